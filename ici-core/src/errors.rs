use thiserror::Error;

/// Error type for the downscaling engine.
///
/// Variants split into two classes (see [`ICIError::is_fatal`]):
/// configuration errors abort a run, data-coverage errors abandon a single
/// initiative or subsector and are collected alongside the results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ICIError {
    #[error("Unit '{0}' is not in the recognised set of CO2-equivalent convertible units")]
    UnknownUnit(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unknown initiative '{0}'")]
    UnknownInitiative(String),
    #[error("Unknown sector '{0}'")]
    UnknownSector(String),
    #[error("Unknown subsector '{0}'")]
    UnknownSubsector(String),
    #[error("'{0}' is not a valid reduction criterium")]
    UnknownCriterium(String),
    #[error("I/O error reading {path}: {details}")]
    Io { path: String, details: String },
    #[error("Could not parse {path}: {details}")]
    Parse { path: String, details: String },
    #[error("No data for {what} in scenario '{scenario}'")]
    MissingData { scenario: String, what: String },
    #[error("No historical data for '{variable}' in {year}")]
    MissingHistoricalData { variable: String, year: i32 },
    #[error("Two initiatives are needed for {sector}|{subsector}, but {found} are given")]
    InitiativeCount {
        sector: String,
        subsector: String,
        found: usize,
    },
    #[error("No overlap rule for {sector}|{subsector} with initiatives {initiatives}")]
    NoOverlapRule {
        sector: String,
        subsector: String,
        initiatives: String,
    },
    #[error("Region '{0}' cannot be resolved to a model region")]
    UnresolvableRegion(String),
}

impl ICIError {
    /// Whether the error must abort the whole run.
    ///
    /// Data-coverage errors only abandon the computation they occurred in.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ICIError::MissingData { .. }
                | ICIError::MissingHistoricalData { .. }
                | ICIError::InitiativeCount { .. }
                | ICIError::NoOverlapRule { .. }
                | ICIError::UnresolvableRegion(_)
        )
    }
}

/// Convenience type for `Result<T, ICIError>`.
pub type ICIResult<T> = Result<T, ICIError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_errors_are_not_fatal() {
        let err = ICIError::InitiativeCount {
            sector: "Industry".to_string(),
            subsector: "Total".to_string(),
            found: 1,
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Two initiatives are needed for Industry|Total, but 1 are given"
        );
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(ICIError::UnknownUnit("Gt C/yr".to_string()).is_fatal());
        assert!(ICIError::InvalidConfiguration("gwp".to_string()).is_fatal());
    }
}
