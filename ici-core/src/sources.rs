//! Interfaces to the external readers
//!
//! The allocation stages never read files. They receive materialised tables through these
//! traits; the command-line front end provides CSV-backed tables and tests provide small
//! in-memory ones.

use crate::errors::{ICIError, ICIResult};
use crate::historical::ensure_world;
use crate::table::{EmissionsRecord, HistoricalRecord};
use crate::Year;

/// Model scenario time series
pub trait ScenarioSource {
    /// All records of `scenario` for the given variables, including World rows
    ///
    /// Returns [`ICIError::MissingData`] when nothing matches.
    fn read(&self, scenario: &str, variables: &[String]) -> ICIResult<Vec<EmissionsRecord>>;
}

/// Historical country-level series
pub trait HistoricalSource {
    /// All years of `variable`, with a World row per year
    ///
    /// Returns [`ICIError::MissingHistoricalData`] when the variable is unknown.
    fn read(&self, variable: &str, reference_year: Year) -> ICIResult<Vec<HistoricalRecord>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryScenarios {
    records: Vec<EmissionsRecord>,
}

impl InMemoryScenarios {
    pub fn new(records: Vec<EmissionsRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[EmissionsRecord] {
        &self.records
    }
}

impl ScenarioSource for InMemoryScenarios {
    fn read(&self, scenario: &str, variables: &[String]) -> ICIResult<Vec<EmissionsRecord>> {
        let out: Vec<EmissionsRecord> = self
            .records
            .iter()
            .filter(|r| r.scenario == scenario && variables.contains(&r.variable))
            .cloned()
            .collect();
        if out.is_empty() {
            return Err(ICIError::MissingData {
                scenario: scenario.to_string(),
                what: variables.join(", "),
            });
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    records: Vec<HistoricalRecord>,
}

impl InMemoryHistory {
    pub fn new(records: Vec<HistoricalRecord>) -> Self {
        Self { records }
    }
}

impl HistoricalSource for InMemoryHistory {
    fn read(&self, variable: &str, reference_year: Year) -> ICIResult<Vec<HistoricalRecord>> {
        let out: Vec<HistoricalRecord> = self
            .records
            .iter()
            .filter(|r| r.variable == variable)
            .cloned()
            .collect();
        if out.is_empty() {
            return Err(ICIError::MissingHistoricalData {
                variable: variable.to_string(),
                year: reference_year,
            });
        }
        Ok(ensure_world(out))
    }
}
