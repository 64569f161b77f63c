//! Run configuration
//!
//! A run is described by a single TOML document:
//!
//! ```toml
//! [settings]
//! baseline_scenario = "CP"
//! initiative_scenario = "COPInitiatives"
//! combined_scenario = "COPInitiatives_combined"
//! hist_year = 2020
//!
//! [gwp]
//! ch4 = 27.0
//! n2o = 273.0
//!
//! [[initiatives]]
//! initiative = "Coal"
//! sector = "Energy Supply"
//! subsector = "Electricity and Heat"
//! hist_variable = "Emissions|CO2|Energy|Supply|Electricity"
//! individual_variable = "Emissions|CO2|Energy|Supply|Electricity|Coal"
//! subsector_variable = "Emissions|CO2|Energy|Supply|Electricity"
//! ```
//!
//! Unknown initiative, sector or subsector names fail at parse time. [`RunConfig::validate`]
//! checks the remaining cross-field rules.

use crate::errors::{ICIError, ICIResult};
use crate::initiative::{Initiative, Sector, Subsector, SubsectorKey};
use crate::units::Gwp;
use crate::Year;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Scenario identifiers and reference years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scenario non-members follow
    /// default: "CP"
    pub baseline_scenario: String,

    /// Scenario with the individual initiatives active
    /// default: "COPInitiatives"
    pub initiative_scenario: String,

    /// Scenario with all initiatives active at the same time, the floor of member pathways
    /// default: "COPInitiatives_combined"
    pub combined_scenario: String,

    /// Label of produced member pathways
    /// default: "COPInitiatives_members"
    pub members_scenario: String,

    /// Reference year of the historical country shares
    /// default: 2020
    pub hist_year: Year,

    /// Reference year of the global Flaring participation fraction
    /// default: `hist_year`
    pub flaring_reference_year: Option<Year>,

    /// Economy-wide total variable
    /// default: "Emissions|Kyoto Gases"
    pub kyoto_variable: String,

    /// Variables only reported at World level
    /// default: international aviation and shipping
    pub bunker_variables: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            baseline_scenario: "CP".to_string(),
            initiative_scenario: "COPInitiatives".to_string(),
            combined_scenario: "COPInitiatives_combined".to_string(),
            members_scenario: "COPInitiatives_members".to_string(),
            hist_year: 2020,
            flaring_reference_year: None,
            kyoto_variable: "Emissions|Kyoto Gases".to_string(),
            bunker_variables: vec![
                "Emissions|CO2|Energy|Demand|Transportation|Aviation|International".to_string(),
                "Emissions|CO2|Energy|Demand|Transportation|Shipping|International".to_string(),
            ],
        }
    }
}

impl Settings {
    pub fn flaring_year(&self) -> Year {
        self.flaring_reference_year.unwrap_or(self.hist_year)
    }
}

/// Variables describing one initiative in one subsector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativeParameters {
    pub initiative: Initiative,
    pub sector: Sector,
    pub subsector: Subsector,
    /// Historical series used for the country shares
    pub hist_variable: String,
    /// Emissions the initiative acts on
    pub individual_variable: String,
    /// Emissions of the whole subsector
    pub subsector_variable: String,
    /// No country members, participation is resolved at World level. Required for Flaring
    /// and rejected for every other initiative.
    #[serde(default)]
    pub only_global: bool,
}

impl InitiativeParameters {
    pub fn key(&self) -> SubsectorKey {
        SubsectorKey::new(self.sector, self.subsector)
    }
}

/// Settings of the actor downscaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorsConfig {
    /// Variable split into urban and company emissions, must be an `Emissions` variable
    /// default: "Emissions|Kyoto Gases"
    pub downscale_variable: String,

    /// Scenarios to downscale
    /// default: empty
    pub scenarios: Vec<String>,

    /// First year of the urban ratio projection
    /// default: 2020
    pub hist_year_urban: Year,

    /// Last year of the urban ratio projection
    /// default: 2050
    pub end_year: Year,

    /// Urban emissions source applied to the emissions
    /// default: "All urban (low)"
    pub urban_source: String,

    /// CO2 variables attributed to companies
    pub company_variables: Vec<String>,

    /// Region label to UN continent
    pub continents: BTreeMap<String, String>,

    /// Years replaced by a trailing 3-year mean in the output
    /// default: empty
    pub smooth_years: Vec<Year>,
}

impl Default for ActorsConfig {
    fn default() -> Self {
        let continents = [
            ("CAN", "Americas"),
            ("USA", "Americas"),
            ("MEX", "Americas"),
            ("RCAM", "Americas"),
            ("BRA", "Americas"),
            ("RSAM", "Americas"),
            ("NAF", "Africa"),
            ("WAF", "Africa"),
            ("EAF", "Africa"),
            ("SAF", "Africa"),
            ("WEU", "Europe"),
            ("CEU", "Europe"),
            ("TUR", "Asia"),
            ("UKR", "Europe"),
            ("STAN", "Asia"),
            ("RUS", "Europe"),
            ("ME", "Asia"),
            ("INDIA", "Asia"),
            ("KOR", "Asia"),
            ("CHN", "Asia"),
            ("SEAS", "Asia"),
            ("INDO", "Asia"),
            ("JAP", "Asia"),
            ("OCE", "Oceania"),
            ("RSAS", "Asia"),
            ("RSAF", "Africa"),
        ];
        Self {
            downscale_variable: "Emissions|Kyoto Gases".to_string(),
            scenarios: Vec::new(),
            hist_year_urban: 2020,
            end_year: 2050,
            urban_source: "All urban (low)".to_string(),
            company_variables: [
                "Gross Emissions|CO2|Industrial Processes",
                "Emissions|CO2|Energy|Supply|Electricity",
                "Emissions|CO2|Energy|Supply|Heat",
                "Emissions|CO2|Transportation|Freight|Domestic",
                "Emissions|CO2|Energy|Demand|Commercial",
                "Emissions|CO2|Energy|Demand|Transportation|Aviation|International",
                "Emissions|CO2|Energy|Demand|Transportation|Shipping|International",
            ]
            .iter()
            .map(|v| v.to_string())
            .collect(),
            continents: continents
                .iter()
                .map(|(region, continent)| (region.to_string(), continent.to_string()))
                .collect(),
            smooth_years: Vec::new(),
        }
    }
}

/// Input files read by the command-line front end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    pub scenarios: Option<PathBuf>,
    pub historical: Option<PathBuf>,
    pub signatories: Option<PathBuf>,
    pub flaring: Option<PathBuf>,
    pub urban_population: Option<PathBuf>,
    pub urban_emissions: Option<PathBuf>,
}

/// Complete description of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub gwp: Gwp,
    #[serde(default)]
    pub initiatives: Vec<InitiativeParameters>,
    pub actors: Option<ActorsConfig>,
    #[serde(default)]
    pub inputs: InputsConfig,
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> ICIResult<Self> {
        toml::from_str(content).map_err(|e| ICIError::Parse {
            path: "<config>".to_string(),
            details: e.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> ICIResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ICIError::Io {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ICIError::Parse {
            path: path.display().to_string(),
            details: e.to_string(),
        })
    }

    /// Check cross-field rules
    pub fn validate(&self) -> ICIResult<()> {
        for (name, factor) in [("gwp.ch4", self.gwp.ch4), ("gwp.n2o", self.gwp.n2o)] {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(ICIError::InvalidConfiguration(format!(
                    "{name} must be finite and positive, got {factor}"
                )));
            }
        }

        let s = &self.settings;
        for (name, value) in [
            ("baseline_scenario", &s.baseline_scenario),
            ("initiative_scenario", &s.initiative_scenario),
            ("combined_scenario", &s.combined_scenario),
            ("members_scenario", &s.members_scenario),
            ("kyoto_variable", &s.kyoto_variable),
        ] {
            if value.trim().is_empty() {
                return Err(ICIError::InvalidConfiguration(format!(
                    "settings.{name} must not be empty"
                )));
            }
        }

        if self.initiatives.is_empty() {
            return Err(ICIError::InvalidConfiguration(
                "at least one [[initiatives]] entry is required".to_string(),
            ));
        }
        for p in &self.initiatives {
            if p.only_global != p.initiative.is_global_only() {
                return Err(ICIError::InvalidConfiguration(format!(
                    "only_global = {} for {}, but only Flaring has no country members",
                    p.only_global, p.initiative
                )));
            }
        }

        if let Some(actors) = &self.actors {
            if !actors.downscale_variable.starts_with("Emissions") {
                return Err(ICIError::InvalidConfiguration(format!(
                    "downscale variable '{}' should be an emissions variable that starts with 'Emissions'",
                    actors.downscale_variable
                )));
            }
            if actors.end_year < actors.hist_year_urban {
                return Err(ICIError::InvalidConfiguration(format!(
                    "actors.end_year {} is before hist_year_urban {}",
                    actors.end_year, actors.hist_year_urban
                )));
            }
        }
        Ok(())
    }

    /// Distinct (sector, subsector) pairs in configuration order
    pub fn subsector_keys(&self) -> Vec<SubsectorKey> {
        let mut keys: Vec<SubsectorKey> = Vec::new();
        for p in &self.initiatives {
            if !keys.contains(&p.key()) {
                keys.push(p.key());
            }
        }
        keys
    }

    /// Distinct initiatives active in a subsector
    pub fn initiatives_in(&self, key: SubsectorKey) -> Vec<Initiative> {
        let mut out: Vec<Initiative> = Vec::new();
        for p in self.initiatives.iter().filter(|p| p.key() == key) {
            if !out.contains(&p.initiative) {
                out.push(p.initiative);
            }
        }
        out
    }

    /// Distinct initiatives with their first parameter entry
    pub fn initiative_entries(&self) -> Vec<&InitiativeParameters> {
        let mut seen: Vec<Initiative> = Vec::new();
        let mut out = Vec::new();
        for p in &self.initiatives {
            if !seen.contains(&p.initiative) {
                seen.push(p.initiative);
                out.push(p);
            }
        }
        out
    }

    /// Subsector variable of a subsector (first configured entry)
    pub fn subsector_variable(&self, key: SubsectorKey) -> Option<&str> {
        self.initiatives
            .iter()
            .find(|p| p.key() == key)
            .map(|p| p.subsector_variable.as_str())
    }

    /// Sorted, de-duplicated variables of a kind
    pub fn variables<F>(&self, field: F) -> Vec<String>
    where
        F: Fn(&InitiativeParameters) -> &str,
    {
        let mut vars: Vec<String> = self.initiatives.iter().map(|p| field(p).to_string()).collect();
        vars.sort();
        vars.dedup();
        vars
    }
}
