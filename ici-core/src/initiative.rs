//! Typed vocabulary of initiatives, sectors and subsectors
//!
//! The names used in signatory tables, parameter files and output tables are mapped onto
//! closed enums. Parsing is strict: an unknown name is a configuration error rather than a
//! silently empty column.
//!
//! ```rust
//! use ici_core::initiative::{Initiative, Sector, Subsector};
//!
//! let ici: Initiative = "Transport_cars_buses".parse().unwrap();
//! assert_eq!(ici, Initiative::TransportCarsBuses);
//! assert_eq!(ici.to_string(), "Transport_cars_buses");
//!
//! let sector: Sector = "Energy Supply".parse().unwrap();
//! let subsector: Subsector = "Fugitive|Oil Production".parse().unwrap();
//! assert_eq!(format!("{sector}|{subsector}"), "Energy Supply|Fugitive|Oil Production");
//! ```

use crate::errors::{ICIError, ICIResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// International cooperative initiative
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Initiative {
    Methane,
    Coal,
    Renewable,
    Cooling,
    Steel,
    Cement,
    #[serde(rename = "Transport_cars_buses")]
    TransportCarsBuses,
    #[serde(rename = "Transport_trucks")]
    TransportTrucks,
    Deforestation,
    #[serde(rename = "Bunkers_aviation")]
    BunkersAviation,
    Efficiency,
    Buildings,
    /// Has no country members, participation is a single global fraction
    Flaring,
}

impl Initiative {
    pub const ALL: [Initiative; 13] = [
        Initiative::Methane,
        Initiative::Coal,
        Initiative::Renewable,
        Initiative::Cooling,
        Initiative::Steel,
        Initiative::Cement,
        Initiative::TransportCarsBuses,
        Initiative::TransportTrucks,
        Initiative::Deforestation,
        Initiative::BunkersAviation,
        Initiative::Efficiency,
        Initiative::Buildings,
        Initiative::Flaring,
    ];

    /// Signatory-table columns that are already folded into other initiatives
    /// (`BT_Power` into Coal, `BT_Road` into Transport_cars_buses).
    pub const IGNORED_COLUMNS: [&'static str; 2] = ["BT_Power", "BT_Road"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Initiative::Methane => "Methane",
            Initiative::Coal => "Coal",
            Initiative::Renewable => "Renewable",
            Initiative::Cooling => "Cooling",
            Initiative::Steel => "Steel",
            Initiative::Cement => "Cement",
            Initiative::TransportCarsBuses => "Transport_cars_buses",
            Initiative::TransportTrucks => "Transport_trucks",
            Initiative::Deforestation => "Deforestation",
            Initiative::BunkersAviation => "Bunkers_aviation",
            Initiative::Efficiency => "Efficiency",
            Initiative::Buildings => "Buildings",
            Initiative::Flaring => "Flaring",
        }
    }

    /// Whether participation is resolved at World level only
    pub fn is_global_only(&self) -> bool {
        matches!(self, Initiative::Flaring)
    }

    /// Whether a signatory-table column should be skipped
    pub fn is_ignored_column(column: &str) -> bool {
        Self::IGNORED_COLUMNS.contains(&column)
    }
}

impl fmt::Display for Initiative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Initiative {
    type Err = ICIError;

    fn from_str(s: &str) -> ICIResult<Self> {
        Initiative::ALL
            .iter()
            .find(|ici| ici.as_str() == s)
            .copied()
            .ok_or_else(|| ICIError::UnknownInitiative(s.to_string()))
    }
}

/// Economic sector an initiative acts on
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Sector {
    #[serde(rename = "Energy Supply")]
    EnergySupply,
    #[serde(rename = "Energy Demand")]
    EnergyDemand,
    Industry,
    Transportation,
    #[serde(rename = "International Bunkers")]
    InternationalBunkers,
    Buildings,
    #[serde(rename = "LULUCF")]
    Lulucf,
    Total,
}

impl Sector {
    pub const ALL: [Sector; 8] = [
        Sector::EnergySupply,
        Sector::EnergyDemand,
        Sector::Industry,
        Sector::Transportation,
        Sector::InternationalBunkers,
        Sector::Buildings,
        Sector::Lulucf,
        Sector::Total,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::EnergySupply => "Energy Supply",
            Sector::EnergyDemand => "Energy Demand",
            Sector::Industry => "Industry",
            Sector::Transportation => "Transportation",
            Sector::InternationalBunkers => "International Bunkers",
            Sector::Buildings => "Buildings",
            Sector::Lulucf => "LULUCF",
            Sector::Total => "Total",
        }
    }

    /// Bunker emissions are only reported for the World region
    pub fn is_world_only(&self) -> bool {
        matches!(self, Sector::InternationalBunkers)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = ICIError;

    fn from_str(s: &str) -> ICIResult<Self> {
        Sector::ALL
            .iter()
            .find(|sector| sector.as_str() == s)
            .copied()
            .ok_or_else(|| ICIError::UnknownSector(s.to_string()))
    }
}

/// Part of a sector with its own emissions variable
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Subsector {
    #[serde(rename = "Electricity and Heat")]
    ElectricityAndHeat,
    #[serde(rename = "Fugitive|Oil Production")]
    FugitiveOilProduction,
    Total,
    Deforestation,
}

impl Subsector {
    pub const ALL: [Subsector; 4] = [
        Subsector::ElectricityAndHeat,
        Subsector::FugitiveOilProduction,
        Subsector::Total,
        Subsector::Deforestation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsector::ElectricityAndHeat => "Electricity and Heat",
            Subsector::FugitiveOilProduction => "Fugitive|Oil Production",
            Subsector::Total => "Total",
            Subsector::Deforestation => "Deforestation",
        }
    }
}

impl fmt::Display for Subsector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsector {
    type Err = ICIError;

    fn from_str(s: &str) -> ICIResult<Self> {
        Subsector::ALL
            .iter()
            .find(|sub| sub.as_str() == s)
            .copied()
            .ok_or_else(|| ICIError::UnknownSubsector(s.to_string()))
    }
}

/// A (sector, subsector) pair, the unit of overlap resolution
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SubsectorKey {
    pub sector: Sector,
    pub subsector: Subsector,
}

impl SubsectorKey {
    pub fn new(sector: Sector, subsector: Subsector) -> Self {
        Self { sector, subsector }
    }
}

impl fmt::Display for SubsectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.sector, self.subsector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiative_names_round_trip() {
        for ici in Initiative::ALL {
            assert_eq!(ici.to_string().parse::<Initiative>().unwrap(), ici);
        }
    }

    #[test]
    fn initiative_serde_uses_column_names() {
        let json = serde_json::to_string(&Initiative::BunkersAviation).unwrap();
        assert_eq!(json, "\"Bunkers_aviation\"");
        let parsed: Initiative = serde_json::from_str("\"Transport_trucks\"").unwrap();
        assert_eq!(parsed, Initiative::TransportTrucks);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            "Solar".parse::<Initiative>(),
            Err(ICIError::UnknownInitiative("Solar".to_string()))
        );
        assert!("Agriculture".parse::<Sector>().is_err());
        assert!("Heat".parse::<Subsector>().is_err());
    }

    #[test]
    fn folded_columns_are_ignored() {
        assert!(Initiative::is_ignored_column("BT_Power"));
        assert!(Initiative::is_ignored_column("BT_Road"));
        assert!(!Initiative::is_ignored_column("Coal"));
        assert!("BT_Power".parse::<Initiative>().is_err());
    }

    #[test]
    fn only_flaring_is_global() {
        let global: Vec<_> = Initiative::ALL
            .iter()
            .filter(|ici| ici.is_global_only())
            .collect();
        assert_eq!(global, vec![&Initiative::Flaring]);
    }

    #[test]
    fn subsector_key_display() {
        let key = SubsectorKey::new(Sector::EnergySupply, Subsector::ElectricityAndHeat);
        assert_eq!(key.to_string(), "Energy Supply|Electricity and Heat");
    }
}
