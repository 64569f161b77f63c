//! Central CO2-equivalent conversion
//!
//! Scenario tables arrive with mixed gas units. Every table is converted exactly once with
//! [`to_co2e`] before any cross-initiative or cross-sector summation, so that downstream
//! stages only ever see `Mt CO2-equiv/yr`.
//!
//! | Unit | Factor |
//! |---|---|
//! | `Mt CO2/yr` | 1 |
//! | `Mt CH4/yr` | GWP CH4 |
//! | `Mt N2O/yr` | GWP N2O |
//! | `kt N2O/yr` | 1e-3 x GWP N2O |
//! | `Tg N/yr` | 44/28 x GWP N2O |
//! | `Mt CO2-equiv/yr` | 1 |

use crate::errors::{ICIError, ICIResult};
use crate::table::EmissionsRecord;
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Molar mass ratio N2O / N2, converts a mass of nitrogen to a mass of N2O
pub const N_TO_N2O: FloatValue = 44.0 / 28.0;

/// Unit label of every converted record
pub const CO2E_UNIT: &str = "Mt CO2-equiv/yr";

/// Global-warming-potential factors used for the conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gwp {
    /// Methane to CO2-equivalent
    /// unit: Mt CO2-equiv / Mt CH4
    /// default: 27.0 (AR6, 100 year)
    pub ch4: FloatValue,

    /// Nitrous oxide to CO2-equivalent
    /// unit: Mt CO2-equiv / Mt N2O
    /// default: 273.0 (AR6, 100 year)
    pub n2o: FloatValue,
}

impl Default for Gwp {
    fn default() -> Self {
        Self {
            ch4: 27.0,
            n2o: 273.0,
        }
    }
}

/// Emission units recognised by the conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmissionUnit {
    MtCO2,
    MtCH4,
    MtN2O,
    KtN2O,
    TgN,
    MtCO2e,
}

impl EmissionUnit {
    /// Parse a unit label, failing with [`ICIError::UnknownUnit`]
    pub fn parse(unit: &str) -> ICIResult<Self> {
        match unit.trim() {
            "Mt CO2/yr" => Ok(EmissionUnit::MtCO2),
            "Mt CH4/yr" => Ok(EmissionUnit::MtCH4),
            "Mt N2O/yr" => Ok(EmissionUnit::MtN2O),
            "kt N2O/yr" => Ok(EmissionUnit::KtN2O),
            "Tg N/yr" => Ok(EmissionUnit::TgN),
            CO2E_UNIT => Ok(EmissionUnit::MtCO2e),
            other => Err(ICIError::UnknownUnit(other.to_string())),
        }
    }

    /// Multiplicative factor to `Mt CO2-equiv/yr`
    pub fn co2e_factor(&self, gwp: &Gwp) -> FloatValue {
        match self {
            EmissionUnit::MtCO2 | EmissionUnit::MtCO2e => 1.0,
            EmissionUnit::MtCH4 => gwp.ch4,
            EmissionUnit::MtN2O => gwp.n2o,
            EmissionUnit::KtN2O => 1e-3 * gwp.n2o,
            EmissionUnit::TgN => N_TO_N2O * gwp.n2o,
        }
    }
}

impl fmt::Display for EmissionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EmissionUnit::MtCO2 => "Mt CO2/yr",
            EmissionUnit::MtCH4 => "Mt CH4/yr",
            EmissionUnit::MtN2O => "Mt N2O/yr",
            EmissionUnit::KtN2O => "kt N2O/yr",
            EmissionUnit::TgN => "Tg N/yr",
            EmissionUnit::MtCO2e => CO2E_UNIT,
        };
        f.write_str(label)
    }
}

/// Convert a whole table to CO2-equivalent
///
/// Fails on the first record whose unit is not recognised; nothing is converted partially.
pub fn to_co2e(records: Vec<EmissionsRecord>, gwp: &Gwp) -> ICIResult<Vec<EmissionsRecord>> {
    records
        .into_iter()
        .map(|mut record| {
            let factor = EmissionUnit::parse(&record.unit)?.co2e_factor(gwp);
            record.value *= factor;
            record.unit = CO2E_UNIT.to_string();
            Ok(record)
        })
        .collect()
}
