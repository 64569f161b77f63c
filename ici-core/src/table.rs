//! Row types of the tables exchanged with the external readers
//!
//! Tables are plain `Vec`s of records. Lookups that the stages need repeatedly are built
//! into `BTreeMap`s keyed on the natural key, which keeps iteration deterministic.

use crate::region::RegionId;
use crate::{FloatValue, Year};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One value of a model scenario time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmissionsRecord {
    pub model: String,
    pub scenario: String,
    pub region: RegionId,
    pub variable: String,
    pub year: Year,
    pub value: FloatValue,
    pub unit: String,
}

/// One value of a historical country-level series
///
/// The two `resolvable_*` flags record whether the country code is known in the model's
/// region mapping and in the historical source's country coding respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoricalRecord {
    pub variable: String,
    #[serde(rename = "ISO3")]
    pub iso3: String,
    pub country: String,
    pub region: Option<RegionId>,
    pub year: Year,
    pub value: Option<FloatValue>,
    pub unit: String,
    pub resolvable_model: bool,
    pub resolvable_source: bool,
}

impl HistoricalRecord {
    pub fn is_world(&self) -> bool {
        self.iso3 == crate::historical::WORLD_ISO3 || self.country == "World"
    }
}

/// Records of one scenario and variable
pub fn select<'a>(
    records: &'a [EmissionsRecord],
    scenario: &'a str,
    variable: &'a str,
) -> impl Iterator<Item = &'a EmissionsRecord> + 'a {
    records
        .iter()
        .filter(move |r| r.scenario == scenario && r.variable == variable)
}

/// Sum values per (region, year)
///
/// Several variables can feed one key; they are added.
pub fn by_region_year<'a, I>(records: I) -> BTreeMap<(RegionId, Year), FloatValue>
where
    I: IntoIterator<Item = &'a EmissionsRecord>,
{
    let mut out = BTreeMap::new();
    for r in records {
        *out.entry((r.region, r.year)).or_insert(0.0) += r.value;
    }
    out
}

/// Sorted, de-duplicated years present in a table
pub fn years(records: &[EmissionsRecord]) -> Vec<Year> {
    let mut years: Vec<Year> = records.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();
    years
}
