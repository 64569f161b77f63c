//! Historical share calculator
//!
//! Turns a country-level historical series into each country's share of its model region
//! in a reference year. Only countries that resolve in both the model's region mapping and
//! the historical source's coding, that belong to a non-World region and that report a
//! value are eligible. Other countries are left out of the denominator entirely.

use ici_core::initiative::Initiative;
use ici_core::region::RegionId;
use ici_core::table::HistoricalRecord;
use ici_core::{FloatValue, Year};
use is_close::is_close;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Parameters for the share calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareParameters {
    /// Year the shares are taken from, kept constant over the projection
    pub reference_year: Year,
}

/// A country's share of its region for one initiative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryShare {
    pub initiative: Initiative,
    pub iso3: String,
    pub country: String,
    pub region: RegionId,
    /// Historical value in the reference year
    pub value: FloatValue,
    pub share: FloatValue,
}

#[derive(Debug, Clone)]
pub struct ShareCalculator {
    parameters: ShareParameters,
}

impl ShareCalculator {
    pub fn from_parameters(parameters: ShareParameters) -> Self {
        Self { parameters }
    }

    fn is_eligible(&self, record: &HistoricalRecord) -> bool {
        record.year == self.parameters.reference_year
            && record.resolvable_model
            && record.resolvable_source
            && record.value.is_some()
            && matches!(record.region, Some(region) if !region.is_world())
            && !record.is_world()
    }

    /// Shares of all eligible countries, ordered by region then country
    ///
    /// A region whose eligible values sum to zero yields no shares.
    pub fn calculate(
        &self,
        initiative: Initiative,
        history: &[HistoricalRecord],
    ) -> Vec<CountryShare> {
        let mut by_region: BTreeMap<RegionId, Vec<(&HistoricalRecord, FloatValue)>> =
            BTreeMap::new();
        for record in history.iter().filter(|r| self.is_eligible(r)) {
            if let (Some(region), Some(value)) = (record.region, record.value) {
                by_region.entry(region).or_default().push((record, value));
            }
        }

        let mut shares = Vec::new();
        for (region, rows) in by_region {
            let total: FloatValue = rows.iter().map(|(_, v)| v).sum();
            if total == 0.0 {
                debug!(initiative = %initiative, region = %region, "no activity in region, no shares");
                continue;
            }
            let mut region_shares: Vec<CountryShare> = rows
                .into_iter()
                .map(|(record, value)| CountryShare {
                    initiative,
                    iso3: record.iso3.clone(),
                    country: record.country.clone(),
                    region,
                    value,
                    share: value / total,
                })
                .collect();
            region_shares.sort_by(|a, b| a.iso3.cmp(&b.iso3));

            let sum: FloatValue = region_shares.iter().map(|s| s.share).sum();
            if !is_close!(sum, 1.0) {
                warn!(initiative = %initiative, region = %region, sum = sum, "country shares do not sum to one");
            }
            shares.extend(region_shares);
        }
        shares
    }
}

/// Index shares by (initiative, country)
pub fn index_shares(shares: &[CountryShare]) -> HashMap<(Initiative, &str), &CountryShare> {
    shares
        .iter()
        .map(|s| ((s.initiative, s.iso3.as_str()), s))
        .collect()
}
