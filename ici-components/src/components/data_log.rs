//! Country data log
//!
//! Reports, per initiative, which countries report historical data in the reference year.
//! Countries are weighted by their share of the reference-year Kyoto total so that gaps in
//! large emitters stand out.

use ici_core::errors::ICIResult;
use ici_core::initiative::Initiative;
use ici_core::table::HistoricalRecord;
use ici_core::{FloatValue, Year};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Data availability of one country
#[derive(Debug, Clone, PartialEq)]
pub struct DataLogEntry {
    pub iso3: String,
    pub country: String,
    /// Percent of the Kyoto total, absent when the Kyoto series is unavailable
    pub weight: Option<FloatValue>,
    /// Whether the country reports a non-zero value, absent when it is not listed at all
    pub flags: BTreeMap<Initiative, Option<bool>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataLog {
    pub initiatives: Vec<Initiative>,
    pub entries: Vec<DataLogEntry>,
}

impl DataLog {
    /// Build the log from each initiative's historical series
    ///
    /// `kyoto` is the historical Kyoto series; when it could not be read the weights are
    /// left empty.
    pub fn build(
        histories: &[(Initiative, Vec<HistoricalRecord>)],
        kyoto: ICIResult<&[HistoricalRecord]>,
        year: Year,
    ) -> Self {
        let mut countries: BTreeMap<String, String> = BTreeMap::new();
        let mut values: BTreeMap<(Initiative, String), bool> = BTreeMap::new();
        let mut initiatives: BTreeSet<Initiative> = BTreeSet::new();
        for (initiative, records) in histories {
            initiatives.insert(*initiative);
            for r in records.iter().filter(|r| r.year == year && !r.is_world()) {
                countries
                    .entry(r.iso3.clone())
                    .or_insert_with(|| r.country.clone());
                let flag = r.value.unwrap_or(0.0) != 0.0;
                values
                    .entry((*initiative, r.iso3.clone()))
                    .and_modify(|f| *f |= flag)
                    .or_insert(flag);
            }
        }

        let weights = match kyoto {
            Ok(records) => Some(kyoto_weights(records, year)),
            Err(e) => {
                warn!(error = %e, "no Kyoto data for the data log weights");
                None
            }
        };

        let mut entries: Vec<DataLogEntry> = countries
            .into_iter()
            .map(|(iso3, country)| {
                let flags = initiatives
                    .iter()
                    .map(|ici| (*ici, values.get(&(*ici, iso3.clone())).copied()))
                    .collect();
                let weight = weights
                    .as_ref()
                    .map(|w| w.get(&iso3).copied().unwrap_or(0.0));
                DataLogEntry {
                    iso3,
                    country,
                    weight,
                    flags,
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            b.weight
                .unwrap_or(0.0)
                .total_cmp(&a.weight.unwrap_or(0.0))
                .then_with(|| a.iso3.cmp(&b.iso3))
        });

        Self {
            initiatives: initiatives.into_iter().collect(),
            entries,
        }
    }
}

/// Percent of the Kyoto total per country in `year`
fn kyoto_weights(records: &[HistoricalRecord], year: Year) -> BTreeMap<String, FloatValue> {
    let values: Vec<(&str, FloatValue)> = records
        .iter()
        .filter(|r| r.year == year && !r.is_world())
        .map(|r| (r.iso3.as_str(), r.value.unwrap_or(0.0)))
        .collect();
    let total: FloatValue = values.iter().map(|(_, v)| v).sum();
    let mut out = BTreeMap::new();
    for (iso3, value) in values {
        let weight = if total == 0.0 {
            0.0
        } else {
            100.0 * value / total
        };
        *out.entry(iso3.to_string()).or_insert(0.0) += weight;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ici_core::errors::ICIError;
    use ici_core::region::RegionId;
    use is_close::is_close;

    fn row(variable: &str, iso3: &str, value: Option<FloatValue>) -> HistoricalRecord {
        HistoricalRecord {
            variable: variable.to_string(),
            iso3: iso3.to_string(),
            country: iso3.to_string(),
            region: Some(RegionId(11)),
            year: 2020,
            value,
            unit: "Mt CO2-equiv/yr".to_string(),
            resolvable_model: true,
            resolvable_source: true,
        }
    }

    #[test]
    fn countries_are_flagged_and_weighted() {
        let steel = vec![row("steel", "DEU", Some(30.0)), row("steel", "FRA", Some(0.0))];
        let cement = vec![row("cement", "DEU", None)];
        let kyoto = vec![
            row("kyoto", "DEU", Some(750.0)),
            row("kyoto", "FRA", Some(250.0)),
            row("kyoto", "WLD", Some(1000.0)),
        ];
        let log = DataLog::build(
            &[(Initiative::Steel, steel), (Initiative::Cement, cement)],
            Ok(kyoto.as_slice()),
            2020,
        );

        assert_eq!(log.initiatives, [Initiative::Steel, Initiative::Cement]);
        assert_eq!(log.entries[0].iso3, "DEU");
        assert!(is_close!(log.entries[0].weight.unwrap(), 75.0));
        assert_eq!(log.entries[0].flags[&Initiative::Steel], Some(true));
        assert_eq!(log.entries[0].flags[&Initiative::Cement], Some(false));
        assert_eq!(log.entries[1].flags[&Initiative::Steel], Some(false));
        assert_eq!(log.entries[1].flags[&Initiative::Cement], None);
    }

    #[test]
    fn missing_kyoto_leaves_weights_empty() {
        let steel = vec![row("steel", "DEU", Some(30.0))];
        let log = DataLog::build(
            &[(Initiative::Steel, steel)],
            Err(ICIError::MissingHistoricalData {
                variable: "kyoto".to_string(),
                year: 2020,
            }),
            2020,
        );
        assert_eq!(log.entries[0].weight, None);
    }
}
