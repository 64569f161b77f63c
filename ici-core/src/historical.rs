//! Historical country series helpers

use crate::region::RegionId;
use crate::table::HistoricalRecord;
use crate::{FloatValue, Year};
use std::collections::BTreeMap;
use tracing::info;

/// Country code of the synthesised World aggregate
pub const WORLD_ISO3: &str = "WLD";

/// Append a World row per (variable, year) if the series has none
///
/// The World value is the sum of all country values of that year; missing values count as
/// nothing. Series that already carry a World row are returned unchanged.
pub fn ensure_world(mut records: Vec<HistoricalRecord>) -> Vec<HistoricalRecord> {
    if records.iter().any(|r| r.is_world()) {
        return records;
    }

    let mut totals: BTreeMap<(String, Year), (FloatValue, String)> = BTreeMap::new();
    for r in &records {
        let entry = totals
            .entry((r.variable.clone(), r.year))
            .or_insert_with(|| (0.0, r.unit.clone()));
        entry.0 += r.value.unwrap_or(0.0);
    }

    if let Some(((variable, _), _)) = totals.iter().next() {
        info!(variable = %variable, "World is not included, all countries are aggregated to World");
    }

    records.extend(
        totals
            .into_iter()
            .map(|((variable, year), (value, unit))| HistoricalRecord {
                variable,
                iso3: WORLD_ISO3.to_string(),
                country: "World".to_string(),
                region: Some(RegionId::WORLD),
                year,
                value: Some(value),
                unit,
                resolvable_model: true,
                resolvable_source: true,
            }),
    );
    records
}
