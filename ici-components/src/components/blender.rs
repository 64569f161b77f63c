//! Pathway blender
//!
//! Builds the member pathway of an initiative: signatories follow the mitigation scenario,
//! everyone else follows the baseline. Emissions are only available per region, so the blend
//! happens at region level with the coverage fraction as weight:
//!
//! $$ M_r = (1 - c_r) B_r + c_r S_r $$
//!
//! The World value is the sum of the regional blends. Initiatives without country members
//! are blended directly at World level with the global fraction.

use ici_core::errors::{ICIError, ICIResult};
use ici_core::initiative::Initiative;
use ici_core::region::{rollup, RegionId};
use ici_core::table::EmissionsRecord;
use ici_core::{FloatValue, Year};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct PathwayBlender {
    members_scenario: String,
}

impl PathwayBlender {
    pub fn new(members_scenario: impl Into<String>) -> Self {
        Self {
            members_scenario: members_scenario.into(),
        }
    }

    /// Blend one value
    pub fn blend_value(
        coverage: FloatValue,
        baseline: FloatValue,
        mitigation: FloatValue,
    ) -> FloatValue {
        let value_share_baseline = (1.0 - coverage) * baseline;
        let value_share_mitigation = coverage * mitigation;
        value_share_baseline + value_share_mitigation
    }

    /// Member pathway of an initiative
    ///
    /// `coverage` is keyed by (region, year); a region without an entry is not covered.
    /// Every baseline value needs a mitigation counterpart, otherwise the initiative is
    /// abandoned with [`ICIError::MissingData`].
    pub fn blend(
        &self,
        initiative: Initiative,
        coverage: &BTreeMap<(RegionId, Year), FloatValue>,
        baseline: &[EmissionsRecord],
        mitigation: &[EmissionsRecord],
    ) -> ICIResult<Vec<EmissionsRecord>> {
        let mitigation_index: BTreeMap<(RegionId, &str, Year), FloatValue> = mitigation
            .iter()
            .map(|r| ((r.region, r.variable.as_str(), r.year), r.value))
            .collect();
        if mitigation_index.is_empty() {
            return Err(ICIError::MissingData {
                scenario: mitigation_scenario(mitigation),
                what: format!("mitigation pathway for {initiative}"),
            });
        }

        let global_only = initiative.is_global_only();
        let mut out = Vec::new();
        let mut world: BTreeMap<(String, Year), (Vec<FloatValue>, &EmissionsRecord)> =
            BTreeMap::new();

        for record in baseline {
            if record.region.is_world() != global_only {
                continue;
            }
            let mitigation_value = mitigation_index
                .get(&(record.region, record.variable.as_str(), record.year))
                .copied()
                .ok_or_else(|| ICIError::MissingData {
                    scenario: mitigation_scenario(mitigation),
                    what: format!(
                        "{} in region {} in {} for {initiative}",
                        record.variable, record.region, record.year
                    ),
                })?;
            let c = coverage
                .get(&(record.region, record.year))
                .copied()
                .unwrap_or(0.0);
            let value = Self::blend_value(c, record.value, mitigation_value);

            if !global_only {
                world
                    .entry((record.variable.clone(), record.year))
                    .or_insert_with(|| (Vec::new(), record))
                    .0
                    .push(value);
            }
            out.push(self.member_record(record, record.region, value));
        }

        for (_, (values, template)) in world {
            out.push(self.member_record(template, RegionId::WORLD, rollup(values)));
        }
        Ok(out)
    }

    fn member_record(
        &self,
        template: &EmissionsRecord,
        region: RegionId,
        value: FloatValue,
    ) -> EmissionsRecord {
        EmissionsRecord {
            model: template.model.clone(),
            scenario: self.members_scenario.clone(),
            region,
            variable: template.variable.clone(),
            year: template.year,
            value,
            unit: template.unit.clone(),
        }
    }
}

fn mitigation_scenario(mitigation: &[EmissionsRecord]) -> String {
    mitigation
        .first()
        .map(|r| r.scenario.clone())
        .unwrap_or_else(|| "mitigation".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn record(scenario: &str, region: RegionId, year: Year, value: FloatValue) -> EmissionsRecord {
        EmissionsRecord {
            model: "IMAGE 3.3".to_string(),
            scenario: scenario.to_string(),
            region,
            variable: "Emissions|CO2|Energy|Supply|Electricity|Coal".to_string(),
            year,
            value,
            unit: "Mt CO2-equiv/yr".to_string(),
        }
    }

    #[test]
    fn regions_blend_and_world_sums() {
        let baseline = vec![
            record("CP", RegionId(11), 2030, 100.0),
            record("CP", RegionId(20), 2030, 300.0),
            record("CP", RegionId::WORLD, 2030, 400.0),
        ];
        let mitigation = vec![
            record("COP", RegionId(11), 2030, 20.0),
            record("COP", RegionId(20), 2030, 100.0),
            record("COP", RegionId::WORLD, 2030, 120.0),
        ];
        let coverage = BTreeMap::from([((RegionId(11), 2030), 0.5)]);
        let out = PathwayBlender::new("members")
            .blend(Initiative::Coal, &coverage, &baseline, &mitigation)
            .unwrap();

        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.scenario == "members"));
        assert!(is_close!(out[0].value, 60.0));
        assert!(is_close!(out[1].value, 300.0));
        assert_eq!(out[2].region, RegionId::WORLD);
        assert!(is_close!(out[2].value, 360.0));
    }

    #[test]
    fn global_initiative_blends_at_world() {
        let baseline = vec![
            record("CP", RegionId(17), 2020, 700.0),
            record("CP", RegionId::WORLD, 2020, 1000.0),
        ];
        let mitigation = vec![
            record("COP", RegionId(17), 2020, 300.0),
            record("COP", RegionId::WORLD, 2020, 500.0),
        ];
        let coverage = BTreeMap::from([((RegionId::WORLD, 2020), 0.3)]);
        let out = PathwayBlender::new("members")
            .blend(Initiative::Flaring, &coverage, &baseline, &mitigation)
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].region, RegionId::WORLD);
        assert!(is_close!(out[0].value, 0.7 * 1000.0 + 0.3 * 500.0));
    }

    #[test]
    fn missing_mitigation_is_a_data_error() {
        let baseline = vec![record("CP", RegionId(11), 2030, 100.0)];
        let mitigation = vec![record("COP", RegionId(11), 2035, 20.0)];
        let err = PathwayBlender::new("members")
            .blend(Initiative::Coal, &BTreeMap::new(), &baseline, &mitigation)
            .unwrap_err();
        assert!(!err.is_fatal());

        let err = PathwayBlender::new("members")
            .blend(Initiative::Coal, &BTreeMap::new(), &baseline, &[])
            .unwrap_err();
        assert!(matches!(err, ICIError::MissingData { .. }));
    }
}
