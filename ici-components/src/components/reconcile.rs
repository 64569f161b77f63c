//! Sector and Kyoto reconciler
//!
//! Turns the member reduction of each subsector into a member pathway and rolls the covered
//! subsectors up into an economy-wide Kyoto-gas pathway.
//!
//! Per subsector, region and year the member pathway is the baseline minus the resolved
//! reduction, floored at the combined-initiatives scenario:
//!
//! $$ P_r(y) = \max(B_r(y) - R_r(y), C_r(y)) $$
//!
//! The Kyoto member pathway treats all emissions outside the covered subsectors as
//! following the baseline:
//!
//! $$ K^{members}_r = \left(K^{baseline}_r - \sum_s B_{s,r}\right) + \sum_s P_{s,r} $$
//!
//! Bunker variables are only reported at World level, so they are left out of the covered
//! baseline of every other region.

use crate::components::overlap::SubsectorReduction;
use ici_core::config::Settings;
use ici_core::diagnostics::{Diagnostics, FloorEvent};
use ici_core::errors::{ICIError, ICIResult};
use ici_core::initiative::{Sector, Subsector, SubsectorKey};
use ici_core::region::{rollup, RegionId};
use ici_core::table::{by_region_year, select, EmissionsRecord};
use ici_core::units::CO2E_UNIT;
use ici_core::{FloatValue, Year};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Member pathway of one subsector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsectorPathway {
    pub sector: Sector,
    pub subsector: Subsector,
    pub region: RegionId,
    pub year: Year,
    pub value: FloatValue,
    pub unit: String,
    pub scenario: String,
}

impl SubsectorPathway {
    pub fn key(&self) -> SubsectorKey {
        SubsectorKey::new(self.sector, self.subsector)
    }
}

/// Economy-wide pathway of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KyotoPathway {
    pub scenario: String,
    pub region: RegionId,
    pub year: Year,
    /// Baseline emissions outside the covered subsectors
    pub not_covered: FloatValue,
    /// Member pathways of the covered subsectors
    pub covered: FloatValue,
    pub value: FloatValue,
    pub unit: String,
}

#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    settings: &'a Settings,
}

impl<'a> Reconciler<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    fn series(
        &self,
        records: &[EmissionsRecord],
        scenario: &str,
        variable: &str,
    ) -> ICIResult<BTreeMap<(RegionId, Year), FloatValue>> {
        let series = by_region_year(select(records, scenario, variable));
        if series.is_empty() {
            return Err(ICIError::MissingData {
                scenario: scenario.to_string(),
                what: variable.to_string(),
            });
        }
        Ok(series)
    }

    /// Member pathway of a subsector, regions plus World
    ///
    /// A region without a resolved reduction follows the baseline. World-only sectors keep
    /// their World row only.
    pub fn subsector_pathway(
        &self,
        key: SubsectorKey,
        variable: &str,
        reductions: &[SubsectorReduction],
        records: &[EmissionsRecord],
        diagnostics: &mut Diagnostics,
    ) -> ICIResult<Vec<SubsectorPathway>> {
        let baseline = self.series(records, &self.settings.baseline_scenario, variable)?;
        let combined = by_region_year(select(records, &self.settings.combined_scenario, variable));
        let reductions: BTreeMap<(RegionId, Year), FloatValue> = reductions
            .iter()
            .filter(|r| r.key() == key)
            .map(|r| ((r.region, r.year), r.reduction_country_members))
            .collect();

        let pathway = |region: RegionId, year: Year, value: FloatValue| SubsectorPathway {
            sector: key.sector,
            subsector: key.subsector,
            region,
            year,
            value,
            unit: CO2E_UNIT.to_string(),
            scenario: self.settings.members_scenario.clone(),
        };

        let mut out = Vec::new();
        let mut world: BTreeMap<Year, Vec<FloatValue>> = BTreeMap::new();
        let mut floored = 0usize;
        for (&(region, year), &value_baseline) in baseline.iter().filter(|((r, _), _)| !r.is_world())
        {
            let reduction = reductions.get(&(region, year)).copied().unwrap_or(0.0);
            let mut value = value_baseline - reduction;
            if let Some(&floor) = combined.get(&(region, year)) {
                if value < floor {
                    floored += 1;
                    diagnostics.floors.push(FloorEvent {
                        sector: key.sector,
                        subsector: key.subsector,
                        region,
                        year,
                        member_value: value,
                        combined_value: floor,
                    });
                    value = floor;
                }
            }
            world.entry(year).or_default().push(value);
            if !key.sector.is_world_only() {
                out.push(pathway(region, year, value));
            }
        }
        if world.is_empty() {
            for (&(_, year), &value) in baseline.iter().filter(|((r, _), _)| r.is_world()) {
                let reduction = reductions
                    .get(&(RegionId::WORLD, year))
                    .copied()
                    .unwrap_or(0.0);
                world.insert(year, vec![value - reduction]);
            }
        }
        if floored > 0 {
            warn!(subsector = %key, rows = floored, "member pathway below the combined scenario, floored");
        }

        out.extend(
            world
                .into_iter()
                .map(|(year, values)| pathway(RegionId::WORLD, year, rollup(values))),
        );
        Ok(out)
    }

    /// Kyoto-gas member pathway from the subsector pathways
    ///
    /// `covered_variables` are the baseline variables of the subsectors that produced a
    /// pathway. Missing subsector values count as zero.
    pub fn kyoto_pathway(
        &self,
        covered_variables: &[String],
        pathways: &[SubsectorPathway],
        records: &[EmissionsRecord],
    ) -> ICIResult<Vec<KyotoPathway>> {
        let settings = self.settings;
        let kyoto = self.series(records, &settings.baseline_scenario, &settings.kyoto_variable)?;

        let variables: BTreeSet<&str> = covered_variables.iter().map(|v| v.as_str()).collect();
        let mut covered_baseline: BTreeMap<(RegionId, Year), FloatValue> = BTreeMap::new();
        for variable in variables {
            let bunker = settings.bunker_variables.iter().any(|b| b == variable);
            for ((region, year), value) in
                by_region_year(select(records, &settings.baseline_scenario, variable))
            {
                if bunker && !region.is_world() {
                    continue;
                }
                *covered_baseline.entry((region, year)).or_insert(0.0) += value;
            }
        }

        let mut covered_members: BTreeMap<(RegionId, Year), FloatValue> = BTreeMap::new();
        for p in pathways {
            *covered_members.entry((p.region, p.year)).or_insert(0.0) += p.value;
        }

        let out: Vec<KyotoPathway> = kyoto
            .into_iter()
            .map(|((region, year), value)| {
                let not_covered =
                    value - covered_baseline.get(&(region, year)).copied().unwrap_or(0.0);
                let covered = covered_members.get(&(region, year)).copied().unwrap_or(0.0);
                KyotoPathway {
                    scenario: settings.members_scenario.clone(),
                    region,
                    year,
                    not_covered,
                    covered,
                    value: not_covered + covered,
                    unit: CO2E_UNIT.to_string(),
                }
            })
            .collect();
        info!(rows = out.len(), "Kyoto member pathway reconciled");
        Ok(out)
    }

    /// Kyoto totals of the baseline, initiative and combined scenarios
    pub fn kyoto_reference(&self, records: &[EmissionsRecord]) -> Vec<KyotoPathway> {
        let settings = self.settings;
        [
            &settings.baseline_scenario,
            &settings.initiative_scenario,
            &settings.combined_scenario,
        ]
        .into_iter()
        .flat_map(|scenario| {
            by_region_year(select(records, scenario, &settings.kyoto_variable))
                .into_iter()
                .map(move |((region, year), value)| KyotoPathway {
                    scenario: scenario.clone(),
                    region,
                    year,
                    not_covered: value,
                    covered: 0.0,
                    value,
                    unit: CO2E_UNIT.to_string(),
                })
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    const ELEC: &str = "Emissions|CO2|Energy|Supply|Electricity";
    const AVIATION: &str = "Emissions|CO2|Energy|Demand|Transportation|Aviation|International";
    const KYOTO: &str = "Emissions|Kyoto Gases";

    fn record(scenario: &str, variable: &str, region: RegionId, value: FloatValue) -> EmissionsRecord {
        EmissionsRecord {
            model: "IMAGE 3.3".to_string(),
            scenario: scenario.to_string(),
            region,
            variable: variable.to_string(),
            year: 2030,
            value,
            unit: CO2E_UNIT.to_string(),
        }
    }

    fn elec() -> SubsectorKey {
        SubsectorKey::new(Sector::EnergySupply, Subsector::ElectricityAndHeat)
    }

    fn reduction(key: SubsectorKey, region: u16, value: FloatValue) -> SubsectorReduction {
        SubsectorReduction {
            sector: key.sector,
            subsector: key.subsector,
            region: RegionId(region),
            year: 2030,
            unit: CO2E_UNIT.to_string(),
            reduction_country_members: value,
        }
    }

    #[test]
    fn pathway_is_baseline_minus_reduction_and_floored() {
        let settings = Settings::default();
        let records = vec![
            record("CP", ELEC, RegionId(11), 100.0),
            record("CP", ELEC, RegionId(20), 50.0),
            record("COPInitiatives_combined", ELEC, RegionId(11), 80.0),
            record("COPInitiatives_combined", ELEC, RegionId(20), 45.0),
        ];
        let reductions = vec![reduction(elec(), 11, 10.0), reduction(elec(), 20, 20.0)];
        let mut diagnostics = Diagnostics::default();
        let out = Reconciler::new(&settings)
            .subsector_pathway(elec(), ELEC, &reductions, &records, &mut diagnostics)
            .unwrap();

        assert_eq!(out.len(), 3);
        assert!(is_close!(out[0].value, 90.0));
        assert!(is_close!(out[1].value, 45.0));
        assert_eq!(out[2].region, RegionId::WORLD);
        assert!(is_close!(out[2].value, 135.0));
        assert_eq!(diagnostics.floors.len(), 1);
        assert_eq!(diagnostics.floors[0].member_value, 30.0);
    }

    #[test]
    fn bunkers_keep_world_only() {
        let settings = Settings::default();
        let key = SubsectorKey::new(Sector::InternationalBunkers, Subsector::Total);
        let records = vec![
            record("CP", AVIATION, RegionId(11), 10.0),
            record("CP", AVIATION, RegionId(20), 30.0),
        ];
        let out = Reconciler::new(&settings)
            .subsector_pathway(key, AVIATION, &[], &records, &mut Diagnostics::default())
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].region, RegionId::WORLD);
        assert_eq!(out[0].value, 40.0);
    }

    #[test]
    fn missing_baseline_is_a_data_error() {
        let settings = Settings::default();
        let err = Reconciler::new(&settings)
            .subsector_pathway(elec(), ELEC, &[], &[], &mut Diagnostics::default())
            .unwrap_err();
        assert!(matches!(err, ICIError::MissingData { .. }));
    }

    #[test]
    fn kyoto_total_adds_not_covered_baseline() {
        let settings = Settings::default();
        let records = vec![
            record("CP", KYOTO, RegionId(11), 500.0),
            record("CP", KYOTO, RegionId::WORLD, 1500.0),
            record("CP", ELEC, RegionId(11), 100.0),
            record("CP", ELEC, RegionId::WORLD, 300.0),
            record("CP", AVIATION, RegionId(11), 5.0),
            record("CP", AVIATION, RegionId::WORLD, 20.0),
        ];
        let pathways = vec![
            SubsectorPathway {
                sector: Sector::EnergySupply,
                subsector: Subsector::ElectricityAndHeat,
                region: RegionId(11),
                year: 2030,
                value: 90.0,
                unit: CO2E_UNIT.to_string(),
                scenario: "COPInitiatives_members".to_string(),
            },
            SubsectorPathway {
                sector: Sector::EnergySupply,
                subsector: Subsector::ElectricityAndHeat,
                region: RegionId::WORLD,
                year: 2030,
                value: 270.0,
                unit: CO2E_UNIT.to_string(),
                scenario: "COPInitiatives_members".to_string(),
            },
        ];
        let covered = vec![ELEC.to_string(), AVIATION.to_string()];
        let out = Reconciler::new(&settings)
            .kyoto_pathway(&covered, &pathways, &records)
            .unwrap();

        let region = out.iter().find(|k| k.region == RegionId(11)).unwrap();
        // Bunkers are not part of a region's covered baseline
        assert!(is_close!(region.not_covered, 400.0));
        assert!(is_close!(region.value, 490.0));

        let world = out.iter().find(|k| k.region.is_world()).unwrap();
        assert!(is_close!(world.not_covered, 1180.0));
        assert_eq!(world.value, world.not_covered + world.covered);
    }

    #[test]
    fn kyoto_reference_lists_three_scenarios() {
        let settings = Settings::default();
        let records = vec![
            record("CP", KYOTO, RegionId::WORLD, 1500.0),
            record("COPInitiatives", KYOTO, RegionId::WORLD, 1400.0),
            record("COPInitiatives_combined", KYOTO, RegionId::WORLD, 1300.0),
            record("Other", KYOTO, RegionId::WORLD, 1.0),
        ];
        let out = Reconciler::new(&settings).kyoto_reference(&records);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].scenario, "COPInitiatives_combined");
        assert_eq!(out[2].value, 1300.0);
    }
}
