//! Invariants of the downscaling pipeline on a small synthetic world.
//!
//! Two regions (WEU and CHN), four countries and three subsectors: Electricity and Heat
//! (Coal, Renewable, Cooling), Industry (Steel, Cement) and Fugitive|Oil Production
//! (Flaring, World-only). Every scenario variable is scaled from the baseline: the
//! initiative scenario by 0.8, the combined scenario by 0.7.

use approx::assert_relative_eq;
use ici_components::components::{cap, deduplicate, index_region_subsector};
use ici_components::pipeline::{
    run_individual_downscaling, run_sector_downscaling, Inputs, SectorOutputs,
};
use ici_core::config::RunConfig;
use ici_core::diagnostics::{Diagnostics, RunContext};
use ici_core::errors::ICIError;
use ici_core::initiative::Initiative;
use ici_core::membership::{Country, FlaringParticipation, MembershipTable};
use ici_core::region::RegionId;
use ici_core::sources::{InMemoryHistory, InMemoryScenarios};
use ici_core::table::{by_region_year, select, EmissionsRecord, HistoricalRecord};
use ici_core::units::to_co2e;
use ici_core::{FloatValue, Year};
use std::collections::{BTreeMap, BTreeSet};

const WEU: RegionId = RegionId(11);
const CHN: RegionId = RegionId(20);
const YEARS: [Year; 2] = [2020, 2030];

const ELEC: &str = "Emissions|CO2|Energy|Supply|Electricity";
const INDUSTRY: &str = "Emissions|CO2|Industry";
const OIL: &str = "Emissions|CH4|Energy|Supply|Fugitive|Oil Production";
const FLARING: &str = "Emissions|CH4|Energy|Supply|Fugitive|Flaring";
const KYOTO: &str = "Emissions|Kyoto Gases";

const CONFIG: &str = r#"
[settings]
hist_year = 2020

[gwp]
ch4 = 27.0
n2o = 273.0

[[initiatives]]
initiative = "Coal"
sector = "Energy Supply"
subsector = "Electricity and Heat"
hist_variable = "Hist|Coal"
individual_variable = "Emissions|CO2|Energy|Supply|Electricity|Coal"
subsector_variable = "Emissions|CO2|Energy|Supply|Electricity"

[[initiatives]]
initiative = "Renewable"
sector = "Energy Supply"
subsector = "Electricity and Heat"
hist_variable = "Hist|Renewable"
individual_variable = "Emissions|CO2|Energy|Supply|Electricity|Renewable"
subsector_variable = "Emissions|CO2|Energy|Supply|Electricity"

[[initiatives]]
initiative = "Cooling"
sector = "Energy Supply"
subsector = "Electricity and Heat"
hist_variable = "Hist|Cooling"
individual_variable = "Emissions|CO2|Energy|Supply|Electricity|Cooling"
subsector_variable = "Emissions|CO2|Energy|Supply|Electricity"

[[initiatives]]
initiative = "Steel"
sector = "Industry"
subsector = "Total"
hist_variable = "Hist|Steel"
individual_variable = "Emissions|CO2|Industry|Steel"
subsector_variable = "Emissions|CO2|Industry"

[[initiatives]]
initiative = "Cement"
sector = "Industry"
subsector = "Total"
hist_variable = "Hist|Cement"
individual_variable = "Emissions|CO2|Industry|Cement"
subsector_variable = "Emissions|CO2|Industry"

[[initiatives]]
initiative = "Flaring"
sector = "Energy Supply"
subsector = "Fugitive|Oil Production"
hist_variable = "Hist|Flaring"
individual_variable = "Emissions|CH4|Energy|Supply|Fugitive|Flaring"
subsector_variable = "Emissions|CH4|Energy|Supply|Fugitive|Oil Production"
only_global = true
"#;

/// Baseline value in WEU, CHN is twice as large
fn baseline_variables() -> Vec<(&'static str, FloatValue, &'static str)> {
    vec![
        ("Emissions|CO2|Energy|Supply|Electricity|Coal", 40.0, "Mt CO2/yr"),
        ("Emissions|CO2|Energy|Supply|Electricity|Renewable", 10.0, "Mt CO2/yr"),
        ("Emissions|CO2|Energy|Supply|Electricity|Cooling", 5.0, "Mt CO2/yr"),
        (ELEC, 100.0, "Mt CO2/yr"),
        ("Emissions|CO2|Industry|Steel", 20.0, "Mt CO2/yr"),
        ("Emissions|CO2|Industry|Cement", 15.0, "Mt CO2/yr"),
        (INDUSTRY, 60.0, "Mt CO2/yr"),
        (FLARING, 2.0, "Mt CH4/yr"),
        (OIL, 3.0, "Mt CH4/yr"),
        (KYOTO, 1000.0, "Mt CO2-equiv/yr"),
    ]
}

fn scenarios() -> InMemoryScenarios {
    let mut records = Vec::new();
    for (scenario, factor) in [
        ("CP", 1.0),
        ("COPInitiatives", 0.8),
        ("COPInitiatives_combined", 0.7),
    ] {
        for (variable, base, unit) in baseline_variables() {
            for year in YEARS {
                let growth = if year == 2030 { 1.1 } else { 1.0 };
                // Reductions only start after the reference year
                let factor = if year == 2020 { 1.0 } else { factor };
                let weu = base * growth * factor;
                for (region, value) in [(WEU, weu), (CHN, 2.0 * weu), (RegionId::WORLD, 3.0 * weu)] {
                    records.push(EmissionsRecord {
                        model: "IMAGE 3.3".to_string(),
                        scenario: scenario.to_string(),
                        region,
                        variable: variable.to_string(),
                        year,
                        value,
                        unit: unit.to_string(),
                    });
                }
            }
        }
    }
    InMemoryScenarios::new(records)
}

fn hist(variable: &str, iso3: &str, region: RegionId, value: Option<FloatValue>) -> HistoricalRecord {
    HistoricalRecord {
        variable: variable.to_string(),
        iso3: iso3.to_string(),
        country: iso3.to_string(),
        region: Some(region),
        year: 2020,
        value,
        unit: "Mt CO2/yr".to_string(),
        resolvable_model: true,
        resolvable_source: true,
    }
}

fn history() -> InMemoryHistory {
    let mut records = Vec::new();
    for variable in ["Hist|Coal", "Hist|Renewable", "Hist|Cooling", "Hist|Steel"] {
        records.push(hist(variable, "DEU", WEU, Some(30.0)));
        records.push(hist(variable, "FRA", WEU, Some(10.0)));
        records.push(hist(variable, "CHN", CHN, Some(50.0)));
    }
    // FRA has no cement data and is left out of the denominator
    records.push(hist("Hist|Cement", "DEU", WEU, Some(30.0)));
    records.push(hist("Hist|Cement", "FRA", WEU, None));
    records.push(hist("Hist|Cement", "BEL", WEU, Some(10.0)));
    records.push(hist("Hist|Cement", "CHN", CHN, Some(50.0)));

    records.push(hist(KYOTO, "DEU", WEU, Some(800.0)));
    records.push(hist(KYOTO, "FRA", WEU, Some(400.0)));
    records.push(hist(KYOTO, "CHN", CHN, Some(12000.0)));
    InMemoryHistory::new(records)
}

fn members() -> MembershipTable {
    use Initiative::*;
    let mut table = MembershipTable::new();
    let rows = [
        ("DEU", WEU, [(Coal, true), (Renewable, false), (Cooling, true), (Steel, true), (Cement, false)]),
        ("FRA", WEU, [(Coal, false), (Renewable, true), (Cooling, false), (Steel, true), (Cement, true)]),
        ("BEL", WEU, [(Coal, false), (Renewable, false), (Cooling, false), (Steel, false), (Cement, true)]),
        ("CHN", CHN, [(Coal, false), (Renewable, false), (Cooling, false), (Steel, false), (Cement, true)]),
    ];
    for (iso3, region, memberships) in rows {
        table
            .add_country(
                Country {
                    iso3: iso3.to_string(),
                    name: iso3.to_string(),
                    region,
                },
                memberships,
            )
            .unwrap();
    }
    table
}

fn flaring() -> FlaringParticipation {
    FlaringParticipation::new(BTreeMap::from([(2020, 0.3)]))
}

fn run_sectors(config: &RunConfig) -> (SectorOutputs, RunContext) {
    let (scenarios, history, members, flaring) = (scenarios(), history(), members(), flaring());
    let inputs = Inputs {
        scenarios: &scenarios,
        history: &history,
        members: &members,
        flaring: &flaring,
    };
    let mut ctx = RunContext::new(config.gwp);
    let outputs = run_sector_downscaling(config, inputs, &mut ctx).unwrap();
    (outputs, ctx)
}

fn config() -> RunConfig {
    RunConfig::from_toml_str(CONFIG).unwrap()
}

mod shares {
    use super::*;

    #[test]
    fn country_shares_sum_to_one_per_region() {
        let (outputs, _) = run_sectors(&config());
        let mut sums: BTreeMap<(Initiative, RegionId), FloatValue> = BTreeMap::new();
        for s in &outputs.country_shares {
            *sums.entry((s.initiative, s.region)).or_insert(0.0) += s.share;
        }
        assert!(!sums.is_empty());
        for (_, sum) in sums {
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn countries_without_history_leave_the_denominator() {
        let (outputs, _) = run_sectors(&config());
        let cement: Vec<_> = outputs
            .country_shares
            .iter()
            .filter(|s| s.initiative == Initiative::Cement && s.region == WEU)
            .collect();
        assert_eq!(cement.len(), 2);
        assert!(cement.iter().all(|s| s.iso3 != "FRA"));
        // DEU keeps its proportion of the remaining total
        let deu = cement.iter().find(|s| s.iso3 == "DEU").unwrap();
        assert_relative_eq!(deu.share, 30.0 / 40.0);
    }

    #[test]
    fn flaring_coverage_is_the_global_fraction() {
        let (outputs, _) = run_sectors(&config());
        for s in outputs
            .member_shares
            .iter()
            .filter(|s| s.initiative == Initiative::Flaring)
        {
            let expected = if s.region.is_world() { 0.3 } else { 0.0 };
            assert_eq!(s.share, expected);
        }
    }
}

mod reductions {
    use super::*;

    #[test]
    fn non_members_have_no_country_reduction() {
        let (outputs, _) = run_sectors(&config());
        let members = members();
        assert!(!outputs.country_reductions.is_empty());
        for r in &outputs.country_reductions {
            if !members.is_member(&r.iso3, r.initiative) {
                assert_eq!(r.reduction_country_individual, 0.0);
                assert_eq!(r.reduction_country_subsector, 0.0);
            }
        }
    }

    #[test]
    fn resolved_reductions_do_not_exceed_the_subsector_reduction() {
        let (outputs, ctx) = run_sectors(&config());
        let limits = index_region_subsector(&outputs.region_reductions);
        for r in &outputs.subsector_reductions {
            let limit = limits[&(r.key(), r.region, r.year)];
            assert!(r.reduction_country_members <= limit + 1e-9);
        }
        for event in &ctx.diagnostics.caps {
            assert!(event.check_before);
            assert!(!event.check_after);
        }
    }

    #[test]
    fn deduplicate_and_cap_are_a_fixed_point() {
        let (outputs, _) = run_sectors(&config());
        let limits = index_region_subsector(&outputs.region_reductions);
        let mut diagnostics = Diagnostics::default();

        let rows = deduplicate(outputs.country_reductions.clone(), "again", &mut diagnostics);
        assert_eq!(rows, outputs.country_reductions);

        let capped = cap(outputs.subsector_reductions.clone(), &limits, &mut diagnostics);
        assert_eq!(capped, outputs.subsector_reductions);
        assert!(diagnostics.duplicates.is_empty());
        assert!(diagnostics.caps.is_empty());
    }

    #[test]
    fn flaring_sector_reduction_is_the_global_share() {
        let (outputs, _) = run_sectors(&config());
        let flaring: Vec<_> = outputs
            .subsector_reductions
            .iter()
            .filter(|r| r.subsector.to_string() == "Fugitive|Oil Production" && r.year == 2030)
            .collect();
        assert_eq!(flaring.len(), 2);
        // 0.2 of the Flaring baseline (2 Mt CH4 * 1.1 * 27) times the fraction in WEU
        let weu = flaring.iter().find(|r| r.region == WEU).unwrap();
        assert_relative_eq!(weu.reduction_country_members, 0.3 * 0.2 * 2.0 * 1.1 * 27.0, epsilon = 1e-9);
    }
}

mod reconciliation {
    use super::*;

    #[test]
    fn member_pathways_stay_above_the_combined_scenario() {
        let config = config();
        let (outputs, _) = run_sectors(&config);
        let records = to_co2e(scenarios().records().to_vec(), &config.gwp).unwrap();
        assert!(!outputs.subsector_pathways.is_empty());
        for p in outputs.subsector_pathways.iter().filter(|p| !p.region.is_world()) {
            let variable = config.subsector_variable(p.key()).unwrap();
            let combined = by_region_year(select(&records, "COPInitiatives_combined", variable));
            assert!(p.value >= combined[&(p.region, p.year)] - 1e-9);
        }
    }

    #[test]
    fn world_kyoto_has_no_residual() {
        let (outputs, ctx) = run_sectors(&config());
        assert!(ctx.diagnostics.errors.is_empty(), "{:?}", ctx.diagnostics.errors);

        for year in YEARS {
            let world = outputs
                .kyoto_pathway
                .iter()
                .find(|k| k.region.is_world() && k.year == year)
                .unwrap();
            let covered: FloatValue = outputs
                .subsector_pathways
                .iter()
                .filter(|p| p.region.is_world() && p.year == year)
                .map(|p| p.value)
                .sum();
            assert_relative_eq!(world.covered, covered, epsilon = 1e-9);
            assert_eq!(world.value, world.not_covered + world.covered);
        }
    }

    #[test]
    fn reference_year_follows_the_baseline() {
        let (outputs, _) = run_sectors(&config());
        let world = outputs
            .kyoto_pathway
            .iter()
            .find(|k| k.region.is_world() && k.year == 2020)
            .unwrap();
        assert_relative_eq!(world.value, 3000.0, epsilon = 1e-9);
        assert_eq!(outputs.kyoto_reference.len(), 3 * 3 * YEARS.len());
    }

    #[test]
    fn subsector_without_overlap_rule_is_abandoned() {
        let extra = r#"
[[initiatives]]
initiative = "Efficiency"
sector = "Energy Demand"
subsector = "Total"
hist_variable = "Hist|Steel"
individual_variable = "Emissions|CO2|Industry|Steel"
subsector_variable = "Emissions|CO2|Industry"

[[initiatives]]
initiative = "Buildings"
sector = "Energy Demand"
subsector = "Total"
hist_variable = "Hist|Steel"
individual_variable = "Emissions|CO2|Industry|Cement"
subsector_variable = "Emissions|CO2|Industry"
"#;
        let config = RunConfig::from_toml_str(&format!("{CONFIG}{extra}")).unwrap();
        let (outputs, ctx) = run_sectors(&config);

        assert_eq!(ctx.diagnostics.errors.len(), 1);
        assert!(matches!(
            ctx.diagnostics.errors[0].error,
            ICIError::NoOverlapRule { .. }
        ));
        let keys: BTreeSet<String> = outputs
            .subsector_pathways
            .iter()
            .map(|p| p.key().to_string())
            .collect();
        assert_eq!(keys.len(), 3);
        assert!(!outputs.kyoto_pathway.is_empty());
    }
}

mod data_log {
    use super::*;

    #[test]
    fn countries_are_sorted_by_kyoto_weight() {
        let (outputs, _) = run_sectors(&config());
        let log = &outputs.data_log;
        assert_eq!(log.entries[0].iso3, "CHN");
        assert_relative_eq!(log.entries[0].weight.unwrap(), 100.0 * 12000.0 / 13200.0);
        let bel = log.entries.iter().find(|e| e.iso3 == "BEL").unwrap();
        assert_eq!(bel.weight, Some(0.0));
        assert_eq!(bel.flags[&Initiative::Cement], Some(true));
        assert_eq!(bel.flags[&Initiative::Steel], None);
    }
}

mod individual {
    use super::*;

    #[test]
    fn flaring_blends_at_world_with_the_global_fraction() {
        let config = config();
        let (scenarios, history, members, flaring) = (scenarios(), history(), members(), flaring());
        let inputs = Inputs {
            scenarios: &scenarios,
            history: &history,
            members: &members,
            flaring: &flaring,
        };
        let mut ctx = RunContext::new(config.gwp);
        let outputs = run_individual_downscaling(&config, inputs, &mut ctx).unwrap();

        let flaring: Vec<_> = outputs
            .pathways
            .iter()
            .filter(|r| r.variable == FLARING && r.year == 2030)
            .collect();
        assert_eq!(flaring.len(), 1);
        assert!(flaring[0].region.is_world());

        let baseline = 3.0 * 2.0 * 1.1 * 27.0;
        let mitigation = 0.8 * baseline;
        assert_relative_eq!(flaring[0].value, 0.7 * baseline + 0.3 * mitigation, epsilon = 1e-9);
    }

    #[test]
    fn member_pathway_world_is_the_sum_of_regions() {
        let config = config();
        let (scenarios, history, members, flaring) = (scenarios(), history(), members(), flaring());
        let inputs = Inputs {
            scenarios: &scenarios,
            history: &history,
            members: &members,
            flaring: &flaring,
        };
        let mut ctx = RunContext::new(config.gwp);
        let outputs = run_individual_downscaling(&config, inputs, &mut ctx).unwrap();

        let steel: Vec<_> = outputs
            .pathways
            .iter()
            .filter(|r| r.variable == "Emissions|CO2|Industry|Steel" && r.year == 2030)
            .collect();
        let regions: FloatValue = steel.iter().filter(|r| !r.region.is_world()).map(|r| r.value).sum();
        let world = steel.iter().find(|r| r.region.is_world()).unwrap();
        assert_relative_eq!(world.value, regions, epsilon = 1e-9);

        // WEU coverage is 0.75 + 0.25 (DEU and FRA are both Steel members), CHN is not covered
        let weu = steel.iter().find(|r| r.region == WEU).unwrap();
        assert_relative_eq!(weu.value, 0.8 * 20.0 * 1.1, epsilon = 1e-9);
        let chn = steel.iter().find(|r| r.region == CHN).unwrap();
        assert_relative_eq!(chn.value, 2.0 * 20.0 * 1.1, epsilon = 1e-9);
    }
}
