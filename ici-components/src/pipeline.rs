//! Runs of the downscaling engine
//!
//! A run reads every table it needs up front, converts the scenario records to CO2e once and
//! then passes complete tables from stage to stage. Data-coverage errors abandon the
//! initiative or subsector they occur in and are recorded in the run's diagnostics. Fatal
//! errors are returned.

use crate::components::{
    cap, combine_actor_groups, country_reductions, global_reductions, index_coverage,
    index_region_subsector, individual_member_pathways, region_reductions, smooth_actor_records,
    ActorDownscaler, ActorRecord, CountryReduction, CountryShare, DataLog, InitiativePathway,
    KyotoPathway, MemberShare, MembershipResolver, OverlapResolver, PathwayBlender, Reconciler,
    RegionReduction, ResolvedRow, ShareCalculator, ShareParameters, SubsectorPathway,
    SubsectorReduction, UrbanEmissionShare, UrbanPopulationRecord,
};
use ici_core::config::{InitiativeParameters, RunConfig};
use ici_core::diagnostics::RunContext;
use ici_core::errors::{ICIError, ICIResult};
use ici_core::initiative::Initiative;
use ici_core::membership::{FlaringParticipation, MembershipTable};
use ici_core::region::{RegionId, RegionMapping};
use ici_core::sources::{HistoricalSource, ScenarioSource};
use ici_core::table::{by_region_year, select, EmissionsRecord, HistoricalRecord};
use ici_core::units::to_co2e;
use ici_core::{FloatValue, Year};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Materialised inputs of a sector or individual run
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    pub scenarios: &'a dyn ScenarioSource,
    pub history: &'a dyn HistoricalSource,
    pub members: &'a MembershipTable,
    pub flaring: &'a FlaringParticipation,
}

/// Tables produced by a sector run
#[derive(Debug, Clone, Default)]
pub struct SectorOutputs {
    pub country_shares: Vec<CountryShare>,
    pub member_shares: Vec<MemberShare>,
    pub region_reductions: Vec<RegionReduction>,
    pub country_reductions: Vec<CountryReduction>,
    pub individual_pathways: Vec<InitiativePathway>,
    pub resolved_rows: Vec<ResolvedRow>,
    pub subsector_reductions: Vec<SubsectorReduction>,
    pub subsector_pathways: Vec<SubsectorPathway>,
    pub kyoto_pathway: Vec<KyotoPathway>,
    pub kyoto_reference: Vec<KyotoPathway>,
    pub data_log: DataLog,
}

/// Tables produced by an individual-initiative run
#[derive(Debug, Clone, Default)]
pub struct IndividualOutputs {
    pub country_shares: Vec<CountryShare>,
    pub member_shares: Vec<MemberShare>,
    pub pathways: Vec<EmissionsRecord>,
}

/// Read the given scenarios and convert them to CO2e
///
/// A scenario without data is recorded and skipped.
fn read_scenarios(
    source: &dyn ScenarioSource,
    scenarios: &[&str],
    variables: &[String],
    ctx: &mut RunContext,
) -> ICIResult<Vec<EmissionsRecord>> {
    let mut records = Vec::new();
    for scenario in scenarios {
        info!(scenario = %scenario, variables = variables.len(), "read scenario");
        let read = source.read(scenario, variables);
        if let Some(r) = ctx.recover(format!("scenario {scenario}"), read)? {
            records.extend(r);
        }
    }
    to_co2e(records, &ctx.gwp)
}

/// Historical series and country shares of every initiative with country members
fn initiative_shares(
    config: &RunConfig,
    history: &dyn HistoricalSource,
    ctx: &mut RunContext,
) -> ICIResult<(Vec<(Initiative, Vec<HistoricalRecord>)>, Vec<CountryShare>)> {
    let hist_year = config.settings.hist_year;
    let calculator = ShareCalculator::from_parameters(ShareParameters {
        reference_year: hist_year,
    });

    let mut histories = Vec::new();
    let mut shares = Vec::new();
    for p in config.initiative_entries() {
        if p.initiative.is_global_only() {
            continue;
        }
        let read = history.read(&p.hist_variable, hist_year);
        let Some(records) = ctx.recover(format!("{} history", p.initiative), read)? else {
            continue;
        };
        shares.extend(calculator.calculate(p.initiative, &records));
        histories.push((p.initiative, records));
    }
    Ok((histories, shares))
}

fn baseline_activity(
    config: &RunConfig,
    records: &[EmissionsRecord],
    p: &InitiativeParameters,
) -> BTreeMap<(RegionId, Year), FloatValue> {
    by_region_year(select(
        records,
        &config.settings.baseline_scenario,
        &p.individual_variable,
    ))
}

/// Coverage fractions of every configured initiative
///
/// World-only initiatives are skipped when no participation fraction is available.
fn member_shares(
    config: &RunConfig,
    members: &MembershipTable,
    records: &[EmissionsRecord],
    shares: &[CountryShare],
    fraction: Option<FloatValue>,
) -> Vec<MemberShare> {
    let resolver = MembershipResolver::new(members);
    let mut out = Vec::new();
    for p in config.initiative_entries() {
        let baseline = baseline_activity(config, records, p);
        if !p.initiative.is_global_only() {
            out.extend(resolver.resolve(p.initiative, shares, &baseline));
        } else if let Some(fraction) = fraction {
            out.extend(resolver.resolve_global(p.initiative, fraction, &baseline));
        }
    }
    out
}

fn flaring_fraction(
    config: &RunConfig,
    flaring: &FlaringParticipation,
    ctx: &mut RunContext,
) -> ICIResult<Option<FloatValue>> {
    let needed = config.initiatives.iter().any(|p| p.initiative.is_global_only());
    if !needed {
        return Ok(None);
    }
    let fraction = flaring.fraction(config.settings.flaring_year());
    ctx.recover("Flaring participation", fraction)
}

/// Downscale the initiatives to member countries per subsector and reconcile with the
/// Kyoto total
pub fn run_sector_downscaling(
    config: &RunConfig,
    inputs: Inputs<'_>,
    ctx: &mut RunContext,
) -> ICIResult<SectorOutputs> {
    config.validate()?;
    let settings = &config.settings;

    let mut variables = config.variables(|p| p.individual_variable.as_str());
    variables.extend(config.variables(|p| p.subsector_variable.as_str()));
    variables.push(settings.kyoto_variable.clone());
    variables.sort();
    variables.dedup();
    let records = read_scenarios(
        inputs.scenarios,
        &[
            settings.baseline_scenario.as_str(),
            settings.initiative_scenario.as_str(),
            settings.combined_scenario.as_str(),
        ],
        &variables,
        ctx,
    )?;

    let fraction = flaring_fraction(config, inputs.flaring, ctx)?;
    let (histories, country_shares) = initiative_shares(config, inputs.history, ctx)?;
    let member_shares =
        member_shares(config, inputs.members, &records, &country_shares, fraction);

    let region_reductions = region_reductions(config, &records, ctx)?;
    let country_reductions =
        country_reductions(&region_reductions, &country_shares, inputs.members);
    let individual_pathways = individual_member_pathways(
        config,
        &records,
        &region_reductions,
        &country_reductions,
        fraction,
    );

    let limits = index_region_subsector(&region_reductions);
    let reconciler = Reconciler::new(settings);
    let mut resolved_rows = Vec::new();
    let mut subsector_reductions = Vec::new();
    let mut subsector_pathways = Vec::new();
    let mut covered_variables = Vec::new();

    for key in config.subsector_keys() {
        let initiatives = config.initiatives_in(key);
        let context = key.to_string();

        let reductions = match initiatives.iter().find(|i| i.is_global_only()) {
            Some(&initiative) => {
                let Some(fraction) = fraction else {
                    warn!(subsector = %key, "no participation fraction, subsector skipped");
                    continue;
                };
                if initiatives.len() > 1 {
                    warn!(subsector = %key, initiative = %initiative, "only the World-level initiative is used");
                }
                global_reductions(key, initiative, &region_reductions, fraction)
            }
            None => {
                let resolution =
                    OverlapResolver::new(key).resolve(&country_reductions, &mut ctx.diagnostics);
                let Some(resolution) = ctx.recover(context.clone(), resolution)? else {
                    continue;
                };
                resolved_rows.extend(resolution.rows);
                resolution.reductions
            }
        };
        let reductions = cap(reductions, &limits, &mut ctx.diagnostics);

        let Some(variable) = config.subsector_variable(key) else {
            continue;
        };
        let pathway =
            reconciler.subsector_pathway(key, variable, &reductions, &records, &mut ctx.diagnostics);
        let Some(pathway) = ctx.recover(context, pathway)? else {
            continue;
        };
        subsector_pathways.extend(pathway);
        subsector_reductions.extend(reductions);
        covered_variables.push(variable.to_string());
    }

    let kyoto = reconciler.kyoto_pathway(&covered_variables, &subsector_pathways, &records);
    let kyoto_pathway = ctx.recover("Kyoto", kyoto)?.unwrap_or_default();
    let kyoto_reference = reconciler.kyoto_reference(&records);

    let kyoto_history = inputs
        .history
        .read(&settings.kyoto_variable, settings.hist_year);
    let data_log = DataLog::build(
        &histories,
        kyoto_history.as_deref().map_err(|e| e.clone()),
        settings.hist_year,
    );

    info!(
        subsectors = covered_variables.len(),
        errors = ctx.diagnostics.errors.len(),
        "sector downscaling finished"
    );
    Ok(SectorOutputs {
        country_shares,
        member_shares,
        region_reductions,
        country_reductions,
        individual_pathways,
        resolved_rows,
        subsector_reductions,
        subsector_pathways,
        kyoto_pathway,
        kyoto_reference,
        data_log,
    })
}

/// Blend baseline and initiative scenario for each initiative's own variable
pub fn run_individual_downscaling(
    config: &RunConfig,
    inputs: Inputs<'_>,
    ctx: &mut RunContext,
) -> ICIResult<IndividualOutputs> {
    config.validate()?;
    let settings = &config.settings;

    let variables = config.variables(|p| p.individual_variable.as_str());
    let records = read_scenarios(
        inputs.scenarios,
        &[
            settings.baseline_scenario.as_str(),
            settings.initiative_scenario.as_str(),
        ],
        &variables,
        ctx,
    )?;

    let fraction = flaring_fraction(config, inputs.flaring, ctx)?;
    let (_, country_shares) = initiative_shares(config, inputs.history, ctx)?;
    let member_shares =
        member_shares(config, inputs.members, &records, &country_shares, fraction);
    let blender = PathwayBlender::new(settings.members_scenario.clone());

    let mut pathways = Vec::new();
    for p in config.initiative_entries() {
        if p.initiative.is_global_only() && fraction.is_none() {
            continue;
        }
        let coverage: BTreeMap<(RegionId, Year), FloatValue> = index_coverage(
            &member_shares
                .iter()
                .filter(|s| s.initiative == p.initiative)
                .cloned()
                .collect::<Vec<_>>(),
        );
        let baseline: Vec<EmissionsRecord> =
            select(&records, &settings.baseline_scenario, &p.individual_variable)
                .cloned()
                .collect();
        let mitigation: Vec<EmissionsRecord> =
            select(&records, &settings.initiative_scenario, &p.individual_variable)
                .cloned()
                .collect();
        if baseline.is_empty() {
            ctx.diagnostics.record_error(
                p.initiative.to_string(),
                ICIError::MissingData {
                    scenario: settings.baseline_scenario.clone(),
                    what: p.individual_variable.clone(),
                },
            );
            continue;
        }

        let blended = blender.blend(p.initiative, &coverage, &baseline, &mitigation);
        if let Some(blended) = ctx.recover(p.initiative.to_string(), blended)? {
            pathways.extend(blended);
        }
    }

    info!(
        initiatives = config.initiative_entries().len(),
        errors = ctx.diagnostics.errors.len(),
        "individual downscaling finished"
    );
    Ok(IndividualOutputs {
        country_shares,
        member_shares,
        pathways,
    })
}

/// Split the configured scenarios into total, urban and company emissions
pub fn run_actor_downscaling(
    config: &RunConfig,
    scenarios: &dyn ScenarioSource,
    population: &[UrbanPopulationRecord],
    urban_emissions: &[UrbanEmissionShare],
    ctx: &mut RunContext,
) -> ICIResult<Vec<ActorRecord>> {
    let actors = config.actors.clone().ok_or_else(|| {
        ICIError::InvalidConfiguration("an [actors] table is required".to_string())
    })?;
    let downscaler = ActorDownscaler::from_parameters(actors, RegionMapping::image())?;
    let parameters = downscaler.parameters();

    let mut variables = parameters.company_variables.clone();
    variables.push(parameters.downscale_variable.clone());
    let shares = downscaler.urban_shares(population, urban_emissions);

    let (mut total, mut urban, mut companies) = (Vec::new(), Vec::new(), Vec::new());
    for scenario in &parameters.scenarios {
        let read = read_scenarios(scenarios, &[scenario.as_str()], &variables, ctx)?;
        if read.is_empty() {
            continue;
        }
        total.extend(downscaler.total(&read, scenario));
        urban.extend(downscaler.urban(&read, scenario, &shares));
        companies.extend(downscaler.companies(&read, scenario));
    }

    let combined = combine_actor_groups(total, urban, companies);
    Ok(smooth_actor_records(combined, &parameters.smooth_years))
}
