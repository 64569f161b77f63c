//! Downscale initiative scenarios to member countries, sectors and actors
//!
//! Usage: `ici-downscale <sectors|individual|actors> --config run.toml --output DIR`

use clap::{Args, Parser, Subcommand};
use ici_components::pipeline::{
    run_actor_downscaling, run_individual_downscaling, run_sector_downscaling, Inputs,
};
use ici_core::config::RunConfig;
use ici_core::diagnostics::RunContext;
use ici_core::errors::{ICIError, ICIResult};
use ici_core::membership::FlaringParticipation;
use ici_core::region::RegionMapping;
use ici_core::sources::{InMemoryHistory, InMemoryScenarios};
use ici_downscale::{readers, writers};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ici-downscale")]
#[command(about = "Downscale international cooperative initiatives to member countries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Member pathways per subsector, reconciled with the Kyoto total
    Sectors(RunArgs),
    /// Member pathway of each initiative's own variable
    Individual(RunArgs),
    /// Total, urban and company emissions of the configured scenarios
    Actors(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Run configuration (TOML)
    #[arg(long)]
    config: PathBuf,

    /// Directory the output tables are written to
    #[arg(long, default_value = "output")]
    output: PathBuf,
}

fn required<'a>(path: &'a Option<PathBuf>, name: &str) -> ICIResult<&'a Path> {
    path.as_deref().ok_or_else(|| {
        ICIError::InvalidConfiguration(format!("inputs.{name} is required for this run"))
    })
}

fn load_scenarios(config: &RunConfig, ctx: &mut RunContext) -> ICIResult<InMemoryScenarios> {
    let table = readers::read_scenarios(
        required(&config.inputs.scenarios, "scenarios")?,
        &RegionMapping::image(),
    )?;
    for label in table.unresolved {
        ctx.diagnostics
            .record_error("scenario regions", ICIError::UnresolvableRegion(label));
    }
    Ok(InMemoryScenarios::new(table.records))
}

fn run_members(args: &RunArgs, sectors: bool) -> ICIResult<RunContext> {
    let config = RunConfig::from_file(&args.config)?;
    let mut ctx = RunContext::new(config.gwp);

    let scenarios = load_scenarios(&config, &mut ctx)?;
    let history = InMemoryHistory::new(readers::read_historical(required(
        &config.inputs.historical,
        "historical",
    )?)?);
    let members = readers::read_signatories(required(&config.inputs.signatories, "signatories")?)?;
    let flaring = match &config.inputs.flaring {
        Some(path) => readers::read_flaring(path)?,
        None => FlaringParticipation::default(),
    };
    let inputs = Inputs {
        scenarios: &scenarios,
        history: &history,
        members: &members,
        flaring: &flaring,
    };

    if sectors {
        let outputs = run_sector_downscaling(&config, inputs, &mut ctx)?;
        writers::write_sector_outputs(&args.output, &outputs)?;
    } else {
        let outputs = run_individual_downscaling(&config, inputs, &mut ctx)?;
        writers::write_individual_outputs(&args.output, &outputs)?;
    }
    Ok(ctx)
}

fn run_actors(args: &RunArgs) -> ICIResult<RunContext> {
    let config = RunConfig::from_file(&args.config)?;
    config.validate()?;
    let mut ctx = RunContext::new(config.gwp);

    let scenarios = load_scenarios(&config, &mut ctx)?;
    let population = readers::read_urban_population(required(
        &config.inputs.urban_population,
        "urban_population",
    )?)?;
    let urban_emissions = readers::read_urban_emissions(required(
        &config.inputs.urban_emissions,
        "urban_emissions",
    )?)?;

    let records =
        run_actor_downscaling(&config, &scenarios, &population, &urban_emissions, &mut ctx)?;
    writers::write_actor_outputs(&args.output, &records)?;
    Ok(ctx)
}

fn main() {
    ici_downscale::init_logging();
    let cli = Cli::parse();

    let (args, result) = match &cli.command {
        Command::Sectors(args) => (args, run_members(args, true)),
        Command::Individual(args) => (args, run_members(args, false)),
        Command::Actors(args) => (args, run_actors(args)),
    };

    let ctx = match result {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    if let Err(e) = writers::write_diagnostics(&args.output, &ctx.diagnostics) {
        error!("{e}");
        process::exit(1);
    }

    if ctx.diagnostics.has_errors() {
        println!("Completed with {} errors:", ctx.diagnostics.errors.len());
        for e in &ctx.diagnostics.errors {
            println!("  {}: {}", e.context, e.error);
        }
    } else {
        info!(output = %args.output.display(), "completed without errors");
    }
}
