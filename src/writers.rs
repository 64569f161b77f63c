//! `;`-separated output tables

use ici_components::components::{ActorRecord, DataLog};
use ici_components::pipeline::{IndividualOutputs, SectorOutputs};
use ici_core::diagnostics::Diagnostics;
use ici_core::errors::{ICIError, ICIResult};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

const DELIMITER: u8 = b';';

fn io_error(path: &Path, e: impl ToString) -> ICIError {
    ICIError::Io {
        path: path.display().to_string(),
        details: e.to_string(),
    }
}

fn writer(path: &Path) -> ICIResult<csv::Writer<fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)
        .map_err(|e| io_error(path, e))
}

/// Write a table of records, one column per field
pub fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> ICIResult<()> {
    let path = dir.join(format!("{name}.csv"));
    let mut wtr = writer(&path)?;
    for row in rows {
        wtr.serialize(row).map_err(|e| io_error(&path, e))?;
    }
    wtr.flush().map_err(|e| io_error(&path, e))?;
    info!(path = %path.display(), rows = rows.len(), "table written");
    Ok(())
}

/// Write the country data log, one flag column per initiative
pub fn write_data_log(dir: &Path, log: &DataLog) -> ICIResult<()> {
    let path = dir.join("data_log.csv");
    let mut wtr = writer(&path)?;

    let mut header = vec!["ISO3".to_string(), "Country".to_string(), "Weight".to_string()];
    header.extend(log.initiatives.iter().map(|i| i.to_string()));
    wtr.write_record(&header).map_err(|e| io_error(&path, e))?;

    for entry in &log.entries {
        let mut row = vec![
            entry.iso3.clone(),
            entry.country.clone(),
            entry
                .weight
                .map(|w| w.to_string())
                .unwrap_or_else(|| "NA".to_string()),
        ];
        row.extend(log.initiatives.iter().map(|i| {
            match entry.flags.get(i).copied().flatten() {
                Some(true) => "1",
                Some(false) => "0",
                None => "NA",
            }
            .to_string()
        }));
        wtr.write_record(&row).map_err(|e| io_error(&path, e))?;
    }
    wtr.flush().map_err(|e| io_error(&path, e))
}

/// Write the audit tables and the error list of a run
pub fn write_diagnostics(dir: &Path, diagnostics: &Diagnostics) -> ICIResult<()> {
    write_table(dir, "duplicates", &diagnostics.duplicates)?;
    write_table(dir, "pair_overlaps", &diagnostics.pair_overlaps)?;
    write_table(dir, "caps", &diagnostics.caps)?;
    write_table(dir, "floors", &diagnostics.floors)?;

    let path = dir.join("errors.csv");
    let mut wtr = writer(&path)?;
    wtr.write_record(["context", "error"])
        .map_err(|e| io_error(&path, e))?;
    for e in &diagnostics.errors {
        wtr.write_record([e.context.as_str(), e.error.to_string().as_str()])
            .map_err(|err| io_error(&path, err))?;
    }
    wtr.flush().map_err(|e| io_error(&path, e))
}

pub fn write_sector_outputs(dir: &Path, outputs: &SectorOutputs) -> ICIResult<()> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    write_table(dir, "country_shares", &outputs.country_shares)?;
    write_table(dir, "member_shares", &outputs.member_shares)?;
    write_table(dir, "region_reductions", &outputs.region_reductions)?;
    write_table(dir, "country_reductions", &outputs.country_reductions)?;
    write_table(dir, "member_pathway_individual", &outputs.individual_pathways)?;
    write_table(dir, "resolved_reductions", &outputs.resolved_rows)?;
    write_table(dir, "subsector_reductions", &outputs.subsector_reductions)?;
    write_table(dir, "member_pathway_subsector", &outputs.subsector_pathways)?;
    write_table(dir, "member_pathway_kyoto", &outputs.kyoto_pathway)?;
    write_table(dir, "kyoto_reference", &outputs.kyoto_reference)?;
    write_data_log(dir, &outputs.data_log)
}

pub fn write_individual_outputs(dir: &Path, outputs: &IndividualOutputs) -> ICIResult<()> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    write_table(dir, "country_shares", &outputs.country_shares)?;
    write_table(dir, "member_shares", &outputs.member_shares)?;
    write_table(dir, "member_pathway_individual", &outputs.pathways)
}

pub fn write_actor_outputs(dir: &Path, records: &[ActorRecord]) -> ICIResult<()> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    write_table(dir, "actor_group_emissions", records)
}
