//! `;`-separated input tables
//!
//! Each reader materialises one file into the in-memory types of `ici-core`. Region labels
//! of scenario files are resolved against the IMAGE mapping; labels that cannot be resolved
//! are returned so the caller can record them.

use ici_components::components::{UrbanEmissionShare, UrbanPopulationRecord};
use ici_core::errors::{ICIError, ICIResult};
use ici_core::initiative::Initiative;
use ici_core::membership::{Country, FlaringParticipation, MembershipTable};
use ici_core::region::{RegionId, RegionMapping};
use ici_core::table::{EmissionsRecord, HistoricalRecord};
use ici_core::{FloatValue, Year};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

const DELIMITER: u8 = b';';

fn parse_error(path: &Path, details: impl ToString) -> ICIError {
    ICIError::Parse {
        path: path.display().to_string(),
        details: details.to_string(),
    }
}

fn reader(path: &Path) -> ICIResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| ICIError::Io {
        path: path.display().to_string(),
        details: e.to_string(),
    })?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> ICIResult<Vec<T>> {
    let mut rdr = reader(path)?;
    let rows = rdr
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|e| parse_error(path, e))?;
    debug!(path = %path.display(), rows = rows.len(), "read table");
    Ok(rows)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScenarioRow {
    model: String,
    scenario: String,
    region: String,
    variable: String,
    year: Year,
    value: FloatValue,
    unit: String,
}

/// Scenario records with the region labels that did not resolve
#[derive(Debug, Clone, Default)]
pub struct ScenarioTable {
    pub records: Vec<EmissionsRecord>,
    pub unresolved: BTreeSet<String>,
}

/// Read a long scenario table (`Model;Scenario;Region;Variable;Year;Value;Unit`)
pub fn read_scenarios(path: &Path, mapping: &RegionMapping) -> ICIResult<ScenarioTable> {
    let mut table = ScenarioTable::default();
    for row in read_rows::<ScenarioRow>(path)? {
        let Some(region) = mapping.id(&row.region) else {
            table.unresolved.insert(row.region);
            continue;
        };
        table.records.push(EmissionsRecord {
            model: row.model,
            scenario: row.scenario,
            region,
            variable: row.variable,
            year: row.year,
            value: row.value,
            unit: row.unit,
        });
    }
    info!(path = %path.display(), records = table.records.len(), "scenario table read");
    Ok(table)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoricalRow {
    variable: String,
    #[serde(rename = "ISO3")]
    iso3: String,
    country: String,
    region: Option<u16>,
    year: Year,
    value: Option<FloatValue>,
    unit: String,
    resolvable_model: String,
    resolvable_source: String,
}

fn parse_flag(path: &Path, value: &str) -> ICIResult<bool> {
    match value {
        "1" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "false" | "False" | "FALSE" | "" => Ok(false),
        other => Err(parse_error(path, format!("'{other}' is not a 0/1 flag"))),
    }
}

/// Read the historical country table
pub fn read_historical(path: &Path) -> ICIResult<Vec<HistoricalRecord>> {
    read_rows::<HistoricalRow>(path)?
        .into_iter()
        .map(|row| {
            Ok(HistoricalRecord {
                variable: row.variable,
                iso3: row.iso3,
                country: row.country,
                region: row.region.map(RegionId),
                year: row.year,
                value: row.value,
                unit: row.unit,
                resolvable_model: parse_flag(path, &row.resolvable_model)?,
                resolvable_source: parse_flag(path, &row.resolvable_source)?,
            })
        })
        .collect()
}

const SIGNATORY_ID_COLUMNS: [&str; 4] =
    ["ISO", "IMAGE_region_nr", "Country_name", "Included by NCI?"];

/// Read the signatories table, one 0/1 column per initiative
///
/// An unknown initiative column is a configuration error. Countries mapped to World are
/// skipped.
pub fn read_signatories(path: &Path) -> ICIResult<MembershipTable> {
    let mut rdr = reader(path)?;
    let headers = rdr.headers().map_err(|e| parse_error(path, e))?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| parse_error(path, format!("missing column '{name}'")))
    };
    let (iso_col, region_col, name_col) = (
        position("ISO")?,
        position("IMAGE_region_nr")?,
        position("Country_name")?,
    );

    let mut columns: Vec<(usize, Initiative)> = Vec::new();
    for (i, header) in headers.iter().enumerate() {
        if SIGNATORY_ID_COLUMNS.contains(&header) || Initiative::is_ignored_column(header) {
            continue;
        }
        columns.push((i, header.parse::<Initiative>()?));
    }

    let mut table = MembershipTable::new();
    for record in rdr.records() {
        let record = record.map_err(|e| parse_error(path, e))?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let region: u16 = field(region_col)
            .parse()
            .map_err(|e| parse_error(path, format!("region of {}: {e}", field(iso_col))))?;
        let country = Country {
            iso3: field(iso_col).to_string(),
            name: field(name_col).to_string(),
            region: RegionId(region),
        };
        let memberships = columns
            .iter()
            .map(|&(i, initiative)| Ok((initiative, parse_flag(path, field(i))?)))
            .collect::<ICIResult<Vec<_>>>()?;
        if let Err(e) = table.add_country(country, memberships) {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(error = %e, "country skipped");
        }
    }
    info!(path = %path.display(), countries = table.countries().len(), "signatories read");
    Ok(table)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlaringRow {
    year: Year,
    value: FloatValue,
}

/// Read the global Flaring participation fractions (`Year;Value`)
pub fn read_flaring(path: &Path) -> ICIResult<FlaringParticipation> {
    let fractions: BTreeMap<Year, FloatValue> = read_rows::<FlaringRow>(path)?
        .into_iter()
        .map(|row| (row.year, row.value))
        .collect();
    Ok(FlaringParticipation::new(fractions))
}

/// Read urban population per region (`year;TIMER;urban_population;urban_ratio`)
pub fn read_urban_population(path: &Path) -> ICIResult<Vec<UrbanPopulationRecord>> {
    read_rows(path)
}

/// Read the wide table of base-year urban emission shares (`Source;<continent>...`)
pub fn read_urban_emissions(path: &Path) -> ICIResult<Vec<UrbanEmissionShare>> {
    let mut rdr = reader(path)?;
    let headers = rdr.headers().map_err(|e| parse_error(path, e))?.clone();
    if headers.get(0) != Some("Source") {
        return Err(parse_error(path, "first column must be 'Source'"));
    }

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| parse_error(path, e))?;
        let source = record.get(0).unwrap_or("").to_string();
        for (continent, value) in headers.iter().zip(record.iter()).skip(1) {
            let share: FloatValue = value
                .parse()
                .map_err(|e| parse_error(path, format!("{source}/{continent}: {e}")))?;
            out.push(UrbanEmissionShare {
                source: source.clone(),
                continent: continent.to_string(),
                share,
            });
        }
    }
    Ok(out)
}
