//! Actor downscaler
//!
//! Splits a scenario's emissions into the part attributable to non-state actor groups.
//!
//! Companies take the sum of a fixed set of CO2 variables (industry, power and heat, freight,
//! commercial buildings and international transport) per region.
//!
//! Urban emissions use fixed historical urban shares per continent (Marcotullio et al. 2013)
//! that move with the continent's urbanisation. With the population-weighted urban ratio
//!
//! $$ w_c(y) = \frac{\sum_{r \in c} u_r(y) p_r(y)}{\sum_{r \in c} p_r(y)} $$
//!
//! the urban share of emissions grows as
//!
//! $$ s_c(y) = s_c^{base} \prod_{k \le y} \frac{w_c(k)}{w_c(k - 1)} $$
//!
//! with no change in the first projection year.

use ici_core::config::ActorsConfig;
use ici_core::errors::{ICIError, ICIResult};
use ici_core::region::{RegionId, RegionMapping};
use ici_core::table::EmissionsRecord;
use ici_core::{FloatValue, Year};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

pub const WORLD_LABEL: &str = "World";

/// Urban population of a model region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrbanPopulationRecord {
    pub year: Year,
    #[serde(rename = "TIMER")]
    pub region: String,
    pub urban_population: FloatValue,
    pub urban_ratio: FloatValue,
}

/// Urban share (percent) of a continent's emissions for one source in the base year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrbanEmissionShare {
    pub source: String,
    pub continent: String,
    pub share: FloatValue,
}

/// Projected urban share of one continent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrbanShare {
    pub source: String,
    pub continent: String,
    pub year: Year,
    pub share: FloatValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorGroup {
    All,
    Urban,
    Companies,
}

impl fmt::Display for ActorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActorGroup::All => "All",
            ActorGroup::Urban => "Urban",
            ActorGroup::Companies => "Companies",
        };
        f.write_str(label)
    }
}

/// Emissions of an actor group, by region label or continent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub scenario: String,
    pub region: String,
    pub year: Year,
    pub value: FloatValue,
    pub unit: String,
    pub actor_group: Option<ActorGroup>,
}

/// Splits scenario emissions into actor groups
#[derive(Debug, Clone)]
pub struct ActorDownscaler {
    parameters: ActorsConfig,
    mapping: RegionMapping,
}

impl ActorDownscaler {
    pub fn from_parameters(parameters: ActorsConfig, mapping: RegionMapping) -> ICIResult<Self> {
        if !parameters.downscale_variable.starts_with("Emissions") {
            return Err(ICIError::InvalidConfiguration(format!(
                "downscale variable '{}' is not an emissions variable",
                parameters.downscale_variable
            )));
        }
        Ok(Self {
            parameters,
            mapping,
        })
    }

    pub fn parameters(&self) -> &ActorsConfig {
        &self.parameters
    }

    fn continent(&self, region: RegionId) -> Option<&str> {
        let label = self.mapping.label(region)?;
        self.parameters.continents.get(label).map(|c| c.as_str())
    }

    /// Total emissions of the downscaled variable, labelled by region
    pub fn total(&self, records: &[EmissionsRecord], scenario: &str) -> Vec<ActorRecord> {
        let variable = self.parameters.downscale_variable.as_str();
        records
            .iter()
            .filter(|r| r.scenario == scenario && r.variable == variable)
            .filter_map(|r| {
                let region = self.mapping.label(r.region)?;
                Some(ActorRecord {
                    scenario: scenario.to_string(),
                    region: region.to_string(),
                    year: r.year,
                    value: r.value,
                    unit: r.unit.clone(),
                    actor_group: None,
                })
            })
            .collect()
    }

    /// Company emissions per region and year
    pub fn companies(&self, records: &[EmissionsRecord], scenario: &str) -> Vec<ActorRecord> {
        let variables = &self.parameters.company_variables;
        let mut sums: BTreeMap<(RegionId, Year), (FloatValue, &str)> =
            BTreeMap::new();
        for r in records
            .iter()
            .filter(|r| r.scenario == scenario && variables.contains(&r.variable))
        {
            sums.entry((r.region, r.year)).or_insert((0.0, r.unit.as_str())).0 += r.value;
        }

        sums.into_iter()
            .filter_map(|((region, year), (value, unit))| {
                let region = self.mapping.label(region)?;
                Some(ActorRecord {
                    scenario: scenario.to_string(),
                    region: region.to_string(),
                    year,
                    value,
                    unit: unit.to_string(),
                    actor_group: None,
                })
            })
            .collect()
    }

    /// Population-weighted urban ratio per (continent, year) within the projection window
    pub fn urban_weights(
        &self,
        population: &[UrbanPopulationRecord],
    ) -> BTreeMap<(String, Year), FloatValue> {
        let p = &self.parameters;
        let mut sums: BTreeMap<(String, Year), (FloatValue, FloatValue)> = BTreeMap::new();
        for r in population
            .iter()
            .filter(|r| r.year >= p.hist_year_urban && r.year <= p.end_year)
        {
            let Some(continent) = p.continents.get(&r.region) else {
                debug!(region = %r.region, "region has no continent, skipped");
                continue;
            };
            let entry = sums.entry((continent.clone(), r.year)).or_insert((0.0, 0.0));
            entry.0 += r.urban_ratio * r.urban_population;
            entry.1 += r.urban_population;
        }
        sums.into_iter()
            .map(|(key, (weighted, population))| {
                let weight = if population == 0.0 {
                    0.0
                } else {
                    weighted / population
                };
                (key, weight)
            })
            .collect()
    }

    /// Urban shares per (source, continent, year), grown with the urban ratio
    pub fn urban_shares(
        &self,
        population: &[UrbanPopulationRecord],
        base: &[UrbanEmissionShare],
    ) -> Vec<UrbanShare> {
        let weights = self.urban_weights(population);

        // Cumulative growth factor per continent and year
        let mut growth: BTreeMap<(String, Year), FloatValue> = BTreeMap::new();
        let mut previous: Option<(String, FloatValue, FloatValue)> = None;
        for ((continent, year), weight) in &weights {
            let factor = match &previous {
                Some((c, w, f)) if c == continent && *w != 0.0 => f * (weight / w),
                Some((c, _, f)) if c == continent => *f,
                _ => 1.0,
            };
            growth.insert((continent.clone(), *year), factor);
            previous = Some((continent.clone(), *weight, factor));
        }

        let mut out = Vec::new();
        for b in base {
            let mut found = false;
            for ((continent, year), factor) in growth.range((b.continent.clone(), Year::MIN)..) {
                if continent != &b.continent {
                    break;
                }
                found = true;
                out.push(UrbanShare {
                    source: b.source.clone(),
                    continent: continent.clone(),
                    year: *year,
                    share: b.share * factor,
                });
            }
            if !found {
                warn!(continent = %b.continent, source = %b.source, "no urban population for continent");
            }
        }
        out
    }

    /// Urban emissions per continent plus World
    pub fn urban(
        &self,
        records: &[EmissionsRecord],
        scenario: &str,
        shares: &[UrbanShare],
    ) -> Vec<ActorRecord> {
        let variable = self.parameters.downscale_variable.as_str();
        let mut continents: BTreeMap<(&str, Year), (FloatValue, &str)> = BTreeMap::new();
        for r in records
            .iter()
            .filter(|r| r.scenario == scenario && r.variable == variable && !r.region.is_world())
        {
            let Some(continent) = self.continent(r.region) else {
                continue;
            };
            continents
                .entry((continent, r.year))
                .or_insert((0.0, r.unit.as_str()))
                .0 += r.value;
        }

        let share_index: BTreeMap<(&str, Year), FloatValue> = shares
            .iter()
            .filter(|s| s.source == self.parameters.urban_source)
            .map(|s| ((s.continent.as_str(), s.year), s.share))
            .collect();

        let mut out = Vec::new();
        let mut world: BTreeMap<Year, (FloatValue, &str)> = BTreeMap::new();
        for ((continent, year), (value, unit)) in continents {
            let Some(share) = share_index.get(&(continent, year)) else {
                continue;
            };
            let urban = value * share / 100.0;
            world.entry(year).or_insert((0.0, unit)).0 += urban;
            out.push(ActorRecord {
                scenario: scenario.to_string(),
                region: continent.to_string(),
                year,
                value: urban,
                unit: unit.to_string(),
                actor_group: None,
            });
        }
        out.extend(world.into_iter().map(|(year, (value, unit))| ActorRecord {
            scenario: scenario.to_string(),
            region: WORLD_LABEL.to_string(),
            year,
            value,
            unit: unit.to_string(),
            actor_group: None,
        }));
        out
    }
}

/// Label and concatenate the total, urban and company tables
pub fn combine_actor_groups(
    total: Vec<ActorRecord>,
    urban: Vec<ActorRecord>,
    companies: Vec<ActorRecord>,
) -> Vec<ActorRecord> {
    [
        (ActorGroup::All, total),
        (ActorGroup::Urban, urban),
        (ActorGroup::Companies, companies),
    ]
    .into_iter()
    .flat_map(|(group, records)| {
        records.into_iter().map(move |mut r| {
            r.actor_group = Some(group);
            r
        })
    })
    .collect()
}

/// Replace the values of `years` with the trailing 3-point mean
///
/// The mean is taken over the unsmoothed series. Years with fewer than two predecessors
/// are left as they are.
pub fn smooth_years(series: &[(Year, FloatValue)], years: &[Year]) -> Vec<(Year, FloatValue)> {
    series
        .iter()
        .enumerate()
        .map(|(i, &(year, value))| {
            if i >= 2 && years.contains(&year) {
                let mean = series[i - 2..=i].iter().map(|(_, v)| v).sum::<FloatValue>() / 3.0;
                (year, mean)
            } else {
                (year, value)
            }
        })
        .collect()
}

/// Smooth every (scenario, region, actor group) series of a combined table
pub fn smooth_actor_records(records: Vec<ActorRecord>, years: &[Year]) -> Vec<ActorRecord> {
    if years.is_empty() {
        return records;
    }
    let mut groups: BTreeMap<(String, String, Option<ActorGroup>), Vec<ActorRecord>> =
        BTreeMap::new();
    for r in records {
        groups
            .entry((r.scenario.clone(), r.region.clone(), r.actor_group))
            .or_default()
            .push(r);
    }

    let mut out = Vec::new();
    for (_, mut group) in groups {
        group.sort_by_key(|r| r.year);
        let series: Vec<(Year, FloatValue)> = group.iter().map(|r| (r.year, r.value)).collect();
        for (r, (_, value)) in group.iter_mut().zip(smooth_years(&series, years)) {
            r.value = value;
        }
        out.extend(group);
    }
    out
}
