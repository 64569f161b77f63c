//! Region and country reductions
//!
//! A reduction is the baseline value minus a scenario value and may be negative. Two are
//! tracked side by side for every (initiative, sector, subsector):
//!
//! - individual: the initiative's own variable, baseline minus the initiative scenario
//! - subsector: the subsector variable, baseline minus the combined scenario
//!
//! Country reductions scale the region reduction by membership and country share,
//! `R_k = R_r x m_k x s_k`, so they are zero for non-members.

use crate::components::shares::{index_shares, CountryShare};
use ici_core::config::{InitiativeParameters, RunConfig};
use ici_core::diagnostics::RunContext;
use ici_core::errors::{ICIError, ICIResult};
use ici_core::initiative::{Initiative, Sector, Subsector, SubsectorKey};
use ici_core::membership::MembershipTable;
use ici_core::region::RegionId;
use ici_core::table::{by_region_year, select, EmissionsRecord};
use ici_core::units::CO2E_UNIT;
use ici_core::{FloatValue, Year};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Reductions of one initiative in one region and year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReduction {
    pub initiative: Initiative,
    pub sector: Sector,
    pub subsector: Subsector,
    pub region: RegionId,
    pub year: Year,
    pub unit: String,
    pub reduction_region_individual: FloatValue,
    pub reduction_region_subsector: FloatValue,
}

impl RegionReduction {
    pub fn key(&self) -> SubsectorKey {
        SubsectorKey::new(self.sector, self.subsector)
    }
}

/// Reductions attributed to one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryReduction {
    pub sector: Sector,
    pub subsector: Subsector,
    pub initiative: Initiative,
    pub region: RegionId,
    pub iso3: String,
    pub year: Year,
    pub unit: String,
    pub reduction_region_individual: FloatValue,
    pub reduction_country_individual: FloatValue,
    pub reduction_region_subsector: FloatValue,
    pub reduction_country_subsector: FloatValue,
}

impl CountryReduction {
    pub fn key(&self) -> SubsectorKey {
        SubsectorKey::new(self.sector, self.subsector)
    }
}

/// Member pathway of one initiative without overlap correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativePathway {
    pub initiative: Initiative,
    pub scenario: String,
    pub region: RegionId,
    pub year: Year,
    pub value: FloatValue,
    pub unit: String,
}

/// Baseline minus scenario per non-World (region, year)
///
/// Both series must be present. Keys only in the baseline are skipped.
pub fn reduction_series(
    records: &[EmissionsRecord],
    baseline_scenario: &str,
    scenario: &str,
    variable: &str,
) -> ICIResult<BTreeMap<(RegionId, Year), FloatValue>> {
    let baseline = by_region_year(select(records, baseline_scenario, variable));
    if baseline.is_empty() {
        return Err(ICIError::MissingData {
            scenario: baseline_scenario.to_string(),
            what: variable.to_string(),
        });
    }
    let other = by_region_year(select(records, scenario, variable));
    if other.is_empty() {
        return Err(ICIError::MissingData {
            scenario: scenario.to_string(),
            what: variable.to_string(),
        });
    }

    Ok(baseline
        .into_iter()
        .filter(|((region, _), _)| !region.is_world())
        .filter_map(|(key, b)| other.get(&key).map(|s| (key, b - s)))
        .collect())
}

/// Region reductions for every configured (initiative, subsector)
///
/// A missing individual or subsector series abandons that entry only.
pub fn region_reductions(
    config: &RunConfig,
    records: &[EmissionsRecord],
    ctx: &mut RunContext,
) -> ICIResult<Vec<RegionReduction>> {
    let settings = &config.settings;
    let mut out = Vec::new();

    for p in &config.initiatives {
        let context = format!("{} {}", p.initiative, p.key());
        let individual = reduction_series(
            records,
            &settings.baseline_scenario,
            &settings.initiative_scenario,
            &p.individual_variable,
        );
        let Some(individual) = ctx.recover(context.clone(), individual)? else {
            continue;
        };
        let subsector = reduction_series(
            records,
            &settings.baseline_scenario,
            &settings.combined_scenario,
            &p.subsector_variable,
        );
        let Some(subsector) = ctx.recover(context, subsector)? else {
            continue;
        };
        out.extend(merge_reductions(p, &individual, &subsector));
    }
    Ok(out)
}

fn merge_reductions(
    p: &InitiativeParameters,
    individual: &BTreeMap<(RegionId, Year), FloatValue>,
    subsector: &BTreeMap<(RegionId, Year), FloatValue>,
) -> Vec<RegionReduction> {
    subsector
        .iter()
        .map(|(&(region, year), &reduction_subsector)| {
            let reduction_individual = individual.get(&(region, year)).copied().unwrap_or_else(|| {
                debug!(initiative = %p.initiative, region = %region, year = year, "no individual reduction, using 0");
                0.0
            });
            RegionReduction {
                initiative: p.initiative,
                sector: p.sector,
                subsector: p.subsector,
                region,
                year,
                unit: CO2E_UNIT.to_string(),
                reduction_region_individual: reduction_individual,
                reduction_region_subsector: reduction_subsector,
            }
        })
        .collect()
}

/// Country reductions for all country-member initiatives
///
/// One row per region reduction and country of the membership table in that region that
/// holds a share for the initiative in the same region.
pub fn country_reductions(
    region_reductions: &[RegionReduction],
    shares: &[CountryShare],
    members: &MembershipTable,
) -> Vec<CountryReduction> {
    let share_index = index_shares(shares);
    let mut out = Vec::new();
    for r in region_reductions
        .iter()
        .filter(|r| !r.initiative.is_global_only())
    {
        for country in members.countries_in(r.region) {
            let Some(share) = share_index.get(&(r.initiative, country.iso3.as_str())) else {
                continue;
            };
            if share.region != r.region {
                warn!(
                    initiative = %r.initiative,
                    country = %country.iso3,
                    region = %r.region,
                    share_region = %share.region,
                    "country share belongs to another region, no reduction"
                );
                continue;
            }
            let weight = members.member_factor(&country.iso3, r.initiative) * share.share;
            out.push(CountryReduction {
                sector: r.sector,
                subsector: r.subsector,
                initiative: r.initiative,
                region: r.region,
                iso3: country.iso3.clone(),
                year: r.year,
                unit: r.unit.clone(),
                reduction_region_individual: r.reduction_region_individual,
                reduction_country_individual: r.reduction_region_individual * weight,
                reduction_region_subsector: r.reduction_region_subsector,
                reduction_country_subsector: r.reduction_region_subsector * weight,
            });
        }
    }
    out
}

/// Member pathways of individual initiatives, before overlap resolution
///
/// Per region the baseline of the initiative's own variable minus the summed country
/// reductions, World as the sum of regions. Initiatives without country members only get
/// a World row: baseline minus the global fraction of the summed region reductions.
pub fn individual_member_pathways(
    config: &RunConfig,
    records: &[EmissionsRecord],
    region_reductions: &[RegionReduction],
    country_reductions: &[CountryReduction],
    flaring_fraction: Option<FloatValue>,
) -> Vec<InitiativePathway> {
    let settings = &config.settings;
    let mut out = Vec::new();

    for p in config.initiative_entries() {
        let baseline: BTreeMap<(RegionId, Year), FloatValue> = by_region_year(select(
            records,
            &settings.baseline_scenario,
            &p.individual_variable,
        ))
        .into_iter()
        .filter(|((region, _), _)| !region.is_world())
        .collect();
        if baseline.is_empty() {
            continue;
        }

        let pathway = |region: RegionId, year: Year, value: FloatValue| InitiativePathway {
            initiative: p.initiative,
            scenario: settings.members_scenario.clone(),
            region,
            year,
            value,
            unit: CO2E_UNIT.to_string(),
        };

        if p.initiative.is_global_only() {
            let Some(fraction) = flaring_fraction else {
                continue;
            };
            let mut reductions: BTreeMap<Year, FloatValue> = BTreeMap::new();
            for r in region_reductions
                .iter()
                .filter(|r| r.initiative == p.initiative && r.key() == p.key())
            {
                *reductions.entry(r.year).or_insert(0.0) += r.reduction_region_individual;
            }
            let mut world: BTreeMap<Year, FloatValue> = BTreeMap::new();
            for (&(_, year), &value) in &baseline {
                *world.entry(year).or_insert(0.0) += value;
            }
            for (year, value) in world {
                let reduction = reductions.get(&year).copied().unwrap_or(0.0) * fraction;
                out.push(pathway(RegionId::WORLD, year, value - reduction));
            }
            continue;
        }

        // Rows of the first configured subsector only, the country reductions repeat per subsector
        let mut reductions: BTreeMap<(RegionId, Year), FloatValue> = BTreeMap::new();
        for c in country_reductions
            .iter()
            .filter(|c| c.initiative == p.initiative && c.key() == p.key())
        {
            *reductions.entry((c.region, c.year)).or_insert(0.0) +=
                c.reduction_country_individual;
        }

        let mut world: BTreeMap<Year, FloatValue> = BTreeMap::new();
        for (&(region, year), &value) in &baseline {
            let member_value = value - reductions.get(&(region, year)).copied().unwrap_or(0.0);
            *world.entry(year).or_insert(0.0) += member_value;
            out.push(pathway(region, year, member_value));
        }
        for (year, value) in world {
            out.push(pathway(RegionId::WORLD, year, value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ici_core::membership::Country;
    use is_close::is_close;

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

    fn region_reduction(initiative: Initiative, individual: FloatValue) -> RegionReduction {
        RegionReduction {
            initiative,
            sector: Sector::Industry,
            subsector: Subsector::Total,
            region: RegionId(11),
            year: 2030,
            unit: CO2E_UNIT.to_string(),
            reduction_region_individual: individual,
            reduction_region_subsector: 2.0 * individual,
        }
    }

    #[test]
    fn reduction_is_baseline_minus_scenario_without_world() {
        let records = vec![
            record("CP", "Emissions|CO2|Industry", RegionId(11), 100.0),
            record("CP", "Emissions|CO2|Industry", RegionId::WORLD, 100.0),
            record("COP", "Emissions|CO2|Industry", RegionId(11), 110.0),
            record("COP", "Emissions|CO2|Industry", RegionId::WORLD, 110.0),
        ];
        let series = reduction_series(&records, "CP", "COP", "Emissions|CO2|Industry").unwrap();
        assert_eq!(series.len(), 1);
        // Negative reductions are kept
        assert_eq!(series[&(RegionId(11), 2030)], -10.0);
    }

    #[test]
    fn missing_scenario_is_a_data_error() {
        let records = vec![record("CP", "Emissions|CO2|Industry", RegionId(11), 100.0)];
        let err = reduction_series(&records, "CP", "COP", "Emissions|CO2|Industry").unwrap_err();
        assert!(matches!(err, ICIError::MissingData { ref scenario, .. } if scenario == "COP"));
    }

    #[test]
    fn non_members_get_no_reduction() {
        let mut members = MembershipTable::new();
        for (iso3, member) in [("DEU", true), ("FRA", false), ("ITA", true)] {
            members
                .add_country(
                    Country {
                        iso3: iso3.to_string(),
                        name: iso3.to_string(),
                        region: RegionId(11),
                    },
                    [(Initiative::Steel, member)],
                )
                .unwrap();
        }
        let shares: Vec<CountryShare> = [("DEU", 0.5), ("FRA", 0.5)]
            .iter()
            .map(|(iso3, share)| CountryShare {
                initiative: Initiative::Steel,
                iso3: iso3.to_string(),
                country: iso3.to_string(),
                region: RegionId(11),
                value: 1.0,
                share: *share,
            })
            .collect();

        let out = country_reductions(
            &[region_reduction(Initiative::Steel, 10.0)],
            &shares,
            &members,
        );
        // ITA holds no share and gets no row
        assert_eq!(out.len(), 2);
        let deu = out.iter().find(|c| c.iso3 == "DEU").unwrap();
        let fra = out.iter().find(|c| c.iso3 == "FRA").unwrap();
        assert!(is_close!(deu.reduction_country_individual, 5.0));
        assert!(is_close!(deu.reduction_country_subsector, 10.0));
        assert_eq!(fra.reduction_country_individual, 0.0);
        assert_eq!(fra.reduction_country_subsector, 0.0);
    }

    #[test]
    fn share_from_another_region_gives_no_reduction() {
        let mut members = MembershipTable::new();
        members
            .add_country(
                Country {
                    iso3: "DEU".to_string(),
                    name: "Germany".to_string(),
                    region: RegionId(12),
                },
                [(Initiative::Steel, true)],
            )
            .unwrap();
        // The historical table places DEU in region 11
        let shares = vec![CountryShare {
            initiative: Initiative::Steel,
            iso3: "DEU".to_string(),
            country: "Germany".to_string(),
            region: RegionId(11),
            value: 30.0,
            share: 1.0,
        }];
        let mut reduction = region_reduction(Initiative::Steel, 100.0);
        reduction.region = RegionId(12);

        let out = country_reductions(&[reduction], &shares, &members);
        assert!(out.is_empty());
    }

    #[test]
    fn global_initiatives_have_no_country_rows() {
        let out = country_reductions(
            &[region_reduction(Initiative::Flaring, 10.0)],
            &[],
            &MembershipTable::new(),
        );
        assert!(out.is_empty());
    }
}
