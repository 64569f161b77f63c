//! Overlap resolver
//!
//! Several initiatives can claim reductions in the same subsector for the same country.
//! Adding their reductions would count avoided emissions twice, so per country and year a
//! decision table picks the reduction that governs.
//!
//! A subsector moves through `deduplicate -> classify -> resolve -> sum -> cap`:
//!
//! 1. exact duplicates on the natural key are dropped and logged
//! 2. the long table is pivoted to one row per (region, country, year, unit) and each
//!    initiative's membership flag is derived as `individual reduction != 0`
//! 3. the flags form a [`MembershipCombination`], matched to a [`Criterium`]
//! 4. resolved country reductions are summed per (sector, subsector, region, year, unit)
//! 5. [`cap`] limits the sum to the region's subsector reduction
//!
//! Electricity and Heat is resolved over Coal, Renewable and Cooling. Industry (Steel and
//! Cement) and road transport (cars/buses and trucks) use the pair table. A subsector with
//! a single initiative passes its individual reductions through unchanged.

use crate::components::reductions::{CountryReduction, RegionReduction};
use ici_core::diagnostics::{CapEvent, Diagnostics, DuplicateRow, PairOverlap};
use ici_core::errors::{ICIError, ICIResult};
use ici_core::initiative::{Initiative, Sector, Subsector, SubsectorKey};
use ici_core::region::RegionId;
use ici_core::{FloatValue, Year};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Reduction chosen for a membership combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterium {
    ReductionSubsector,
    CoalPlusCooling,
    Coal,
    Cop28,
    Cooling,
    First,
    Second,
    Baseline,
}

impl Criterium {
    const ALL: [Criterium; 8] = [
        Criterium::ReductionSubsector,
        Criterium::CoalPlusCooling,
        Criterium::Coal,
        Criterium::Cop28,
        Criterium::Cooling,
        Criterium::First,
        Criterium::Second,
        Criterium::Baseline,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Criterium::ReductionSubsector => "reduction_subsector",
            Criterium::CoalPlusCooling => "reduction_coal + reduction_cooling",
            Criterium::Coal => "reduction_coal",
            Criterium::Cop28 => "COP28",
            Criterium::Cooling => "reduction_cooling",
            Criterium::First => "reduction_first",
            Criterium::Second => "reduction_second",
            Criterium::Baseline => "baseline",
        }
    }
}

impl fmt::Display for Criterium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Criterium {
    type Err = ICIError;

    fn from_str(s: &str) -> ICIResult<Self> {
        Criterium::ALL
            .iter()
            .find(|c| c.label() == s)
            .copied()
            .ok_or_else(|| ICIError::UnknownCriterium(s.to_string()))
    }
}

impl Serialize for Criterium {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Membership flags of one country in an overlapping subsector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipCombination {
    ElectricityHeat {
        coal: bool,
        renewable: bool,
        cooling: bool,
    },
    Pair {
        first: bool,
        second: bool,
    },
}

impl MembershipCombination {
    pub fn criterium(&self) -> Criterium {
        match *self {
            MembershipCombination::ElectricityHeat {
                coal,
                renewable,
                cooling,
            } => match (coal, renewable, cooling) {
                (true, true, _) => Criterium::ReductionSubsector,
                (true, false, true) => Criterium::CoalPlusCooling,
                (true, false, false) => Criterium::Coal,
                (false, true, _) => Criterium::Cop28,
                (false, false, true) => Criterium::Cooling,
                (false, false, false) => Criterium::Baseline,
            },
            MembershipCombination::Pair { first, second } => match (first, second) {
                (true, true) => Criterium::ReductionSubsector,
                (true, false) => Criterium::First,
                (false, true) => Criterium::Second,
                (false, false) => Criterium::Baseline,
            },
        }
    }
}

impl fmt::Display for MembershipCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |b: bool| u8::from(b);
        match *self {
            MembershipCombination::ElectricityHeat {
                coal,
                renewable,
                cooling,
            } => write!(
                f,
                "Coal={} Renewable={} Cooling={}",
                flag(coal),
                flag(renewable),
                flag(cooling)
            ),
            MembershipCombination::Pair { first, second } => {
                write!(f, "first={} second={}", flag(first), flag(second))
            }
        }
    }
}

impl Serialize for MembershipCombination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How a subsector's overlapping initiatives are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapRule {
    ElectricityHeat,
    Pair { first: Initiative, second: Initiative },
}

impl OverlapRule {
    pub fn for_subsector(key: SubsectorKey) -> Option<Self> {
        match (key.sector, key.subsector) {
            (_, Subsector::ElectricityAndHeat) => Some(OverlapRule::ElectricityHeat),
            (Sector::Industry, Subsector::Total) => Some(OverlapRule::Pair {
                first: Initiative::Steel,
                second: Initiative::Cement,
            }),
            (Sector::Transportation, Subsector::Total) => Some(OverlapRule::Pair {
                first: Initiative::TransportCarsBuses,
                second: Initiative::TransportTrucks,
            }),
            _ => None,
        }
    }

    pub fn initiatives(&self) -> Vec<Initiative> {
        match self {
            OverlapRule::ElectricityHeat => {
                vec![Initiative::Coal, Initiative::Renewable, Initiative::Cooling]
            }
            OverlapRule::Pair { first, second } => vec![*first, *second],
        }
    }
}

/// Audit row of a resolved country reduction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRow {
    pub sector: Sector,
    pub subsector: Subsector,
    pub region: RegionId,
    pub iso3: String,
    pub year: Year,
    pub unit: String,
    /// Absent when the subsector has a single initiative
    pub membership: Option<MembershipCombination>,
    pub criterium: Option<Criterium>,
    pub reduction_country_subsector: FloatValue,
    pub reduction_country_members: FloatValue,
}

/// Member reduction of a subsector in one region and year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsectorReduction {
    pub sector: Sector,
    pub subsector: Subsector,
    pub region: RegionId,
    pub year: Year,
    pub unit: String,
    pub reduction_country_members: FloatValue,
}

impl SubsectorReduction {
    pub fn key(&self) -> SubsectorKey {
        SubsectorKey::new(self.sector, self.subsector)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubsectorResolution {
    pub rows: Vec<ResolvedRow>,
    pub reductions: Vec<SubsectorReduction>,
}

type NaturalKey = (RegionId, String, Sector, Subsector, Year, String, Initiative);

/// Drop rows whose natural key was already seen, keeping the first
pub fn deduplicate(
    rows: Vec<CountryReduction>,
    stage: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<CountryReduction> {
    let mut seen: HashSet<NaturalKey> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in rows {
        let key = (
            row.region,
            row.iso3.clone(),
            row.sector,
            row.subsector,
            row.year,
            row.unit.clone(),
            row.initiative,
        );
        if seen.insert(key) {
            kept.push(row);
        } else {
            dropped += 1;
            diagnostics.duplicates.push(DuplicateRow {
                stage: stage.to_string(),
                sector: row.sector,
                subsector: row.subsector,
                initiative: row.initiative,
                region: row.region,
                iso3: row.iso3,
                year: row.year,
                unit: row.unit,
                reduction_individual: row.reduction_country_individual,
                reduction_subsector: row.reduction_country_subsector,
            });
        }
    }
    if dropped > 0 {
        warn!(stage = %stage, dropped = dropped, "duplicates in the data were dropped");
    }
    kept
}

type PivotKey = (RegionId, String, Year, String);

/// Individual and subsector reduction per initiative of one pivoted row
#[derive(Debug, Default)]
struct PivotRow {
    reductions: BTreeMap<Initiative, (FloatValue, FloatValue)>,
}

impl PivotRow {
    fn individual(&self, initiative: Initiative) -> FloatValue {
        self.reductions.get(&initiative).map(|r| r.0).unwrap_or(0.0)
    }

    fn is_member(&self, initiative: Initiative) -> bool {
        self.individual(initiative) != 0.0
    }

    /// Largest subsector reduction of the row's initiatives
    fn subsector(&self, initiatives: &[Initiative]) -> FloatValue {
        initiatives
            .iter()
            .map(|ici| self.reductions.get(ici).map(|r| r.1).unwrap_or(0.0))
            .fold(FloatValue::NEG_INFINITY, FloatValue::max)
    }
}

fn pivot(rows: &[CountryReduction]) -> BTreeMap<PivotKey, PivotRow> {
    let mut out: BTreeMap<PivotKey, PivotRow> = BTreeMap::new();
    for r in rows {
        out.entry((r.region, r.iso3.clone(), r.year, r.unit.clone()))
            .or_default()
            .reductions
            .insert(
                r.initiative,
                (r.reduction_country_individual, r.reduction_country_subsector),
            );
    }
    out
}

/// Resolves overlapping initiatives of one subsector
#[derive(Debug, Clone)]
pub struct OverlapResolver {
    key: SubsectorKey,
}

impl OverlapResolver {
    pub fn new(key: SubsectorKey) -> Self {
        Self { key }
    }

    /// Resolve the country reductions of this subsector
    ///
    /// Rows of other subsectors are ignored. Fails with [`ICIError::NoOverlapRule`] when
    /// several initiatives share a subsector without a decision table.
    pub fn resolve(
        &self,
        rows: &[CountryReduction],
        diagnostics: &mut Diagnostics,
    ) -> ICIResult<SubsectorResolution> {
        let rows: Vec<CountryReduction> = rows
            .iter()
            .filter(|r| r.key() == self.key)
            .cloned()
            .collect();
        let rule = OverlapRule::for_subsector(self.key);

        let rows = match rule {
            Some(rule) => {
                let allowed = rule.initiatives();
                let (inside, outside): (Vec<_>, Vec<_>) =
                    rows.into_iter().partition(|r| allowed.contains(&r.initiative));
                let ignored: BTreeSet<Initiative> = outside.iter().map(|r| r.initiative).collect();
                for initiative in ignored {
                    warn!(subsector = %self.key, initiative = %initiative, "initiative is not part of the overlap rule, ignored");
                }
                inside
            }
            None => rows,
        };
        if rows.is_empty() {
            warn!(subsector = %self.key, "no country reductions for subsector");
            return Ok(SubsectorResolution::default());
        }

        let rows = deduplicate(rows, &self.key.to_string(), diagnostics);
        let present: BTreeSet<Initiative> = rows.iter().map(|r| r.initiative).collect();
        info!(
            subsector = %self.key,
            initiatives = %present.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", "),
            "calculate member reductions"
        );

        let resolved = match (rule, present.len()) {
            (_, 1) => self.pass_through(&rows),
            (Some(OverlapRule::ElectricityHeat), _) => self.resolve_electricity_heat(&rows),
            (Some(OverlapRule::Pair { first, second }), _) => {
                self.resolve_pair(&rows, first, second, diagnostics)?
            }
            (None, _) => {
                return Err(ICIError::NoOverlapRule {
                    sector: self.key.sector.to_string(),
                    subsector: self.key.subsector.to_string(),
                    initiatives: present
                        .iter()
                        .map(|i| i.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        };

        let reductions = sum_resolved(&resolved);
        Ok(SubsectorResolution {
            rows: resolved,
            reductions,
        })
    }

    fn resolved_row(
        &self,
        key: &PivotKey,
        membership: Option<MembershipCombination>,
        criterium: Option<Criterium>,
        subsector: FloatValue,
        members: FloatValue,
    ) -> ResolvedRow {
        let (region, iso3, year, unit) = key;
        ResolvedRow {
            sector: self.key.sector,
            subsector: self.key.subsector,
            region: *region,
            iso3: iso3.clone(),
            year: *year,
            unit: unit.clone(),
            membership,
            criterium,
            reduction_country_subsector: subsector,
            reduction_country_members: members,
        }
    }

    fn pass_through(&self, rows: &[CountryReduction]) -> Vec<ResolvedRow> {
        rows.iter()
            .map(|r| {
                let key = (r.region, r.iso3.clone(), r.year, r.unit.clone());
                self.resolved_row(
                    &key,
                    None,
                    None,
                    r.reduction_country_subsector,
                    r.reduction_country_individual,
                )
            })
            .collect()
    }

    fn resolve_electricity_heat(&self, rows: &[CountryReduction]) -> Vec<ResolvedRow> {
        let initiatives = OverlapRule::ElectricityHeat.initiatives();
        pivot(rows)
            .iter()
            .map(|(key, row)| {
                let combination = MembershipCombination::ElectricityHeat {
                    coal: row.is_member(Initiative::Coal),
                    renewable: row.is_member(Initiative::Renewable),
                    cooling: row.is_member(Initiative::Cooling),
                };
                let criterium = combination.criterium();
                let subsector = row.subsector(&initiatives);
                let value = match criterium {
                    Criterium::ReductionSubsector | Criterium::Cop28 | Criterium::Cooling => {
                        subsector
                    }
                    Criterium::CoalPlusCooling => {
                        row.individual(Initiative::Coal) + row.individual(Initiative::Cooling)
                    }
                    Criterium::Coal => row.individual(Initiative::Coal),
                    Criterium::Baseline | Criterium::First | Criterium::Second => 0.0,
                };
                self.resolved_row(key, Some(combination), Some(criterium), subsector, value)
            })
            .collect()
    }

    /// Pair decision table over `first` and `second`
    ///
    /// [`resolve`](Self::resolve) only gets here with both initiatives present, so
    /// [`ICIError::InitiativeCount`] is unreachable from the pipeline. It guards the pivot
    /// against rows that were not filtered to the pair.
    fn resolve_pair(
        &self,
        rows: &[CountryReduction],
        first: Initiative,
        second: Initiative,
        diagnostics: &mut Diagnostics,
    ) -> ICIResult<Vec<ResolvedRow>> {
        let present: BTreeSet<Initiative> = rows.iter().map(|r| r.initiative).collect();
        if present.len() != 2 {
            return Err(ICIError::InitiativeCount {
                sector: self.key.sector.to_string(),
                subsector: self.key.subsector.to_string(),
                found: present.len(),
            });
        }

        let initiatives = [first, second];
        let mut out = Vec::new();
        for (key, row) in pivot(rows).iter() {
            let combination = MembershipCombination::Pair {
                first: row.is_member(first),
                second: row.is_member(second),
            };
            let criterium = combination.criterium();
            let subsector = row.subsector(&initiatives);
            let value = match criterium {
                Criterium::ReductionSubsector => {
                    let sum_individual = row.individual(first) + row.individual(second);
                    diagnostics.pair_overlaps.push(PairOverlap {
                        sector: self.key.sector,
                        subsector: self.key.subsector,
                        region: key.0,
                        iso3: key.1.clone(),
                        year: key.2,
                        value_subsector: subsector,
                        value_sum_individual: sum_individual,
                    });
                    subsector.min(sum_individual)
                }
                Criterium::First => row.individual(first),
                Criterium::Second => row.individual(second),
                _ => 0.0,
            };
            out.push(self.resolved_row(key, Some(combination), Some(criterium), subsector, value));
        }
        Ok(out)
    }
}

/// Sum resolved country reductions per (sector, subsector, region, year, unit)
pub fn sum_resolved(rows: &[ResolvedRow]) -> Vec<SubsectorReduction> {
    let mut sums: BTreeMap<(Sector, Subsector, RegionId, Year, String), FloatValue> =
        BTreeMap::new();
    for r in rows {
        *sums
            .entry((r.sector, r.subsector, r.region, r.year, r.unit.clone()))
            .or_insert(0.0) += r.reduction_country_members;
    }
    sums.into_iter()
        .map(
            |((sector, subsector, region, year, unit), reduction)| SubsectorReduction {
                sector,
                subsector,
                region,
                year,
                unit,
                reduction_country_members: reduction,
            },
        )
        .collect()
}

/// Member reductions of a World-only initiative's subsector
///
/// The global participation fraction is applied to every region's individual reduction.
pub fn global_reductions(
    key: SubsectorKey,
    initiative: Initiative,
    region_reductions: &[RegionReduction],
    fraction: FloatValue,
) -> Vec<SubsectorReduction> {
    region_reductions
        .iter()
        .filter(|r| r.key() == key && r.initiative == initiative)
        .map(|r| SubsectorReduction {
            sector: r.sector,
            subsector: r.subsector,
            region: r.region,
            year: r.year,
            unit: r.unit.clone(),
            reduction_country_members: r.reduction_region_individual * fraction,
        })
        .collect()
}

/// Limit member reductions to the region's subsector reduction
///
/// Rows without a region reduction are left unchanged. Every binding cap is recorded.
pub fn cap(
    reductions: Vec<SubsectorReduction>,
    region_subsector: &BTreeMap<(SubsectorKey, RegionId, Year), FloatValue>,
    diagnostics: &mut Diagnostics,
) -> Vec<SubsectorReduction> {
    let mut binding = 0usize;
    let out = reductions
        .into_iter()
        .map(|mut r| {
            let Some(&limit) = region_subsector.get(&(r.key(), r.region, r.year)) else {
                return r;
            };
            let check_before = r.reduction_country_members > limit;
            if check_before {
                let capped = r.reduction_country_members.min(limit);
                binding += 1;
                diagnostics.caps.push(CapEvent {
                    sector: r.sector,
                    subsector: r.subsector,
                    region: r.region,
                    year: r.year,
                    reduction_members: r.reduction_country_members,
                    reduction_region_subsector: limit,
                    capped,
                    check_before,
                    check_after: capped > limit,
                });
                r.reduction_country_members = capped;
            }
            r
        })
        .collect();
    if binding > 0 {
        warn!(rows = binding, "member reductions capped to the subsector reduction");
    }
    out
}

/// Region subsector reductions keyed for [`cap`], one value per subsector
pub fn index_region_subsector(
    region_reductions: &[RegionReduction],
) -> BTreeMap<(SubsectorKey, RegionId, Year), FloatValue> {
    region_reductions
        .iter()
        .map(|r| ((r.key(), r.region, r.year), r.reduction_region_subsector))
        .collect()
}
