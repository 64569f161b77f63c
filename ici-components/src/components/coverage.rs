//! Membership resolver
//!
//! Combines country shares with the membership table into a coverage fraction per region:
//! the part of a region's activity attributable to signatories.
//!
//! $$ c_r = \sum_{k \in r} m_k s_k $$
//!
//! The World fraction is the baseline-weighted average of the regional fractions,
//!
//! $$ c_{World}(y) = \frac{\sum_r B_r(y) c_r}{\sum_r B_r(y)} $$
//!
//! except for initiatives without country members (Flaring), which take a single global
//! participation fraction at World level and zero in every region.

use crate::components::shares::CountryShare;
use ici_core::initiative::Initiative;
use ici_core::membership::MembershipTable;
use ici_core::region::{weighted_average, RegionId};
use ici_core::{FloatValue, Year};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Coverage fraction of one initiative in one region and year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberShare {
    pub initiative: Initiative,
    pub region: RegionId,
    pub year: Year,
    pub share: FloatValue,
}

/// Coverage fraction per region, from country shares and membership
///
/// Countries holding a share but absent from the membership table count as non-members, as
/// do countries the membership table places in another region.
pub fn region_coverage(
    initiative: Initiative,
    shares: &[CountryShare],
    members: &MembershipTable,
) -> BTreeMap<RegionId, FloatValue> {
    let mut coverage = BTreeMap::new();
    for share in shares.iter().filter(|s| s.initiative == initiative) {
        let same_region = members
            .country(&share.iso3)
            .is_some_and(|c| c.region == share.region);
        let factor = if same_region {
            members.member_factor(&share.iso3, initiative)
        } else {
            0.0
        };
        *coverage.entry(share.region).or_insert(0.0) += factor * share.share;
    }
    coverage
}

/// Resolves coverage fractions for every (region, year) of a baseline series
#[derive(Debug, Clone)]
pub struct MembershipResolver<'a> {
    members: &'a MembershipTable,
}

impl<'a> MembershipResolver<'a> {
    pub fn new(members: &'a MembershipTable) -> Self {
        Self { members }
    }

    /// Coverage of a country-member initiative
    ///
    /// `baseline` holds the activity per (region, year) used to weight the World fraction;
    /// World rows in it are ignored. Regions without any share get a fraction of zero.
    pub fn resolve(
        &self,
        initiative: Initiative,
        shares: &[CountryShare],
        baseline: &BTreeMap<(RegionId, Year), FloatValue>,
    ) -> Vec<MemberShare> {
        let coverage = region_coverage(initiative, shares, self.members);

        let mut out = Vec::new();
        let mut world: BTreeMap<Year, Vec<(FloatValue, FloatValue)>> = BTreeMap::new();
        for (&(region, year), &activity) in baseline.iter().filter(|((r, _), _)| !r.is_world()) {
            let share = coverage.get(&region).copied().unwrap_or(0.0);
            world.entry(year).or_default().push((share, activity));
            out.push(MemberShare {
                initiative,
                region,
                year,
                share,
            });
        }

        let first_year = world.keys().next().copied();
        for (year, pairs) in world {
            let share = weighted_average(&pairs);
            if Some(year) == first_year {
                info!(initiative = %initiative, year = year, share = share, "global signatories share");
            }
            out.push(MemberShare {
                initiative,
                region: RegionId::WORLD,
                year,
                share,
            });
        }
        out
    }

    /// Coverage of a World-only initiative from its global participation fraction
    pub fn resolve_global(
        &self,
        initiative: Initiative,
        fraction: FloatValue,
        baseline: &BTreeMap<(RegionId, Year), FloatValue>,
    ) -> Vec<MemberShare> {
        let mut out: Vec<MemberShare> = baseline
            .keys()
            .filter(|(r, _)| !r.is_world())
            .map(|&(region, year)| MemberShare {
                initiative,
                region,
                year,
                share: 0.0,
            })
            .collect();

        let mut years: Vec<Year> = baseline.keys().map(|(_, y)| *y).collect();
        years.sort_unstable();
        years.dedup();
        out.extend(years.into_iter().map(|year| MemberShare {
            initiative,
            region: RegionId::WORLD,
            year,
            share: fraction,
        }));
        out
    }
}

/// Index coverage fractions by (region, year)
pub fn index_coverage(shares: &[MemberShare]) -> BTreeMap<(RegionId, Year), FloatValue> {
    shares.iter().map(|s| ((s.region, s.year), s.share)).collect()
}
