//! Country membership of initiatives
//!
//! Membership is a strongly-typed map `(country, initiative) -> bool` built once from the
//! signatories table and immutable during a run. Flaring has no country members; its
//! participation is a global fraction per year held in [`FlaringParticipation`].

use crate::errors::{ICIError, ICIResult};
use crate::initiative::Initiative;
use crate::region::RegionId;
use crate::{FloatValue, Year};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A country as listed in the signatories table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub iso3: String,
    pub name: String,
    /// Owning model region, never World
    pub region: RegionId,
}

/// Country x initiative membership
#[derive(Debug, Clone, Default)]
pub struct MembershipTable {
    countries: Vec<Country>,
    members: HashMap<(String, Initiative), bool>,
}

impl MembershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a country with its memberships
    ///
    /// Initiatives not listed are treated as non-membership. A country mapped to World or
    /// listed twice is rejected.
    pub fn add_country(
        &mut self,
        country: Country,
        memberships: impl IntoIterator<Item = (Initiative, bool)>,
    ) -> ICIResult<()> {
        if country.region.is_world() {
            return Err(ICIError::UnresolvableRegion(format!(
                "{} is mapped to World",
                country.iso3
            )));
        }
        if self.country(&country.iso3).is_some() {
            return Err(ICIError::InvalidConfiguration(format!(
                "country {} is listed more than once in the signatories table",
                country.iso3
            )));
        }
        for (initiative, member) in memberships {
            self.members
                .insert((country.iso3.clone(), initiative), member);
        }
        self.countries.push(country);
        Ok(())
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn country(&self, iso3: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.iso3 == iso3)
    }

    pub fn countries_in(&self, region: RegionId) -> impl Iterator<Item = &Country> + '_ {
        self.countries.iter().filter(move |c| c.region == region)
    }

    pub fn is_member(&self, iso3: &str, initiative: Initiative) -> bool {
        self.members
            .get(&(iso3.to_string(), initiative))
            .copied()
            .unwrap_or(false)
    }

    /// Membership as a 0/1 factor
    pub fn member_factor(&self, iso3: &str, initiative: Initiative) -> FloatValue {
        if self.is_member(iso3, initiative) {
            1.0
        } else {
            0.0
        }
    }
}

/// Global participation fraction of the Flaring initiative
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlaringParticipation {
    fractions: BTreeMap<Year, FloatValue>,
}

impl FlaringParticipation {
    pub fn new(fractions: BTreeMap<Year, FloatValue>) -> Self {
        Self { fractions }
    }

    /// Participation fraction for a reference year
    pub fn fraction(&self, year: Year) -> ICIResult<FloatValue> {
        self.fractions
            .get(&year)
            .copied()
            .ok_or_else(|| ICIError::MissingData {
                scenario: "flaring participation".to_string(),
                what: format!("fraction in {year}"),
            })
    }
}
