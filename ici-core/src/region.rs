//! Model regions and their aggregation to the World total
//!
//! Scenario data from the integrated-assessment model is resolved on a fixed set of
//! macro regions. One sentinel region id ([`RegionId::WORLD`]) denotes the global aggregate.
//!
//! Two aggregation rules are used throughout the engine:
//!
//! - [`rollup`]: additive World total (emissions, reductions, pathways)
//! - [`weighted_average`]: activity-weighted World value (member coverage fractions)
//!
//! # Examples
//!
//! ```rust
//! use ici_core::region::{weighted_average, RegionId, RegionMapping};
//!
//! let mapping = RegionMapping::image();
//! assert_eq!(mapping.label(RegionId::WORLD), Some("World"));
//! assert_eq!(mapping.id("USA"), Some(RegionId(2)));
//!
//! // Coverage of 0.5 in a large region and 0.0 in a small one
//! let world = weighted_average(&[(0.5, 900.0), (0.0, 100.0)]);
//! assert!((world - 0.45).abs() < 1e-12);
//! ```

use crate::errors::{ICIError, ICIResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Numeric identifier of a model region
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RegionId(pub u16);

impl RegionId {
    /// Sentinel id of the global aggregate
    pub const WORLD: RegionId = RegionId(28);

    pub fn is_world(&self) -> bool {
        *self == Self::WORLD
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two-way lookup between region numbers and the labels used in scenario files
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RegionMapping {
    labels: BTreeMap<RegionId, String>,
}

impl RegionMapping {
    pub fn new(labels: BTreeMap<RegionId, String>) -> Self {
        Self { labels }
    }

    /// The 26 IMAGE regions plus the World aggregate
    pub fn image() -> Self {
        const IMAGE_REGIONS: [(u16, &str); 27] = [
            (1, "CAN"),
            (2, "USA"),
            (3, "MEX"),
            (4, "RCAM"),
            (5, "BRA"),
            (6, "RSAM"),
            (7, "NAF"),
            (8, "WAF"),
            (9, "EAF"),
            (10, "SAF"),
            (11, "WEU"),
            (12, "CEU"),
            (13, "TUR"),
            (14, "UKR"),
            (15, "STAN"),
            (16, "RUS"),
            (17, "ME"),
            (18, "INDIA"),
            (19, "KOR"),
            (20, "CHN"),
            (21, "SEAS"),
            (22, "INDO"),
            (23, "JAP"),
            (24, "OCE"),
            (25, "RSAS"),
            (26, "RSAF"),
            (28, "World"),
        ];
        Self {
            labels: IMAGE_REGIONS
                .iter()
                .map(|(nr, label)| (RegionId(*nr), label.to_string()))
                .collect(),
        }
    }

    pub fn label(&self, id: RegionId) -> Option<&str> {
        self.labels.get(&id).map(|s| s.as_str())
    }

    pub fn id(&self, label: &str) -> Option<RegionId> {
        self.labels
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(id, _)| *id)
    }

    /// Resolve a label, failing with [`ICIError::UnresolvableRegion`]
    pub fn resolve(&self, label: &str) -> ICIResult<RegionId> {
        self.id(label)
            .ok_or_else(|| ICIError::UnresolvableRegion(label.to_string()))
    }

    /// All non-World regions in id order
    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.labels.keys().copied().filter(|id| !id.is_world())
    }
}

/// Additive World total of regional values
pub fn rollup<I>(values: I) -> FloatValue
where
    I: IntoIterator<Item = FloatValue>,
{
    values.into_iter().sum()
}

/// Activity-weighted average of `(value, weight)` pairs
///
/// Returns 0.0 when the weights sum to zero, so a World without activity
/// reports no coverage instead of NaN.
pub fn weighted_average(pairs: &[(FloatValue, FloatValue)]) -> FloatValue {
    let total_weight: FloatValue = pairs.iter().map(|(_, w)| w).sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    pairs.iter().map(|(v, w)| v * w).sum::<FloatValue>() / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn image_mapping_round_trips_labels() {
        let mapping = RegionMapping::image();
        assert_eq!(mapping.regions().count(), 26);
        for id in mapping.regions() {
            let label = mapping.label(id).unwrap();
            assert_eq!(mapping.id(label), Some(id));
        }
        assert_eq!(mapping.id("World"), Some(RegionId::WORLD));
    }

    #[test]
    fn unknown_label_is_unresolvable() {
        let mapping = RegionMapping::image();
        assert_eq!(
            mapping.resolve("Atlantis"),
            Err(ICIError::UnresolvableRegion("Atlantis".to_string()))
        );
    }

    #[test]
    fn weighted_average_uses_activity() {
        // A simple mean would give 0.5
        let world = weighted_average(&[(1.0, 30.0), (0.0, 70.0)]);
        assert!(is_close!(world, 0.3));
    }

    #[test]
    fn weighted_average_without_activity_is_zero() {
        assert_eq!(weighted_average(&[(0.4, 0.0), (0.6, 0.0)]), 0.0);
        assert_eq!(weighted_average(&[]), 0.0);
    }

    #[test]
    fn rollup_sums() {
        assert_eq!(rollup(vec![1.0, 2.5, 3.5]), 7.0);
    }
}
