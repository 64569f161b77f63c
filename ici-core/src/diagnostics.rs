//! Audit trail of a run
//!
//! Consistency corrections (dropped duplicates, capped reductions, floored pathways) are
//! applied in place and recorded here, together with the data-coverage errors that abandoned
//! part of a run. Every vector is append-only and written by exactly one stage.

use crate::errors::ICIError;
use crate::initiative::{Initiative, Sector, Subsector};
use crate::region::RegionId;
use crate::units::Gwp;
use crate::{FloatValue, Year};
use serde::Serialize;
use tracing::warn;

/// A country reduction row dropped because its natural key was already present
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRow {
    pub stage: String,
    pub sector: Sector,
    pub subsector: Subsector,
    pub initiative: Initiative,
    pub region: RegionId,
    pub iso3: String,
    pub year: Year,
    pub unit: String,
    pub reduction_individual: FloatValue,
    pub reduction_subsector: FloatValue,
}

/// Uncapped pair of a country that is member of both initiatives of a pair subsector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairOverlap {
    pub sector: Sector,
    pub subsector: Subsector,
    pub region: RegionId,
    pub iso3: String,
    pub year: Year,
    pub value_subsector: FloatValue,
    pub value_sum_individual: FloatValue,
}

/// Resolved member reduction compared with the region subsector reduction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapEvent {
    pub sector: Sector,
    pub subsector: Subsector,
    pub region: RegionId,
    pub year: Year,
    pub reduction_members: FloatValue,
    pub reduction_region_subsector: FloatValue,
    pub capped: FloatValue,
    /// Reduction exceeded the headroom before capping
    pub check_before: bool,
    /// Reduction exceeds the headroom after capping
    pub check_after: bool,
}

/// Member pathway raised to the combined-initiative scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorEvent {
    pub sector: Sector,
    pub subsector: Subsector,
    pub region: RegionId,
    pub year: Year,
    pub member_value: FloatValue,
    pub combined_value: FloatValue,
}

/// A non-fatal error and the computation it abandoned
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedError {
    pub context: String,
    pub error: ICIError,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub duplicates: Vec<DuplicateRow>,
    pub pair_overlaps: Vec<PairOverlap>,
    pub caps: Vec<CapEvent>,
    pub floors: Vec<FloorEvent>,
    pub errors: Vec<RecordedError>,
}

impl Diagnostics {
    pub fn record_error(&mut self, context: impl Into<String>, error: ICIError) {
        let context = context.into();
        warn!(context = %context, error = %error, "abandoning computation");
        self.errors.push(RecordedError { context, error });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// State threaded through every stage of a run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub gwp: Gwp,
    pub diagnostics: Diagnostics,
}

impl RunContext {
    pub fn new(gwp: Gwp) -> Self {
        Self {
            gwp,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Run a fallible computation, recording data-coverage errors instead of returning them
    ///
    /// Fatal errors are passed through so the caller can abort the run.
    pub fn recover<T>(
        &mut self,
        context: impl Into<String>,
        result: Result<T, ICIError>,
    ) -> Result<Option<T>, ICIError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if !e.is_fatal() => {
                self.diagnostics.record_error(context, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
