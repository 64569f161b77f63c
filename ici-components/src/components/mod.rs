mod actors;
mod blender;
mod coverage;
mod data_log;
mod overlap;
mod reconcile;
mod reductions;
mod shares;

pub use actors::{
    combine_actor_groups, smooth_actor_records, smooth_years, ActorDownscaler, ActorGroup,
    ActorRecord, UrbanEmissionShare, UrbanPopulationRecord, UrbanShare, WORLD_LABEL,
};
pub use blender::PathwayBlender;
pub use coverage::{index_coverage, region_coverage, MemberShare, MembershipResolver};
pub use data_log::{DataLog, DataLogEntry};
pub use overlap::{
    cap, deduplicate, global_reductions, index_region_subsector, Criterium,
    sum_resolved, MembershipCombination, OverlapResolver, OverlapRule, ResolvedRow,
    SubsectorReduction, SubsectorResolution,
};
pub use reconcile::{KyotoPathway, Reconciler, SubsectorPathway};
pub use reductions::{
    country_reductions, individual_member_pathways, reduction_series, region_reductions,
    CountryReduction, InitiativePathway, RegionReduction,
};
pub use shares::{index_shares, CountryShare, ShareCalculator, ShareParameters};
