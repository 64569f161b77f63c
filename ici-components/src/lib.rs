//! Allocation stages of the initiative downscaling engine
//!
//! Each stage consumes the complete output table of the previous one:
//! shares, coverage, reductions, overlap resolution and reconciliation.
//! [`pipeline`] wires them into the sector, individual and actor runs.

pub mod components;
pub mod pipeline;
