//! Core data model of the initiative downscaling engine
//!
//! Holds the typed vocabulary, tables, configuration and diagnostics shared by the
//! allocation stages in `ici-components`.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod historical;
pub mod initiative;
pub mod membership;
pub mod region;
pub mod sources;
pub mod table;
pub mod units;

pub type FloatValue = f64;
pub type Year = i32;
