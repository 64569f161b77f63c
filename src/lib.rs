//! Command-line front end of the initiative downscaling engine
//!
//! Materialises the `;`-separated input files into the in-memory sources of `ici-core`,
//! runs one of the pipelines of `ici-components` and writes the resulting tables.

pub mod readers;
pub mod writers;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the log subscriber
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ici_downscale=info,ici_components=info"));

    fmt().with_env_filter(filter).with_target(false).init();
}
