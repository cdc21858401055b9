use std::env;
use std::io;

use tracing_subscriber::EnvFilter;

// Prefix match: covers `finboard_core`, `finboard_cli` and the `finboard::provider_contract` target.
const DEFAULT_FILTER: &str = "finboard=info";

/// Installs the stderr subscriber; stdout is reserved for JSON output.
///
/// The filter comes from `FINBOARD_LOG`, then `RUST_LOG`.
pub fn init() {
    let directives = env::var("FINBOARD_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_owned());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}
