//! Logging initialization.
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for
//! result commit ids. The default level follows the CLI flags
//! (`--debug` → debug, `--quiet` → warn, otherwise info) and `RUST_LOG`
//! overrides everything when set.

use tracing_subscriber::EnvFilter;

/// Initialize the stderr logger once, in `main`.
pub fn init(quiet: bool, debug: bool) {
    let default = if debug {
        "splice=debug"
    } else if quiet {
        "splice=warn"
    } else {
        "splice=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
