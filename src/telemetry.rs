//! Logging setup for the credence binary

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter, e.g. `credence::retrieval=debug`
pub const LOG_ENV: &str = "CREDENCE_LOG";

const DEFAULT_FILTER: &str = "credence=info";

/// Initialize tracing once per process.
///
/// Reads `CREDENCE_LOG`; falls back to `credence=info` when unset or
/// invalid. Events go to stderr so `--json` output on stdout stays clean.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // A subscriber installed by an embedding application wins
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}
