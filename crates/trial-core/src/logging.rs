//! Diagnostic output for the engine itself

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber for engine diagnostics.
///
/// Does nothing unless `RUST_LOG` is set, e.g. `RUST_LOG=trial_core=debug`.
/// Safe to call more than once.
pub fn init() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            // Another subscriber may already be installed by the host.
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init();
        }
    });
}
