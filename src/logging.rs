//! Tracing initialization.
//!
//! Diagnostics go to stderr through `tracing`; run reports stay on stdout.
//! The filter comes from `--log-level` when given, else from the
//! `TIRE_UNIFY_LOG` environment variable (`TIRE_UNIFY_LOG=tire_unifier=debug`),
//! else `warn`.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "TIRE_UNIFY_LOG";

static INIT: Once = Once::new();

/// Idempotent; later calls are ignored.
pub fn init_tracing(level: Option<&str>) {
    INIT.call_once(|| {
        let filter = match level {
            Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")),
            None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        };

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .with(filter)
            .init();
    });
}
