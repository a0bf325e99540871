//! Process-wide tracing subscriber setup.
//!
//! Mirrors the way every skus binary starts up: a default env filter derived
//! from the binary name, an optional hard floor on the minimum level, and a
//! choice between human-readable and JSON output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber. `default_filter` is used when
/// `RUST_LOG` is unset. `min_level` raises the effective level floor
/// regardless of what the filter string requests (used to silence noisy
/// dependencies in production while keeping our own `debug` spans on request).
pub fn initialize(default_filter: &str, min_level: tracing::level_filters::LevelFilter, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter))
        .add_directive(min_level.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
            .ok();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .ok();
    }
}

/// Test-only initializer that never fails if called more than once.
pub fn initialize_reentrant() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
