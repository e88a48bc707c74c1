// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Tracing subscriber setup.
//!
//! Both initializers honour `RUST_LOG` and fall back to `default_level`.
//! Audit events are emitted on the `audit` target, so they can be routed
//! separately, e.g. `RUST_LOG=info,audit=warn`.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs JSON-formatted logging, for production.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(service_name: &str, default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_current_span(false)
                .with_span_list(true),
        )
        .try_init()?;

    tracing::info!(service = service_name, "Logging initialized");
    Ok(())
}

/// Installs human-readable logging on stderr, for development and tools.
pub fn init_console_logging(service_name: &str, default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()?;

    tracing::debug!(service = service_name, "Console logging initialized");
    Ok(())
}
