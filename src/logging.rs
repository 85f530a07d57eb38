// ABOUTME: Production logging setup with structured output support
// ABOUTME: Initializes tracing-subscriber with env-filter and optional JSON format
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use std::env;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// Log level comes from `RUST_LOG` (default `info`); setting
/// `LOG_FORMAT=json` switches to structured JSON output for log shippers.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_output = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json_output {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
