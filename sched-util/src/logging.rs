// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Logging setup using the `tracing` ecosystem.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Build the filter: `SCHED_LOG_LEVEL`, then `RUST_LOG`, then `verbosity`.
fn build_filter(verbosity: i32) -> EnvFilter {
    EnvFilter::try_from_env("SCHED_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)))
}

fn level_for_verbosity(verbosity: i32) -> &'static str {
    match verbosity {
        i32::MIN..=-1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize logging for a scheduler component.
///
/// Log lines go to `<log_dir>/<component>.log` when a directory is given,
/// stderr otherwise. Calling this twice is harmless; the second call is a
/// no-op.
pub fn init_logging(component: &str, log_dir: Option<&Path>, verbosity: i32) -> std::io::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbosity))
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let installed = if let Some(dir) = log_dir {
        let log_file = dir.join(format!("{component}.log"));
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        subscriber.with_writer(file).try_init().is_ok()
    } else {
        subscriber.with_writer(std::io::stderr).try_init().is_ok()
    };

    if installed {
        tracing::info!(component, "logging initialized");
    }
    Ok(())
}
