// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Time utilities.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Current time in whole seconds since the Unix epoch.
pub fn current_time_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Number of whole `interval` periods between `last` and `now`.
///
/// Returns 0 for a non-positive interval or when `now` is before `last`.
pub fn intervals_elapsed(last: i64, now: i64, interval: i64) -> u32 {
    if interval <= 0 || now <= last {
        return 0;
    }
    ((now - last) / interval).min(u32::MAX as i64) as u32
}

/// A simple monotonic stopwatch for measuring elapsed time.
pub struct Stopwatch {
    start: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }
}
