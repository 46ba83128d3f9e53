// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Scheduling policy configuration.
//!
//! A plain struct with defaults. Values can be overridden from a JSON object
//! (as produced by the configuration front end, which is not part of this
//! crate) and from environment variables of the form `SCHED_<field_name>`.
//! There is no global instance: the policy is owned by the scheduler state
//! and passed by reference.

use serde::Serialize;
use tracing::warn;

use crate::constants::*;
use crate::sort_key::SortKey;

/// Scheduling policy parameters consumed by the core.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyConfig {
    // ─── Ordering ─────────────────────────────────────────────
    pub fair_share: bool,
    pub help_starving_jobs: bool,
    pub max_starve_secs: i64,
    pub by_queue: bool,
    pub round_robin: bool,
    pub job_sort_keys: Vec<SortKey>,
    pub node_sort_keys: Vec<SortKey>,

    // ─── Fairshare ────────────────────────────────────────────
    pub fairshare_usage_res: String,
    pub fairshare_decay_factor: f64,
    pub fairshare_decay_time_secs: i64,
    /// Unit attribute naming the fairshare entity: `euser`, `egroup`,
    /// `project` or `queue`.
    pub fairshare_entity: String,
    pub unknown_shares: i32,

    // ─── Preemption ───────────────────────────────────────────
    pub preempt_prio: String,
    pub preempt_queue_prio: i32,

    // ─── Execution ────────────────────────────────────────────
    pub worker_threads: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            fair_share: false,
            help_starving_jobs: true,
            max_starve_secs: DEFAULT_MAX_STARVE_SECS,
            by_queue: true,
            round_robin: false,
            job_sort_keys: Vec::new(),
            node_sort_keys: Vec::new(),
            fairshare_usage_res: DEFAULT_FAIRSHARE_USAGE_RES.to_string(),
            fairshare_decay_factor: DEFAULT_DECAY_FACTOR,
            fairshare_decay_time_secs: DEFAULT_DECAY_TIME_SECS,
            fairshare_entity: "euser".to_string(),
            unknown_shares: DEFAULT_UNKNOWN_SHARES,
            preempt_prio: DEFAULT_PREEMPT_PRIO.to_string(),
            preempt_queue_prio: DEFAULT_PREEMPT_QUEUE_PRIO,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl PolicyConfig {
    /// Parse from a JSON object string. Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| format!("JSON parse error: {e}"))?;

        let mut config = Self::default();

        macro_rules! set_field {
            ($field:ident, bool) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_bool()) {
                    config.$field = v;
                }
            };
            ($field:ident, i64) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_i64()) {
                    config.$field = v;
                }
            };
            ($field:ident, i32) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_i64()) {
                    match i32::try_from(v) {
                        Ok(v) => config.$field = v,
                        Err(_) => warn!(key = stringify!($field), value = v, "ignoring out-of-range value"),
                    }
                }
            };
            ($field:ident, usize) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_u64()) {
                    match usize::try_from(v) {
                        Ok(v) => config.$field = v,
                        Err(_) => warn!(key = stringify!($field), value = v, "ignoring out-of-range value"),
                    }
                }
            };
            ($field:ident, f64) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_f64()) {
                    config.$field = v;
                }
            };
            ($field:ident, String) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_str()) {
                    config.$field = v.to_string();
                }
            };
            ($field:ident, SortKeys) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_array()) {
                    let keys: Vec<&str> = v.iter().filter_map(|k| k.as_str()).collect();
                    config.$field = parse_sort_keys(&keys);
                }
            };
        }

        set_field!(fair_share, bool);
        set_field!(help_starving_jobs, bool);
        set_field!(max_starve_secs, i64);
        set_field!(by_queue, bool);
        set_field!(round_robin, bool);
        set_field!(job_sort_keys, SortKeys);
        set_field!(node_sort_keys, SortKeys);
        set_field!(fairshare_usage_res, String);
        set_field!(fairshare_decay_factor, f64);
        set_field!(fairshare_decay_time_secs, i64);
        set_field!(fairshare_entity, String);
        set_field!(unknown_shares, i32);
        set_field!(preempt_prio, String);
        set_field!(preempt_queue_prio, i32);
        set_field!(worker_threads, usize);

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides of the form `SCHED_<name>`.
    pub fn apply_env_overrides(&mut self) {
        macro_rules! env_override {
            ($field:ident, $ty:ty) => {
                let env_key = concat!("SCHED_", stringify!($field));
                if let Ok(val) = std::env::var(env_key) {
                    match val.parse::<$ty>() {
                        Ok(v) => self.$field = v,
                        Err(_) => warn!(key = env_key, value = %val, "ignoring unparsable override"),
                    }
                }
            };
        }

        env_override!(fair_share, bool);
        env_override!(help_starving_jobs, bool);
        env_override!(by_queue, bool);
        env_override!(round_robin, bool);
        env_override!(fairshare_decay_factor, f64);
        env_override!(fairshare_usage_res, String);
        env_override!(worker_threads, usize);
    }

    /// Reject values the core cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.fairshare_decay_factor > 0.0 && self.fairshare_decay_factor < 1.0) {
            return Err(format!(
                "fairshare_decay_factor must be in (0, 1), got {}",
                self.fairshare_decay_factor
            ));
        }
        if self.fairshare_decay_time_secs <= 0 {
            return Err("fairshare_decay_time_secs must be positive".to_string());
        }
        if self.worker_threads == 0 {
            return Err("worker_threads must be at least 1".to_string());
        }
        Ok(())
    }

    /// Serialize the effective configuration.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Parse sort key strings, skipping bad entries and truncating to
/// [`MAX_SORT_KEYS`].
pub fn parse_sort_keys(keys: &[&str]) -> Vec<SortKey> {
    let mut parsed = Vec::with_capacity(keys.len().min(MAX_SORT_KEYS));
    for key in keys {
        match key.parse::<SortKey>() {
            Ok(k) if parsed.len() < MAX_SORT_KEYS => parsed.push(k),
            Ok(k) => warn!(key = %k, max = MAX_SORT_KEYS, "too many sort keys, ignoring"),
            Err(e) => warn!(key, error = %e, "ignoring bad sort key"),
        }
    }
    parsed
}
