// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Constants shared by the scheduler core.

/// Sentinel for an unbounded amount (infinite availability, no limit).
pub const SCHD_INFINITY: f64 = f64::INFINITY;

/// Maximum number of configured sort keys honoured per sort.
pub const MAX_SORT_KEYS: usize = 8;

/// Maximum number of free-form arguments carried by a `SchdError`.
pub const MAX_ERR_ARGS: usize = 3;

// ─── Fairshare ────────────────────────────────────────────────────────

/// Name of the distinguished root of the fairshare tree.
pub const FAIRSHARE_ROOT_NAME: &str = "TREEROOT";

/// Name of the bucket that collects entities missing from the resource group file.
pub const FAIRSHARE_UNKNOWN_NAME: &str = "unknown";

/// Keyword used in the resource group file to bind an entity to the root.
pub const FAIRSHARE_ROOT_KEYWORD: &str = "root";

/// Usage never drops below this floor so ratios stay defined.
pub const FAIRSHARE_MIN_USAGE: f64 = 1.0;

/// Resource group id of the root node.
pub const ROOT_RESGROUP: i32 = -1;

/// Child resource group id handed out by the root.
pub const ROOT_CRESGROUP: i32 = 0;

/// Child resource group id of the "unknown" bucket.
pub const UNKNOWN_CRESGROUP: i32 = 1;

/// Shares given to entities allocated on the fly under "unknown".
pub const UNKNOWN_ENTITY_SHARES: i32 = 1;

// ─── Usage file ───────────────────────────────────────────────────────

/// Magic tag at the start of a versioned usage file.
pub const USAGE_MAGIC: [u8; 4] = *b"FSUS";

/// Current usage file version (adds the decay timestamp).
pub const USAGE_VERSION: i32 = 2;

/// Width of the NUL padded entity name in a usage record.
pub const USAGE_NAME_WIDTH: usize = 50;

/// Size in bytes of one usage record.
pub const USAGE_RECORD_SIZE: usize = USAGE_NAME_WIDTH + 8;

// ─── Limits ───────────────────────────────────────────────────────────

/// Entity name of a generic (wildcard) limit.
pub const GENERIC_ENTITY: &str = "PBS_GENERIC";

/// Entity name of the overall ("all jobs") bucket.
pub const ALL_ENTITY: &str = "PBS_ALL";

// ─── Policy defaults ──────────────────────────────────────────────────

pub const DEFAULT_DECAY_FACTOR: f64 = 0.5;
pub const DEFAULT_DECAY_TIME_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_MAX_STARVE_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_UNKNOWN_SHARES: i32 = 10;
pub const DEFAULT_PREEMPT_QUEUE_PRIO: i32 = 150;
pub const DEFAULT_PREEMPT_PRIO: &str = "express_queue, normal_jobs";
pub const DEFAULT_FAIRSHARE_USAGE_RES: &str = "cput";
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Well known resource names.
pub const NCPUS: &str = "ncpus";
pub const MEM: &str = "mem";
pub const WALLTIME: &str = "walltime";
pub const CPUT: &str = "cput";
