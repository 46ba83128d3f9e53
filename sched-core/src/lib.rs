// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Decision core of a batch job scheduler.
//!
//! Orders schedulable units (jobs and reservations), nodes and placement
//! sets; tracks fairshare usage in a hierarchical share tree; and enforces
//! hard and soft run and resource limits at server and queue scope.

#![allow(clippy::result_large_err)]

pub mod calendar;
pub mod counts;
pub mod fairshare;
pub mod fairshare_file;
pub mod limit_context;
pub mod limits;
pub mod preemption;
pub mod run_order;
pub mod snapshot;
pub mod sort;
pub mod state;
pub mod usage_formula;
pub mod worker_pool;
