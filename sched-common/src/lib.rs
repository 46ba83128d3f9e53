// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Common types for the scheduler core: resources, status/error, policy
//! configuration, sort keys and the admission error taxonomy.

pub mod config;
pub mod constants;
pub mod resource;
pub mod sched_error;
pub mod sort_key;
pub mod status;
