// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Random unit generators for ordering tests.

use rand::seq::SliceRandom;
use rand::Rng;
use sched_core::snapshot::SchedulableUnit;

use crate::builders::UnitBuilder;

const USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// `n` candidates mixing everything the job comparator distinguishes:
/// jobs and reservations, starving and blocked units, two preemption
/// levels, and units with no formula value or no `ncpus` request.
/// Ranks are `1..=n`, so every unit is distinct.
pub fn random_units<R: Rng>(rng: &mut R, n: u64) -> Vec<SchedulableUnit> {
    (1..=n)
        .map(|id| {
            let mut builder = if rng.gen_bool(0.2) {
                UnitBuilder::reservation(id)
            } else {
                UnitBuilder::job(id)
            };
            builder = builder
                .user(USERS[rng.gen_range(0..USERS.len())])
                .priority(rng.gen_range(0..5))
                .preempt(rng.gen_range(0..2) * 1000)
                .qtime(rng.gen_range(0..100));
            if rng.gen_bool(0.7) {
                builder = builder.formula(rng.gen_range(0..3) as f64);
            }
            if rng.gen_bool(0.7) {
                builder = builder.request("ncpus", rng.gen_range(1..=8) as f64);
            }
            if rng.gen_bool(0.25) {
                builder = builder.starving(rng.gen_range(100..200));
            }
            if rng.gen_bool(0.1) {
                builder = builder.can_not_run();
            }
            builder.build()
        })
        .collect()
}

/// A shuffled copy of `units`.
pub fn shuffled<R: Rng>(rng: &mut R, units: &[SchedulableUnit]) -> Vec<SchedulableUnit> {
    let mut out = units.to_vec();
    out.shuffle(rng);
    out
}
