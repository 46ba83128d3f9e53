// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Consideration order for one cycle.
//!
//! Only runnable units are candidates. Without `by_queue` every candidate is
//! sorted together. With `by_queue` queues are visited by descending
//! priority and each queue's candidates are sorted on their own. With
//! `round_robin` queues of equal priority take turns, one unit each.

use std::collections::HashMap;

use tracing::debug;

use crate::snapshot::{Queue, SchedulableUnit};
use crate::sort::{cmp_queue_prio_dsc, compare_units, SortContext};

pub fn build_run_order<'u>(
    ctx: &SortContext<'_>,
    units: &'u [SchedulableUnit],
    queues: &[Queue],
) -> Vec<&'u SchedulableUnit> {
    let mut candidates: Vec<&SchedulableUnit> = units.iter().filter(|u| u.is_runnable()).collect();
    let by_queue = ctx.policy.by_queue || ctx.policy.round_robin;
    if !by_queue {
        candidates.sort_by(|a, b| compare_units(ctx, Some(*a), Some(*b)));
        return candidates;
    }

    let mut ordered_queues: Vec<&Queue> = queues.iter().collect();
    ordered_queues.sort_by(|a, b| cmp_queue_prio_dsc(a, b));

    let mut per_queue: HashMap<&str, Vec<&SchedulableUnit>> = HashMap::new();
    for unit in candidates {
        per_queue.entry(unit.queue.as_str()).or_default().push(unit);
    }
    for list in per_queue.values_mut() {
        list.sort_by(|a, b| compare_units(ctx, Some(*a), Some(*b)));
    }

    let mut order = Vec::new();
    let mut i = 0;
    while i < ordered_queues.len() {
        // Queues sharing a priority form one level.
        let prio = ordered_queues[i].priority;
        let mut j = i;
        while j < ordered_queues.len() && ordered_queues[j].priority == prio {
            j += 1;
        }
        let level: Vec<Vec<&SchedulableUnit>> = ordered_queues[i..j]
            .iter()
            .map(|q| per_queue.remove(q.name.as_str()).unwrap_or_default())
            .collect();
        if ctx.policy.round_robin {
            interleave(level, &mut order);
        } else {
            order.extend(level.into_iter().flatten());
        }
        i = j;
    }

    // Units whose queue is not in the snapshot go last.
    let mut orphans: Vec<&SchedulableUnit> = per_queue.into_values().flatten().collect();
    if !orphans.is_empty() {
        debug!(count = orphans.len(), "candidates in unknown queues ordered last");
        orphans.sort_by(|a, b| compare_units(ctx, Some(*a), Some(*b)));
        order.extend(orphans);
    }
    order
}

fn interleave<'u>(level: Vec<Vec<&'u SchedulableUnit>>, out: &mut Vec<&'u SchedulableUnit>) {
    let mut iters: Vec<_> = level.into_iter().map(|v| v.into_iter()).collect();
    loop {
        let mut progressed = false;
        for it in &mut iters {
            if let Some(unit) = it.next() {
                out.push(unit);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
}
