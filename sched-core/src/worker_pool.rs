// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Fixed-size thread pool for side-effect-free per-unit evaluations.
//!
//! Workers drain a shared work queue; each batch collects its results in
//! its own result queue. Both queues are a `parking_lot` mutex paired with a
//! condition variable. Tasks must not touch live scheduler state: they get
//! owned or `Arc`-shared snapshots.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use sched_common::status::{SchedError, SchedResult};
use tracing::{debug, error};

use crate::fairshare::{FairshareTree, GroupId};
use crate::snapshot::SchedulableUnit;
use crate::usage_formula::UsageFormula;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct WorkState {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

#[derive(Default)]
struct WorkQueue {
    state: Mutex<WorkState>,
    available: Condvar,
}

struct ResultQueue<T> {
    slots: Mutex<(Vec<Option<T>>, usize)>,
    done: Condvar,
}

impl<T> ResultQueue<T> {
    fn new(n: usize) -> Self {
        Self {
            slots: Mutex::new(((0..n).map(|_| None).collect(), 0)),
            done: Condvar::new(),
        }
    }

    /// Record one finished task; `None` marks a task that panicked.
    fn post(&self, idx: usize, value: Option<T>) {
        let mut guard = self.slots.lock();
        guard.0[idx] = value;
        guard.1 += 1;
        if guard.1 == guard.0.len() {
            self.done.notify_all();
        }
    }
}

pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` worker threads (at least one).
    pub fn new(size: usize) -> SchedResult<Self> {
        let queue = Arc::new(WorkQueue::default());
        let mut workers = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            let queue = Arc::clone(&queue);
            let handle = thread::Builder::new()
                .name(format!("sched-worker-{i}"))
                .spawn(move || worker_loop(&queue))
                .map_err(|e| SchedError::internal(format!("failed to start worker {i}: {e}")))?;
            workers.push(handle);
        }
        debug!(workers = workers.len(), "worker pool started");
        Ok(Self { queue, workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Run every task and return their results in submission order. Blocks
    /// until the whole batch is done. A panicking task fails the batch.
    pub fn run_batch<T, F>(&self, tasks: Vec<F>) -> SchedResult<Vec<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let n = tasks.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let results = Arc::new(ResultQueue::new(n));
        {
            let mut state = self.queue.state.lock();
            for (idx, task) in tasks.into_iter().enumerate() {
                let results = Arc::clone(&results);
                state.jobs.push_back(Box::new(move || {
                    let value = catch_unwind(AssertUnwindSafe(task)).ok();
                    results.post(idx, value);
                }));
            }
        }
        self.queue.available.notify_all();

        let mut guard = results.slots.lock();
        while guard.1 < n {
            results.done.wait(&mut guard);
        }
        let slots = std::mem::take(&mut guard.0);
        drop(guard);

        let failed = slots.iter().filter(|s| s.is_none()).count();
        if failed > 0 {
            error!(failed, total = n, "worker tasks panicked");
            return Err(SchedError::internal(format!("{failed} of {n} worker tasks panicked")));
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.state.lock().shutdown = true;
        self.queue.available.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(queue: &WorkQueue) {
    loop {
        let job = {
            let mut state = queue.state.lock();
            loop {
                if let Some(job) = state.jobs.pop_front() {
                    break job;
                }
                if state.shutdown {
                    return;
                }
                queue.available.wait(&mut state);
            }
        };
        job();
    }
}

// ─── Per-unit evaluations ─────────────────────────────────────────

/// Fairshare usage each unit would be charged, one task per unit.
pub fn bulk_usage_values(
    pool: &WorkerPool,
    formula: &UsageFormula,
    units: &[SchedulableUnit],
) -> SchedResult<Vec<f64>> {
    let formula = Arc::new(formula.clone());
    let units: Arc<[SchedulableUnit]> = units.into();
    let tasks: Vec<_> = (0..units.len())
        .map(|i| {
            let formula = Arc::clone(&formula);
            let units = Arc::clone(&units);
            move || formula.evaluate(&units[i])
        })
        .collect();
    pool.run_batch(tasks)
}

/// Whether each group is over its fairshare, read from an immutable tree
/// snapshot. Units without a group are never over.
pub fn bulk_over_fairshare(
    pool: &WorkerPool,
    tree: Arc<FairshareTree>,
    groups: &[Option<GroupId>],
) -> SchedResult<Vec<bool>> {
    let tasks: Vec<_> = groups
        .iter()
        .map(|group| {
            let tree = Arc::clone(&tree);
            let group = *group;
            move || group.is_some_and(|g| tree.over_fairshare(g))
        })
        .collect();
    pool.run_batch(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_common::resource::ResourceRequest;

    #[test]
    fn test_run_batch_preserves_order() {
        let pool = WorkerPool::new(3).unwrap();
        let tasks: Vec<_> = (0..50u64).map(|i| move || i * i).collect();
        let out = pool.run_batch(tasks).unwrap();
        assert_eq!(out, (0..50u64).map(|i| i * i).collect::<Vec<_>>());
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn test_empty_batch_and_zero_size() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
        let out: Vec<u32> = pool.run_batch(Vec::<fn() -> u32>::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_panicking_task_fails_batch() {
        let pool = WorkerPool::new(2).unwrap();
        let tasks: Vec<Box<dyn FnOnce() -> u32 + Send>> =
            vec![Box::new(|| 1), Box::new(|| panic!("boom")), Box::new(|| 3)];
        let err = pool.run_batch(tasks).unwrap_err();
        assert!(err.is_internal());
        // pool still usable
        assert_eq!(pool.run_batch(vec![|| 7]).unwrap(), vec![7]);
    }

    #[test]
    fn test_bulk_usage_values() {
        let pool = WorkerPool::new(2).unwrap();
        let formula = UsageFormula::parse("ncpus").unwrap();
        let units: Vec<_> = (1..=4)
            .map(|i| {
                let mut u = SchedulableUnit::job(format!("{i}.s"), i);
                u.resreq = vec![ResourceRequest::new("ncpus", i as f64)];
                u
            })
            .collect();
        let values = bulk_usage_values(&pool, &formula, &units).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_bulk_over_fairshare() {
        let pool = WorkerPool::new(2).unwrap();
        let mut tree = FairshareTree::new(0);
        let a = tree.add_child("a", 10, 1, GroupId::ROOT);
        let b = tree.add_child("b", 11, 1, GroupId::ROOT);
        tree.calc_percentages();
        tree.set_usage(a, 90.0);
        tree.set_usage(b, 10.0);
        tree.rollup_usage();
        let over = bulk_over_fairshare(&pool, tree.snapshot(), &[Some(a), Some(b), None]).unwrap();
        assert_eq!(over, vec![true, false, false]);
    }
}
