// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Preemption state: reason bits, the configured priority table, and the
//! pure comparators the job ordering uses.
//!
//! A unit's `preempt_status` is a set of reason bits (express queue,
//! starving, over a soft limit, ...). The `preempt_prio` policy string maps
//! combinations of those bits to a numeric priority stored in
//! `SchedulableUnit::preempt`; higher priority may preempt lower.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use sched_common::status::{SchedError, SchedResult};
use tracing::debug;

use crate::snapshot::{Queue, SchedulableUnit};

/// Set of preemption reason bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PreemptBits(u32);

impl PreemptBits {
    pub const NORMAL: Self = Self(1 << 0);
    pub const OVER_FS_LIMIT: Self = Self(1 << 1);
    pub const OVER_QUEUE_LIMIT: Self = Self(1 << 2);
    pub const OVER_SERVER_LIMIT: Self = Self(1 << 3);
    pub const STARVING: Self = Self(1 << 4);
    pub const EXPRESS: Self = Self(1 << 5);
    /// Administratively forced run.
    pub const QRUN: Self = Self(1 << 6);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::NORMAL, "normal_jobs"),
        (Self::OVER_FS_LIMIT, "fairshare"),
        (Self::OVER_QUEUE_LIMIT, "queue_softlimits"),
        (Self::OVER_SERVER_LIMIT, "server_softlimits"),
        (Self::STARVING, "starving_jobs"),
        (Self::EXPRESS, "express_queue"),
        (Self::QRUN, "qrun"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(bits, _)| *bits)
    }
}

impl BitOr for PreemptBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PreemptBits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PreemptBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "PreemptBits(empty)");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(bits, _)| self.contains(*bits))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "PreemptBits({})", names.join("+"))
    }
}

// ─── Priority table ───────────────────────────────────────────────

/// Priority of an administratively forced run; above every configured level.
pub const PREEMPT_PRIORITY_HIGH: i32 = 100_000;
const PREEMPT_PRIORITY_STEP: i32 = 1000;

/// Ordered mapping from reason-bit combinations to preemption priority.
#[derive(Debug, Clone, PartialEq)]
pub struct PreemptPrioTable {
    /// `(bits, priority)`, highest priority first.
    entries: Vec<(PreemptBits, i32)>,
    normal: i32,
}

impl PreemptPrioTable {
    /// Parse a `preempt_prio` value such as
    /// `"express_queue, starving_jobs+fairshare, normal_jobs"`.
    ///
    /// Earlier entries get higher priority. `qrun` always ranks first. When
    /// `normal_jobs` is not listed it ranks below every listed entry.
    pub fn parse(value: &str) -> SchedResult<Self> {
        let mut entries = vec![(PreemptBits::QRUN, PREEMPT_PRIORITY_HIGH)];
        let mut normal = None;
        let mut prio = PREEMPT_PRIORITY_HIGH;

        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut bits = PreemptBits::empty();
            for name in entry.split('+').map(str::trim) {
                let bit = PreemptBits::from_name(name).ok_or_else(|| {
                    SchedError::invalid_argument(format!("unknown preempt_prio level '{name}'"))
                })?;
                bits |= bit;
            }
            prio -= PREEMPT_PRIORITY_STEP;
            if bits == PreemptBits::NORMAL {
                normal = Some(prio);
            }
            entries.push((bits, prio));
        }

        let normal = normal.unwrap_or(prio - PREEMPT_PRIORITY_STEP);
        Ok(Self { entries, normal })
    }

    /// Priority of `bits`: an exact match first, else the highest entry all
    /// of whose bits are present, else the normal priority.
    pub fn priority(&self, bits: PreemptBits) -> i32 {
        if let Some((_, p)) = self.entries.iter().find(|(b, _)| *b == bits) {
            return *p;
        }
        self.entries
            .iter()
            .filter(|(b, _)| *b != PreemptBits::NORMAL)
            .find(|(b, _)| bits.contains(*b))
            .map(|(_, p)| *p)
            .unwrap_or(self.normal)
    }

    pub fn normal_priority(&self) -> i32 {
        self.normal
    }
}

/// Compute a unit's reason bits from its queue, starvation and soft-limit
/// state. A unit with no reason is `NORMAL`.
pub fn compute_preempt_bits(
    unit: &SchedulableUnit,
    queue: Option<&Queue>,
    preempt_queue_prio: i32,
    over_fairshare: bool,
    soft_limit_bits: PreemptBits,
) -> PreemptBits {
    let mut bits = soft_limit_bits;
    bits.remove(PreemptBits::NORMAL);
    if queue.is_some_and(|q| q.priority >= preempt_queue_prio) {
        bits |= PreemptBits::EXPRESS;
    }
    if unit.is_starving {
        bits |= PreemptBits::STARVING;
    }
    if over_fairshare {
        bits |= PreemptBits::OVER_FS_LIMIT;
    }
    if bits.is_empty() {
        bits = PreemptBits::NORMAL;
    }
    bits
}

/// Store `bits` on the unit and derive its numeric priority.
pub fn set_preempt_prio(unit: &mut SchedulableUnit, table: &PreemptPrioTable, bits: PreemptBits) {
    unit.preempt_status = bits;
    unit.preempt = table.priority(bits);
    debug!(unit = %unit.name, ?bits, preempt = unit.preempt, "set preemption priority");
}

// ─── Starvation ───────────────────────────────────────────────────

/// Flag a queued job as starving once it has waited longer than
/// `max_starve_secs`. A starving job's `sch_priority` becomes its wait time
/// so the longest-waiting job ranks first.
pub fn mark_starving(unit: &mut SchedulableUnit, now: i64, max_starve_secs: i64) -> bool {
    let waited = now - unit.qtime;
    unit.is_starving = unit.is_job && unit.is_runnable() && waited > max_starve_secs;
    if unit.is_starving {
        unit.sch_priority = waited;
    }
    unit.is_starving
}

// ─── Comparators ──────────────────────────────────────────────────

/// Descending by preemption priority: higher `preempt` sorts first.
pub fn cmp_preempt_priority_dsc(a: &SchedulableUnit, b: &SchedulableUnit) -> Ordering {
    b.preempt.cmp(&a.preempt)
}

/// Ascending by preemption time: earlier preempted first, never preempted
/// last.
pub fn cmp_preempt_time_asc(a: &SchedulableUnit, b: &SchedulableUnit) -> Ordering {
    let ta = a.time_preempted.unwrap_or(i64::MAX);
    let tb = b.time_preempted.unwrap_or(i64::MAX);
    ta.cmp(&tb)
}

fn starving_priority(unit: &SchedulableUnit) -> Option<i64> {
    (unit.is_job && unit.is_starving).then_some(unit.sch_priority)
}

/// Starving jobs first; among starving jobs higher `sch_priority` first.
/// Anything that is not a job counts as not starving.
pub fn cmp_starving(a: &SchedulableUnit, b: &SchedulableUnit) -> Ordering {
    match (starving_priority(a), starving_priority(b)) {
        (Some(pa), Some(pb)) => pb.cmp(&pa),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Running units `high` may preempt: strictly lower priority, ordered lowest
/// priority first and, within a priority, most recently started first.
pub fn select_preemption_candidates<'a>(
    high: &SchedulableUnit,
    running: &'a [SchedulableUnit],
) -> Vec<&'a SchedulableUnit> {
    let mut candidates: Vec<&SchedulableUnit> = running
        .iter()
        .filter(|r| r.is_running() && r.preempt < high.preempt)
        .collect();
    candidates.sort_by(|a, b| {
        a.preempt
            .cmp(&b.preempt)
            .then_with(|| b.start.unwrap_or(i64::MIN).cmp(&a.start.unwrap_or(i64::MIN)))
            .then_with(|| a.rank.cmp(&b.rank))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::UnitState;

    #[test]
    fn test_bits_ops() {
        let mut bits = PreemptBits::EXPRESS | PreemptBits::STARVING;
        assert!(bits.contains(PreemptBits::EXPRESS));
        assert!(!bits.contains(PreemptBits::EXPRESS | PreemptBits::QRUN));
        bits.remove(PreemptBits::EXPRESS);
        assert_eq!(bits, PreemptBits::STARVING);
        assert!(PreemptBits::empty().is_empty());
        assert_eq!(format!("{bits:?}"), "PreemptBits(starving_jobs)");
    }

    #[test]
    fn test_default_table() {
        let table = PreemptPrioTable::parse("express_queue, normal_jobs").unwrap();
        let qrun = table.priority(PreemptBits::QRUN);
        let express = table.priority(PreemptBits::EXPRESS);
        let normal = table.priority(PreemptBits::NORMAL);
        assert!(qrun > express);
        assert!(express > normal);
        assert_eq!(normal, table.normal_priority());
        // unlisted reasons fall back to normal
        assert_eq!(table.priority(PreemptBits::OVER_FS_LIMIT), normal);
    }

    #[test]
    fn test_combination_and_subset_lookup() {
        let table =
            PreemptPrioTable::parse("express_queue, starving_jobs+fairshare, starving_jobs")
                .unwrap();
        let combo = table.priority(PreemptBits::STARVING | PreemptBits::OVER_FS_LIMIT);
        let starving = table.priority(PreemptBits::STARVING);
        assert!(combo > starving);
        // express is a subset of express+starving and ranks highest
        assert_eq!(
            table.priority(PreemptBits::EXPRESS | PreemptBits::STARVING),
            table.priority(PreemptBits::EXPRESS)
        );
        // normal_jobs not listed: below everything
        assert!(table.normal_priority() < starving);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(PreemptPrioTable::parse("express_queue, vip").is_err());
    }

    #[test]
    fn test_compute_bits() {
        let unit = SchedulableUnit::job("1.s", 1);
        let workq = Queue::new("workq", 100);
        let express = Queue::new("express", 200);
        assert_eq!(
            compute_preempt_bits(&unit, Some(&workq), 150, false, PreemptBits::empty()),
            PreemptBits::NORMAL
        );
        assert_eq!(
            compute_preempt_bits(&unit, Some(&express), 150, true, PreemptBits::empty()),
            PreemptBits::EXPRESS | PreemptBits::OVER_FS_LIMIT
        );
        assert_eq!(
            compute_preempt_bits(&unit, None, 150, false, PreemptBits::OVER_QUEUE_LIMIT),
            PreemptBits::OVER_QUEUE_LIMIT
        );
    }

    #[test]
    fn test_preempt_time_unspecified_is_latest() {
        let mut a = SchedulableUnit::job("1.s", 1);
        let b = SchedulableUnit::job("2.s", 2);
        a.time_preempted = Some(500);
        assert_eq!(cmp_preempt_time_asc(&a, &b), Ordering::Less);
        assert_eq!(cmp_preempt_time_asc(&b, &a), Ordering::Greater);
        assert_eq!(cmp_preempt_time_asc(&b, &b), Ordering::Equal);
    }

    #[test]
    fn test_starving() {
        let mut a = SchedulableUnit::job("1.s", 1);
        let mut b = SchedulableUnit::job("2.s", 2);
        a.qtime = 0;
        b.qtime = 50;
        assert!(mark_starving(&mut a, 1000, 100));
        assert!(mark_starving(&mut b, 1000, 100));
        assert_eq!(cmp_starving(&a, &b), Ordering::Less);

        let mut c = SchedulableUnit::job("3.s", 3);
        c.qtime = 990;
        assert!(!mark_starving(&mut c, 1000, 100));
        assert_eq!(cmp_starving(&c, &a), Ordering::Greater);

        let mut resv = SchedulableUnit::reservation("R1", 4);
        assert_eq!(cmp_starving(&resv, &a), Ordering::Greater);
        assert_eq!(cmp_starving(&resv, &c), Ordering::Equal);
        // a reservation never counts as starving
        resv.is_starving = true;
        assert_eq!(cmp_starving(&a, &resv), Ordering::Less);
    }

    #[test]
    fn test_select_candidates() {
        let mut high = SchedulableUnit::job("1.s", 1);
        high.preempt = 50;

        let mk = |name: &str, rank, preempt, start| {
            let mut u = SchedulableUnit::job(name, rank);
            u.state = UnitState::Running;
            u.preempt = preempt;
            u.start = Some(start);
            u
        };
        let running = vec![
            mk("2.s", 2, 10, 100),
            mk("3.s", 3, 10, 300),
            mk("4.s", 4, 5, 50),
            mk("5.s", 5, 50, 10),
        ];
        let names: Vec<_> = select_preemption_candidates(&high, &running)
            .iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(names, vec!["4.s", "3.s", "2.s"]);
    }
}
