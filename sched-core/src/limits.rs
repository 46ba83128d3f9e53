// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Hard and soft limit enforcement.
//!
//! Checks run in the fixed order of [`LIMIT_CHECKS`]: run-count checks for
//! queue then server, each over user, group, project and overall, then the
//! same eight checks for resource amounts. The first hard violation wins
//! unless every violation is requested.
//!
//! A violation is a value ([`LimitVerdict`]); `Err` is reserved for internal
//! problems such as counters missing for a scope that has limits.

use std::borrow::Cow;

use sched_common::constants::{ALL_ENTITY, SCHD_INFINITY};
use sched_common::sched_error::{ErrArg, SchdErrStatus, SchdError, SchedErrorCode};
use sched_common::status::{SchedError, SchedResult};
use tracing::{debug, error};

use crate::calendar::{Calendar, EventKind};
use crate::counts::LimitCounters;
use crate::limit_context::{EntityClass, LimitContext, LimitKind, ScopeLevel};
use crate::preemption::PreemptBits;
use crate::snapshot::{Queue, SchedulableUnit, Server};

/// One entry of the check table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitCheck {
    pub scope: ScopeLevel,
    pub kind: LimitKind,
    pub class: EntityClass,
}

const fn check(scope: ScopeLevel, kind: LimitKind, class: EntityClass) -> LimitCheck {
    LimitCheck { scope, kind, class }
}

/// Fixed check order. Callers rely on "first violation wins" following it.
pub const LIMIT_CHECKS: [LimitCheck; 16] = {
    use EntityClass::*;
    use LimitKind::*;
    use ScopeLevel::*;
    [
        check(Queue, Run, User),
        check(Queue, Run, Group),
        check(Queue, Run, Project),
        check(Queue, Run, All),
        check(Server, Run, User),
        check(Server, Run, Group),
        check(Server, Run, Project),
        check(Server, Run, All),
        check(Queue, Res, User),
        check(Queue, Res, Group),
        check(Queue, Res, Project),
        check(Queue, Res, All),
        check(Server, Res, User),
        check(Server, Res, Group),
        check(Server, Res, Project),
        check(Server, Res, All),
    ]
};

/// Options for [`check_hard_limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitCheckFlags {
    /// Project the server calendar forward over the unit's run.
    pub cumulative: bool,
    /// Chain every violation instead of stopping at the first.
    pub collect_all: bool,
}

impl LimitCheckFlags {
    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    pub fn collect_all(mut self) -> Self {
        self.collect_all = true;
        self
    }
}

/// Outcome of a hard limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitVerdict {
    /// Code of the first violation, `Success` when admitted.
    pub code: SchedErrorCode,
    /// The violations, chained in table order.
    pub err: SchdError,
}

impl LimitVerdict {
    fn pass() -> Self {
        Self {
            code: SchedErrorCode::Success,
            err: SchdError::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_success()
    }
}

/// Taxonomy code for a violated check. `individual` selects the
/// exact-entity code over the generic one.
pub fn limit_code(check: LimitCheck, individual: bool) -> SchedErrorCode {
    use EntityClass::*;
    use LimitKind::*;
    use SchedErrorCode as C;
    use ScopeLevel::*;
    match (check.scope, check.kind, check.class, individual) {
        (Queue, Run, User, true) => C::QueueByUserJobLimitReached,
        (Queue, Run, User, false) => C::QueueUserLimitReached,
        (Queue, Run, Group, true) => C::QueueByGroupJobLimitReached,
        (Queue, Run, Group, false) => C::QueueGroupLimitReached,
        (Queue, Run, Project, true) => C::QueueByProjectJobLimitReached,
        (Queue, Run, Project, false) => C::QueueProjectLimitReached,
        (Queue, Run, All, _) => C::QueueJobLimitReached,
        (Server, Run, User, true) => C::ServerByUserJobLimitReached,
        (Server, Run, User, false) => C::ServerUserLimitReached,
        (Server, Run, Group, true) => C::ServerByGroupJobLimitReached,
        (Server, Run, Group, false) => C::ServerGroupLimitReached,
        (Server, Run, Project, true) => C::ServerByProjectJobLimitReached,
        (Server, Run, Project, false) => C::ServerProjectLimitReached,
        (Server, Run, All, _) => C::ServerJobLimitReached,
        (Queue, Res, User, true) => C::QueueByUserResLimitReached,
        (Queue, Res, User, false) => C::QueueUserResLimitReached,
        (Queue, Res, Group, true) => C::QueueByGroupResLimitReached,
        (Queue, Res, Group, false) => C::QueueGroupResLimitReached,
        (Queue, Res, Project, true) => C::QueueByProjectResLimitReached,
        (Queue, Res, Project, false) => C::QueueProjectResLimitReached,
        (Queue, Res, All, _) => C::QueueResourceLimitReached,
        (Server, Res, User, true) => C::ServerByUserResLimitReached,
        (Server, Res, User, false) => C::ServerUserResLimitReached,
        (Server, Res, Group, true) => C::ServerByGroupResLimitReached,
        (Server, Res, Group, false) => C::ServerGroupResLimitReached,
        (Server, Res, Project, true) => C::ServerByProjectResLimitReached,
        (Server, Res, Project, false) => C::ServerProjectResLimitReached,
        (Server, Res, All, _) => C::ServerResourceLimitReached,
    }
}

/// Preemption reason recorded for a soft violation at `scope`.
pub fn soft_limit_bit(scope: ScopeLevel) -> PreemptBits {
    match scope {
        ScopeLevel::Queue => PreemptBits::OVER_QUEUE_LIMIT,
        ScopeLevel::Server => PreemptBits::OVER_SERVER_LIMIT,
    }
}

fn missing_counters(scope: ScopeLevel, name: &str) -> SchedError {
    error!(%scope, name, "limits configured but no counters");
    SchedError::internal(format!("{scope} {name} has limits but no counters"))
}

// ─── Hard limits ──────────────────────────────────────────────────

struct HardScope<'a> {
    level: ScopeLevel,
    name: &'a str,
    limits: &'a LimitContext,
    counts: Option<Cow<'a, LimitCounters>>,
}

impl<'a> HardScope<'a> {
    fn new(
        level: ScopeLevel,
        name: &'a str,
        limits: &'a LimitContext,
        counts: Option<&'a LimitCounters>,
        projection: Option<Projection<'_>>,
    ) -> SchedResult<Self> {
        let counts = if limits.is_empty() {
            None
        } else {
            let base = counts.ok_or_else(|| missing_counters(level, name))?;
            Some(match projection {
                Some(p) => Cow::Owned(p.project(base)),
                None => Cow::Borrowed(base),
            })
        };
        Ok(Self {
            level,
            name,
            limits,
            counts,
        })
    }

    fn counts(&self) -> SchedResult<&LimitCounters> {
        self.counts
            .as_deref()
            .ok_or_else(|| missing_counters(self.level, self.name))
    }

    fn violation(
        &self,
        check: LimitCheck,
        individual: bool,
        entity: &str,
        limit: f64,
        resource: Option<&str>,
    ) -> SchdError {
        let mut err = SchdError::new(limit_code(check, individual), SchdErrStatus::NotRun);
        match self.level {
            ScopeLevel::Queue => {
                err.set_arg(ErrArg::Arg1, self.name);
                if check.class != EntityClass::All {
                    err.set_arg(ErrArg::Arg2, entity);
                }
            }
            ScopeLevel::Server => {
                let who = if check.class == EntityClass::All {
                    self.name
                } else {
                    entity
                };
                err.set_arg(ErrArg::Arg1, who);
            }
        }
        err.set_arg(ErrArg::Arg3, limit.to_string());
        if let Some(res) = resource {
            err.resource = Some(res.to_string());
        }
        err
    }

    /// Violations of one check, in request order.
    fn run_check(&self, check: LimitCheck, unit: &SchedulableUnit) -> SchedResult<Vec<SchdError>> {
        if !self.limits.has_limits(check.kind, check.class) {
            return Ok(Vec::new());
        }
        let counts = self.counts()?;
        let entity = entity_name(unit, check.class);
        let mut violations = Vec::new();

        match check.kind {
            LimitKind::Run => {
                if let Some(limit) = self.limits.resolve_run_limit(check.class, entity) {
                    let used = f64::from(counts.running(check.class, entity));
                    if limit.value != SCHD_INFINITY && limit.value <= used {
                        violations.push(self.violation(
                            check,
                            limit.individual,
                            entity,
                            limit.value,
                            None,
                        ));
                    }
                }
            }
            LimitKind::Res => {
                for req in unit.resreq.iter().filter(|r| r.is_numeric()) {
                    let Some(limit) = self.limits.resolve_res_limit(check.class, entity, &req.name)
                    else {
                        continue;
                    };
                    let used = counts.res_amount(check.class, entity, &req.name);
                    if limit.value != SCHD_INFINITY && used + req.amount > limit.value {
                        violations.push(self.violation(
                            check,
                            limit.individual,
                            entity,
                            limit.value,
                            Some(&req.name),
                        ));
                    }
                }
            }
        }
        Ok(violations)
    }
}

fn entity_name(unit: &SchedulableUnit, class: EntityClass) -> &str {
    match class {
        EntityClass::All => ALL_ENTITY,
        _ => unit.entity(class),
    }
}

/// Check whether admitting `unit` would break a hard limit.
pub fn check_hard_limits(
    server: &Server,
    queue: &Queue,
    unit: &SchedulableUnit,
    flags: LimitCheckFlags,
    now: i64,
) -> SchedResult<LimitVerdict> {
    let (start, end) = (unit.start_or(now), unit.end_or(now));
    let projection = |queue_name| {
        flags.cumulative.then_some(Projection {
            calendar: &server.calendar,
            queue: queue_name,
            start,
            end,
        })
    };

    let scopes = [
        HardScope::new(
            ScopeLevel::Queue,
            &queue.name,
            &queue.limits.hard,
            queue.counts.as_ref(),
            projection(Some(queue.name.as_str())),
        )?,
        HardScope::new(
            ScopeLevel::Server,
            &server.name,
            &server.limits.hard,
            server.counts.as_ref(),
            projection(None),
        )?,
    ];

    let mut violations: Vec<SchdError> = Vec::new();
    for check in LIMIT_CHECKS {
        let scope = match check.scope {
            ScopeLevel::Queue => &scopes[0],
            ScopeLevel::Server => &scopes[1],
        };
        let found = scope.run_check(check, unit)?;
        if found.is_empty() {
            continue;
        }
        if flags.collect_all {
            violations.extend(found);
        } else {
            violations.extend(found.into_iter().take(1));
            break;
        }
    }

    let mut iter = violations.into_iter();
    let Some(mut head) = iter.next() else {
        return Ok(LimitVerdict::pass());
    };
    for err in iter {
        head.push(err);
    }
    debug!(unit = %unit.name, code = %head.error_code(), reason = %head, "hard limit reached");
    Ok(LimitVerdict {
        code: head.error_code(),
        err: head,
    })
}

// ─── Look-ahead ───────────────────────────────────────────────────

/// Calendar projection over the window a unit would run in.
#[derive(Debug, Clone, Copy)]
struct Projection<'a> {
    calendar: &'a Calendar,
    /// Restrict to events of units in this queue.
    queue: Option<&'a str>,
    start: i64,
    end: i64,
}

impl Projection<'_> {
    /// Fold calendar events into a copy of `base` and return the peak seen
    /// while the unit would be running.
    fn project(&self, base: &LimitCounters) -> LimitCounters {
        let mut cur = base.clone();
        let mut peak: Option<LimitCounters> = None;
        for ev in self.calendar.iter() {
            if ev.time >= self.end {
                break;
            }
            if self.queue.is_some_and(|q| ev.unit.queue != q) {
                continue;
            }
            if ev.time > self.start && peak.is_none() {
                peak = Some(cur.clone());
            }
            match ev.kind {
                EventKind::RunStart => cur.update_on_run(&ev.unit),
                EventKind::RunEnd => cur.update_on_end(&ev.unit),
            }
            if let Some(p) = peak.as_mut() {
                p.counts_max(&cur);
            }
        }
        peak.unwrap_or(cur)
    }
}

// ─── Soft limits ──────────────────────────────────────────────────

/// Evaluate soft limits for `unit`. Marks each counted entity that is
/// already over a soft limit and returns the reason bits that apply to the
/// unit. A queued unit is judged with its own increment added.
pub fn check_soft_limits(
    server: &mut Server,
    queue: &mut Queue,
    unit: &SchedulableUnit,
) -> SchedResult<PreemptBits> {
    run_soft_table(server, queue, unit, unit.is_running())
}

/// Re-evaluate soft limits after `unit` was admitted and counted.
pub fn update_soft_limits_after_dispatch(
    server: &mut Server,
    queue: &mut Queue,
    unit: &SchedulableUnit,
) -> SchedResult<PreemptBits> {
    run_soft_table(server, queue, unit, true)
}

fn run_soft_table(
    server: &mut Server,
    queue: &mut Queue,
    unit: &SchedulableUnit,
    counted: bool,
) -> SchedResult<PreemptBits> {
    let mut bits = PreemptBits::empty();
    for check in LIMIT_CHECKS {
        let (name, limits, counts) = match check.scope {
            ScopeLevel::Queue => (&queue.name, &queue.limits.soft, queue.counts.as_mut()),
            ScopeLevel::Server => (&server.name, &server.limits.soft, server.counts.as_mut()),
        };
        if !limits.has_limits(check.kind, check.class) {
            continue;
        }
        let counts = counts.ok_or_else(|| missing_counters(check.scope, name))?;
        if soft_check(check, limits, counts, unit, counted) {
            bits |= soft_limit_bit(check.scope);
        }
    }
    if !bits.is_empty() {
        debug!(unit = %unit.name, ?bits, "over soft limit");
    }
    Ok(bits)
}

/// Returns true when the unit is over a soft limit of this check.
fn soft_check(
    check: LimitCheck,
    limits: &LimitContext,
    counts: &mut LimitCounters,
    unit: &SchedulableUnit,
    counted: bool,
) -> bool {
    let entity = entity_name(unit, check.class);
    let bit = soft_limit_bit(check.scope);
    let mark = |over: bool| if over { bit } else { PreemptBits::empty() };
    let mut unit_over = false;

    match check.kind {
        LimitKind::Run => {
            let Some(limit) = limits.resolve_run_limit(check.class, entity) else {
                return false;
            };
            let used = f64::from(counts.running(check.class, entity));
            if let Some(c) = counts.map_mut(check.class).get_mut(entity) {
                c.soft_limit_preempt_bit = mark(used > limit.value);
            }
            let projected = if counted { used } else { used + 1.0 };
            unit_over = projected > limit.value;
        }
        LimitKind::Res => {
            for req in unit.resreq.iter().filter(|r| r.is_numeric()) {
                let Some(limit) = limits.resolve_res_limit(check.class, entity, &req.name) else {
                    continue;
                };
                let used = counts.res_amount(check.class, entity, &req.name);
                if let Some(rc) = counts
                    .map_mut(check.class)
                    .get_mut(entity)
                    .and_then(|c| c.find_res_mut(&req.name))
                {
                    rc.soft_limit_preempt_bit = mark(used > limit.value);
                }
                let projected = if counted { used } else { used + req.amount };
                unit_over |= projected > limit.value;
            }
        }
    }
    unit_over
}

/// Reason bits already marked on the counters of `unit`'s entities.
pub fn marked_soft_bits(server: &Server, queue: &Queue, unit: &SchedulableUnit) -> PreemptBits {
    let mut bits = PreemptBits::empty();
    for counts in [queue.counts.as_ref(), server.counts.as_ref()]
        .into_iter()
        .flatten()
    {
        for class in EntityClass::ALL_CLASSES {
            if let Some(c) = counts.find(class, entity_name(unit, class)) {
                bits |= c.soft_limit_preempt_bit;
                for rc in &c.rescount {
                    bits |= rc.soft_limit_preempt_bit;
                }
            }
        }
    }
    bits
}
