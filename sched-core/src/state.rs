// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Scheduler state owned by the caller and passed by reference.
//!
//! Holds the policy, the fairshare tree and the server / queue snapshot for
//! the current cycle. `Clone` gives an independent copy for what-if
//! evaluation.

use sched_common::config::PolicyConfig;
use sched_common::sched_error::{ErrArg, SchdErrStatus, SchdError, SchedErrorCode};
use sched_common::status::{SchedError, SchedResult};
use sched_util::time::Stopwatch;
use tracing::{debug, info};

use crate::counts::LimitCounters;
use crate::fairshare::FairshareTree;
use crate::limits::{
    check_hard_limits, check_soft_limits, update_soft_limits_after_dispatch, LimitCheckFlags,
    LimitVerdict,
};
use crate::preemption::{
    compute_preempt_bits, mark_starving, select_preemption_candidates, set_preempt_prio,
    PreemptBits, PreemptPrioTable,
};
use crate::run_order::build_run_order;
use crate::snapshot::{Queue, SchedulableUnit, Server, UnitState};
use crate::sort::SortContext;
use crate::usage_formula::UsageFormula;
use crate::worker_pool::{bulk_over_fairshare, WorkerPool};

/// Unit attribute that names its fairshare entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FairshareEntity {
    User,
    Group,
    Project,
    Queue,
}

impl FairshareEntity {
    pub fn parse(name: &str) -> SchedResult<Self> {
        match name {
            "euser" => Ok(Self::User),
            "egroup" => Ok(Self::Group),
            "project" => Ok(Self::Project),
            "queue" => Ok(Self::Queue),
            other => Err(SchedError::invalid_argument(format!(
                "unknown fairshare_entity '{other}'"
            ))),
        }
    }

    pub fn of<'u>(&self, unit: &'u SchedulableUnit) -> &'u str {
        match self {
            Self::User => &unit.user,
            Self::Group => &unit.group,
            Self::Project => &unit.project,
            Self::Queue => &unit.queue,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub policy: PolicyConfig,
    pub fairshare: FairshareTree,
    pub usage_formula: UsageFormula,
    pub preempt_table: PreemptPrioTable,
    pub fairshare_entity: FairshareEntity,
    pub server: Server,
    pub queues: Vec<Queue>,
}

impl SchedulerState {
    pub fn new(policy: PolicyConfig, fairshare: FairshareTree) -> SchedResult<Self> {
        policy.validate().map_err(SchedError::invalid_argument)?;
        let usage_formula = UsageFormula::parse(&policy.fairshare_usage_res)?;
        let preempt_table = PreemptPrioTable::parse(&policy.preempt_prio)?;
        let fairshare_entity = FairshareEntity::parse(&policy.fairshare_entity)?;
        Ok(Self {
            policy,
            fairshare,
            usage_formula,
            preempt_table,
            fairshare_entity,
            server: Server::new("server"),
            queues: Vec::new(),
        })
    }

    pub fn with_server(mut self, server: Server) -> Self {
        self.server = server;
        self
    }

    pub fn with_queues(mut self, queues: Vec<Queue>) -> Self {
        self.queues = queues;
        self
    }

    pub fn queue(&self, name: &str) -> Option<&Queue> {
        self.queues.iter().find(|q| q.name == name)
    }

    fn queue_index(&self, name: &str) -> Option<usize> {
        self.queues.iter().position(|q| q.name == name)
    }

    /// Prepare a cycle: decay fairshare usage when due, reset per-cycle
    /// usage, bind units to fairshare groups, flag starving jobs and rebuild
    /// the limit counters from the running units.
    pub fn begin_cycle(&mut self, units: &mut [SchedulableUnit], now: i64) {
        if self.policy.fair_share {
            self.fairshare.decay_if_due(
                now,
                self.policy.fairshare_decay_time_secs,
                self.policy.fairshare_decay_factor,
            );
        }
        self.fairshare.reset_temp_usage();
        self.assign_fairshare_groups(units);

        if self.policy.help_starving_jobs {
            let mut starving = 0;
            for unit in units.iter_mut() {
                if mark_starving(unit, now, self.policy.max_starve_secs) {
                    starving += 1;
                }
            }
            if starving > 0 {
                debug!(starving, "starving jobs this cycle");
            }
        }

        self.server.counts = Some(LimitCounters::from_running(units.iter()));
        for queue in &mut self.queues {
            let name = queue.name.clone();
            queue.counts = Some(LimitCounters::from_running(
                units.iter().filter(|u| u.queue == name),
            ));
        }
        info!(units = units.len(), queues = self.queues.len(), "cycle started");
    }

    /// Bind each unit to the fairshare group of its entity, allocating
    /// unknown entities.
    pub fn assign_fairshare_groups(&mut self, units: &mut [SchedulableUnit]) {
        for unit in units {
            let entity = self.fairshare_entity.of(unit).to_string();
            unit.fairshare_group = Some(self.fairshare.find_or_allocate(&entity));
        }
    }

    /// Compute every unit's preemption bits and priority. Fairshare checks
    /// run on `pool` against a tree snapshot when one is given.
    pub fn assign_preempt_status(
        &mut self,
        units: &mut [SchedulableUnit],
        pool: Option<&WorkerPool>,
    ) -> SchedResult<()> {
        let timer = Stopwatch::new();
        let over_fs: Vec<bool> = if !self.policy.fair_share {
            vec![false; units.len()]
        } else {
            let groups: Vec<_> = units.iter().map(|u| u.fairshare_group).collect();
            match pool {
                Some(pool) => bulk_over_fairshare(pool, self.fairshare.snapshot(), &groups)?,
                None => groups
                    .iter()
                    .map(|g| g.is_some_and(|g| self.fairshare.over_fairshare(g)))
                    .collect(),
            }
        };

        for (unit, over) in units.iter_mut().zip(over_fs) {
            let soft = match self.queue_index(&unit.queue) {
                Some(qi)
                    if self.server.limits.has_soft_limits()
                        || self.queues[qi].limits.has_soft_limits() =>
                {
                    check_soft_limits(&mut self.server, &mut self.queues[qi], unit)?
                }
                _ => PreemptBits::empty(),
            };
            let bits = compute_preempt_bits(
                unit,
                self.queue(&unit.queue),
                self.policy.preempt_queue_prio,
                over,
                soft,
            );
            set_preempt_prio(unit, &self.preempt_table, bits);
        }
        debug!(
            units = units.len(),
            elapsed_us = timer.elapsed_us(),
            "assigned preemption status"
        );
        Ok(())
    }

    pub fn sort_context(&self) -> SortContext<'_> {
        let ctx = SortContext::new(&self.policy).with_queues(&self.queues);
        if self.policy.fair_share {
            ctx.with_fairshare(&self.fairshare)
        } else {
            ctx
        }
    }

    pub fn run_order<'u>(&self, units: &'u [SchedulableUnit]) -> Vec<&'u SchedulableUnit> {
        build_run_order(&self.sort_context(), units, &self.queues)
    }

    /// Queue state and hard limits for `unit`. A unit whose queue is not in
    /// the snapshot is an internal error.
    pub fn check_admission(
        &self,
        unit: &SchedulableUnit,
        flags: LimitCheckFlags,
        now: i64,
    ) -> SchedResult<LimitVerdict> {
        let queue = self.queue(&unit.queue).ok_or_else(|| {
            SchedError::internal(format!("unit {} names unknown queue '{}'", unit.name, unit.queue))
        })?;

        let refuse = |code: SchedErrorCode| {
            let err = SchdError::new(code, SchdErrStatus::NotRun).with_arg(ErrArg::Arg1, &queue.name);
            Ok(LimitVerdict { code, err })
        };
        if unit.state != UnitState::Queued {
            return refuse(SchedErrorCode::NotQueued);
        }
        if !queue.is_started {
            return refuse(SchedErrorCode::QueueNotStarted);
        }
        if !queue.is_exec {
            return refuse(SchedErrorCode::QueueNotExec);
        }
        check_hard_limits(&self.server, queue, unit, flags, now)
    }

    /// Record that `unit` starts now: charge fairshare usage, count it
    /// against its limits and refresh soft-limit marks. Returns the unit's
    /// new preemption bits.
    pub fn dispatch(&mut self, unit: &mut SchedulableUnit, now: i64) -> SchedResult<PreemptBits> {
        let qi = self.queue_index(&unit.queue).ok_or_else(|| {
            SchedError::internal(format!("unit {} names unknown queue '{}'", unit.name, unit.queue))
        })?;

        unit.state = UnitState::Running;
        unit.start = Some(now);
        unit.end = Some(now + unit.duration);

        if self.policy.fair_share {
            self.fairshare.update_usage_on_run(unit, &self.usage_formula);
        }
        if let Some(counts) = self.server.counts.as_mut() {
            counts.update_on_run(unit);
        }
        if let Some(counts) = self.queues[qi].counts.as_mut() {
            counts.update_on_run(unit);
        }
        let soft = update_soft_limits_after_dispatch(&mut self.server, &mut self.queues[qi], unit)?;

        let over = self.policy.fair_share
            && unit
                .fairshare_group
                .is_some_and(|g| self.fairshare.over_fairshare(g));
        let bits = compute_preempt_bits(
            unit,
            Some(&self.queues[qi]),
            self.policy.preempt_queue_prio,
            over,
            soft,
        );
        set_preempt_prio(unit, &self.preempt_table, bits);
        debug!(unit = %unit.name, queue = %unit.queue, ?bits, "dispatched");
        Ok(bits)
    }

    /// Running units `high` may preempt, best victim first.
    pub fn preemption_candidates<'u>(
        &self,
        high: &SchedulableUnit,
        running: &'u [SchedulableUnit],
    ) -> Vec<&'u SchedulableUnit> {
        select_preemption_candidates(high, running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairshare::GroupId;
    use sched_common::resource::ResourceRequest;

    fn unit(id: u64, user: &str, queue: &str) -> SchedulableUnit {
        let mut u = SchedulableUnit::job(format!("{id}.s"), id);
        u.user = user.into();
        u.group = "grp".into();
        u.queue = queue.into();
        u.duration = 60;
        u.resreq = vec![ResourceRequest::new("ncpus", 2.0)];
        u
    }

    fn state(policy: PolicyConfig) -> SchedulerState {
        let mut tree = FairshareTree::new(10);
        tree.add_child("alice", 10, 1, GroupId::ROOT);
        tree.add_child("bob", 11, 3, GroupId::ROOT);
        tree.calc_percentages();
        SchedulerState::new(policy, tree)
            .unwrap()
            .with_queues(vec![Queue::new("workq", 100), Queue::new("express", 200)])
    }

    #[test]
    fn test_new_rejects_bad_policy() {
        let mut policy = PolicyConfig::default();
        policy.fairshare_entity = "nobody".into();
        assert!(SchedulerState::new(policy, FairshareTree::new(10))
            .unwrap_err()
            .is_invalid_argument());

        let mut policy = PolicyConfig::default();
        policy.fairshare_usage_res = "2*".into();
        assert!(SchedulerState::new(policy, FairshareTree::new(10)).is_err());
    }

    #[test]
    fn test_begin_cycle_assigns_groups_and_counts() {
        let mut st = state(PolicyConfig::default());
        let mut units = vec![unit(1, "alice", "workq"), unit(2, "carol", "workq")];
        units[0].state = UnitState::Running;
        st.begin_cycle(&mut units, 1000);

        assert_eq!(units[0].fairshare_group, st.fairshare.find("alice"));
        let carol = st.fairshare.find("carol").unwrap();
        assert_eq!(st.fairshare.get(carol).parent(), Some(st.fairshare.unknown()));
        let counts = st.queue("workq").unwrap().counts.as_ref().unwrap();
        assert_eq!(counts.running(crate::limit_context::EntityClass::User, "alice"), 1);
        assert_eq!(
            st.queue("express").unwrap().counts.as_ref().unwrap().user.len(),
            0
        );
    }

    #[test]
    fn test_check_admission_queue_state() {
        let mut st = state(PolicyConfig::default());
        st.queues[0].is_started = false;
        let u = unit(1, "alice", "workq");
        let verdict = st.check_admission(&u, LimitCheckFlags::default(), 0).unwrap();
        assert_eq!(verdict.code, SchedErrorCode::QueueNotStarted);
        assert_eq!(verdict.err.arg(ErrArg::Arg1), Some("workq"));

        let lost = unit(2, "alice", "nowhere");
        assert!(st
            .check_admission(&lost, LimitCheckFlags::default(), 0)
            .unwrap_err()
            .is_internal());
    }

    #[test]
    fn test_dispatch_updates_usage_counts_and_soft_bits() {
        let mut policy = PolicyConfig::default();
        policy.fair_share = true;
        policy.fairshare_usage_res = "ncpus".into();
        let mut st = state(policy);
        st.queues[0]
            .limits
            .parse_attribute("max_run_soft", "[u:alice=0]")
            .unwrap();

        let mut units = vec![unit(1, "alice", "workq")];
        st.begin_cycle(&mut units, 1000);
        let alice = st.fairshare.find("alice").unwrap();

        let bits = st.dispatch(&mut units[0], 1000).unwrap();
        assert!(bits.contains(PreemptBits::OVER_QUEUE_LIMIT));
        assert_eq!(units[0].state, UnitState::Running);
        assert_eq!(units[0].end, Some(1060));
        assert_eq!(st.fairshare.get(alice).temp_usage, 3.0);
        let counts = st.queue("workq").unwrap().counts.as_ref().unwrap();
        assert_eq!(counts.running(crate::limit_context::EntityClass::User, "alice"), 1);
    }

    #[test]
    fn test_express_queue_outranks_normal() {
        let mut st = state(PolicyConfig::default());
        let mut units = vec![unit(1, "alice", "workq"), unit(2, "bob", "express")];
        st.begin_cycle(&mut units, 0);
        st.assign_preempt_status(&mut units, None).unwrap();
        assert!(units[1].preempt > units[0].preempt);
        assert_eq!(units[0].preempt_status, PreemptBits::NORMAL);

        let order = st.run_order(&units);
        assert_eq!(order[0].name, "2.s");
    }

    #[test]
    fn test_preemption_candidates_exclude_peers() {
        let mut st = state(PolicyConfig::default());
        let mut units = vec![
            unit(1, "alice", "workq"),
            unit(2, "bob", "workq"),
            unit(3, "carol", "express"),
        ];
        for (u, start) in units.iter_mut().take(2).zip([10, 20]) {
            u.state = UnitState::Running;
            u.start = Some(start);
        }
        st.begin_cycle(&mut units, 100);
        st.assign_preempt_status(&mut units, None).unwrap();

        let victims = st.preemption_candidates(&units[2], &units);
        let names: Vec<&str> = victims.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["2.s", "1.s"]);
        assert!(st.preemption_candidates(&units[0], &units).is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut st = state(PolicyConfig::default());
        let mut units = vec![unit(1, "alice", "workq")];
        st.begin_cycle(&mut units, 0);
        let mut what_if = st.clone();
        what_if.dispatch(&mut units[0].clone(), 0).unwrap();
        let original = st.queue("workq").unwrap().counts.as_ref().unwrap();
        assert_eq!(original.running(crate::limit_context::EntityClass::User, "alice"), 0);
    }
}
