// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Per-cycle snapshot types: schedulable units, nodes, partitions, queues
//! and the server.
//!
//! The snapshot is built by an external collaborator. The core reads it and
//! annotates units (fairshare group, preemption state).

use std::collections::HashMap;

use sched_common::constants::ALL_ENTITY;
use sched_common::resource::{find_request, find_resource, Resource, ResourceRequest};

use crate::calendar::Calendar;
use crate::counts::LimitCounters;
use crate::fairshare::GroupId;
use crate::limit_context::{EntityClass, Limits};
use crate::preemption::PreemptBits;

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Queued,
    Running,
    Suspended,
    Held,
    Waiting,
    Exiting,
}

/// A job or an advance reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulableUnit {
    /// Full identifier, e.g. `"1234.server"`.
    pub name: String,
    /// Unique tie-breaker.
    pub rank: u64,
    pub user: String,
    pub group: String,
    pub project: String,
    pub queue: String,
    pub is_job: bool,
    pub state: UnitState,
    /// Set once the unit is known not to be runnable this cycle.
    pub can_not_run: bool,
    /// Submission time (seconds).
    pub qtime: i64,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub duration: i64,
    pub hard_duration: i64,
    pub sch_priority: i64,
    pub formula_value: Option<f64>,
    /// Preemption priority derived from `preempt_status`.
    pub preempt: i32,
    pub preempt_status: PreemptBits,
    pub time_preempted: Option<i64>,
    pub is_starving: bool,
    /// Requested application environment.
    pub aoe: Option<String>,
    pub resreq: Vec<ResourceRequest>,
    /// Fairshare entity this unit charges, assigned by the core.
    pub fairshare_group: Option<GroupId>,
}

impl SchedulableUnit {
    pub fn job(name: impl Into<String>, rank: u64) -> Self {
        Self {
            name: name.into(),
            rank,
            user: String::new(),
            group: String::new(),
            project: String::new(),
            queue: String::new(),
            is_job: true,
            state: UnitState::Queued,
            can_not_run: false,
            qtime: 0,
            start: None,
            end: None,
            duration: 0,
            hard_duration: 0,
            sch_priority: 0,
            formula_value: None,
            preempt: 0,
            preempt_status: PreemptBits::empty(),
            time_preempted: None,
            is_starving: false,
            aoe: None,
            resreq: Vec::new(),
            fairshare_group: None,
        }
    }

    pub fn reservation(name: impl Into<String>, rank: u64) -> Self {
        Self {
            is_job: false,
            ..Self::job(name, rank)
        }
    }

    /// Queued and not yet ruled out for this cycle.
    pub fn is_runnable(&self) -> bool {
        self.state == UnitState::Queued && !self.can_not_run
    }

    pub fn is_running(&self) -> bool {
        self.state == UnitState::Running
    }

    /// Leading numeric part of the identifier (`1234` for `"1234.server"`,
    /// `12` for the array job `"12[].server"`).
    pub fn job_id_number(&self) -> Option<u64> {
        let digits: String = self.name.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    pub fn request(&self, name: &str) -> Option<&ResourceRequest> {
        find_request(&self.resreq, name)
    }

    /// Name of the entity of `class` this unit counts against.
    pub fn entity(&self, class: EntityClass) -> &str {
        match class {
            EntityClass::User => &self.user,
            EntityClass::Group => &self.group,
            EntityClass::Project => &self.project,
            EntityClass::All => ALL_ENTITY,
        }
    }

    /// Start time, or `now` when the unit would start immediately.
    pub fn start_or(&self, now: i64) -> i64 {
        self.start.unwrap_or(now)
    }

    /// Projected end time: the stored end, else start (or `now`) plus duration.
    pub fn end_or(&self, now: i64) -> i64 {
        self.end.unwrap_or_else(|| self.start_or(now) + self.duration)
    }
}

/// An execution host.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub rank: u64,
    pub priority: i32,
    pub resources: Vec<Resource>,
    /// Application environment currently instantiated on the node.
    pub current_aoe: Option<String>,
    pub is_free: bool,
}

impl Node {
    pub fn new(name: impl Into<String>, rank: u64) -> Self {
        Self {
            name: name.into(),
            rank,
            priority: 0,
            resources: Vec::new(),
            current_aoe: None,
            is_free: true,
        }
    }

    pub fn with_resource(mut self, res: Resource) -> Self {
        self.resources.push(res);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        find_resource(&self.resources, name)
    }
}

/// A named group of nodes considered together for placement.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePartition {
    pub name: String,
    pub rank: u64,
    pub priority: i32,
    /// Aggregated resources of the member nodes.
    pub resources: Vec<Resource>,
    pub free_nodes: usize,
    pub total_nodes: usize,
}

impl NodePartition {
    pub fn new(name: impl Into<String>, rank: u64) -> Self {
        Self {
            name: name.into(),
            rank,
            priority: 0,
            resources: Vec::new(),
            free_nodes: 0,
            total_nodes: 0,
        }
    }

    pub fn with_resource(mut self, res: Resource) -> Self {
        self.resources.push(res);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        find_resource(&self.resources, name)
    }
}

/// Name lookup over the snapshot's nodes, used to follow indirect resources.
#[derive(Debug, Default)]
pub struct NodeIndex<'a> {
    by_name: HashMap<&'a str, &'a Node>,
}

impl<'a> NodeIndex<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        Self {
            by_name: nodes.iter().map(|n| (n.name.as_str(), n)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Node> {
        self.by_name.get(name).copied()
    }

    /// Follow `res` to the resource that holds its value. Returns `None` if
    /// the link is dangling or circular.
    pub fn resolve<'r>(&self, res: &'r Resource) -> Option<&'r Resource>
    where
        'a: 'r,
    {
        let mut cur = res;
        for _ in 0..=self.by_name.len() {
            match &cur.indirect {
                None => return Some(cur),
                Some(target) => cur = self.get(target)?.resource(&cur.name)?,
            }
        }
        None
    }
}

/// A queue and its per-cycle limit state.
#[derive(Debug, Clone, PartialEq)]
pub struct Queue {
    pub name: String,
    pub priority: i32,
    pub is_started: bool,
    pub is_exec: bool,
    pub limits: Limits,
    /// Running totals for this cycle; required when limits are configured.
    pub counts: Option<LimitCounters>,
}

impl Queue {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            is_started: true,
            is_exec: true,
            limits: Limits::new(),
            counts: Some(LimitCounters::new()),
        }
    }
}

/// The server: server-wide limits, counters and the event calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub name: String,
    pub limits: Limits,
    pub counts: Option<LimitCounters>,
    pub calendar: Calendar,
}

impl Server {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limits: Limits::new(),
            counts: Some(LimitCounters::new()),
            calendar: Calendar::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_number() {
        assert_eq!(SchedulableUnit::job("1234.server", 0).job_id_number(), Some(1234));
        assert_eq!(SchedulableUnit::job("12[].server", 0).job_id_number(), Some(12));
        assert_eq!(SchedulableUnit::job("R55.server", 0).job_id_number(), None);
    }

    #[test]
    fn test_runnable() {
        let mut job = SchedulableUnit::job("1.s", 1);
        assert!(job.is_runnable());
        job.can_not_run = true;
        assert!(!job.is_runnable());
        job.can_not_run = false;
        job.state = UnitState::Held;
        assert!(!job.is_runnable());
    }

    #[test]
    fn test_end_time() {
        let mut job = SchedulableUnit::job("1.s", 1);
        job.duration = 100;
        assert_eq!(job.end_or(50), 150);
        job.start = Some(10);
        assert_eq!(job.end_or(50), 110);
        job.end = Some(999);
        assert_eq!(job.end_or(50), 999);
    }

    #[test]
    fn test_resolve_indirect() {
        let nodes = vec![
            Node::new("n1", 1).with_resource(Resource::indirect("scratch", "store")),
            Node::new("store", 2).with_resource(Resource::numeric("scratch", 500.0, 100.0)),
            Node::new("loop", 3).with_resource(Resource::indirect("scratch", "loop")),
        ];
        let index = NodeIndex::new(&nodes);
        let res = nodes[0].resource("scratch").unwrap();
        let real = index.resolve(res).unwrap();
        assert_eq!(real.available, 500.0);

        let looped = nodes[2].resource("scratch").unwrap();
        assert!(index.resolve(looped).is_none());
    }
}
