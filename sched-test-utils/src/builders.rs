// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Builders for snapshot objects used across the core tests.

use sched_common::resource::{Resource, ResourceRequest};
use sched_core::fairshare::{FairshareTree, GroupId};
use sched_core::snapshot::{Node, Queue, SchedulableUnit, Server, UnitState};

/// Fluent builder for a job or reservation.
pub struct UnitBuilder {
    unit: SchedulableUnit,
}

impl UnitBuilder {
    /// A queued job named `"<id>.server"` in `workq`, owned by `user1`.
    pub fn job(id: u64) -> Self {
        let mut unit = SchedulableUnit::job(format!("{id}.server"), id);
        unit.user = "user1".to_string();
        unit.group = "group1".to_string();
        unit.project = "_default".to_string();
        unit.queue = "workq".to_string();
        unit.duration = 3600;
        unit.hard_duration = 3600;
        Self { unit }
    }

    pub fn reservation(id: u64) -> Self {
        let mut builder = Self::job(id);
        builder.unit.is_job = false;
        builder.unit.name = format!("R{id}.server");
        builder
    }

    pub fn user(mut self, user: &str) -> Self {
        self.unit.user = user.to_string();
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.unit.group = group.to_string();
        self
    }

    pub fn project(mut self, project: &str) -> Self {
        self.unit.project = project.to_string();
        self
    }

    pub fn queue(mut self, queue: &str) -> Self {
        self.unit.queue = queue.to_string();
        self
    }

    pub fn qtime(mut self, qtime: i64) -> Self {
        self.unit.qtime = qtime;
        self
    }

    pub fn duration(mut self, secs: i64) -> Self {
        self.unit.duration = secs;
        self.unit.hard_duration = secs;
        self
    }

    pub fn priority(mut self, sch_priority: i64) -> Self {
        self.unit.sch_priority = sch_priority;
        self
    }

    pub fn formula(mut self, value: f64) -> Self {
        self.unit.formula_value = Some(value);
        self
    }

    /// Mark the job starving with the given wait-derived priority.
    pub fn starving(mut self, sch_priority: i64) -> Self {
        self.unit.is_starving = true;
        self.unit.sch_priority = sch_priority;
        self
    }

    pub fn can_not_run(mut self) -> Self {
        self.unit.can_not_run = true;
        self
    }

    pub fn request(mut self, name: &str, amount: f64) -> Self {
        self.unit.resreq.push(ResourceRequest::new(name, amount));
        self
    }

    /// Mark the unit running over `[start, start + duration)`.
    pub fn running_since(mut self, start: i64) -> Self {
        self.unit.state = UnitState::Running;
        self.unit.start = Some(start);
        self.unit.end = Some(start + self.unit.duration);
        self
    }

    pub fn preempt(mut self, preempt: i32) -> Self {
        self.unit.preempt = preempt;
        self
    }

    pub fn build(self) -> SchedulableUnit {
        self.unit
    }
}

/// A node with `ncpus` and `mem` (kb) of which `used_*` is assigned.
pub fn gen_node(name: &str, rank: u64, ncpus: f64, used_ncpus: f64, mem_kb: f64, used_mem_kb: f64) -> Node {
    Node::new(name, rank)
        .with_resource(Resource::numeric("ncpus", ncpus, used_ncpus))
        .with_resource(Resource::size("mem", mem_kb, used_mem_kb))
}

/// A started, executing queue with the given `(attribute, value)` limits.
pub fn gen_queue(name: &str, priority: i32, limits: &[(&str, &str)]) -> Queue {
    let mut queue = Queue::new(name, priority);
    for (attr, value) in limits {
        queue
            .limits
            .parse_attribute(attr, value)
            .expect("invalid queue limit in test");
    }
    queue
}

pub fn gen_server(limits: &[(&str, &str)]) -> Server {
    let mut server = Server::new("server");
    for (attr, value) in limits {
        server
            .limits
            .parse_attribute(attr, value)
            .expect("invalid server limit in test");
    }
    server
}

/// Two departments under the root:
///
/// ```text
/// root
/// ├── eng (60 shares)
/// │   ├── alice (1)
/// │   └── bob (3)
/// └── ops (40 shares)
///     └── carol (1)
/// ```
pub fn gen_fairshare_tree() -> FairshareTree {
    let mut tree = FairshareTree::new(10);
    let eng = tree.add_child("eng", 10, 60, GroupId::ROOT);
    let ops = tree.add_child("ops", 20, 40, GroupId::ROOT);
    tree.add_child("alice", 11, 1, eng);
    tree.add_child("bob", 12, 3, eng);
    tree.add_child("carol", 21, 1, ops);
    tree.calc_percentages();
    tree
}
