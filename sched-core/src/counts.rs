// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Running totals used by the limit engine.
//!
//! One `LimitCounters` exists for the server and one per queue each cycle.
//! Entities are keyed by name inside four maps (user, group, project, all).
//! Counters are plain values: `Clone` gives the deep copy the look-ahead
//! needs.

use std::collections::HashMap;

use sched_common::constants::ALL_ENTITY;

use crate::limit_context::EntityClass;
use crate::preemption::PreemptBits;
use crate::snapshot::SchedulableUnit;

/// Accumulated amount of one resource for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCount {
    pub name: String,
    pub amount: f64,
    /// Set while this entity is over its soft limit for this resource.
    pub soft_limit_preempt_bit: PreemptBits,
}

/// Totals for one entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Counts {
    pub name: String,
    pub running: i32,
    pub rescount: Vec<ResourceCount>,
    /// Set while this entity is over its soft run-count limit.
    pub soft_limit_preempt_bit: PreemptBits,
}

impl Counts {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn res_amount(&self, resource: &str) -> f64 {
        self.rescount
            .iter()
            .find(|r| r.name == resource)
            .map(|r| r.amount)
            .unwrap_or(0.0)
    }

    pub fn find_res_mut(&mut self, resource: &str) -> Option<&mut ResourceCount> {
        self.rescount.iter_mut().find(|r| r.name == resource)
    }

    pub fn find_or_create_res(&mut self, resource: &str) -> &mut ResourceCount {
        let idx = match self.rescount.iter().position(|r| r.name == resource) {
            Some(idx) => idx,
            None => {
                self.rescount.push(ResourceCount {
                    name: resource.to_string(),
                    amount: 0.0,
                    soft_limit_preempt_bit: PreemptBits::empty(),
                });
                self.rescount.len() - 1
            }
        };
        &mut self.rescount[idx]
    }

    fn add_unit(&mut self, unit: &SchedulableUnit) {
        self.running += 1;
        for req in unit.resreq.iter().filter(|r| r.is_numeric()) {
            self.find_or_create_res(&req.name).amount += req.amount;
        }
    }

    fn remove_unit(&mut self, unit: &SchedulableUnit) {
        self.running = (self.running - 1).max(0);
        for req in unit.resreq.iter().filter(|r| r.is_numeric()) {
            if let Some(rc) = self.find_res_mut(&req.name) {
                rc.amount = (rc.amount - req.amount).max(0.0);
            }
        }
    }

    /// Element-wise maximum with `other`.
    fn max_with(&mut self, other: &Counts) {
        self.running = self.running.max(other.running);
        for rc in &other.rescount {
            let mine = self.find_or_create_res(&rc.name);
            mine.amount = mine.amount.max(rc.amount);
        }
    }
}

/// Entity name → totals.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountsMap {
    entries: HashMap<String, Counts>,
}

impl CountsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Counts> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Counts> {
        self.entries.get_mut(name)
    }

    pub fn find_or_create(&mut self, name: &str) -> &mut Counts {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| Counts::new(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Counts> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn max_with(&mut self, other: &CountsMap) {
        for counts in other.entries.values() {
            self.find_or_create(&counts.name).max_with(counts);
        }
    }
}

/// Server- or queue-level totals broken out by entity class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LimitCounters {
    pub user: CountsMap,
    pub group: CountsMap,
    pub project: CountsMap,
    pub all: CountsMap,
}

impl LimitCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build counters from the units currently running.
    pub fn from_running<'a>(units: impl IntoIterator<Item = &'a SchedulableUnit>) -> Self {
        let mut counters = Self::new();
        for unit in units.into_iter().filter(|u| u.is_running()) {
            counters.update_on_run(unit);
        }
        counters
    }

    pub fn map(&self, class: EntityClass) -> &CountsMap {
        match class {
            EntityClass::User => &self.user,
            EntityClass::Group => &self.group,
            EntityClass::Project => &self.project,
            EntityClass::All => &self.all,
        }
    }

    pub fn map_mut(&mut self, class: EntityClass) -> &mut CountsMap {
        match class {
            EntityClass::User => &mut self.user,
            EntityClass::Group => &mut self.group,
            EntityClass::Project => &mut self.project,
            EntityClass::All => &mut self.all,
        }
    }

    pub fn find(&self, class: EntityClass, entity: &str) -> Option<&Counts> {
        self.map(class).get(entity)
    }

    /// Running count for `entity`, zero when it has never been counted.
    pub fn running(&self, class: EntityClass, entity: &str) -> i32 {
        self.find(class, entity).map(|c| c.running).unwrap_or(0)
    }

    pub fn res_amount(&self, class: EntityClass, entity: &str, resource: &str) -> f64 {
        self.find(class, entity)
            .map(|c| c.res_amount(resource))
            .unwrap_or(0.0)
    }

    /// Count `unit` as running for each of its entities.
    pub fn update_on_run(&mut self, unit: &SchedulableUnit) {
        for class in EntityClass::ALL_CLASSES {
            let entity = entity_key(unit, class);
            self.map_mut(class).find_or_create(entity).add_unit(unit);
        }
    }

    /// Remove `unit` from the totals. Never drops below zero.
    pub fn update_on_end(&mut self, unit: &SchedulableUnit) {
        for class in EntityClass::ALL_CLASSES {
            let entity = entity_key(unit, class);
            if let Some(counts) = self.map_mut(class).get_mut(entity) {
                counts.remove_unit(unit);
            }
        }
    }

    /// Merge `other` into `self` keeping the element-wise maximum.
    pub fn counts_max(&mut self, other: &LimitCounters) {
        self.user.max_with(&other.user);
        self.group.max_with(&other.group);
        self.project.max_with(&other.project);
        self.all.max_with(&other.all);
    }
}

fn entity_key(unit: &SchedulableUnit, class: EntityClass) -> &str {
    match class {
        EntityClass::All => ALL_ENTITY,
        _ => unit.entity(class),
    }
}
