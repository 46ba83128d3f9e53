// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Hierarchical fairshare usage tree.
//!
//! Groups live in an arena (`Vec<GroupInfo>`) and refer to each other by
//! `GroupId`. Index 0 is always the root (`TREEROOT`); the `unknown` bucket
//! that collects entities missing from the resource-group file is created
//! with the tree.
//!
//! Each group has a share of its parent. `group_percentage` is the share of
//! its siblings and `tree_percentage` the share of the whole machine. Usage
//! is historical consumption (decayed over time); `temp_usage` starts each
//! cycle equal to `usage` and grows as units are dispatched.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::Arc;

use sched_common::constants::{
    FAIRSHARE_MIN_USAGE, FAIRSHARE_ROOT_NAME, FAIRSHARE_UNKNOWN_NAME, ROOT_CRESGROUP,
    ROOT_RESGROUP, UNKNOWN_CRESGROUP, UNKNOWN_ENTITY_SHARES,
};
use sched_common::status::{SchedError, SchedResult};
use tracing::{debug, info, warn};

use crate::snapshot::SchedulableUnit;
use crate::usage_formula::UsageFormula;

/// Index of a group in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

impl GroupId {
    pub const ROOT: GroupId = GroupId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One entity or interior group of the fairshare tree.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    pub name: String,
    pub shares: i32,
    /// Resource group this node belongs to (its parent's `cresgroup`).
    pub resgroup: i32,
    /// Resource group id of this node's children.
    pub cresgroup: i32,
    pub usage: f64,
    pub temp_usage: f64,
    pub group_percentage: f64,
    pub tree_percentage: f64,
    parent: Option<GroupId>,
    children: Vec<GroupId>,
    /// Root-to-node path, including both ends.
    gpath: Vec<GroupId>,
}

impl GroupInfo {
    fn new(name: &str, cresgroup: i32, shares: i32) -> Self {
        Self {
            name: name.to_string(),
            shares,
            resgroup: ROOT_RESGROUP,
            cresgroup,
            usage: FAIRSHARE_MIN_USAGE,
            temp_usage: FAIRSHARE_MIN_USAGE,
            group_percentage: 0.0,
            tree_percentage: 0.0,
            parent: None,
            children: Vec::new(),
            gpath: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    /// Children, most recently added first.
    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn path(&self) -> &[GroupId] {
        &self.gpath
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Usage relative to entitlement; lower is more deserving.
    pub fn normalized_usage(&self) -> f64 {
        self.temp_usage / self.tree_percentage
    }
}

/// The fairshare forest: the tree plus the time of the last decay.
#[derive(Debug, Clone, PartialEq)]
pub struct FairshareTree {
    groups: Vec<GroupInfo>,
    unknown: GroupId,
    pub last_decay: Option<i64>,
}

impl FairshareTree {
    /// A tree holding only the root and the `unknown` bucket.
    pub fn new(unknown_shares: i32) -> Self {
        let mut root = GroupInfo::new(FAIRSHARE_ROOT_NAME, ROOT_CRESGROUP, 0);
        root.group_percentage = 1.0;
        root.tree_percentage = 1.0;
        root.gpath = vec![GroupId::ROOT];

        let mut tree = Self {
            groups: vec![root],
            unknown: GroupId::ROOT,
            last_decay: None,
        };
        tree.unknown = tree.add_child(
            FAIRSHARE_UNKNOWN_NAME,
            UNKNOWN_CRESGROUP,
            unknown_shares,
            GroupId::ROOT,
        );
        tree.calc_percentages();
        tree
    }

    pub fn root(&self) -> &GroupInfo {
        &self.groups[GroupId::ROOT.0]
    }

    pub fn unknown(&self) -> GroupId {
        self.unknown
    }

    pub fn get(&self, id: GroupId) -> &GroupInfo {
        &self.groups[id.0]
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = GroupId> {
        (0..self.groups.len()).map(GroupId)
    }

    /// Entities with no children, excluding the root.
    pub fn leaves(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.ids()
            .filter(move |id| *id != GroupId::ROOT && self.get(*id).is_leaf())
    }

    /// Attach a new group as the first child of `parent`. The new group's
    /// `resgroup` is the parent's `cresgroup`. Percentages are not
    /// recomputed.
    pub fn add_child(&mut self, name: &str, cresgroup: i32, shares: i32, parent: GroupId) -> GroupId {
        let id = GroupId(self.groups.len());
        let mut info = GroupInfo::new(name, cresgroup, shares);
        info.resgroup = self.groups[parent.0].cresgroup;
        info.parent = Some(parent);
        info.gpath = self.groups[parent.0].gpath.clone();
        info.gpath.push(id);
        self.groups.push(info);
        self.groups[parent.0].children.insert(0, id);
        id
    }

    /// Like [`add_child`](Self::add_child) but rejects a name already in the
    /// tree.
    pub fn add_group(
        &mut self,
        name: &str,
        cresgroup: i32,
        shares: i32,
        parent: GroupId,
    ) -> SchedResult<GroupId> {
        if self.find(name).is_some() {
            return Err(SchedError::already_exists(format!(
                "fairshare entity '{name}' already exists"
            )));
        }
        Ok(self.add_child(name, cresgroup, shares, parent))
    }

    /// Recompute every group's percentages from the root down.
    pub fn calc_percentages(&mut self) {
        let root = &mut self.groups[GroupId::ROOT.0];
        root.group_percentage = 1.0;
        root.tree_percentage = 1.0;
        self.calc_percentages_from(GroupId::ROOT);
    }

    /// Recompute percentages of the subtree below `parent`, one sibling
    /// chain at a time. `parent`'s own `tree_percentage` must be current.
    pub fn calc_percentages_from(&mut self, parent: GroupId) {
        let mut stack = vec![parent];
        while let Some(pid) = stack.pop() {
            let parent_tp = self.groups[pid.0].tree_percentage;
            let children = self.groups[pid.0].children.clone();
            let total: i64 = children
                .iter()
                .map(|c| i64::from(self.groups[c.0].shares.max(0)))
                .sum();
            for cid in &children {
                let child = &mut self.groups[cid.0];
                if total > 0 {
                    child.group_percentage = f64::from(child.shares.max(0)) / total as f64;
                    child.tree_percentage = child.group_percentage * parent_tp;
                } else {
                    child.group_percentage = 0.0;
                    child.tree_percentage = 0.0;
                }
            }
            stack.extend(children);
        }
    }

    /// Find a group by exact name, checking each sibling chain before
    /// descending into children.
    pub fn find(&self, name: &str) -> Option<GroupId> {
        if self.root().name == name {
            return Some(GroupId::ROOT);
        }
        self.find_in_chain(&self.root().children, name)
    }

    fn find_in_chain(&self, chain: &[GroupId], name: &str) -> Option<GroupId> {
        if let Some(id) = chain.iter().find(|id| self.groups[id.0].name == name) {
            return Some(*id);
        }
        chain
            .iter()
            .find_map(|id| self.find_in_chain(&self.groups[id.0].children, name))
    }

    /// Find `name`, or allocate a one-share leaf for it under `unknown`.
    pub fn find_or_allocate(&mut self, name: &str) -> GroupId {
        if let Some(id) = self.find(name) {
            return id;
        }
        let cresgroup = self.next_cresgroup();
        let id = self.add_child(name, cresgroup, UNKNOWN_ENTITY_SHARES, self.unknown);
        self.calc_percentages_from(self.unknown);
        debug!(entity = name, cresgroup, "allocated fairshare entity under unknown");
        id
    }

    fn next_cresgroup(&self) -> i32 {
        self.groups
            .iter()
            .map(|g| g.cresgroup)
            .max()
            .unwrap_or(ROOT_CRESGROUP)
            + 1
    }

    /// Set a group's usage (floored). Also resets its `temp_usage`.
    pub fn set_usage(&mut self, id: GroupId, usage: f64) {
        let g = &mut self.groups[id.0];
        g.usage = usage.max(FAIRSHARE_MIN_USAGE);
        g.temp_usage = g.usage;
    }

    /// Add `amount` to the `temp_usage` of `id` and every ancestor.
    pub fn add_temp_usage(&mut self, id: GroupId, amount: f64) {
        let path = self.groups[id.0].gpath.clone();
        for gid in path {
            self.groups[gid.0].temp_usage += amount;
        }
    }

    /// Charge a dispatched unit's usage to its fairshare group's path.
    pub fn update_usage_on_run(&mut self, unit: &SchedulableUnit, formula: &UsageFormula) {
        let Some(group) = unit.fairshare_group else {
            warn!(unit = %unit.name, "unit has no fairshare group, usage not charged");
            return;
        };
        let amount = formula.evaluate(unit);
        self.add_temp_usage(group, amount);
        debug!(unit = %unit.name, entity = %self.get(group).name, amount, "charged usage");
    }

    /// Copy `usage` into `temp_usage` for every group.
    pub fn reset_temp_usage(&mut self) {
        for g in &mut self.groups {
            g.temp_usage = g.usage;
        }
    }

    /// Multiply every usage by `factor`, never dropping below the floor.
    pub fn decay(&mut self, factor: f64) {
        for g in &mut self.groups {
            g.usage = (g.usage * factor).max(FAIRSHARE_MIN_USAGE);
            g.temp_usage = (g.temp_usage * factor).max(FAIRSHARE_MIN_USAGE);
        }
    }

    /// Apply one decay per whole `interval_secs` elapsed since the last
    /// decay. The first call only records `now`. Returns the number of
    /// decays applied.
    pub fn decay_if_due(&mut self, now: i64, interval_secs: i64, factor: f64) -> u32 {
        let Some(last) = self.last_decay else {
            self.last_decay = Some(now);
            return 0;
        };
        let n = sched_util::time::intervals_elapsed(last, now, interval_secs);
        for _ in 0..n {
            self.decay(factor);
        }
        if n > 0 {
            self.last_decay = Some(last + i64::from(n) * interval_secs);
            info!(decays = n, factor, "decayed fairshare usage");
        }
        n
    }

    /// Make every interior group's usage the sum of its children's.
    pub fn rollup_usage(&mut self) {
        self.rollup_from(GroupId::ROOT);
        self.reset_temp_usage();
    }

    fn rollup_from(&mut self, id: GroupId) -> f64 {
        let children = self.groups[id.0].children.clone();
        if children.is_empty() {
            return self.groups[id.0].usage;
        }
        let sum: f64 = children.iter().map(|c| self.rollup_from(*c)).sum();
        self.groups[id.0].usage = sum.max(FAIRSHARE_MIN_USAGE);
        self.groups[id.0].usage
    }

    /// Compare two groups level by level along their root paths. The first
    /// level whose groups differ in normalized usage decides; when every
    /// shared level ties the shorter path wins. Less means `a` is more
    /// deserving.
    pub fn compare_paths(&self, a: GroupId, b: GroupId) -> Ordering {
        let pa = &self.groups[a.0].gpath;
        let pb = &self.groups[b.0].gpath;
        for (ga, gb) in pa.iter().zip(pb.iter()) {
            let ord = Self::compare_groups(self.get(*ga), self.get(*gb));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        pa.len().cmp(&pb.len())
    }

    /// Groups without a share of the machine sort after those with one.
    fn compare_groups(a: &GroupInfo, b: &GroupInfo) -> Ordering {
        match (a.tree_percentage > 0.0, b.tree_percentage > 0.0) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (true, true) => a.normalized_usage().total_cmp(&b.normalized_usage()),
        }
    }

    /// True when the group has used more than its share of the machine.
    pub fn over_fairshare(&self, id: GroupId) -> bool {
        let g = self.get(id);
        self.root().usage * g.tree_percentage < g.usage
    }

    /// Immutable copy for readers running on worker threads.
    pub fn snapshot(&self) -> Arc<FairshareTree> {
        Arc::new(self.clone())
    }

    /// Indented listing of the tree with shares, percentages and usage.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(GroupId::ROOT, 0, &mut out);
        out
    }

    fn render_into(&self, id: GroupId, depth: usize, out: &mut String) {
        let g = self.get(id);
        let _ = writeln!(
            out,
            "{:indent$}{}({}) grp {} shares {} perc {:.4}% usage {:.0}",
            "",
            g.name,
            g.cresgroup,
            g.resgroup,
            g.shares,
            g.tree_percentage * 100.0,
            g.usage,
            indent = depth * 4,
        );
        for child in &g.children {
            self.render_into(*child, depth + 1, out);
        }
    }
}
