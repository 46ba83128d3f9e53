// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Comparators for jobs, nodes, node partitions and queues.
//!
//! Every comparator returns `Ordering::Less` when `a` should be considered
//! first. Direction is documented per function. None of them fail: a unit
//! or object missing a compared value sorts after every one that has it, and
//! ties only with others missing the same value.

use std::cmp::Ordering;

use sched_common::config::PolicyConfig;
use sched_common::constants::{MEM, NCPUS, SCHD_INFINITY};
use sched_common::resource::Resource;
use sched_common::sort_key::{SortKey, SortKeyKind, SortResType};

use crate::fairshare::FairshareTree;
use crate::preemption::{cmp_preempt_priority_dsc, cmp_preempt_time_asc, cmp_starving};
use crate::snapshot::{Node, NodeIndex, NodePartition, Queue, SchedulableUnit};

/// Ascending comparison of two availability amounts where an infinite
/// amount is smaller than any finite one. Two infinities tie.
pub fn cmp_avail(a: f64, b: f64) -> Ordering {
    match (a == SCHD_INFINITY, b == SCHD_INFINITY) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.total_cmp(&b),
    }
}

/// Orders present values with `cmp`; absent values sort after every present
/// one.
fn cmp_present_first(
    a: Option<f64>,
    b: Option<f64>,
    cmp: impl FnOnce(f64, f64) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn directed(ord: Ordering, key: &SortKey) -> Ordering {
    if key.is_ascending() {
        ord
    } else {
        ord.reverse()
    }
}

// ─── Jobs ─────────────────────────────────────────────────────────

/// What the job comparator reads besides the units themselves.
#[derive(Debug, Clone, Copy)]
pub struct SortContext<'a> {
    pub policy: &'a PolicyConfig,
    pub fairshare: Option<&'a FairshareTree>,
    /// Used by the `queue_priority` key.
    pub queues: &'a [Queue],
}

impl<'a> SortContext<'a> {
    pub fn new(policy: &'a PolicyConfig) -> Self {
        Self {
            policy,
            fairshare: None,
            queues: &[],
        }
    }

    pub fn with_fairshare(mut self, tree: &'a FairshareTree) -> Self {
        self.fairshare = Some(tree);
        self
    }

    pub fn with_queues(mut self, queues: &'a [Queue]) -> Self {
        self.queues = queues;
        self
    }

    fn queue_priority(&self, name: &str) -> Option<f64> {
        self.queues
            .iter()
            .find(|q| q.name == name)
            .map(|q| f64::from(q.priority))
    }

    fn key_value(&self, unit: &SchedulableUnit, key: &SortKey) -> Option<f64> {
        match &key.kind {
            SortKeyKind::SortPriority => Some(unit.sch_priority as f64),
            SortKeyKind::PreemptPriority => Some(f64::from(unit.preempt)),
            SortKeyKind::QueuePriority => self.queue_priority(&unit.queue),
            SortKeyKind::FairsharePerc => {
                let tree = self.fairshare?;
                unit.fairshare_group.map(|g| tree.get(g).tree_percentage)
            }
            SortKeyKind::Resource(name) => unit.request(name).map(|r| r.amount),
        }
    }
}

/// Total order over candidate units. `None` sorts after any unit.
///
/// Decision tree, first non-tie wins: runnable first; higher preemption
/// priority, then earlier preemption; starving jobs (when enabled); higher
/// formula value; fairshare path (when enabled); configured sort keys;
/// earlier queue time, lower job id, lower rank.
pub fn compare_units(
    ctx: &SortContext<'_>,
    a: Option<&SchedulableUnit>,
    b: Option<&SchedulableUnit>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_present(ctx, a, b),
    }
}

fn compare_present(ctx: &SortContext<'_>, a: &SchedulableUnit, b: &SchedulableUnit) -> Ordering {
    b.is_runnable()
        .cmp(&a.is_runnable())
        .then_with(|| cmp_preempt_priority_dsc(a, b))
        .then_with(|| cmp_preempt_time_asc(a, b))
        .then_with(|| {
            if ctx.policy.help_starving_jobs {
                cmp_starving(a, b)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| cmp_formula_dsc(a, b))
        .then_with(|| match (ctx.policy.fair_share, ctx.fairshare) {
            (true, Some(tree)) => match (a.fairshare_group, b.fairshare_group) {
                (Some(ga), Some(gb)) => tree.compare_paths(ga, gb),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            _ => Ordering::Equal,
        })
        .then_with(|| cmp_job_sort_keys(ctx, a, b, &ctx.policy.job_sort_keys))
        .then_with(|| cmp_stable(a, b))
}

/// Descending by job-sort-formula value; units without a value last.
pub fn cmp_formula_dsc(a: &SchedulableUnit, b: &SchedulableUnit) -> Ordering {
    cmp_present_first(a.formula_value, b.formula_value, |fa, fb| fb.total_cmp(&fa))
}

/// Multi-key comparison. A unit missing a key's value sorts after the units
/// that have it, whatever the key's direction.
pub fn cmp_job_sort_keys(
    ctx: &SortContext<'_>,
    a: &SchedulableUnit,
    b: &SchedulableUnit,
    keys: &[SortKey],
) -> Ordering {
    for key in keys {
        let ord = cmp_present_first(ctx.key_value(a, key), ctx.key_value(b, key), |va, vb| {
            directed(cmp_avail(va, vb), key)
        });
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Ascending queue time, then job id, then rank.
pub fn cmp_stable(a: &SchedulableUnit, b: &SchedulableUnit) -> Ordering {
    a.qtime
        .cmp(&b.qtime)
        .then_with(|| match (a.job_id_number(), b.job_id_number()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.rank.cmp(&b.rank))
}

/// Sort candidates into consideration order.
pub fn sort_units(ctx: &SortContext<'_>, units: &mut [SchedulableUnit]) {
    units.sort_by(|a, b| compare_units(ctx, Some(a), Some(b)));
}

// ─── Nodes and partitions ─────────────────────────────────────────

/// Common view of nodes and node partitions for the node comparators.
pub trait SortableObject {
    fn object_rank(&self) -> u64;
    fn object_priority(&self) -> i32;
    fn object_resource(&self, name: &str) -> Option<&Resource>;
}

impl SortableObject for Node {
    fn object_rank(&self) -> u64 {
        self.rank
    }
    fn object_priority(&self) -> i32 {
        self.priority
    }
    fn object_resource(&self, name: &str) -> Option<&Resource> {
        self.resource(name)
    }
}

impl SortableObject for NodePartition {
    fn object_rank(&self) -> u64 {
        self.rank
    }
    fn object_priority(&self) -> i32 {
        self.priority
    }
    fn object_resource(&self, name: &str) -> Option<&Resource> {
        self.resource(name)
    }
}

fn object_key_value<T: SortableObject>(
    obj: &T,
    key: &SortKey,
    index: Option<&NodeIndex<'_>>,
) -> Option<f64> {
    match &key.kind {
        SortKeyKind::SortPriority => Some(f64::from(obj.object_priority())),
        SortKeyKind::Resource(name) => {
            let res = obj.object_resource(name)?;
            let res = if res.is_indirect() {
                index?.resolve(res)?
            } else {
                res
            };
            Some(match key.res_type {
                SortResType::Available => res.available,
                SortResType::Assigned => res.assigned,
                SortResType::Unused => res.unused(),
            })
        }
        _ => None,
    }
}

/// Shared node / partition comparison: configured keys in order, then rank
/// in the direction of the first key (ascending without keys). An object
/// missing a key's resource, or whose indirect resource cannot be resolved,
/// sorts after those that have it.
pub fn compare_sortable<T: SortableObject>(
    a: &T,
    b: &T,
    keys: &[SortKey],
    index: Option<&NodeIndex<'_>>,
) -> Ordering {
    for key in keys {
        let ord = cmp_present_first(
            object_key_value(a, key, index),
            object_key_value(b, key, index),
            |va, vb| directed(cmp_avail(va, vb), key),
        );
        if ord != Ordering::Equal {
            return ord;
        }
    }
    let rank = a.object_rank().cmp(&b.object_rank());
    match keys.first() {
        Some(first) => directed(rank, first),
        None => rank,
    }
}

pub fn compare_nodes(a: &Node, b: &Node, keys: &[SortKey], index: Option<&NodeIndex<'_>>) -> Ordering {
    compare_sortable(a, b, keys, index)
}

pub fn compare_partitions(a: &NodePartition, b: &NodePartition, keys: &[SortKey]) -> Ordering {
    compare_sortable(a, b, keys, None)
}

/// Node positions in sorted order. Indirect resources are resolved
/// against `nodes` itself.
pub fn sorted_node_indices(nodes: &[Node], keys: &[SortKey]) -> Vec<usize> {
    let index = NodeIndex::new(nodes);
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by(|&i, &j| compare_nodes(&nodes[i], &nodes[j], keys, Some(&index)));
    order
}

pub fn sort_nodes(nodes: &mut Vec<Node>, keys: &[SortKey]) {
    let order = sorted_node_indices(nodes, keys);
    let mut slots: Vec<Option<Node>> = std::mem::take(nodes).into_iter().map(Some).collect();
    *nodes = order.into_iter().filter_map(|i| slots[i].take()).collect();
}

pub fn sort_partitions(parts: &mut [NodePartition], keys: &[SortKey]) {
    parts.sort_by(|a, b| compare_partitions(a, b, keys));
}

fn amount(obj: &impl SortableObject, name: &str, free: bool) -> f64 {
    obj.object_resource(name)
        .map(|r| if free { r.unused() } else { r.available })
        .unwrap_or(0.0)
}

/// Smallest placement set first: ascending by total CPUs, total memory,
/// free CPUs, free memory, then rank.
pub fn cmp_placement_sets(a: &NodePartition, b: &NodePartition) -> Ordering {
    let key = |p: &NodePartition| {
        [
            amount(p, NCPUS, false),
            amount(p, MEM, false),
            amount(p, NCPUS, true),
            amount(p, MEM, true),
        ]
    };
    let (ka, kb) = (key(a), key(b));
    ka.iter()
        .zip(kb.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.rank.cmp(&b.rank))
}

/// Nodes already running `aoe` first, then the configured node sort.
pub fn cmp_aoe(
    aoe: Option<&str>,
    a: &Node,
    b: &Node,
    keys: &[SortKey],
    index: Option<&NodeIndex<'_>>,
) -> Ordering {
    if let Some(aoe) = aoe {
        let has = |n: &Node| n.current_aoe.as_deref() == Some(aoe);
        match (has(a), has(b)) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }
    compare_nodes(a, b, keys, index)
}

// ─── Queues ───────────────────────────────────────────────────────

/// Descending by queue priority.
pub fn cmp_queue_prio_dsc(a: &Queue, b: &Queue) -> Ordering {
    b.priority.cmp(&a.priority)
}

/// Ascending by queue priority; equal priorities tie.
pub fn cmp_queue_prio_asc(a: &Queue, b: &Queue) -> Ordering {
    a.priority.cmp(&b.priority)
}

/// Ascending by queue priority with the historical tie behaviour: equal
/// priorities report `Less`, so `a` wins every tie. This is not a total
/// order and must not be handed to a sort; it exists for callers that scan
/// for the first lowest-priority queue and depend on the first one found
/// being kept.
pub fn cmp_queue_prio_asc_legacy(a: &Queue, b: &Queue) -> Ordering {
    if a.priority > b.priority {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_common::resource::ResourceRequest;
    use sched_common::sort_key::SortOrder;

    fn job(name: &str, rank: u64) -> SchedulableUnit {
        SchedulableUnit::job(name, rank)
    }

    #[test]
    fn test_cmp_avail_infinity() {
        assert_eq!(cmp_avail(SCHD_INFINITY, 1.0), Ordering::Less);
        assert_eq!(cmp_avail(1.0, SCHD_INFINITY), Ordering::Greater);
        assert_eq!(cmp_avail(SCHD_INFINITY, SCHD_INFINITY), Ordering::Equal);
        assert_eq!(cmp_avail(2.0, 1.0), Ordering::Greater);
    }

    #[test]
    fn test_missing_units() {
        let policy = PolicyConfig::default();
        let ctx = SortContext::new(&policy);
        let a = job("1.s", 1);
        assert_eq!(compare_units(&ctx, None, Some(&a)), Ordering::Greater);
        assert_eq!(compare_units(&ctx, Some(&a), None), Ordering::Less);
        assert_eq!(compare_units(&ctx, None, None), Ordering::Equal);
    }

    #[test]
    fn test_runnable_first() {
        let policy = PolicyConfig::default();
        let ctx = SortContext::new(&policy);
        let mut a = job("1.s", 1);
        a.can_not_run = true;
        a.preempt = 100;
        let b = job("2.s", 2);
        assert_eq!(compare_units(&ctx, Some(&a), Some(&b)), Ordering::Greater);
    }

    #[test]
    fn test_starving_only_when_enabled() {
        let mut policy = PolicyConfig::default();
        let mut a = job("2.s", 2);
        a.is_starving = true;
        a.sch_priority = 10;
        let b = job("1.s", 1);
        assert_eq!(
            compare_units(&SortContext::new(&policy), Some(&a), Some(&b)),
            Ordering::Less
        );
        policy.help_starving_jobs = false;
        assert_eq!(
            compare_units(&SortContext::new(&policy), Some(&a), Some(&b)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_formula_descending_and_absent_ties() {
        let policy = PolicyConfig::default();
        let ctx = SortContext::new(&policy);
        let mut a = job("2.s", 2);
        let mut b = job("1.s", 1);
        a.formula_value = Some(5.0);
        b.formula_value = Some(1.0);
        assert_eq!(compare_units(&ctx, Some(&a), Some(&b)), Ordering::Less);
        b.formula_value = None;
        assert_eq!(cmp_formula_dsc(&a, &b), Ordering::Less);
        assert_eq!(cmp_formula_dsc(&b, &a), Ordering::Greater);
        a.formula_value = None;
        assert_eq!(cmp_formula_dsc(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_sort_keys_and_missing_request() {
        let mut policy = PolicyConfig::default();
        policy.job_sort_keys = vec![
            SortKey::resource("ncpus", SortOrder::Descending),
            SortKey::resource("mem", SortOrder::Ascending),
        ];
        let ctx = SortContext::new(&policy);
        let mut a = job("1.s", 1);
        let mut b = job("2.s", 2);
        a.resreq = vec![ResourceRequest::new("ncpus", 2.0), ResourceRequest::size("mem", 10.0)];
        b.resreq = vec![ResourceRequest::new("ncpus", 2.0), ResourceRequest::size("mem", 5.0)];
        assert_eq!(compare_units(&ctx, Some(&a), Some(&b)), Ordering::Greater);

        b.resreq = vec![ResourceRequest::new("ncpus", 4.0)];
        assert_eq!(compare_units(&ctx, Some(&a), Some(&b)), Ordering::Greater);
        // mem missing on b: b goes after a even though b has the lower rank
        b.resreq = vec![ResourceRequest::new("ncpus", 2.0)];
        a.rank = 3;
        assert_eq!(cmp_job_sort_keys(&ctx, &a, &b, &policy.job_sort_keys), Ordering::Less);
        assert_eq!(compare_units(&ctx, Some(&b), Some(&a)), Ordering::Greater);
        a.resreq = vec![ResourceRequest::new("ncpus", 2.0)];
        assert_eq!(cmp_job_sort_keys(&ctx, &a, &b, &policy.job_sort_keys), Ordering::Equal);
    }

    #[test]
    fn test_queue_priority_key() {
        let mut policy = PolicyConfig::default();
        policy.job_sort_keys = vec![SortKey::new(SortKeyKind::QueuePriority, SortOrder::Descending)];
        let queues = vec![Queue::new("low", 10), Queue::new("high", 90)];
        let ctx = SortContext::new(&policy).with_queues(&queues);
        let mut a = job("1.s", 1);
        let mut b = job("2.s", 2);
        a.queue = "low".into();
        b.queue = "high".into();
        assert_eq!(compare_units(&ctx, Some(&a), Some(&b)), Ordering::Greater);
    }

    #[test]
    fn test_stable_tier() {
        let mut a = job("10.s", 5);
        let mut b = job("9.s", 6);
        assert_eq!(cmp_stable(&a, &b), Ordering::Greater);
        a.qtime = 1;
        b.qtime = 2;
        assert_eq!(cmp_stable(&a, &b), Ordering::Less);
        let r1 = SchedulableUnit::reservation("R1.s", 1);
        let r2 = SchedulableUnit::reservation("R2.s", 2);
        assert_eq!(cmp_stable(&r1, &r2), Ordering::Less);
    }

    #[test]
    fn test_mixed_units_order_transitively() {
        let policy = PolicyConfig::default();
        let ctx = SortContext::new(&policy);
        let mut starving = job("1.s", 1);
        starving.qtime = 10;
        starving.is_starving = true;
        starving.sch_priority = 90;
        let mut resv = SchedulableUnit::reservation("R2.s", 2);
        resv.qtime = 5;
        let mut plain = job("3.s", 3);
        plain.qtime = 1;
        plain.formula_value = Some(1.0);

        let cmp = |a: &SchedulableUnit, b: &SchedulableUnit| compare_units(&ctx, Some(a), Some(b));
        assert_eq!(cmp(&starving, &resv), Ordering::Less);
        assert_eq!(cmp(&starving, &plain), Ordering::Less);
        // only plain has a formula value
        assert_eq!(cmp(&plain, &resv), Ordering::Less);

        let expected = vec!["1.s", "3.s", "R2.s"];
        let base = [starving, resv, plain];
        for perm in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            let mut units: Vec<SchedulableUnit> = perm.iter().map(|&i| base[i].clone()).collect();
            sort_units(&ctx, &mut units);
            let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
            assert_eq!(names, expected);
        }
    }

    fn node(name: &str, rank: u64, ncpus: f64) -> Node {
        Node::new(name, rank).with_resource(Resource::numeric("ncpus", ncpus, 0.0))
    }

    #[test]
    fn test_node_sort_and_rank_direction() {
        let high = vec![SortKey::resource("ncpus", SortOrder::Descending)];
        let low = vec![SortKey::resource("ncpus", SortOrder::Ascending)];
        let nodes = vec![node("a", 1, 8.0), node("b", 2, 16.0), node("c", 3, 8.0)];

        let order = sorted_node_indices(&nodes, &high);
        assert_eq!(order, vec![1, 2, 0]);
        let order = sorted_node_indices(&nodes, &low);
        assert_eq!(order, vec![0, 2, 1]);
        assert_eq!(sorted_node_indices(&nodes, &[]), vec![0, 1, 2]);
    }

    #[test]
    fn test_node_missing_resource_sorts_last() {
        let nodes = vec![node("a", 1, 8.0), Node::new("b", 2), node("c", 3, 4.0)];
        let asc = vec![SortKey::resource("ncpus", SortOrder::Ascending)];
        let dsc = vec![SortKey::resource("ncpus", SortOrder::Descending)];
        assert_eq!(sorted_node_indices(&nodes, &asc), vec![2, 0, 1]);
        assert_eq!(sorted_node_indices(&nodes, &dsc), vec![0, 2, 1]);

        // no index to resolve against
        let plain = NodePartition::new("plain", 1).with_resource(Resource::numeric("ncpus", 2.0, 0.0));
        let ind = NodePartition::new("ind", 2).with_resource(Resource::indirect("ncpus", "n1"));
        assert_eq!(compare_partitions(&ind, &plain, &asc), Ordering::Greater);
        assert_eq!(compare_partitions(&plain, &ind, &dsc), Ordering::Less);
    }

    #[test]
    fn test_node_infinite_and_indirect() {
        let keys = vec![SortKey::resource("ncpus", SortOrder::Ascending)];
        let mut nodes = vec![
            node("finite", 1, 4.0),
            Node::new("inf", 2).with_resource(Resource::infinite("ncpus")),
            Node::new("ind", 3).with_resource(Resource::indirect("ncpus", "finite")),
        ];
        sort_nodes(&mut nodes, &keys);
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["inf", "finite", "ind"]);
    }

    #[test]
    fn test_node_assigned_res_type() {
        let keys = vec![SortKey::resource("ncpus", SortOrder::Ascending)
            .with_res_type(SortResType::Assigned)];
        let a = Node::new("a", 1).with_resource(Resource::numeric("ncpus", 8.0, 6.0));
        let b = Node::new("b", 2).with_resource(Resource::numeric("ncpus", 16.0, 2.0));
        assert_eq!(compare_nodes(&a, &b, &keys, None), Ordering::Greater);
    }

    #[test]
    fn test_placement_sets_smallest_first() {
        let small = NodePartition::new("small", 2)
            .with_resource(Resource::numeric("ncpus", 8.0, 0.0))
            .with_resource(Resource::size("mem", 100.0, 0.0));
        let big = NodePartition::new("big", 1)
            .with_resource(Resource::numeric("ncpus", 64.0, 0.0))
            .with_resource(Resource::size("mem", 50.0, 0.0));
        let busy = NodePartition::new("busy", 3)
            .with_resource(Resource::numeric("ncpus", 8.0, 4.0))
            .with_resource(Resource::size("mem", 100.0, 0.0));
        let mut sets = vec![big, small, busy];
        sets.sort_by(cmp_placement_sets);
        let names: Vec<_> = sets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["busy", "small", "big"]);
    }

    #[test]
    fn test_partition_priority_key() {
        let keys = vec![SortKey::new(SortKeyKind::SortPriority, SortOrder::Descending)];
        let mut a = NodePartition::new("a", 1);
        let mut b = NodePartition::new("b", 2);
        a.priority = 1;
        b.priority = 5;
        let mut parts = vec![a, b];
        sort_partitions(&mut parts, &keys);
        assert_eq!(parts[0].name, "b");
    }

    #[test]
    fn test_cmp_aoe() {
        let keys = vec![SortKey::resource("ncpus", SortOrder::Descending)];
        let mut a = node("a", 1, 4.0);
        let b = node("b", 2, 32.0);
        a.current_aoe = Some("rhel9".into());
        assert_eq!(cmp_aoe(Some("rhel9"), &a, &b, &keys, None), Ordering::Less);
        assert_eq!(cmp_aoe(Some("sles"), &a, &b, &keys, None), Ordering::Greater);
        assert_eq!(cmp_aoe(None, &a, &b, &keys, None), Ordering::Greater);
    }

    #[test]
    fn test_queue_comparators() {
        let a = Queue::new("a", 10);
        let b = Queue::new("b", 20);
        let c = Queue::new("c", 10);
        assert_eq!(cmp_queue_prio_dsc(&a, &b), Ordering::Greater);
        assert_eq!(cmp_queue_prio_asc(&a, &b), Ordering::Less);
        assert_eq!(cmp_queue_prio_asc(&a, &c), Ordering::Equal);
        assert_eq!(cmp_queue_prio_asc_legacy(&a, &c), Ordering::Less);
        assert_eq!(cmp_queue_prio_asc_legacy(&c, &a), Ordering::Less);
        assert_eq!(cmp_queue_prio_asc_legacy(&b, &a), Ordering::Greater);
    }
}
