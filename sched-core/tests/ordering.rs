// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Ordering of units, nodes and queues through the public API.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sched_common::config::PolicyConfig;
use sched_common::sort_key::{SortKey, SortKeyKind, SortOrder, SortResType};
use sched_core::fairshare::FairshareTree;
use sched_core::preemption::{set_preempt_prio, PreemptBits, PreemptPrioTable};
use sched_core::snapshot::SchedulableUnit;
use sched_core::sort::{compare_units, sort_nodes, sort_units, SortContext};
use sched_core::state::SchedulerState;
use sched_test_utils::{
    gen_fairshare_tree, gen_node, gen_queue, init_test_logging, random_units, shuffled, UnitBuilder,
};

fn names<'a>(units: impl IntoIterator<Item = &'a SchedulableUnit>) -> Vec<String> {
    units.into_iter().map(|u| u.name.clone()).collect()
}

#[test]
fn test_preempt_priority_orders_units() {
    init_test_logging();
    let table = PreemptPrioTable::parse("express_queue, starving_jobs, normal_jobs").unwrap();
    let mut p3 = UnitBuilder::job(1).build();
    let mut p1 = UnitBuilder::job(2).build();
    let mut p2 = UnitBuilder::job(3).build();
    set_preempt_prio(&mut p1, &table, PreemptBits::EXPRESS);
    set_preempt_prio(&mut p2, &table, PreemptBits::STARVING);
    set_preempt_prio(&mut p3, &table, PreemptBits::NORMAL);
    assert!(p1.preempt > p2.preempt && p2.preempt > p3.preempt);

    let policy = PolicyConfig::default();
    let ctx = SortContext::new(&policy);
    let mut units = vec![p3, p2, p1];
    sort_units(&ctx, &mut units);
    assert_eq!(names(&units), vec!["2.server", "3.server", "1.server"]);
}

/// Candidates for the ordering checks. Some are charged to fairshare
/// groups and some sit in a queue the context does not know.
fn mixed_candidates(rng: &mut StdRng, n: u64, tree: &FairshareTree) -> Vec<SchedulableUnit> {
    let groups: Vec<_> = ["alice", "bob", "carol"]
        .iter()
        .filter_map(|name| tree.find(name))
        .collect();
    let mut units = random_units(rng, n);
    for unit in units.iter_mut() {
        match rng.gen_range(0..4) {
            0 => unit.fairshare_group = None,
            _ => unit.fairshare_group = Some(groups[rng.gen_range(0..groups.len())]),
        }
        if rng.gen_bool(0.2) {
            unit.queue = "retired".to_string();
        }
    }
    units
}

fn mixed_policy() -> PolicyConfig {
    let mut policy = PolicyConfig::default();
    policy.fair_share = true;
    policy.help_starving_jobs = true;
    policy.job_sort_keys = vec![
        SortKey::new(SortKeyKind::QueuePriority, SortOrder::Descending),
        SortKey::resource("ncpus", SortOrder::Descending),
    ];
    policy
}

#[test]
fn test_sort_is_independent_of_input_order() {
    let mut rng = StdRng::seed_from_u64(7);
    let policy = mixed_policy();
    let mut tree = gen_fairshare_tree();
    let alice = tree.find("alice").unwrap();
    tree.set_usage(alice, 500.0);
    tree.rollup_usage();
    let queues = vec![gen_queue("workq", 100, &[])];
    let ctx = SortContext::new(&policy).with_fairshare(&tree).with_queues(&queues);

    for round in 0..5 {
        let units = mixed_candidates(&mut rng, 60, &tree);
        let mut expected = units.clone();
        sort_units(&ctx, &mut expected);

        for _ in 0..10 {
            let mut attempt = shuffled(&mut rng, &units);
            sort_units(&ctx, &mut attempt);
            assert_eq!(names(&attempt), names(&expected), "round {round}");
        }
    }
}

#[test]
fn test_compare_units_is_antisymmetric() {
    let mut rng = StdRng::seed_from_u64(11);
    let policy = mixed_policy();
    let tree = gen_fairshare_tree();
    let ctx = SortContext::new(&policy).with_fairshare(&tree);
    let units = mixed_candidates(&mut rng, 40, &tree);
    for a in &units {
        for b in &units {
            let ab = compare_units(&ctx, Some(a), Some(b));
            let ba = compare_units(&ctx, Some(b), Some(a));
            assert_eq!(ab, ba.reverse(), "{} vs {}", a.name, b.name);
            if a.rank != b.rank {
                assert_ne!(ab, Ordering::Equal);
            }
        }
    }
}

#[test]
fn test_compare_units_is_transitive() {
    let mut rng = StdRng::seed_from_u64(23);
    let policy = mixed_policy();
    let mut tree = gen_fairshare_tree();
    let bob = tree.find("bob").unwrap();
    tree.set_usage(bob, 40.0);
    tree.rollup_usage();
    let queues = vec![gen_queue("workq", 100, &[])];
    let ctx = SortContext::new(&policy).with_fairshare(&tree).with_queues(&queues);
    let units = mixed_candidates(&mut rng, 24, &tree);

    let cmp = |a: &SchedulableUnit, b: &SchedulableUnit| compare_units(&ctx, Some(a), Some(b));
    for a in &units {
        for b in &units {
            let ab = cmp(a, b);
            if ab == Ordering::Greater {
                continue;
            }
            for c in &units {
                let bc = cmp(b, c);
                if bc == Ordering::Greater {
                    continue;
                }
                let ac = cmp(a, c);
                assert_ne!(ac, Ordering::Greater, "{} {} {}", a.name, b.name, c.name);
                if ab == Ordering::Less || bc == Ordering::Less {
                    assert_eq!(ac, Ordering::Less, "{} {} {}", a.name, b.name, c.name);
                }
            }
        }
    }
}

#[test]
fn test_starving_job_reservation_and_plain_job() {
    let policy = mixed_policy();
    let ctx = SortContext::new(&policy);
    let starving = UnitBuilder::job(1).qtime(10).starving(150).build();
    let resv = UnitBuilder::reservation(2).qtime(5).build();
    let plain = UnitBuilder::job(3).qtime(1).build();

    let cmp = |a: &SchedulableUnit, b: &SchedulableUnit| compare_units(&ctx, Some(a), Some(b));
    assert_eq!(cmp(&starving, &resv), Ordering::Less);
    assert_eq!(cmp(&resv, &plain), Ordering::Greater);
    assert_eq!(cmp(&starving, &plain), Ordering::Less);

    let mut units = vec![plain, resv, starving];
    sort_units(&ctx, &mut units);
    assert_eq!(names(&units), vec!["1.server", "3.server", "R2.server"]);
}

#[test]
fn test_fairshare_prefers_larger_share() {
    let mut policy = PolicyConfig::default();
    policy.fair_share = true;
    let mut tree = gen_fairshare_tree();
    let alice = tree.find("alice").unwrap();
    let bob = tree.find("bob").unwrap();
    tree.set_usage(alice, 100.0);
    tree.set_usage(bob, 100.0);
    tree.rollup_usage();

    let mut a = UnitBuilder::job(1).user("alice").build();
    let mut b = UnitBuilder::job(2).user("bob").build();
    a.fairshare_group = Some(alice);
    b.fairshare_group = Some(bob);

    let ctx = SortContext::new(&policy).with_fairshare(&tree);
    assert_eq!(compare_units(&ctx, Some(&b), Some(&a)), Ordering::Less);
}

#[test]
fn test_run_order_from_state() {
    let mut policy = PolicyConfig::default();
    policy.fair_share = true;
    let mut state = SchedulerState::new(policy, gen_fairshare_tree())
        .unwrap()
        .with_queues(vec![gen_queue("workq", 100, &[]), gen_queue("express", 200, &[])]);

    let mut units = vec![
        UnitBuilder::job(1).user("alice").request("ncpus", 1.0).build(),
        UnitBuilder::job(2).user("bob").request("ncpus", 1.0).build(),
        UnitBuilder::job(3).user("carol").queue("express").build(),
        UnitBuilder::job(4).user("alice").running_since(0).build(),
    ];
    state.begin_cycle(&mut units, 100);
    state.assign_preempt_status(&mut units, None).unwrap();

    let order = state.run_order(&units);
    // bob holds three times alice's share at equal usage
    assert_eq!(names(order), vec!["3.server", "2.server", "1.server"]);
}

#[test]
fn test_nodes_sorted_by_free_cpus() {
    let mut nodes = vec![
        gen_node("n1", 1, 8.0, 6.0, 1024.0, 0.0),
        gen_node("n2", 2, 8.0, 0.0, 1024.0, 0.0),
        gen_node("n3", 3, 16.0, 12.0, 1024.0, 0.0),
    ];
    let keys = [SortKey::resource("ncpus", SortOrder::Descending).with_res_type(SortResType::Unused)];
    sort_nodes(&mut nodes, &keys);
    let order: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(order, vec!["n2", "n3", "n1"]);
}
