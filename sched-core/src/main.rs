// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Fairshare administration tool.
//!
//! Inspects and edits the persisted fairshare usage of the scheduler.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sched_common::config::PolicyConfig;
use sched_common::status::SchedError;
use sched_core::fairshare::{FairshareTree, GroupId};
use sched_core::fairshare_file::{load_resource_groups, read_usage, write_usage};
use sched_util::time::current_time_secs;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "schedfs", about = "Inspect and edit scheduler fairshare usage")]
struct Args {
    /// Resource group file describing the share tree
    #[arg(long, default_value = "resource_group")]
    resource_group: PathBuf,

    /// Binary usage file
    #[arg(long, default_value = "usage")]
    usage: PathBuf,

    /// Policy configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the share tree with percentages and usage
    Print,
    /// Show one entity
    Get { entity: String },
    /// Set an entity's usage
    Set { entity: String, usage: f64 },
    /// Apply one decay to every usage
    Decay,
    /// Report which of two entities is more deserving
    Compare { a: String, b: String },
    /// Drop usage records for entities missing from the share tree
    Trim,
    /// Print the effective policy configuration
    Policy,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Sched(#[from] SchedError),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("no fairshare entity named '{0}'")]
    UnknownEntity(String),
    #[error("'{0}' is a group; its usage is the sum of its members")]
    NotLeaf(String),
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] std::io::Error),
}

/// `from_json` applies env overrides and validates on its own.
fn load_policy(path: Option<&PathBuf>) -> Result<PolicyConfig, CliError> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(SchedError::from)?;
            PolicyConfig::from_json(&json).map_err(CliError::Config)
        }
        None => {
            let mut policy = PolicyConfig::default();
            policy.apply_env_overrides();
            policy.validate().map_err(CliError::Config)?;
            Ok(policy)
        }
    }
}

fn lookup(tree: &FairshareTree, entity: &str) -> Result<GroupId, CliError> {
    tree.find(entity)
        .ok_or_else(|| CliError::UnknownEntity(entity.to_string()))
}

/// Only leaf usage is persisted; a group's usage is rolled up from its
/// members and cannot be set directly.
fn set_leaf_usage(tree: &mut FairshareTree, entity: &str, usage: f64) -> Result<(), CliError> {
    let id = lookup(tree, entity)?;
    if !tree.get(id).is_leaf() {
        return Err(CliError::NotLeaf(entity.to_string()));
    }
    tree.set_usage(id, usage);
    tree.rollup_usage();
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    sched_util::logging::init_logging("schedfs", None, args.verbose as i32 - 1)?;
    let policy = load_policy(args.config.as_ref())?;

    let mut tree = load_resource_groups(&args.resource_group, policy.unknown_shares)?;
    let trim = matches!(args.command, Command::Trim);
    read_usage(&args.usage, &mut tree, trim)?;

    match args.command {
        Command::Print => print!("{}", tree.render()),
        Command::Get { entity } => {
            let g = tree.get(lookup(&tree, &entity)?);
            println!(
                "{} shares {} perc {:.4}% usage {:.0} usage/perc {:.2}",
                g.name,
                g.shares,
                g.tree_percentage * 100.0,
                g.usage,
                g.normalized_usage()
            );
        }
        Command::Set { entity, usage } => {
            set_leaf_usage(&mut tree, &entity, usage)?;
            write_usage(&args.usage, &tree)?;
            info!(entity = %entity, usage, "usage set");
        }
        Command::Decay => {
            tree.decay(policy.fairshare_decay_factor);
            tree.rollup_usage();
            tree.last_decay = Some(current_time_secs());
            write_usage(&args.usage, &tree)?;
            info!(factor = policy.fairshare_decay_factor, "usage decayed");
        }
        Command::Compare { a, b } => {
            let (ga, gb) = (lookup(&tree, &a)?, lookup(&tree, &b)?);
            match tree.compare_paths(ga, gb) {
                std::cmp::Ordering::Less => println!("{a} is more deserving"),
                std::cmp::Ordering::Greater => println!("{b} is more deserving"),
                std::cmp::Ordering::Equal => println!("{a} and {b} are equally deserving"),
            }
        }
        Command::Trim => {
            write_usage(&args.usage, &tree)?;
            info!(path = %args.usage.display(), "usage file trimmed");
        }
        Command::Policy => println!("{}", policy.to_json()),
    }
    Ok(())
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("schedfs: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> FairshareTree {
        let mut tree = FairshareTree::new(0);
        let eng = tree.add_child("eng", 10, 1, GroupId::ROOT);
        tree.add_child("alice", 11, 1, eng);
        tree.add_child("bob", 12, 1, eng);
        tree.calc_percentages();
        tree
    }

    #[test]
    fn test_load_policy_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, r#"{"fair_share": true, "unknown_shares": 4}"#).unwrap();
        let policy = load_policy(Some(&path)).unwrap();
        assert!(policy.fair_share);
        assert_eq!(policy.unknown_shares, 4);

        std::fs::write(&path, r#"{"fairshare_decay_factor": 2.0}"#).unwrap();
        assert!(matches!(load_policy(Some(&path)), Err(CliError::Config(_))));
        assert!(load_policy(None).is_ok());
    }

    #[test]
    fn test_set_leaf_usage_rolls_up() {
        let mut tree = tree();
        set_leaf_usage(&mut tree, "alice", 30.0).unwrap();
        set_leaf_usage(&mut tree, "bob", 10.0).unwrap();
        let eng = tree.find("eng").unwrap();
        assert_eq!(tree.get(eng).usage, 40.0);
    }

    #[test]
    fn test_set_group_usage_rejected() {
        let mut tree = tree();
        let err = set_leaf_usage(&mut tree, "eng", 500.0).unwrap_err();
        assert!(matches!(err, CliError::NotLeaf(ref name) if name == "eng"));
        let eng = tree.find("eng").unwrap();
        assert_ne!(tree.get(eng).usage, 500.0);

        let err = set_leaf_usage(&mut tree, "nobody", 1.0).unwrap_err();
        assert!(matches!(err, CliError::UnknownEntity(_)));
    }
}
