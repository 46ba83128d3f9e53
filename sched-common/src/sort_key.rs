// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Configured sort keys for job and node ordering.
//!
//! Keys are written as `"<key> HIGH|LOW [avail|assigned|unused]"`, e.g.
//! `"ncpus HIGH"` or `"mem LOW unused"`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::status::{SchedError, SchedResult};

/// What a sort key reads from the objects being compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SortKeyKind {
    /// The object's own priority: job `sch_priority`, node or partition priority.
    SortPriority,
    /// Fairshare tree percentage of the unit's group.
    FairsharePerc,
    /// Preemption priority of the unit.
    PreemptPriority,
    /// Priority of the unit's queue.
    QueuePriority,
    /// A resource amount (request for units, node value for nodes).
    Resource(String),
}

impl SortKeyKind {
    fn from_name(name: &str) -> Self {
        match name {
            "sort_priority" | "job_priority" => Self::SortPriority,
            "fair_share_perc" => Self::FairsharePerc,
            "preempt_priority" => Self::PreemptPriority,
            "queue_priority" => Self::QueuePriority,
            other => Self::Resource(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SortPriority => "sort_priority",
            Self::FairsharePerc => "fair_share_perc",
            Self::PreemptPriority => "preempt_priority",
            Self::QueuePriority => "queue_priority",
            Self::Resource(r) => r,
        }
    }
}

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SortOrder {
    /// `LOW`: smaller values first.
    Ascending,
    /// `HIGH`: larger values first.
    Descending,
}

/// Which value of a node resource a node sort key reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SortResType {
    #[default]
    Available,
    Assigned,
    Unused,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SortKey {
    pub kind: SortKeyKind,
    pub order: SortOrder,
    pub res_type: SortResType,
}

impl SortKey {
    pub fn new(kind: SortKeyKind, order: SortOrder) -> Self {
        Self {
            kind,
            order,
            res_type: SortResType::Available,
        }
    }

    pub fn resource(name: impl Into<String>, order: SortOrder) -> Self {
        Self::new(SortKeyKind::Resource(name.into()), order)
    }

    pub fn with_res_type(mut self, res_type: SortResType) -> Self {
        self.res_type = res_type;
        self
    }

    pub fn is_ascending(&self) -> bool {
        self.order == SortOrder::Ascending
    }
}

impl FromStr for SortKey {
    type Err = SchedError;

    fn from_str(s: &str) -> SchedResult<Self> {
        let mut parts = s.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| SchedError::invalid_argument("empty sort key"))?;
        let order = match parts.next().map(|o| o.to_ascii_uppercase()) {
            Some(o) if o == "HIGH" => SortOrder::Descending,
            Some(o) if o == "LOW" => SortOrder::Ascending,
            Some(o) => {
                return Err(SchedError::invalid_argument(format!(
                    "bad sort direction '{o}' in '{s}'"
                )))
            }
            None => SortOrder::Descending,
        };
        let res_type = match parts.next().map(|t| t.to_ascii_lowercase()) {
            None => SortResType::Available,
            Some(t) if t == "avail" || t == "total" => SortResType::Available,
            Some(t) if t == "assigned" => SortResType::Assigned,
            Some(t) if t == "unused" => SortResType::Unused,
            Some(t) => {
                return Err(SchedError::invalid_argument(format!(
                    "bad resource value type '{t}' in '{s}'"
                )))
            }
        };
        Ok(Self {
            kind: SortKeyKind::from_name(name),
            order,
            res_type,
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.order {
            SortOrder::Ascending => "LOW",
            SortOrder::Descending => "HIGH",
        };
        write!(f, "{} {}", self.kind.name(), dir)?;
        match self.res_type {
            SortResType::Available => Ok(()),
            SortResType::Assigned => write!(f, " assigned"),
            SortResType::Unused => write!(f, " unused"),
        }
    }
}
