// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Admission error taxonomy.
//!
//! A `SchdError` explains why a unit could not be admitted. It is a normal
//! value, not a Rust error: several reasons can be chained for one unit and
//! the whole chain is rendered for operators by an external formatter.

use std::fmt;

use crate::constants::MAX_ERR_ARGS;

/// Fixed taxonomy of admission outcomes.
///
/// The discriminants are stable; external formatters key off them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SchedErrorCode {
    Success = 0,

    // ─── Internal ─────────────────────────────────────────────
    SchdError = 1,
    NotQueued = 2,

    // ─── Queue state ──────────────────────────────────────────
    QueueNotStarted = 10,
    QueueNotExec = 11,

    // ─── Server run-count limits ──────────────────────────────
    ServerUserLimitReached = 20,
    ServerByUserJobLimitReached = 21,
    ServerGroupLimitReached = 22,
    ServerByGroupJobLimitReached = 23,
    ServerProjectLimitReached = 24,
    ServerByProjectJobLimitReached = 25,
    ServerJobLimitReached = 26,

    // ─── Queue run-count limits ───────────────────────────────
    QueueUserLimitReached = 30,
    QueueByUserJobLimitReached = 31,
    QueueGroupLimitReached = 32,
    QueueByGroupJobLimitReached = 33,
    QueueProjectLimitReached = 34,
    QueueByProjectJobLimitReached = 35,
    QueueJobLimitReached = 36,

    // ─── Server resource limits ───────────────────────────────
    ServerUserResLimitReached = 40,
    ServerByUserResLimitReached = 41,
    ServerGroupResLimitReached = 42,
    ServerByGroupResLimitReached = 43,
    ServerProjectResLimitReached = 44,
    ServerByProjectResLimitReached = 45,
    ServerResourceLimitReached = 46,

    // ─── Queue resource limits ────────────────────────────────
    QueueUserResLimitReached = 50,
    QueueByUserResLimitReached = 51,
    QueueGroupResLimitReached = 52,
    QueueByGroupResLimitReached = 53,
    QueueProjectResLimitReached = 54,
    QueueByProjectResLimitReached = 55,
    QueueResourceLimitReached = 56,

    // ─── Placement / provisioning (collaborators) ─────────────
    InsufficientResource = 60,
    NoNodeResources = 61,
    NotEnoughNodesAvail = 62,
    ProvDisableOnServer = 63,
    ProvDisableOnNode = 64,
    AoeNotAvailable = 65,

    // ─── Reservations / dedicated time ────────────────────────
    ReservationConflict = 70,
    DedTime = 71,
    CrossDedTimeBoundary = 72,
    BackfillConflict = 73,
}

impl SchedErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::SchdError => "SchdError",
            Self::NotQueued => "NotQueued",
            Self::QueueNotStarted => "QueueNotStarted",
            Self::QueueNotExec => "QueueNotExec",
            Self::ServerUserLimitReached => "ServerUserLimitReached",
            Self::ServerByUserJobLimitReached => "ServerByUserJobLimitReached",
            Self::ServerGroupLimitReached => "ServerGroupLimitReached",
            Self::ServerByGroupJobLimitReached => "ServerByGroupJobLimitReached",
            Self::ServerProjectLimitReached => "ServerProjectLimitReached",
            Self::ServerByProjectJobLimitReached => "ServerByProjectJobLimitReached",
            Self::ServerJobLimitReached => "ServerJobLimitReached",
            Self::QueueUserLimitReached => "QueueUserLimitReached",
            Self::QueueByUserJobLimitReached => "QueueByUserJobLimitReached",
            Self::QueueGroupLimitReached => "QueueGroupLimitReached",
            Self::QueueByGroupJobLimitReached => "QueueByGroupJobLimitReached",
            Self::QueueProjectLimitReached => "QueueProjectLimitReached",
            Self::QueueByProjectJobLimitReached => "QueueByProjectJobLimitReached",
            Self::QueueJobLimitReached => "QueueJobLimitReached",
            Self::ServerUserResLimitReached => "ServerUserResLimitReached",
            Self::ServerByUserResLimitReached => "ServerByUserResLimitReached",
            Self::ServerGroupResLimitReached => "ServerGroupResLimitReached",
            Self::ServerByGroupResLimitReached => "ServerByGroupResLimitReached",
            Self::ServerProjectResLimitReached => "ServerProjectResLimitReached",
            Self::ServerByProjectResLimitReached => "ServerByProjectResLimitReached",
            Self::ServerResourceLimitReached => "ServerResourceLimitReached",
            Self::QueueUserResLimitReached => "QueueUserResLimitReached",
            Self::QueueByUserResLimitReached => "QueueByUserResLimitReached",
            Self::QueueGroupResLimitReached => "QueueGroupResLimitReached",
            Self::QueueByGroupResLimitReached => "QueueByGroupResLimitReached",
            Self::QueueProjectResLimitReached => "QueueProjectResLimitReached",
            Self::QueueByProjectResLimitReached => "QueueByProjectResLimitReached",
            Self::QueueResourceLimitReached => "QueueResourceLimitReached",
            Self::InsufficientResource => "InsufficientResource",
            Self::NoNodeResources => "NoNodeResources",
            Self::NotEnoughNodesAvail => "NotEnoughNodesAvail",
            Self::ProvDisableOnServer => "ProvDisableOnServer",
            Self::ProvDisableOnNode => "ProvDisableOnNode",
            Self::AoeNotAvailable => "AoeNotAvailable",
            Self::ReservationConflict => "ReservationConflict",
            Self::DedTime => "DedTime",
            Self::CrossDedTimeBoundary => "CrossDedTimeBoundary",
            Self::BackfillConflict => "BackfillConflict",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }

    /// True for the run-count and resource limit codes.
    pub fn is_limit(&self) -> bool {
        (20..60).contains(&(*self as u16))
    }

    /// Operator-facing message template; `{1}`..`{3}` are the arguments and
    /// `{r}` the resource name.
    fn template(&self) -> &'static str {
        match self {
            Self::Success => "no error",
            Self::SchdError => "scheduler internal error",
            Self::NotQueued => "job is not in a queued state",
            Self::QueueNotStarted => "queue {1} not started",
            Self::QueueNotExec => "queue {1} is not an execution queue",
            Self::ServerUserLimitReached => "server-wide generic run limit reached for user {1}",
            Self::ServerByUserJobLimitReached => "server-wide run limit reached for user {1}",
            Self::ServerGroupLimitReached => "server-wide generic run limit reached for group {1}",
            Self::ServerByGroupJobLimitReached => "server-wide run limit reached for group {1}",
            Self::ServerProjectLimitReached => {
                "server-wide generic run limit reached for project {1}"
            }
            Self::ServerByProjectJobLimitReached => "server-wide run limit reached for project {1}",
            Self::ServerJobLimitReached => "server {1} run limit of {3} jobs reached",
            Self::QueueUserLimitReached => "queue {1} generic run limit reached for user {2}",
            Self::QueueByUserJobLimitReached => "queue {1} run limit reached for user {2}",
            Self::QueueGroupLimitReached => "queue {1} generic run limit reached for group {2}",
            Self::QueueByGroupJobLimitReached => "queue {1} run limit reached for group {2}",
            Self::QueueProjectLimitReached => "queue {1} generic run limit reached for project {2}",
            Self::QueueByProjectJobLimitReached => "queue {1} run limit reached for project {2}",
            Self::QueueJobLimitReached => "queue {1} run limit of {3} jobs reached",
            Self::ServerUserResLimitReached => {
                "server-wide generic {r} limit reached for user {1}"
            }
            Self::ServerByUserResLimitReached => "server-wide {r} limit reached for user {1}",
            Self::ServerGroupResLimitReached => {
                "server-wide generic {r} limit reached for group {1}"
            }
            Self::ServerByGroupResLimitReached => "server-wide {r} limit reached for group {1}",
            Self::ServerProjectResLimitReached => {
                "server-wide generic {r} limit reached for project {1}"
            }
            Self::ServerByProjectResLimitReached => {
                "server-wide {r} limit reached for project {1}"
            }
            Self::ServerResourceLimitReached => "server {1} {r} limit of {3} reached",
            Self::QueueUserResLimitReached => "queue {1} generic {r} limit reached for user {2}",
            Self::QueueByUserResLimitReached => "queue {1} {r} limit reached for user {2}",
            Self::QueueGroupResLimitReached => "queue {1} generic {r} limit reached for group {2}",
            Self::QueueByGroupResLimitReached => "queue {1} {r} limit reached for group {2}",
            Self::QueueProjectResLimitReached => {
                "queue {1} generic {r} limit reached for project {2}"
            }
            Self::QueueByProjectResLimitReached => "queue {1} {r} limit reached for project {2}",
            Self::QueueResourceLimitReached => "queue {1} {r} limit of {3} reached",
            Self::InsufficientResource => "insufficient amount of resource {r}",
            Self::NoNodeResources => "no available resources on nodes",
            Self::NotEnoughNodesAvail => "not enough nodes available",
            Self::ProvDisableOnServer => "provisioning disabled on server",
            Self::ProvDisableOnNode => "provisioning disabled on node {1}",
            Self::AoeNotAvailable => "cannot provision aoe {1}",
            Self::ReservationConflict => "job would conflict with reservation {1}",
            Self::DedTime => "dedicated time conflict",
            Self::CrossDedTimeBoundary => "job would cross a dedicated time boundary",
            Self::BackfillConflict => "job would conflict with a top job",
        }
    }
}

impl fmt::Display for SchedErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How final an admission failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchdErrStatus {
    #[default]
    Unknown,
    /// Not admitted this cycle; may run later.
    NotRun,
    /// Can never be admitted as submitted.
    NeverRun,
}

/// Argument slot of a `SchdError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrArg {
    Arg1 = 0,
    Arg2 = 1,
    Arg3 = 2,
}

/// A chained explanation of why a unit was not admitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchdError {
    pub status: SchdErrStatus,
    pub code: Option<SchedErrorCode>,
    pub args: [Option<String>; MAX_ERR_ARGS],
    /// Resource the error refers to, if any.
    pub resource: Option<String>,
    pub next: Option<Box<SchdError>>,
}

impl SchdError {
    pub fn new(code: SchedErrorCode, status: SchdErrStatus) -> Self {
        Self {
            status,
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn with_arg(mut self, slot: ErrArg, value: impl Into<String>) -> Self {
        self.set_arg(slot, value);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn set_arg(&mut self, slot: ErrArg, value: impl Into<String>) {
        self.args[slot as usize] = Some(value.into());
    }

    pub fn arg(&self, slot: ErrArg) -> Option<&str> {
        self.args[slot as usize].as_deref()
    }

    /// The code of this record, `Success` when unset.
    pub fn error_code(&self) -> SchedErrorCode {
        self.code.unwrap_or(SchedErrorCode::Success)
    }

    /// Append `err` (and its own chain) at the end of this chain.
    pub fn push(&mut self, err: SchdError) {
        match self.next {
            Some(ref mut next) => next.push(err),
            None => self.next = Some(Box::new(err)),
        }
    }

    /// Iterate over this record and every chained record.
    pub fn iter(&self) -> SchdErrorIter<'_> {
        SchdErrorIter { cur: Some(self) }
    }

    pub fn chain_len(&self) -> usize {
        self.iter().count()
    }
}

impl fmt::Display for SchdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut msg = self.error_code().template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            let placeholder = format!("{{{}}}", i + 1);
            msg = msg.replace(&placeholder, arg.as_deref().unwrap_or(""));
        }
        msg = msg.replace("{r}", self.resource.as_deref().unwrap_or(""));
        write!(f, "{msg}")
    }
}

pub struct SchdErrorIter<'a> {
    cur: Option<&'a SchdError>,
}

impl<'a> Iterator for SchdErrorIter<'a> {
    type Item = &'a SchdError;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.cur?;
        self.cur = cur.next.as_deref();
        Some(cur)
    }
}
