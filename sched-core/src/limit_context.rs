// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Parsed limit directives.
//!
//! A `LimitContext` is a key → string store of configured ceilings, looked up
//! by `(kind, entity class, entity name[, resource])`. Each server and queue
//! carries one context for hard limits and one for soft limits.
//!
//! Directives use the attribute form
//! `[u:PBS_GENERIC=5], [g:physics=10], [p:climate=3], [o:PBS_ALL=20]`.

use std::collections::{HashMap, HashSet};
use std::fmt;

use sched_common::constants::{ALL_ENTITY, GENERIC_ENTITY};
use sched_common::resource::parse_amount;
use sched_common::status::{SchedError, SchedResult};
use tracing::warn;

/// Level at which a limit is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeLevel {
    Server,
    Queue,
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Queue => write!(f, "queue"),
        }
    }
}

/// Class of entity a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    User,
    Group,
    Project,
    /// Every unit counts against the single `PBS_ALL` bucket.
    All,
}

impl EntityClass {
    pub const ALL_CLASSES: [EntityClass; 4] = [Self::User, Self::Group, Self::Project, Self::All];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::User => "u",
            Self::Group => "g",
            Self::Project => "p",
            Self::All => "o",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "u" => Some(Self::User),
            "g" => Some(Self::Group),
            "p" => Some(Self::Project),
            "o" => Some(Self::All),
            _ => None,
        }
    }
}

/// What a limit bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// Number of running units.
    Run,
    /// Amount of a resource across running units.
    Res,
}

/// A ceiling resolved for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLimit {
    pub value: f64,
    /// Set for an exact-entity limit, clear for a generic one.
    pub individual: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitContext {
    values: HashMap<String, String>,
    configured: HashSet<(LimitKind, EntityClass)>,
}

impl LimitContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn run_key(class: EntityClass, entity: &str) -> String {
        format!("max_run:{}:{}", class.prefix(), entity)
    }

    fn res_key(class: EntityClass, entity: &str, resource: &str) -> String {
        format!("max_run_res:{}:{}:{}", class.prefix(), entity, resource)
    }

    pub fn set_run_limit(&mut self, class: EntityClass, entity: &str, value: impl Into<String>) {
        self.values
            .insert(Self::run_key(class, entity), value.into());
        self.configured.insert((LimitKind::Run, class));
    }

    pub fn set_res_limit(
        &mut self,
        class: EntityClass,
        entity: &str,
        resource: &str,
        value: impl Into<String>,
    ) {
        self.values
            .insert(Self::res_key(class, entity, resource), value.into());
        self.configured.insert((LimitKind::Res, class));
    }

    /// Cheap check used before any counting work.
    pub fn has_limits(&self, kind: LimitKind, class: EntityClass) -> bool {
        self.configured.contains(&(kind, class))
    }

    pub fn has_any(&self, kind: LimitKind) -> bool {
        EntityClass::ALL_CLASSES
            .iter()
            .any(|c| self.has_limits(kind, *c))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<f64> {
        let raw = self.values.get(key)?;
        match parse_amount(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, value = %raw, error = %e, "ignoring unparsable limit");
                None
            }
        }
    }

    pub fn run_limit(&self, class: EntityClass, entity: &str) -> Option<f64> {
        self.lookup(&Self::run_key(class, entity))
    }

    pub fn res_limit(&self, class: EntityClass, entity: &str, resource: &str) -> Option<f64> {
        self.lookup(&Self::res_key(class, entity, resource))
    }

    /// The run limit that applies to `entity`: its individual limit if one is
    /// configured, otherwise the generic limit. The `All` class only knows
    /// the `PBS_ALL` bucket.
    pub fn resolve_run_limit(&self, class: EntityClass, entity: &str) -> Option<ResolvedLimit> {
        self.resolve(class, entity, |e| self.run_limit(class, e))
    }

    /// Resource counterpart of [`resolve_run_limit`](Self::resolve_run_limit).
    pub fn resolve_res_limit(
        &self,
        class: EntityClass,
        entity: &str,
        resource: &str,
    ) -> Option<ResolvedLimit> {
        self.resolve(class, entity, |e| self.res_limit(class, e, resource))
    }

    fn resolve(
        &self,
        class: EntityClass,
        entity: &str,
        get: impl Fn(&str) -> Option<f64>,
    ) -> Option<ResolvedLimit> {
        if class == EntityClass::All {
            return get(ALL_ENTITY).map(|value| ResolvedLimit {
                value,
                individual: false,
            });
        }
        if let Some(value) = get(entity) {
            return Some(ResolvedLimit {
                value,
                individual: true,
            });
        }
        get(GENERIC_ENTITY).map(|value| ResolvedLimit {
            value,
            individual: false,
        })
    }

    /// Parse one limit attribute value.
    ///
    /// `resource` is `None` for run-count limits (`max_run`) and the
    /// resource name for resource limits (`max_run_res.<resource>`).
    pub fn parse_directives(&mut self, resource: Option<&str>, value: &str) -> SchedResult<()> {
        for entry in value.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let inner = entry
                .strip_prefix('[')
                .and_then(|e| e.strip_suffix(']'))
                .ok_or_else(|| {
                    SchedError::invalid_argument(format!("limit '{entry}' is not bracketed"))
                })?;
            let (scope, amount) = inner.split_once('=').ok_or_else(|| {
                SchedError::invalid_argument(format!("limit '{entry}' has no '='"))
            })?;
            let (prefix, entity) = scope.split_once(':').ok_or_else(|| {
                SchedError::invalid_argument(format!("limit '{entry}' has no entity class"))
            })?;
            let class = EntityClass::from_prefix(prefix.trim()).ok_or_else(|| {
                SchedError::invalid_argument(format!("unknown entity class '{prefix}'"))
            })?;
            let entity = entity.trim();
            if class == EntityClass::All && entity != ALL_ENTITY {
                return Err(SchedError::invalid_argument(format!(
                    "overall limits must use {ALL_ENTITY}, got '{entity}'"
                )));
            }
            let amount = amount.trim();
            parse_amount(amount)?;
            match resource {
                None => self.set_run_limit(class, entity, amount),
                Some(res) => self.set_res_limit(class, entity, res, amount),
            }
        }
        Ok(())
    }
}

/// Hard and soft limits for one server or queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Limits {
    pub hard: LimitContext,
    pub soft: LimitContext,
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a limit attribute by name: `max_run`, `max_run_soft`,
    /// `max_run_res.<res>` or `max_run_res_soft.<res>`.
    pub fn parse_attribute(&mut self, name: &str, value: &str) -> SchedResult<()> {
        let (base, resource) = match name.split_once('.') {
            Some((base, res)) => (base, Some(res)),
            None => (name, None),
        };
        let (ctx, expects_resource) = match base {
            "max_run" => (&mut self.hard, false),
            "max_run_soft" => (&mut self.soft, false),
            "max_run_res" => (&mut self.hard, true),
            "max_run_res_soft" => (&mut self.soft, true),
            other => {
                return Err(SchedError::invalid_argument(format!(
                    "unknown limit attribute '{other}'"
                )))
            }
        };
        if expects_resource != resource.is_some() {
            return Err(SchedError::invalid_argument(format!(
                "limit attribute '{name}' has the wrong resource form"
            )));
        }
        ctx.parse_directives(resource, value)
    }

    pub fn has_hard_limits(&self) -> bool {
        !self.hard.is_empty()
    }

    pub fn has_soft_limits(&self) -> bool {
        !self.soft.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_individual_overrides_generic() {
        let mut ctx = LimitContext::new();
        ctx.set_run_limit(EntityClass::User, GENERIC_ENTITY, "2");
        ctx.set_run_limit(EntityClass::User, "alice", "10");

        let alice = ctx.resolve_run_limit(EntityClass::User, "alice").unwrap();
        assert_eq!(alice.value, 10.0);
        assert!(alice.individual);

        let bob = ctx.resolve_run_limit(EntityClass::User, "bob").unwrap();
        assert_eq!(bob.value, 2.0);
        assert!(!bob.individual);

        assert!(ctx.resolve_run_limit(EntityClass::Group, "g").is_none());
    }

    #[test]
    fn test_has_limits_early_exit() {
        let mut ctx = LimitContext::new();
        assert!(!ctx.has_limits(LimitKind::Run, EntityClass::User));
        ctx.set_res_limit(EntityClass::Group, "physics", "ncpus", "64");
        assert!(ctx.has_limits(LimitKind::Res, EntityClass::Group));
        assert!(!ctx.has_limits(LimitKind::Run, EntityClass::Group));
        assert!(ctx.has_any(LimitKind::Res));
    }

    #[test]
    fn test_parse_attribute() {
        let mut limits = Limits::new();
        limits
            .parse_attribute("max_run", "[u:PBS_GENERIC=5], [g:physics=10], [o:PBS_ALL=20]")
            .unwrap();
        limits
            .parse_attribute("max_run_res_soft.mem", "[p:climate=4gb]")
            .unwrap();

        assert_eq!(limits.hard.run_limit(EntityClass::User, GENERIC_ENTITY), Some(5.0));
        assert_eq!(limits.hard.run_limit(EntityClass::Group, "physics"), Some(10.0));
        assert_eq!(limits.hard.run_limit(EntityClass::All, ALL_ENTITY), Some(20.0));
        assert_eq!(
            limits.soft.res_limit(EntityClass::Project, "climate", "mem"),
            Some(4.0 * 1024.0 * 1024.0)
        );
        assert!(limits.has_hard_limits());
        assert!(limits.has_soft_limits());
    }

    #[test]
    fn test_parse_attribute_errors() {
        let mut limits = Limits::new();
        assert!(limits.parse_attribute("max_run", "u:bob=3").is_err());
        assert!(limits.parse_attribute("max_run", "[x:bob=3]").is_err());
        assert!(limits.parse_attribute("max_run", "[o:everyone=3]").is_err());
        assert!(limits.parse_attribute("max_run", "[u:bob=lots]").is_err());
        assert!(limits.parse_attribute("max_run_res", "[u:bob=3]").is_err());
        assert!(limits.parse_attribute("max_queued", "[u:bob=3]").is_err());
    }
}
