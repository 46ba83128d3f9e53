// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Amount of fairshare usage charged for a unit.
//!
//! The formula is a sum of `[coefficient *] resource` terms, e.g. `"cput"`
//! or `"2*ncpus + mem"`. `walltime` reads the unit's duration and `cput` is
//! `ncpus * walltime`. Any other name reads the unit's request amount
//! (zero when not requested).

use std::fmt;

use sched_common::constants::{CPUT, NCPUS, WALLTIME};
use sched_common::status::{SchedError, SchedResult};

use crate::snapshot::SchedulableUnit;

#[derive(Debug, Clone, PartialEq)]
struct Term {
    coefficient: f64,
    resource: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageFormula {
    terms: Vec<Term>,
}

impl UsageFormula {
    pub fn parse(expr: &str) -> SchedResult<Self> {
        let mut terms = Vec::new();
        for raw in expr.split('+') {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(SchedError::invalid_argument(format!(
                    "empty term in usage formula '{expr}'"
                )));
            }
            let (coefficient, resource) = match raw.split_once('*') {
                Some((coef, res)) => {
                    let coef: f64 = coef.trim().parse().map_err(|_| {
                        SchedError::invalid_argument(format!("bad coefficient in '{raw}'"))
                    })?;
                    (coef, res.trim())
                }
                None => (1.0, raw),
            };
            if resource.is_empty() || resource.contains(char::is_whitespace) {
                return Err(SchedError::invalid_argument(format!(
                    "bad resource name in '{raw}'"
                )));
            }
            terms.push(Term {
                coefficient,
                resource: resource.to_string(),
            });
        }
        Ok(Self { terms })
    }

    pub fn evaluate(&self, unit: &SchedulableUnit) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coefficient * resource_value(unit, &t.resource))
            .sum()
    }
}

impl fmt::Display for UsageFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if t.coefficient == 1.0 {
                write!(f, "{}", t.resource)?;
            } else {
                write!(f, "{}*{}", t.coefficient, t.resource)?;
            }
        }
        Ok(())
    }
}

fn resource_value(unit: &SchedulableUnit, resource: &str) -> f64 {
    let request = |name: &str| unit.request(name).map(|r| r.amount).unwrap_or(0.0);
    match resource {
        WALLTIME => unit.duration as f64,
        CPUT => request(NCPUS) * unit.duration as f64,
        other => request(other),
    }
}
