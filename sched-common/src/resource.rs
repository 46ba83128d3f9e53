// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Resource types: typed quantities on nodes and requests on units.
//!
//! Amounts are `f64`. Sizes are kept in kilobytes. Boolean resources use
//! `1.0` / `0.0`. Infinite availability is [`SCHD_INFINITY`].

use std::fmt;

use crate::constants::SCHD_INFINITY;
use crate::status::{SchedError, SchedResult};

/// Value type of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Long,
    Float,
    Size,
    Boolean,
    String,
}

impl ResourceType {
    /// Numeric and size resources carry amounts that can be summed and compared.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Long | Self::Float | Self::Size)
    }
}

/// A named, typed quantity on a node, queue, server or partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub rtype: ResourceType,
    pub available: f64,
    pub assigned: f64,
    /// Value of a string resource.
    pub str_value: Option<String>,
    /// Name of the node holding the real value of this resource.
    pub indirect: Option<String>,
}

impl Resource {
    pub fn numeric(name: impl Into<String>, available: f64, assigned: f64) -> Self {
        Self {
            name: name.into(),
            rtype: ResourceType::Float,
            available,
            assigned,
            str_value: None,
            indirect: None,
        }
    }

    pub fn size(name: impl Into<String>, available_kb: f64, assigned_kb: f64) -> Self {
        Self {
            rtype: ResourceType::Size,
            ..Self::numeric(name, available_kb, assigned_kb)
        }
    }

    pub fn infinite(name: impl Into<String>) -> Self {
        Self::numeric(name, SCHD_INFINITY, 0.0)
    }

    /// A resource whose value lives on `target_node`.
    pub fn indirect(name: impl Into<String>, target_node: impl Into<String>) -> Self {
        Self {
            indirect: Some(target_node.into()),
            ..Self::numeric(name, 0.0, 0.0)
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.available == SCHD_INFINITY
    }

    pub fn is_indirect(&self) -> bool {
        self.indirect.is_some()
    }

    /// Available minus assigned; infinite stays infinite.
    pub fn unused(&self) -> f64 {
        if self.is_infinite() {
            SCHD_INFINITY
        } else {
            self.available - self.assigned
        }
    }
}

/// A requested amount of a resource attached to a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub name: String,
    pub rtype: ResourceType,
    pub amount: f64,
    pub str_value: Option<String>,
}

impl ResourceRequest {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            rtype: ResourceType::Float,
            amount,
            str_value: None,
        }
    }

    pub fn size(name: impl Into<String>, amount_kb: f64) -> Self {
        Self {
            rtype: ResourceType::Size,
            ..Self::new(name, amount_kb)
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rtype: ResourceType::String,
            amount: 0.0,
            str_value: Some(value.into()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.rtype.is_numeric()
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.str_value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}={}", self.name, self.amount),
        }
    }
}

/// Find a request by resource name.
pub fn find_request<'a>(reqs: &'a [ResourceRequest], name: &str) -> Option<&'a ResourceRequest> {
    reqs.iter().find(|r| r.name == name)
}

/// Find a resource by name.
pub fn find_resource<'a>(resources: &'a [Resource], name: &str) -> Option<&'a Resource> {
    resources.iter().find(|r| r.name == name)
}

/// Parse a resource amount: plain numbers, `unlimited`/`infinity`, or a
/// size with a `b`/`kb`/`mb`/`gb`/`tb`/`pb` suffix (result in kilobytes).
pub fn parse_amount(value: &str) -> SchedResult<f64> {
    let v = value.trim().to_ascii_lowercase();
    if v.is_empty() {
        return Err(SchedError::invalid_argument("empty resource amount"));
    }
    if v == "unlimited" || v == "infinity" {
        return Ok(SCHD_INFINITY);
    }
    if let Ok(n) = v.parse::<f64>() {
        return Ok(n);
    }

    let split = v
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| SchedError::invalid_argument(format!("bad resource amount '{value}'")))?;
    let (num, suffix) = v.split_at(split);
    let base: f64 = num
        .parse()
        .map_err(|_| SchedError::invalid_argument(format!("bad resource amount '{value}'")))?;
    let kb = match suffix {
        "b" => base / 1024.0,
        "kb" | "k" => base,
        "mb" | "m" => base * 1024.0,
        "gb" | "g" => base * 1024.0 * 1024.0,
        "tb" | "t" => base * 1024.0 * 1024.0 * 1024.0,
        "pb" | "p" => base * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => {
            return Err(SchedError::invalid_argument(format!(
                "unknown size suffix in '{value}'"
            )))
        }
    };
    Ok(kb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unused_and_infinite() {
        let r = Resource::numeric("ncpus", 8.0, 3.0);
        assert_eq!(r.unused(), 5.0);
        assert!(!r.is_infinite());

        let inf = Resource::infinite("licenses");
        assert!(inf.is_infinite());
        assert_eq!(inf.unused(), SCHD_INFINITY);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("4").unwrap(), 4.0);
        assert_eq!(parse_amount("2.5").unwrap(), 2.5);
        assert_eq!(parse_amount("1gb").unwrap(), 1024.0 * 1024.0);
        assert_eq!(parse_amount("512MB").unwrap(), 512.0 * 1024.0);
        assert_eq!(parse_amount("unlimited").unwrap(), SCHD_INFINITY);
        assert!(parse_amount("10xb").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_find_request() {
        let reqs = vec![
            ResourceRequest::new("ncpus", 4.0),
            ResourceRequest::size("mem", 2048.0),
        ];
        assert_eq!(find_request(&reqs, "mem").unwrap().amount, 2048.0);
        assert!(find_request(&reqs, "ngpus").is_none());
    }
}
