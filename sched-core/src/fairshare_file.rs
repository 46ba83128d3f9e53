// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Fairshare persistence: the text resource-group file that shapes the
//! tree, and the binary usage file that carries usage across restarts.
//!
//! Usage file layout (little endian):
//!
//! ```text
//! magic    [u8; 4]   "FSUS"
//! version  i32       1 or 2
//! decay    i64       version 2 only: time of the last decay
//! records  { name: [u8; 50] NUL padded, usage: f64 } ...
//! ```
//!
//! A file that does not start with the magic is a legacy file made of
//! records only.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sched_common::constants::{
    FAIRSHARE_MIN_USAGE, FAIRSHARE_ROOT_KEYWORD, USAGE_MAGIC, USAGE_NAME_WIDTH, USAGE_RECORD_SIZE,
    USAGE_VERSION,
};
use sched_common::status::{SchedError, SchedResult};
use tracing::{debug, info, warn};

use crate::fairshare::{FairshareTree, GroupId};

// ─── Resource-group file ──────────────────────────────────────────

/// Build a tree from resource-group text: one `name cresgroup parent shares`
/// per line, `#` comments and blank lines ignored. A parent of `root`
/// attaches to the root; any other parent must appear on an earlier line.
pub fn parse_resource_groups(text: &str, unknown_shares: i32) -> SchedResult<FairshareTree> {
    let mut tree = FairshareTree::new(unknown_shares);

    for (lineno, line) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [name, cresgroup, parent, shares] = fields[..] else {
            return Err(SchedError::invalid_argument(format!(
                "resource group line {lineno}: expected 'name cresgroup parent shares'"
            )));
        };
        let cresgroup: i32 = cresgroup.parse().map_err(|_| {
            SchedError::invalid_argument(format!(
                "resource group line {lineno}: bad group id '{cresgroup}'"
            ))
        })?;
        let shares: i32 = shares.parse().map_err(|_| {
            SchedError::invalid_argument(format!(
                "resource group line {lineno}: bad shares '{shares}'"
            ))
        })?;
        let parent_id = if parent == FAIRSHARE_ROOT_KEYWORD {
            GroupId::ROOT
        } else {
            tree.find(parent).ok_or_else(|| {
                SchedError::not_found(format!(
                    "resource group line {lineno}: unknown parent '{parent}'"
                ))
            })?
        };
        tree.add_group(name, cresgroup, shares, parent_id)
            .map_err(|e| {
                SchedError::new(e.code, format!("resource group line {lineno}: {}", e.message))
            })?;
    }

    tree.calc_percentages();
    Ok(tree)
}

/// Read and parse a resource-group file. A missing file yields a tree with
/// only the root and the `unknown` bucket.
pub fn load_resource_groups(path: &Path, unknown_shares: i32) -> SchedResult<FairshareTree> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let tree = parse_resource_groups(&text, unknown_shares)?;
            info!(path = %path.display(), groups = tree.len(), "loaded resource groups");
            Ok(tree)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "no resource group file, all entities are unknown");
            Ok(FairshareTree::new(unknown_shares))
        }
        Err(e) => Err(SchedError::io_error(format!("{}: {e}", path.display()))),
    }
}

// ─── Usage file ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub name: String,
    pub usage: f64,
}

/// Decoded contents of a usage file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageFile {
    /// 0 for a legacy headerless file.
    pub version: i32,
    pub last_decay: Option<i64>,
    pub records: Vec<UsageRecord>,
}

/// Encode the usage of every leaf that differs from the floor.
pub fn encode_usage(tree: &FairshareTree) -> Bytes {
    let mut buf = BytesMut::with_capacity(16 + tree.len() * USAGE_RECORD_SIZE);
    buf.put_slice(&USAGE_MAGIC);
    buf.put_i32_le(USAGE_VERSION);
    buf.put_i64_le(tree.last_decay.unwrap_or(0));

    for id in tree.leaves() {
        let g = tree.get(id);
        if g.usage == FAIRSHARE_MIN_USAGE {
            continue;
        }
        let name = g.name.as_bytes();
        if name.len() >= USAGE_NAME_WIDTH {
            warn!(entity = %g.name, "entity name too long for the usage file, skipped");
            continue;
        }
        buf.put_slice(name);
        buf.put_bytes(0, USAGE_NAME_WIDTH - name.len());
        buf.put_f64_le(g.usage);
    }
    buf.freeze()
}

pub fn decode_usage(data: &[u8]) -> SchedResult<UsageFile> {
    let mut buf = data;
    let mut file = UsageFile::default();

    if buf.len() >= USAGE_MAGIC.len() && buf[..USAGE_MAGIC.len()] == USAGE_MAGIC {
        buf.advance(USAGE_MAGIC.len());
        if buf.remaining() < 4 {
            return Err(SchedError::corrupt_file("usage file header truncated"));
        }
        file.version = buf.get_i32_le();
        match file.version {
            1 => {}
            2 => {
                if buf.remaining() < 8 {
                    return Err(SchedError::corrupt_file("usage file header truncated"));
                }
                file.last_decay = Some(buf.get_i64_le());
            }
            v => {
                return Err(SchedError::corrupt_file(format!(
                    "unsupported usage file version {v}"
                )))
            }
        }
    }

    while buf.remaining() >= USAGE_RECORD_SIZE {
        let raw = &buf[..USAGE_NAME_WIDTH];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(USAGE_NAME_WIDTH);
        let name = String::from_utf8_lossy(&raw[..end]).into_owned();
        buf.advance(USAGE_NAME_WIDTH);
        let usage = buf.get_f64_le();
        if name.is_empty() {
            warn!("usage record with an empty name, skipped");
            continue;
        }
        file.records.push(UsageRecord { name, usage });
    }
    if buf.has_remaining() {
        warn!(bytes = buf.remaining(), "ignoring partial record at end of usage file");
    }
    Ok(file)
}

/// Load decoded usage into the tree, then roll interior usage up from the
/// leaves. With `trim`, records for entities the tree does not already know
/// are dropped instead of being allocated under `unknown`. Returns the
/// number of records applied.
pub fn apply_usage(tree: &mut FairshareTree, file: &UsageFile, trim: bool) -> usize {
    let mut applied = 0;
    for rec in &file.records {
        let id = if trim {
            match tree.find(&rec.name) {
                Some(id) => id,
                None => {
                    debug!(entity = %rec.name, "trimmed entity from usage");
                    continue;
                }
            }
        } else {
            tree.find_or_allocate(&rec.name)
        };
        tree.set_usage(id, rec.usage);
        applied += 1;
    }
    if file.last_decay.is_some() {
        tree.last_decay = file.last_decay;
    }
    tree.rollup_usage();
    applied
}

/// Write the tree's usage to `path` atomically (temp file and rename).
pub fn write_usage(path: &Path, tree: &FairshareTree) -> SchedResult<()> {
    let data = encode_usage(tree);
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), bytes = data.len(), "wrote usage file");
    Ok(())
}

/// Read `path` into the tree. A missing file leaves the tree unchanged.
pub fn read_usage(path: &Path, tree: &mut FairshareTree, trim: bool) -> SchedResult<usize> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no usage file, starting fresh");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };
    let file = decode_usage(&data)?;
    let applied = apply_usage(tree, &file, trim);
    info!(
        path = %path.display(),
        version = file.version,
        records = applied,
        "loaded fairshare usage"
    );
    Ok(applied)
}
