// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Line format of salt snapshot files.
//!
//! Extended lines have eleven columns:
//!
//! ```text
//! id,lastUpdated,salt,refreshFrom,previousSalt,curKeyId,curKey,curKeySalt,prevKeyId,prevKey,prevKeySalt
//! ```
//!
//! Absent values are empty, and a missing key writes all three of its
//! columns empty. Legacy lines carry only the first three columns.

use std::fmt::Write as _;

use crate::error::{StoreError, StoreResult};
use crate::models::{KeyMaterial, SaltEntry};

const LEGACY_COLUMNS: usize = 3;
const EXTENDED_COLUMNS: usize = 11;

/// Extended form, one line per entry.
pub fn to_csv(entries: &[SaltEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        // whole-second timestamps are written one millisecond later
        let last_updated = if entry.last_updated % 1000 == 0 {
            entry.last_updated + 1
        } else {
            entry.last_updated
        };
        let _ = write!(
            out,
            "{},{},{},{},{}",
            entry.id,
            last_updated,
            entry.current_salt,
            optional(&entry.refresh_from),
            optional(&entry.previous_salt),
        );
        write_key(&mut out, entry.current_key.as_ref());
        write_key(&mut out, entry.previous_key.as_ref());
        out.push('\n');
    }
    out
}

/// Legacy `id,lastUpdated,salt` form.
pub fn to_legacy_csv(entries: &[SaltEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{},{},{}",
            entry.id, entry.last_updated, entry.current_salt
        );
    }
    out
}

/// Parse either form. Blank lines are ignored.
pub fn from_csv(content: &str) -> StoreResult<Vec<SaltEntry>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_line(line.trim_end_matches('\r')).map_err(|reason| {
            StoreError::MalformedContent(format!("salt line {}: {reason}", index + 1))
        }))
        .collect()
}

fn parse_line(line: &str) -> Result<SaltEntry, String> {
    let columns: Vec<&str> = line.split(',').collect();
    match columns.len() {
        LEGACY_COLUMNS => Ok(SaltEntry::new(
            number(columns[0], "id")?,
            number(columns[1], "lastUpdated")?,
            columns[2],
        )),
        EXTENDED_COLUMNS => Ok(SaltEntry {
            id: number(columns[0], "id")?,
            last_updated: number(columns[1], "lastUpdated")?,
            current_salt: columns[2].to_string(),
            refresh_from: optional_number(columns[3], "refreshFrom")?,
            previous_salt: optional_text(columns[4]),
            current_key: key(&columns[5..8])?,
            previous_key: key(&columns[8..11])?,
        }),
        n => Err(format!(
            "expected {LEGACY_COLUMNS} or {EXTENDED_COLUMNS} columns, found {n}"
        )),
    }
}

fn write_key(out: &mut String, key: Option<&KeyMaterial>) {
    match key {
        Some(key) => {
            let _ = write!(out, ",{},{},{}", key.id, optional(&key.key), optional(&key.salt));
        }
        None => out.push_str(",,,"),
    }
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn key(columns: &[&str]) -> Result<Option<KeyMaterial>, String> {
    let Some(id) = optional_number(columns[0], "keyId")? else {
        return Ok(None);
    };
    Ok(Some(KeyMaterial {
        id,
        key: optional_text(columns[1]),
        salt: optional_text(columns[2]),
    }))
}

fn number<T: std::str::FromStr>(value: &str, column: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {column} '{value}'"))
}

fn optional_number<T: std::str::FromStr>(value: &str, column: &str) -> Result<Option<T>, String> {
    if value.is_empty() {
        Ok(None)
    } else {
        number(value, column).map(Some)
    }
}

fn optional_text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
