//! Heading-based records.
//!
//! ```text
//! ## Scope
//! root: /srv/sandbox
//! expires: 2025-01-02T12:00:00Z
//!
//! ## Allowed action classes
//! - delete
//!
//! ## Constraints
//! - max_files: 20
//! - **/*.pem
//!
//! ## Signature
//! signature: Operator
//! ```
//!
//! `key: value` lines are recognised anywhere; list items are only meaningful
//! under the two headings above.

use super::{RawFields, RecordError};

const ACTIONS_HEADING: &str = "allowed action classes";
const CONSTRAINTS_HEADING: &str = "constraints";

pub(super) fn parse(text: &str) -> Result<RawFields, RecordError> {
    let mut raw = RawFields::default();
    let mut section: Option<String> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(heading) = trimmed.strip_prefix("## ") {
            section = Some(heading.trim().to_ascii_lowercase());
            continue;
        }
        if trimmed.starts_with('#') {
            section = None;
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            let item = item.trim();
            match section.as_deref() {
                Some(ACTIONS_HEADING) => raw.actions.push(item.to_string()),
                Some(CONSTRAINTS_HEADING) => constraint_item(&mut raw, item)?,
                _ => {}
            }
            continue;
        }

        if let Some((key, value)) = trimmed.split_once(':') {
            assign(&mut raw, key.trim(), value.trim())?;
        }
    }

    Ok(raw)
}

fn constraint_item(raw: &mut RawFields, item: &str) -> Result<(), RecordError> {
    if let Some((key, value)) = item.split_once(':') {
        if key.trim() == "max_files" {
            raw.max_files = Some(parse_max_files(value)?);
            return Ok(());
        }
    }
    raw.deny_globs.push(item.to_string());
    Ok(())
}

fn assign(raw: &mut RawFields, key: &str, value: &str) -> Result<(), RecordError> {
    // First occurrence wins, matching how a reader scans the document.
    let slot = match key {
        "id" => &mut raw.id,
        "created" | "created_at" | "created_utc" => &mut raw.created_at,
        "expires" | "expires_at" | "expires_utc" => &mut raw.expires_at,
        "root" => &mut raw.scope_root,
        "signature" => &mut raw.signature,
        "max_files" => {
            if raw.max_files.is_none() {
                raw.max_files = Some(parse_max_files(value)?);
            }
            return Ok(());
        }
        _ => return Ok(()),
    };
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
    Ok(())
}

fn parse_max_files(value: &str) -> Result<u64, RecordError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| RecordError::InvalidField {
            field: "constraints.max_files",
            message: format!("'{}': {}", value.trim(), e),
        })
}
