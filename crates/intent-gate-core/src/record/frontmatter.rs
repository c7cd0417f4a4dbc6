//! YAML front-matter records.
//!
//! ```text
//! ---
//! id: IR-20250101-120000Z
//! expires_utc: 2025-01-02T12:00:00Z
//! scope:
//!   root: /srv/sandbox
//! actions_allowed: [delete]
//! constraints:
//!   max_files: 20
//!   deny_globs: ["**/*.pem"]
//! signature: Operator
//! ---
//! free-form notes
//! ```

use super::{RawFields, RecordError, FRONT_MATTER_MARKER};
use serde_yaml::{Mapping, Value};

pub(super) fn parse(text: &str) -> Result<RawFields, RecordError> {
    let block = extract_block(text)?;
    let doc: Value = serde_yaml::from_str(&block)?;
    let map = match doc {
        Value::Null => Mapping::new(),
        Value::Mapping(m) => m,
        _ => return Err(RecordError::NotAMapping),
    };

    let scope = sub_mapping(&map, "scope")?;
    let constraints = sub_mapping(&map, "constraints")?;

    let mut raw = RawFields {
        id: scalar(&map, "id")?,
        created_at: first_scalar(&[(&map, "created_utc"), (&map, "created_at")])?,
        expires_at: first_scalar(&[
            (&map, "expires_utc"),
            (&map, "expires_at"),
            (&scope, "expires"),
            (&map, "expires"),
        ])?,
        signature: scalar(&map, "signature")?,
        scope_root: first_scalar(&[(&scope, "root"), (&map, "root")])?,
        ..Default::default()
    };

    raw.actions = match map.get("actions_allowed").filter(|v| !v.is_null()) {
        Some(v) => string_list("actions_allowed", v)?,
        None => match map.get("actions") {
            Some(v) => string_list("actions", v)?,
            None => Vec::new(),
        },
    };

    raw.deny_globs = match constraints.get("deny_globs").filter(|v| !v.is_null()) {
        Some(v) => string_list("constraints.deny_globs", v)?,
        None => match map.get("deny_globs") {
            Some(v) => string_list("deny_globs", v)?,
            None => Vec::new(),
        },
    };

    raw.max_files = match constraints.get("max_files").filter(|v| !v.is_null()) {
        Some(v) => Some(max_files(v)?),
        None => match map.get("max_files").filter(|v| !v.is_null()) {
            Some(v) => Some(max_files(v)?),
            None => None,
        },
    };

    Ok(raw)
}

/// Return the YAML between the opening and closing marker lines.
fn extract_block(text: &str) -> Result<String, RecordError> {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
    match lines.next() {
        Some(first) if first.trim() == FRONT_MATTER_MARKER => {}
        _ => return Err(RecordError::UnclosedFrontMatter),
    }

    let mut body = Vec::new();
    for line in lines {
        if line.trim() == FRONT_MATTER_MARKER {
            return Ok(body.join("\n"));
        }
        body.push(line);
    }
    Err(RecordError::UnclosedFrontMatter)
}

fn sub_mapping(map: &Mapping, key: &'static str) -> Result<Mapping, RecordError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(m)) => Ok(m.clone()),
        Some(_) => Err(RecordError::InvalidField {
            field: key,
            message: "expected a mapping".to_string(),
        }),
    }
}

fn scalar(map: &Mapping, key: &'static str) -> Result<Option<String>, RecordError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_value(v).map(Some).ok_or(RecordError::InvalidField {
            field: key,
            message: "expected a scalar".to_string(),
        }),
    }
}

fn first_scalar(candidates: &[(&Mapping, &'static str)]) -> Result<Option<String>, RecordError> {
    for (map, key) in candidates {
        if let Some(v) = scalar(map, key)? {
            if !v.trim().is_empty() {
                return Ok(Some(v));
            }
        }
    }
    Ok(None)
}

fn scalar_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(field: &'static str, v: &Value) -> Result<Vec<String>, RecordError> {
    let invalid = || RecordError::InvalidField {
        field,
        message: "expected a string or a list of strings".to_string(),
    };
    match v {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_value(item).ok_or_else(invalid))
            .collect(),
        other => scalar_value(other).map(|s| vec![s]).ok_or_else(invalid),
    }
}

fn max_files(v: &Value) -> Result<u64, RecordError> {
    let parsed = match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RecordError::InvalidField {
        field: "constraints.max_files",
        message: format!("expected a non-negative integer, got {v:?}"),
    })
}
