//! Record validation.
//!
//! Checks run in a fixed order and the first failure decides the
//! classification; there is no partial credit.
//!
//! 1. signature present
//! 2. expiry parseable and strictly in the future
//! 3. scope root canonicalizes to the sandbox root
//! 4. required action class granted

use super::time::parse_timestamp;
use super::AuthorizationRecord;
use crate::classify::ActionClass;
use crate::verdict::Violation;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A validation failure is a [`Violation`] raised by one of the record checks.
pub type ValidationFailure = Violation;

/// Validate `record` for a command requiring `required`, against a sandbox
/// root that the caller has already canonicalized.
pub fn validate_record(
    record: &AuthorizationRecord,
    required: &ActionClass,
    sandbox_root: &Path,
    now: DateTime<Utc>,
) -> Result<(), ValidationFailure> {
    check_signature(record)?;
    check_expiry(record, now)?;
    check_scope(record, sandbox_root)?;
    check_action(record, required)?;
    Ok(())
}

fn check_signature(record: &AuthorizationRecord) -> Result<(), Violation> {
    if record.signature.trim().is_empty() {
        return Err(Violation::MissingSignature);
    }
    Ok(())
}

fn check_expiry(record: &AuthorizationRecord, now: DateTime<Utc>) -> Result<(), Violation> {
    let raw = record.expires_at.as_deref().unwrap_or("");
    let Some(expires_at) = parse_timestamp(raw) else {
        return Err(Violation::ExpiryUnreadable {
            raw: record.expires_at.clone(),
        });
    };
    if expires_at <= now {
        return Err(Violation::Expired {
            expires_at,
            evaluated_at: now,
        });
    }
    Ok(())
}

fn check_scope(record: &AuthorizationRecord, sandbox_root: &Path) -> Result<(), Violation> {
    let mismatch = |resolved: Option<PathBuf>| Violation::ScopeMismatch {
        declared: record.scope_root.clone(),
        resolved: resolved.map(|p| p.display().to_string()),
        sandbox_root: sandbox_root.display().to_string(),
    };

    let Some(declared) = record.scope_root.as_deref() else {
        return Err(mismatch(None));
    };
    let resolved = std::fs::canonicalize(expand_home(declared)).map_err(|_| mismatch(None))?;
    if resolved != sandbox_root {
        return Err(mismatch(Some(resolved)));
    }
    Ok(())
}

fn check_action(record: &AuthorizationRecord, required: &ActionClass) -> Result<(), Violation> {
    if !record.allows(required) {
        return Err(Violation::ActionNotAllowed {
            required: required.clone(),
            allowed: record.actions_allowed.iter().cloned().collect(),
        });
    }
    Ok(())
}

/// Expand a leading `~` from `HOME`; other forms are returned unchanged.
pub(crate) fn expand_home(raw: &str) -> PathBuf {
    let home = || std::env::var_os("HOME").map(PathBuf::from);
    if raw == "~" {
        if let Some(h) = home() {
            return h;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(h) = home() {
            return h.join(rest);
        }
    }
    PathBuf::from(raw)
}
