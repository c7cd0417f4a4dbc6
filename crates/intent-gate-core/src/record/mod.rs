//! Authorization ("intent") records.
//!
//! Records arrive in one of two encodings:
//!
//! | Format | Marker | Producer |
//! |--------|--------|----------|
//! | [`RecordFormat::FrontMatter`] | first non-blank line is `---` | current authoring tool |
//! | [`RecordFormat::LegacyHeadings`] | anything else | older hand-written records |
//!
//! Each format has its own parser; both yield the same canonical
//! [`AuthorizationRecord`]. The gate never writes or mutates a record.

mod frontmatter;
mod legacy;
pub mod time;
pub mod validate;

use crate::classify::ActionClass;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

pub use validate::{validate_record, ValidationFailure};

/// Marker line that opens (and closes) a front-matter record.
pub const FRONT_MATTER_MARKER: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    FrontMatter,
    LegacyHeadings,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("cannot read intent record {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("intent record front matter is missing its closing '---'")]
    UnclosedFrontMatter,

    #[error("intent record front matter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("intent record front matter must be a mapping")]
    NotAMapping,

    #[error("intent record field '{field}' is invalid: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("intent record contains none of the expected fields")]
    Empty,
}

/// Record constraints; every field is optional and merged with policy defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordConstraints {
    pub max_files: Option<u64>,
    pub deny_globs: BTreeSet<String>,
}

/// Canonical authorization record, independent of the encoding it came from.
///
/// Fields are kept as written; interpretation (timestamp parsing, path
/// canonicalization) happens during validation so that a bad value is reported
/// under its own classification instead of as a malformed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationRecord {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub expires_at: Option<String>,
    /// Plain attestation string. Never verified cryptographically.
    pub signature: String,
    pub scope_root: Option<String>,
    pub actions_allowed: BTreeSet<ActionClass>,
    pub constraints: RecordConstraints,
    pub format: RecordFormat,
    /// `sha256:<hex>` of the raw document bytes.
    pub digest: String,
}

impl AuthorizationRecord {
    /// Read and parse a record from disk.
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = std::fs::read_to_string(path).map_err(|source| RecordError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse a record, dispatching on the leading marker.
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let format = detect_format(text);
        let fields = match format {
            RecordFormat::FrontMatter => frontmatter::parse(text)?,
            RecordFormat::LegacyHeadings => legacy::parse(text)?,
        };
        if fields.is_empty() {
            return Err(RecordError::Empty);
        }
        Ok(fields.into_record(format, digest_text(text)))
    }

    pub fn allows(&self, class: &ActionClass) -> bool {
        self.actions_allowed.contains(class)
    }
}

pub fn detect_format(text: &str) -> RecordFormat {
    let first = text.lines().find(|l| !l.trim().is_empty());
    match first {
        Some(line) if line.trim() == FRONT_MATTER_MARKER => RecordFormat::FrontMatter,
        _ => RecordFormat::LegacyHeadings,
    }
}

/// `sha256:<hex>` content digest, as recorded in audit events.
pub fn digest_text(text: &str) -> String {
    digest_bytes(text.as_bytes())
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Fields collected by either parser before canonicalization.
#[derive(Debug, Default)]
pub(crate) struct RawFields {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub expires_at: Option<String>,
    pub signature: Option<String>,
    pub scope_root: Option<String>,
    pub actions: Vec<String>,
    pub max_files: Option<u64>,
    pub deny_globs: Vec<String>,
}

impl RawFields {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.created_at.is_none()
            && self.expires_at.is_none()
            && self.signature.is_none()
            && self.scope_root.is_none()
            && self.actions.is_empty()
            && self.max_files.is_none()
            && self.deny_globs.is_empty()
    }

    fn into_record(self, format: RecordFormat, digest: String) -> AuthorizationRecord {
        AuthorizationRecord {
            id: non_empty(self.id),
            created_at: non_empty(self.created_at),
            expires_at: non_empty(self.expires_at),
            signature: self
                .signature
                .map(|s| clean_scalar(&s))
                .unwrap_or_default(),
            scope_root: non_empty(self.scope_root),
            actions_allowed: self
                .actions
                .iter()
                .map(|a| clean_scalar(a))
                .filter(|a| !a.is_empty())
                .map(ActionClass::new)
                .collect(),
            constraints: RecordConstraints {
                max_files: self.max_files,
                deny_globs: self
                    .deny_globs
                    .iter()
                    .map(|g| clean_scalar(g))
                    .filter(|g| !g.is_empty())
                    .collect(),
            },
            format,
            digest,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| clean_scalar(&v)).filter(|v| !v.is_empty())
}

/// Trim whitespace and one layer of matching quotes.
pub(crate) fn clean_scalar(value: &str) -> String {
    let v = value.trim();
    let unquoted = v
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| v.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(v);
    unquoted.trim().to_string()
}
