//! Policy loading for the intent gate.
//!
//! A policy is the operator-owned half of every decision: which programs are
//! read-only, which mutate and under what action class, and the deny-globs and
//! file-count ceiling that apply even when an intent record says otherwise.
//!
//! # Example
//!
//! ```yaml
//! version: 0.1
//! read_only_commands: [ls, cat, grep]
//! mutating_commands:
//!   rm: delete
//!   mv: move_or_rename
//! default_deny_globs: ["**/.git/**", "**/*.pem"]
//! default_max_files: 50
//! ```
//!
//! Older policies spell the keys `deny_globs_default`, `max_files_default` and
//! list mutating programs under `requires_intent_commands`; both spellings load
//! into the same [`Policy`].

use crate::classify::ActionClass;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Default ceiling on in-scope arguments when neither policy nor record sets one.
pub const DEFAULT_MAX_FILES: u64 = 50;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("program '{program}' is listed as both read-only and mutating")]
    AmbiguousProgram { program: String },

    #[error("program name must not be empty")]
    EmptyProgram,
}

/// Immutable gate policy, loaded once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub default_deny_globs: BTreeSet<String>,
    pub default_max_files: u64,
    pub read_only_commands: BTreeSet<String>,
    pub mutating_commands: BTreeMap<String, ActionClass>,
}

/// On-disk shape, tolerant of the legacy key spellings.
#[derive(Debug, Deserialize, Default)]
struct PolicyDocument {
    #[serde(default, alias = "deny_globs_default")]
    default_deny_globs: Vec<String>,
    #[serde(default, alias = "max_files_default")]
    default_max_files: Option<u64>,
    #[serde(default)]
    read_only_commands: Vec<String>,
    #[serde(default)]
    mutating_commands: BTreeMap<String, String>,
    #[serde(default)]
    requires_intent_commands: Vec<String>,
}

impl Policy {
    /// Load policy from a YAML file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, PolicyError> {
        // An empty file deserializes to unit; treat it as an empty document.
        let doc: PolicyDocument = if content.trim().is_empty() {
            PolicyDocument::default()
        } else {
            serde_yaml::from_str(content)?
        };
        Self::from_document(doc)
    }

    fn from_document(doc: PolicyDocument) -> Result<Self, PolicyError> {
        let read_only_commands: BTreeSet<String> = doc
            .read_only_commands
            .into_iter()
            .map(|p| p.trim().to_string())
            .collect();

        let mut mutating_commands = BTreeMap::new();
        for program in doc.requires_intent_commands {
            let program = program.trim().to_string();
            let class = ActionClass::builtin_for(&program);
            mutating_commands.insert(program, class);
        }
        // Explicit table entries win over the legacy list.
        for (program, class) in doc.mutating_commands {
            mutating_commands.insert(program.trim().to_string(), ActionClass::new(class));
        }

        if read_only_commands.contains("") || mutating_commands.contains_key("") {
            return Err(PolicyError::EmptyProgram);
        }
        if let Some(program) = read_only_commands
            .iter()
            .find(|p| mutating_commands.contains_key(p.as_str()))
        {
            return Err(PolicyError::AmbiguousProgram {
                program: program.clone(),
            });
        }

        Ok(Self {
            default_deny_globs: doc.default_deny_globs.into_iter().collect(),
            default_max_files: doc.default_max_files.unwrap_or(DEFAULT_MAX_FILES),
            read_only_commands,
            mutating_commands,
        })
    }

    /// Get rule counts for display.
    pub fn rule_counts(&self) -> (usize, usize, usize) {
        (
            self.read_only_commands.len(),
            self.mutating_commands.len(),
            self.default_deny_globs.len(),
        )
    }
}

/// Built-in policy, identical to the shipped `policies/policy.yaml`.
pub fn builtin_default() -> Policy {
    let mutating = [
        ("rm", "delete"),
        ("mv", "move_or_rename"),
        ("cp", "copy"),
        ("sed", "write_over_existing"),
        ("truncate", "write_over_existing"),
    ];
    Policy {
        default_deny_globs: ["**/.git/**", "**/*.key", "**/*.pem"]
            .into_iter()
            .map(String::from)
            .collect(),
        default_max_files: DEFAULT_MAX_FILES,
        // `find` stays off: `-delete` and `-exec` mutate.
        read_only_commands: ["ls", "cat", "grep"]
            .into_iter()
            .map(String::from)
            .collect(),
        mutating_commands: mutating
            .into_iter()
            .map(|(p, c)| (p.to_string(), ActionClass::new(c)))
            .collect(),
    }
}
