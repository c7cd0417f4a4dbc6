//! Command classification.
//!
//! | Category | Source | Record needed |
//! |----------|--------|---------------|
//! | `read_only` | `read_only_commands` | no |
//! | `mutating(class)` | `mutating_commands` | yes |
//! | `unknown` | anything else | always denied |
//!
//! The table is closed: a program name that is not listed is `unknown`. Names
//! are matched exactly, so `/bin/rm` is not `rm`.

use crate::policy::Policy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action class a mutating program requires, e.g. `delete` or `copy`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionClass(String);

impl ActionClass {
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into().trim().to_string())
    }

    /// Class implied for a program listed under the legacy
    /// `requires_intent_commands` key.
    pub fn builtin_for(program: &str) -> Self {
        let class = match program {
            "rm" => "delete",
            "mv" => "move_or_rename",
            "cp" => "copy",
            "sed" | "truncate" => "write_over_existing",
            _ => "mutate",
        };
        Self::new(class)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", content = "action_class", rename_all = "snake_case")]
pub enum CommandClass {
    ReadOnly,
    Mutating(ActionClass),
    Unknown,
}

impl CommandClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::Mutating(_) => "mutating",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify `program` against the policy's closed table.
pub fn classify(policy: &Policy, program: &str) -> CommandClass {
    if let Some(class) = policy.mutating_commands.get(program) {
        return CommandClass::Mutating(class.clone());
    }
    if policy.read_only_commands.contains(program) {
        return CommandClass::ReadOnly;
    }
    CommandClass::Unknown
}
