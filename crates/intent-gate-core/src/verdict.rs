//! Verdicts, classifications and the structured violation behind each denial.

use crate::classify::{ActionClass, CommandClass};
use crate::containment::ResolvedTarget;
use crate::merge::EffectiveConstraints;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rule that determined a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    // Allow
    ReadOnly,
    Authorized,

    // Deny
    UnknownCommand,
    MissingIntent,
    MissingSignature,
    Expired,
    ScopeMismatch,
    ActionNotAllowed,
    MalformedIntentRecord,
    MalformedPolicy,
    PathEscape,
    SymlinkEscape,
    DenyGlobMatch,
    MaxFilesExceeded,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "READ_ONLY",
            Self::Authorized => "AUTHORIZED",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::MissingIntent => "MISSING_INTENT",
            Self::MissingSignature => "MISSING_SIGNATURE",
            Self::Expired => "EXPIRED",
            Self::ScopeMismatch => "SCOPE_MISMATCH",
            Self::ActionNotAllowed => "ACTION_NOT_ALLOWED",
            Self::MalformedIntentRecord => "MALFORMED_INTENT_RECORD",
            Self::MalformedPolicy => "MALFORMED_POLICY",
            Self::PathEscape => "PATH_ESCAPE",
            Self::SymlinkEscape => "SYMLINK_ESCAPE",
            Self::DenyGlobMatch => "DENY_GLOB_MATCH",
            Self::MaxFilesExceeded => "MAX_FILES_EXCEEDED",
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            Self::ReadOnly | Self::Authorized => Verdict::Allow,
            _ => Verdict::Deny,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a path argument failed the lexical or containment checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeKind {
    /// `/`, `.`, `..`, `~` or any spelling of the sandbox root as a direct target.
    DangerousTarget,
    /// `~/...`, which the shell would have expanded outside the sandbox.
    HomeRelative,
    AbsoluteOutsideRoot,
    /// `sandbox/foo` while already working inside `sandbox`.
    SandboxSelfReference,
    /// Resolved real path lies outside the root.
    OutsideRoot,
    /// Symlink chain too long or cyclic.
    SymlinkLoop,
    Unresolvable { error: String },
}

/// Structured detail of the rule that fired. Everything a human needs to
/// understand a denial is derived from this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    UnknownCommand {
        program: String,
    },
    MalformedPolicy {
        error: String,
    },
    MissingIntent {
        program: String,
        required: ActionClass,
    },
    MalformedIntentRecord {
        error: String,
    },
    MissingSignature,
    ExpiryUnreadable {
        raw: Option<String>,
    },
    Expired {
        expires_at: DateTime<Utc>,
        evaluated_at: DateTime<Utc>,
    },
    ScopeMismatch {
        declared: Option<String>,
        resolved: Option<String>,
        sandbox_root: String,
    },
    ActionNotAllowed {
        required: ActionClass,
        allowed: Vec<ActionClass>,
    },
    PathEscape {
        argument: String,
        resolved: Option<String>,
        kind: EscapeKind,
    },
    SymlinkEscape {
        argument: String,
        resolved: Option<String>,
        kind: EscapeKind,
    },
    DenyGlobMatch {
        argument: String,
        pattern: String,
        matched: String,
    },
    InvalidDenyGlob {
        pattern: String,
        error: String,
    },
    MaxFilesExceeded {
        count: u64,
        max: u64,
    },
}

impl Violation {
    pub fn classification(&self) -> Classification {
        match self {
            Self::UnknownCommand { .. } => Classification::UnknownCommand,
            Self::MalformedPolicy { .. } => Classification::MalformedPolicy,
            Self::MissingIntent { .. } => Classification::MissingIntent,
            Self::MalformedIntentRecord { .. } => Classification::MalformedIntentRecord,
            Self::MissingSignature => Classification::MissingSignature,
            Self::ExpiryUnreadable { .. } | Self::Expired { .. } => Classification::Expired,
            Self::ScopeMismatch { .. } => Classification::ScopeMismatch,
            Self::ActionNotAllowed { .. } => Classification::ActionNotAllowed,
            Self::PathEscape { .. } => Classification::PathEscape,
            Self::SymlinkEscape { .. } => Classification::SymlinkEscape,
            Self::DenyGlobMatch { .. } | Self::InvalidDenyGlob { .. } => {
                Classification::DenyGlobMatch
            }
            Self::MaxFilesExceeded { .. } => Classification::MaxFilesExceeded,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand { program } if program.is_empty() => {
                write!(f, "no command provided (default deny)")
            }
            Self::UnknownCommand { program } => {
                write!(f, "unknown command '{program}' (default deny)")
            }
            Self::MalformedPolicy { error } => write!(f, "policy unavailable: {error}"),
            Self::MissingIntent { program, required } => write!(
                f,
                "'{program}' requires an intent record granting '{required}'"
            ),
            Self::MalformedIntentRecord { error } => {
                write!(f, "intent record is malformed: {error}")
            }
            Self::MissingSignature => write!(f, "intent record missing signature"),
            Self::ExpiryUnreadable { raw: Some(raw) } => {
                write!(f, "intent record expiry '{raw}' is not a parseable datetime")
            }
            Self::ExpiryUnreadable { raw: None } => {
                write!(f, "intent record has no expiry")
            }
            Self::Expired {
                expires_at,
                evaluated_at,
            } => write!(
                f,
                "intent record expired at {} (evaluated at {})",
                expires_at.to_rfc3339(),
                evaluated_at.to_rfc3339()
            ),
            Self::ScopeMismatch {
                declared: None,
                sandbox_root,
                ..
            } => write!(f, "intent record has no scope.root (sandbox={sandbox_root})"),
            Self::ScopeMismatch {
                declared: Some(declared),
                resolved: None,
                sandbox_root,
            } => write!(
                f,
                "scope.root '{declared}' cannot be resolved (sandbox={sandbox_root})"
            ),
            Self::ScopeMismatch {
                resolved: Some(resolved),
                sandbox_root,
                ..
            } => write!(
                f,
                "scope.root mismatch (record={resolved} != sandbox={sandbox_root})"
            ),
            Self::ActionNotAllowed { required, .. } => {
                write!(f, "intent record does not allow action '{required}'")
            }
            Self::PathEscape { argument, kind, .. } | Self::SymlinkEscape { argument, kind, .. } => {
                match kind {
                    EscapeKind::DangerousTarget => {
                        write!(f, "dangerous target '{argument}' not allowed")
                    }
                    EscapeKind::HomeRelative => {
                        write!(f, "argument '{argument}' is home-relative")
                    }
                    EscapeKind::AbsoluteOutsideRoot => write!(
                        f,
                        "absolute path '{argument}' is outside the sandbox root"
                    ),
                    EscapeKind::SandboxSelfReference => write!(
                        f,
                        "argument '{argument}' re-enters the sandbox by name; use paths relative to the sandbox root"
                    ),
                    EscapeKind::OutsideRoot => {
                        let via = if matches!(self, Self::SymlinkEscape { .. }) {
                            " via symlink"
                        } else {
                            ""
                        };
                        write!(f, "argument '{argument}' resolves outside sandbox{via}")
                    }
                    EscapeKind::SymlinkLoop => {
                        write!(f, "argument '{argument}' has a symlink loop")
                    }
                    EscapeKind::Unresolvable { error } => {
                        write!(f, "argument '{argument}' cannot be resolved: {error}")
                    }
                }
            }
            Self::DenyGlobMatch {
                argument, pattern, ..
            } => write!(f, "argument '{argument}' matches deny_glob '{pattern}'"),
            Self::InvalidDenyGlob { pattern, error } => {
                write!(f, "deny_glob '{pattern}' is invalid: {error}")
            }
            Self::MaxFilesExceeded { count, max } => write!(
                f,
                "command touches too many files ({count} > max_files={max})"
            ),
        }
    }
}

/// The engine's output for one command. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub classification: Classification,
    pub reason: String,
    pub command_class: Option<CommandClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_constraints: Option<EffectiveConstraints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<ResolvedTarget>,
    pub evaluated_at: DateTime<Utc>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }
}
