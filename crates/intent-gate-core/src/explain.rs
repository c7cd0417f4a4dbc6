//! Denial context snapshots.
//!
//! A snapshot is derived from a finished [`Decision`] through a shared
//! reference. It adds the field that failed, what was observed, what the rule
//! expected and how an operator could resolve it. It never feeds back into
//! the verdict.

use crate::verdict::{Classification, Decision, EscapeKind, Violation};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialSnapshot {
    pub classification: Classification,
    pub reason: String,
    pub field: String,
    pub observed: String,
    pub expected: String,
    pub remedy: String,
}

impl DenialSnapshot {
    /// Snapshot for a denied decision; `None` when the decision allowed.
    pub fn from_decision(decision: &Decision) -> Option<Self> {
        let violation = decision.violation.as_ref()?;
        Some(Self::from_violation(violation, &decision.reason))
    }

    pub fn from_violation(violation: &Violation, reason: &str) -> Self {
        let (field, observed, expected, remedy) = describe(violation);
        Self {
            classification: violation.classification(),
            reason: reason.to_string(),
            field: field.to_string(),
            observed,
            expected,
            remedy: remedy.to_string(),
        }
    }
}

fn describe(v: &Violation) -> (&'static str, String, String, &'static str) {
    match v {
        Violation::UnknownCommand { program } => (
            "command",
            display_or_empty(program),
            "a program listed in the policy".into(),
            "add the program to the policy or use a listed one",
        ),
        Violation::MalformedPolicy { error } => (
            "policy",
            error.clone(),
            "a readable, valid policy document".into(),
            "fix the policy file",
        ),
        Violation::MissingIntent { required, .. } => (
            "intent",
            "no intent record".into(),
            format!("a record granting '{required}'"),
            "author an intent record for this sandbox",
        ),
        Violation::MalformedIntentRecord { error } => (
            "intent",
            error.clone(),
            "a front-matter or heading record with known fields".into(),
            "regenerate the intent record",
        ),
        Violation::MissingSignature => (
            "signature",
            "empty".into(),
            "a non-empty attestation".into(),
            "sign the intent record",
        ),
        Violation::ExpiryUnreadable { raw } => (
            "expires_at",
            raw.clone().unwrap_or_else(|| "(missing)".into()),
            "an RFC 3339 timestamp".into(),
            "set a valid expiry on the intent record",
        ),
        Violation::Expired {
            expires_at,
            evaluated_at,
        } => (
            "expires_at",
            expires_at.to_rfc3339(),
            format!("later than {}", evaluated_at.to_rfc3339()),
            "issue a fresh intent record",
        ),
        Violation::ScopeMismatch {
            declared,
            resolved,
            sandbox_root,
        } => (
            "scope.root",
            resolved
                .clone()
                .or_else(|| declared.clone())
                .unwrap_or_else(|| "(missing)".into()),
            sandbox_root.clone(),
            "scope the intent record to this sandbox root",
        ),
        Violation::ActionNotAllowed { required, allowed } => (
            "actions_allowed",
            format!(
                "[{}]",
                allowed
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            format!("contains '{required}'"),
            "request an intent record that grants this action",
        ),
        Violation::PathEscape {
            argument,
            resolved,
            kind,
        }
        | Violation::SymlinkEscape {
            argument,
            resolved,
            kind,
        } => (
            "argument",
            match resolved {
                Some(r) => format!("{argument} -> {r}"),
                None => argument.clone(),
            },
            "a path inside the sandbox root".into(),
            escape_remedy(kind),
        ),
        Violation::DenyGlobMatch {
            matched, pattern, ..
        } => (
            "argument",
            matched.clone(),
            format!("no match for '{pattern}'"),
            "leave protected files alone",
        ),
        Violation::InvalidDenyGlob { pattern, error } => (
            "deny_globs",
            format!("{pattern}: {error}"),
            "valid glob patterns".into(),
            "fix the pattern in the policy or intent record",
        ),
        Violation::MaxFilesExceeded { count, max } => (
            "max_files",
            count.to_string(),
            format!("at most {max}"),
            "split the command or raise max_files in the intent record",
        ),
    }
}

fn escape_remedy(kind: &EscapeKind) -> &'static str {
    match kind {
        EscapeKind::DangerousTarget => "name the files explicitly",
        EscapeKind::HomeRelative | EscapeKind::AbsoluteOutsideRoot => {
            "use paths relative to the sandbox root"
        }
        EscapeKind::SandboxSelfReference => "drop the sandbox directory prefix",
        EscapeKind::OutsideRoot => "target files inside the sandbox only",
        EscapeKind::SymlinkLoop => "remove the symlink cycle",
        EscapeKind::Unresolvable { .. } => "check the path exists and is accessible",
    }
}

fn display_or_empty(program: &str) -> String {
    if program.is_empty() {
        "(empty)".into()
    } else {
        program.to_string()
    }
}

impl fmt::Display for DenialSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DENY {}: {}", self.classification, self.reason)?;
        writeln!(f, "  field:    {}", self.field)?;
        writeln!(f, "  observed: {}", self.observed)?;
        writeln!(f, "  expected: {}", self.expected)?;
        write!(f, "  remedy:   {}", self.remedy)
    }
}
