//! Offline replay of logged decisions.
//!
//! A decision event names its policy and intent record by path and digest.
//! Replay reloads both, refuses to continue if either digest moved, and runs
//! the engine again at the logged evaluation time.

use crate::audit::{AuditError, AuditLog, DecisionEvent, InputRef};
use crate::engine::{deny_malformed_policy, evaluate, RecordInput};
use crate::policy::{builtin_default, Policy};
use crate::verdict::{Classification, Decision, Verdict};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("no decision event found{}", id_suffix(.0))]
    NotFound(Option<String>),

    #[error("{input} changed since the decision was logged (logged {}, now {})", show(.logged), show(.current))]
    InputChanged {
        input: &'static str,
        logged: Option<String>,
        current: Option<String>,
    },
}

fn id_suffix(id: &Option<String>) -> String {
    id.as_deref()
        .map(|id| format!(" with id {id}"))
        .unwrap_or_default()
}

fn show(digest: &Option<String>) -> &str {
    digest.as_deref().unwrap_or("unreadable")
}

/// Verdict, classification and reason of one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub verdict: Verdict,
    pub classification: Classification,
    pub reason: String,
}

impl From<&Decision> for Outcome {
    fn from(d: &Decision) -> Self {
        Self {
            verdict: d.verdict,
            classification: d.classification,
            reason: d.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub event_id: String,
    pub logged: Outcome,
    pub replayed: Outcome,
}

impl ReplayReport {
    pub fn reproduced(&self) -> bool {
        self.logged == self.replayed
    }
}

/// Replay the decision `event_id` (or the last decision) from `log`.
pub fn replay(log: &AuditLog, event_id: Option<&str>) -> Result<ReplayReport, ReplayError> {
    let event = log
        .find_decision(event_id)?
        .ok_or_else(|| ReplayError::NotFound(event_id.map(String::from)))?;
    replay_event(&event)
}

pub fn replay_event(event: &DecisionEvent) -> Result<ReplayReport, ReplayError> {
    let policy_path = verify_input("policy", &event.policy)?;
    let intent_path = verify_input("intent record", &event.intent)?;

    let request = event.request();
    let at = event.evaluated_at;
    debug!(event_id = %event.event_id, %at, "replaying decision");

    let policy = match policy_path {
        Some(path) => Policy::load(&path),
        None => Ok(builtin_default()),
    };
    let evaluation = match policy {
        Ok(policy) => {
            let record = RecordInput::load(intent_path.as_deref());
            evaluate(&policy, &record, Path::new(&event.sandbox_root), &request, at)
        }
        Err(e) => deny_malformed_policy(&e, &request, at),
    };

    Ok(ReplayReport {
        event_id: event.event_id.clone(),
        logged: Outcome {
            verdict: event.verdict,
            classification: event.classification,
            reason: event.reason.clone(),
        },
        replayed: Outcome::from(&evaluation.decision),
    })
}

/// Check the file behind `logged` still has the logged digest.
fn verify_input(input: &'static str, logged: &InputRef) -> Result<Option<PathBuf>, ReplayError> {
    let Some(path) = logged.path.as_deref().map(PathBuf::from) else {
        return Ok(None);
    };
    let current = InputRef::file(Some(&path));
    if current.digest != logged.digest {
        return Err(ReplayError::InputChanged {
            input,
            logged: logged.digest.clone(),
            current: current.digest,
        });
    }
    Ok(Some(path))
}
