//! Append-only NDJSON audit trail.
//!
//! Every invocation appends one `decision` event. A command that actually runs
//! appends an `execution` event after it, linked by `decision_id`. Each event is
//! self-contained: it names the policy and record it was decided on, with
//! content digests, so a decision can be replayed offline.

use crate::engine::CommandRequest;
use crate::merge::EffectiveConstraints;
use crate::record::digest_bytes;
use crate::verdict::{Classification, Decision, Verdict, Violation};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit log line {line} is not a valid event: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// An input file as seen at decision time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRef {
    pub path: Option<String>,
    /// `sha256:<hex>` of the file content; `None` when it could not be read.
    pub digest: Option<String>,
}

impl InputRef {
    /// Describe the file at `path`, digesting its current content.
    pub fn file(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        Self {
            path: Some(path.display().to_string()),
            digest: std::fs::read(path).ok().map(|b| digest_bytes(&b)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub event_id: String,
    pub timestamp: String,
    pub policy: InputRef,
    pub intent: InputRef,
    pub sandbox_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Command as requested, program first.
    pub cmd: Vec<String>,
    pub verdict: Verdict,
    pub classification: Classification,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_constraints: Option<EffectiveConstraints>,
    pub evaluated_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl DecisionEvent {
    pub fn new(decision: &Decision, request: &CommandRequest, sandbox_root: &Path) -> Self {
        let mut cmd = Vec::with_capacity(request.args.len() + 1);
        if !request.program.is_empty() {
            cmd.push(request.program.clone());
        }
        cmd.extend(request.args.iter().cloned());

        Self {
            event_id: format!("evt_decision_{}", uuid::Uuid::new_v4()),
            timestamp: now_rfc3339(),
            policy: InputRef::default(),
            intent: InputRef::default(),
            sandbox_root: sandbox_root.display().to_string(),
            workdir: request.workdir.as_ref().map(|w| w.display().to_string()),
            cmd,
            verdict: decision.verdict,
            classification: decision.classification,
            reason: decision.reason.clone(),
            violation: decision.violation.clone(),
            effective_constraints: decision.effective_constraints.clone(),
            evaluated_at: decision.evaluated_at,
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: InputRef) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_intent(mut self, intent: InputRef) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Rebuild the request this decision was made for.
    pub fn request(&self) -> CommandRequest {
        CommandRequest::from_argv(&self.cmd, self.workdir.as_ref().map(PathBuf::from))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub event_id: String,
    pub timestamp: String,
    pub decision_id: String,
    /// Command as executed, after glob expansion.
    pub cmd: Vec<String>,
    pub workdir: String,
    pub returncode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub stdout_preview: String,
    pub stderr_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Decision(DecisionEvent),
    Execution(ExecutionEvent),
}

impl AuditEvent {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Decision(e) => &e.event_id,
            Self::Execution(e) => &e.event_id,
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Handle on an audit log file. The file is opened per append.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line.
    ///
    /// The line is written with one `write_all` on an `O_APPEND` handle, so
    /// concurrent appenders never interleave partial lines.
    pub fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let io_err = |source: std::io::Error| AuditError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(&line).map_err(io_err)?;
        Ok(())
    }

    /// Read every event with its 1-based line number. Blank lines are skipped.
    pub fn read_events(&self) -> Result<Vec<(usize, AuditEvent)>, AuditError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| AuditError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        let mut events = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(line).map_err(|source| AuditError::Malformed {
                line: idx + 1,
                source,
            })?;
            events.push((idx + 1, event));
        }
        Ok(events)
    }

    /// The decision with `event_id`, or the last decision in the log.
    pub fn find_decision(&self, event_id: Option<&str>) -> Result<Option<DecisionEvent>, AuditError> {
        let mut decisions = self
            .read_events()?
            .into_iter()
            .filter_map(|(_, e)| match e {
                AuditEvent::Decision(d) => Some(d),
                AuditEvent::Execution(_) => None,
            });
        Ok(match event_id {
            Some(id) => decisions.find(|d| d.event_id == id),
            None => decisions.last(),
        })
    }
}
