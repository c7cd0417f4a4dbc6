//! Decision engine.
//!
//! Flow:
//! 1. Classify the program (unknown denies, read-only allows)
//! 2. Require an intent record for mutating programs
//! 3. Validate the record against the sandbox root
//! 4. Merge policy defaults with record constraints
//! 5. Resolve and check every path argument
//!
//! The engine is a pure function of its inputs plus filesystem topology. The
//! evaluation time is a parameter so a logged decision can be replayed exactly.

use crate::classify::{classify, ActionClass, CommandClass};
use crate::containment::{check_arguments, prepare_args, ResolvedTarget, Sandbox};
use crate::merge::{merge, EffectiveConstraints};
use crate::policy::{Policy, PolicyError};
use crate::record::{validate_record, AuthorizationRecord, RecordError};
use crate::verdict::{Classification, Decision, EscapeKind, Verdict, Violation};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A command as the caller wants it run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; `None` means the sandbox root.
    pub workdir: Option<PathBuf>,
}

impl CommandRequest {
    /// Split an argv (`[program, args...]`). An empty argv yields an empty program.
    pub fn from_argv(argv: &[String], workdir: Option<PathBuf>) -> Self {
        let (program, args) = match argv.split_first() {
            Some((p, rest)) => (p.clone(), rest.to_vec()),
            None => (String::new(), Vec::new()),
        };
        Self {
            program,
            args,
            workdir,
        }
    }
}

/// The record half of the engine input.
#[derive(Debug, Clone)]
pub enum RecordInput {
    Absent,
    Loaded(AuthorizationRecord),
    /// Present but unreadable or unparsable.
    Invalid(String),
}

impl RecordInput {
    /// Load the record at `path`. A missing file is `Absent`, not an error.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::Absent;
        };
        if !path.exists() {
            return Self::Absent;
        }
        match AuthorizationRecord::load(path) {
            Ok(record) => Self::Loaded(record),
            Err(e) => Self::Invalid(e.to_string()),
        }
    }
}

impl From<Result<AuthorizationRecord, RecordError>> for RecordInput {
    fn from(result: Result<AuthorizationRecord, RecordError>) -> Self {
        match result {
            Ok(r) => Self::Loaded(r),
            Err(e) => Self::Invalid(e.to_string()),
        }
    }
}

/// Engine states. Transitions are logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Start,
    Classified,
    RecordRequired,
    Validated,
    Checked,
    Terminal(Verdict),
}

fn enter(state: GateState) {
    debug!(?state, "gate transition");
}

/// A decision plus the argument list to execute if it allows.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// Arguments after local glob expansion.
    pub argv: Vec<String>,
}

/// Evaluate `request` against `policy` and `record` at time `now`.
pub fn evaluate(
    policy: &Policy,
    record: &RecordInput,
    sandbox_root: &Path,
    request: &CommandRequest,
    now: DateTime<Utc>,
) -> Evaluation {
    enter(GateState::Start);
    let command_class = classify(policy, &request.program);
    enter(GateState::Classified);
    debug!(program = %request.program, class = command_class.as_str(), "classified");

    let required = match &command_class {
        CommandClass::Unknown => {
            let violation = Violation::UnknownCommand {
                program: request.program.clone(),
            };
            return finish(
                deny(violation, Some(CommandClass::Unknown), None, now),
                request.args.clone(),
            );
        }
        CommandClass::ReadOnly => {
            let argv = read_only_argv(sandbox_root, request);
            let reason = format!("read-only command '{}'", request.program);
            return finish(
                allow(
                    Classification::ReadOnly,
                    reason,
                    CommandClass::ReadOnly,
                    None,
                    Vec::new(),
                    now,
                ),
                argv,
            );
        }
        CommandClass::Mutating(class) => class.clone(),
    };

    enter(GateState::RecordRequired);
    let record = match record {
        RecordInput::Absent => {
            let violation = Violation::MissingIntent {
                program: request.program.clone(),
                required,
            };
            return finish(deny(violation, Some(command_class), None, now), request.args.clone());
        }
        RecordInput::Invalid(error) => {
            let violation = Violation::MalformedIntentRecord {
                error: error.clone(),
            };
            return finish(deny(violation, Some(command_class), None, now), request.args.clone());
        }
        RecordInput::Loaded(r) => r,
    };

    let root = match std::fs::canonicalize(sandbox_root) {
        Ok(root) => root,
        Err(_) => {
            let violation = Violation::ScopeMismatch {
                declared: record.scope_root.clone(),
                resolved: None,
                sandbox_root: sandbox_root.display().to_string(),
            };
            return finish(deny(violation, Some(command_class), None, now), request.args.clone());
        }
    };

    if let Err(violation) = validate_record(record, &required, &root, now) {
        return finish(deny(violation, Some(command_class), None, now), request.args.clone());
    }
    enter(GateState::Validated);

    let sandbox = match open_sandbox(&root, request) {
        Ok(s) => s,
        Err(violation) => {
            return finish(deny(violation, Some(command_class), None, now), request.args.clone())
        }
    };

    let effective = merge(policy, record);
    let prepared = prepare_args(&request.program, &request.args, sandbox.workdir());
    debug!(operands = ?prepared.operands, "path operands");

    let targets = match check_arguments(&sandbox, &prepared.operands, &effective) {
        Ok(t) => t,
        Err(violation) => {
            return finish(
                deny(violation, Some(command_class), Some(effective), now),
                prepared.argv,
            )
        }
    };
    enter(GateState::Checked);

    let reason = authorized_reason(record, &required);
    finish(
        allow(
            Classification::Authorized,
            reason,
            command_class,
            Some(effective),
            targets,
            now,
        ),
        prepared.argv,
    )
}

/// Decision used when the policy itself cannot be loaded: every command denies.
pub fn deny_malformed_policy(
    error: &PolicyError,
    request: &CommandRequest,
    now: DateTime<Utc>,
) -> Evaluation {
    enter(GateState::Start);
    let violation = Violation::MalformedPolicy {
        error: error.to_string(),
    };
    finish(deny(violation, None, None, now), request.args.clone())
}

fn open_sandbox(root: &Path, request: &CommandRequest) -> Result<Sandbox, Violation> {
    let workdir = request.workdir.as_deref().unwrap_or(root);
    Sandbox::new(root, workdir).map_err(|e| Violation::PathEscape {
        argument: workdir.display().to_string(),
        resolved: None,
        kind: EscapeKind::Unresolvable {
            error: e.to_string(),
        },
    })
}

/// Read-only commands are not path-checked; their globs are still expanded
/// so they run as a shell would have run them.
fn read_only_argv(sandbox_root: &Path, request: &CommandRequest) -> Vec<String> {
    let workdir = request.workdir.as_deref().unwrap_or(sandbox_root);
    match std::fs::canonicalize(workdir) {
        Ok(dir) => prepare_args(&request.program, &request.args, &dir).argv,
        Err(_) => request.args.clone(),
    }
}

fn authorized_reason(record: &AuthorizationRecord, required: &ActionClass) -> String {
    match &record.id {
        Some(id) => format!("authorized by intent record {id} for '{required}'"),
        None => format!("authorized by intent record for '{required}'"),
    }
}

fn allow(
    classification: Classification,
    reason: String,
    command_class: CommandClass,
    effective_constraints: Option<EffectiveConstraints>,
    targets: Vec<ResolvedTarget>,
    now: DateTime<Utc>,
) -> Decision {
    Decision {
        verdict: Verdict::Allow,
        classification,
        reason,
        command_class: Some(command_class),
        effective_constraints,
        violation: None,
        targets,
        evaluated_at: now,
    }
}

fn deny(
    violation: Violation,
    command_class: Option<CommandClass>,
    effective_constraints: Option<EffectiveConstraints>,
    now: DateTime<Utc>,
) -> Decision {
    let classification = violation.classification();
    let reason = violation.to_string();
    warn!(classification = classification.as_str(), %reason, "denied");
    Decision {
        verdict: Verdict::Deny,
        classification,
        reason,
        command_class,
        effective_constraints,
        violation: Some(violation),
        targets: Vec::new(),
        evaluated_at: now,
    }
}

fn finish(decision: Decision, argv: Vec<String>) -> Evaluation {
    enter(GateState::Terminal(decision.verdict));
    Evaluation { decision, argv }
}
