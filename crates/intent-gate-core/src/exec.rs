//! Execution of allowed commands.

use crate::audit::{now_rfc3339, ExecutionEvent};
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::{info, warn};

/// Characters kept in each output preview.
pub const PREVIEW_LIMIT: usize = 2000;
pub const TRUNCATION_MARKER: &str = "...(truncated)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub returncode: Option<i32>,
    /// Terminating signal, if the child was killed.
    pub signal: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Spawn failure.
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.returncode == Some(0)
    }

    /// Audit event for this run, linked to its decision.
    pub fn to_event(&self, decision_id: &str, cmd: Vec<String>, workdir: &Path) -> ExecutionEvent {
        ExecutionEvent {
            event_id: format!("evt_execution_{}", uuid::Uuid::new_v4()),
            timestamp: now_rfc3339(),
            decision_id: decision_id.to_string(),
            cmd,
            workdir: workdir.display().to_string(),
            returncode: self.returncode,
            signal: self.signal,
            stdout_preview: preview(&self.stdout),
            stderr_preview: preview(&self.stderr),
            error: self.error.clone(),
        }
    }
}

/// Run `program` with `args` in `workdir`, capturing its output.
///
/// No shell is involved and no timeout is applied.
pub fn run_command(program: &str, args: &[String], workdir: &Path) -> ExecutionOutcome {
    info!(program, ?args, workdir = %workdir.display(), "executing");
    match Command::new(program).args(args).current_dir(workdir).output() {
        Ok(output) => {
            let (returncode, signal) = exit_parts(output.status);
            info!(?returncode, ?signal, "command finished");
            ExecutionOutcome {
                returncode,
                signal,
                stdout: output.stdout,
                stderr: output.stderr,
                error: None,
            }
        }
        Err(e) => {
            warn!(program, error = %e, "failed to spawn");
            ExecutionOutcome {
                returncode: None,
                signal: None,
                stdout: Vec::new(),
                stderr: Vec::new(),
                error: Some(format!("failed to spawn '{program}': {e}")),
            }
        }
    }
}

#[cfg(unix)]
fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    use std::os::unix::process::ExitStatusExt;
    (status.code(), status.signal())
}

#[cfg(not(unix))]
fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    (status.code(), None)
}

/// Lossy UTF-8 preview bounded to [`PREVIEW_LIMIT`] characters.
pub fn preview(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.into_owned(),
    }
}
