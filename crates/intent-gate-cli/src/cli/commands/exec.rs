use crate::cli::args::ExecArgs;
use crate::exit_codes;
use anyhow::Context;
use chrono::Utc;
use intent_gate_core::{
    deny_malformed_policy, evaluate, run_command, AuditEvent, AuditLog, CommandRequest,
    DecisionEvent, DenialSnapshot, ExecutionOutcome, InputRef, Policy, RecordInput,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub fn run(args: ExecArgs) -> anyhow::Result<i32> {
    let now = Utc::now();

    // Absolute paths in the audit trail keep replay independent of the cwd.
    let sandbox_root = absolute(&args.sandbox)?;
    let policy_path = absolute(&args.policy)?;
    let intent_path = args.intent.as_deref().map(absolute).transpose()?;
    let workdir = args.workdir.as_deref().map(absolute).transpose()?;

    let request = CommandRequest::from_argv(&args.command, workdir);

    let evaluation = match Policy::load(&policy_path) {
        Ok(policy) => {
            let (read_only, mutating, deny_globs) = policy.rule_counts();
            debug!(read_only, mutating, deny_globs, policy = %policy_path.display(), "policy loaded");
            let record = RecordInput::load(intent_path.as_deref());
            evaluate(&policy, &record, &sandbox_root, &request, now)
        }
        Err(e) => deny_malformed_policy(&e, &request, now),
    };
    let decision = &evaluation.decision;

    let event = DecisionEvent::new(decision, &request, &sandbox_root)
        .with_policy(InputRef::file(Some(&policy_path)))
        .with_intent(InputRef::file(intent_path.as_deref()))
        .with_dry_run(args.dry_run || args.print_decision);
    let decision_id = event.event_id.clone();

    // No decision on record, no execution.
    let log = AuditLog::new(&args.audit);
    log.append(&AuditEvent::Decision(event))
        .context("failed to write decision event")?;

    if args.print_decision {
        println!("{}", serde_json::to_string_pretty(decision)?);
    }

    if !decision.is_allowed() {
        eprintln!(
            "intent-gate: DENY {}: {}",
            decision.classification, decision.reason
        );
        if args.explain {
            if let Some(snapshot) = DenialSnapshot::from_decision(decision) {
                eprintln!("{snapshot}");
            }
        }
        return Ok(exit_codes::DENIED);
    }

    // Printing the decision replaces running the command.
    if args.print_decision {
        return Ok(exit_codes::SUCCESS);
    }

    if args.dry_run {
        eprintln!(
            "intent-gate: ALLOW {} (dry run, not executed)",
            decision.classification
        );
        return Ok(exit_codes::SUCCESS);
    }

    let workdir = request.workdir.clone().unwrap_or_else(|| sandbox_root.clone());
    let outcome = run_command(&request.program, &evaluation.argv, &workdir);

    let mut executed = Vec::with_capacity(evaluation.argv.len() + 1);
    executed.push(request.program.clone());
    executed.extend(evaluation.argv.iter().cloned());
    let exec_event = outcome.to_event(&decision_id, executed, &workdir);
    if let Err(e) = log.append(&AuditEvent::Execution(exec_event)) {
        warn!(error = %e, "failed to write execution event");
    }
    relay_output(&outcome)?;

    if let Some(error) = &outcome.error {
        eprintln!("intent-gate: {error}");
    }
    Ok(exit_code(&outcome))
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("invalid path {}", path.display()))
}

fn relay_output(outcome: &ExecutionOutcome) -> anyhow::Result<()> {
    std::io::stdout()
        .write_all(&outcome.stdout)
        .context("failed to relay stdout")?;
    std::io::stderr()
        .write_all(&outcome.stderr)
        .context("failed to relay stderr")?;
    Ok(())
}

/// The child's own code, or [`exit_codes::CHILD_FAILED`] if it has none.
fn exit_code(outcome: &ExecutionOutcome) -> i32 {
    outcome.returncode.unwrap_or(exit_codes::CHILD_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(returncode: Option<i32>, signal: Option<i32>) -> ExecutionOutcome {
        ExecutionOutcome {
            returncode,
            signal,
            stdout: Vec::new(),
            stderr: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(&outcome(Some(0), None)), exit_codes::SUCCESS);
        assert_eq!(exit_code(&outcome(Some(7), None)), 7);
        assert_eq!(exit_code(&outcome(None, Some(9))), exit_codes::CHILD_FAILED);
    }
}
