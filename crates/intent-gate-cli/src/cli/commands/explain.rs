use crate::cli::args::ExplainArgs;
use crate::exit_codes;
use anyhow::Context;
use intent_gate_core::{AuditLog, DenialSnapshot};

pub fn run(args: ExplainArgs) -> anyhow::Result<i32> {
    let log = AuditLog::new(&args.audit);
    let event = log
        .find_decision(args.event.as_deref())
        .context("failed to read audit log")?
        .with_context(|| match &args.event {
            Some(id) => format!("no decision event {id} in {}", args.audit.display()),
            None => format!("no decision events in {}", args.audit.display()),
        })?;

    let snapshot = event
        .violation
        .as_ref()
        .map(|v| DenialSnapshot::from_violation(v, &event.reason));

    if args.json {
        let out = serde_json::json!({
            "event_id": event.event_id,
            "cmd": event.cmd,
            "verdict": event.verdict,
            "classification": event.classification,
            "reason": event.reason,
            "snapshot": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(exit_codes::SUCCESS);
    }

    println!("event:   {}", event.event_id);
    println!("command: {}", event.cmd.join(" "));
    match snapshot {
        Some(snapshot) => println!("{snapshot}"),
        None => println!("{} {}: {}", event.verdict, event.classification, event.reason),
    }
    Ok(exit_codes::SUCCESS)
}
