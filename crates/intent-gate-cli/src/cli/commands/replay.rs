use crate::cli::args::ReplayArgs;
use crate::exit_codes;
use intent_gate_core::replay::Outcome;
use intent_gate_core::{replay, AuditLog};

pub fn run(args: ReplayArgs) -> anyhow::Result<i32> {
    let log = AuditLog::new(&args.audit);
    let report = match replay(&log, args.event.as_deref()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("replay: {e}");
            return Ok(exit_codes::REPLAY_INPUTS_CHANGED);
        }
    };

    println!("event:    {}", report.event_id);
    println!("logged:   {}", line(&report.logged));
    println!("replayed: {}", line(&report.replayed));

    if report.reproduced() {
        println!("reproduced");
        Ok(exit_codes::SUCCESS)
    } else {
        println!("diverged");
        Ok(exit_codes::REPLAY_DIVERGED)
    }
}

fn line(outcome: &Outcome) -> String {
    format!(
        "{} {}: {}",
        outcome.verdict, outcome.classification, outcome.reason
    )
}
