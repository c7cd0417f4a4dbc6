use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "intent-gate",
    version,
    about = "Gate mutating filesystem commands behind scoped, time-bound intent records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate a command and run it if the gate allows it
    Exec(ExecArgs),
    /// Explain a logged decision
    Explain(ExplainArgs),
    /// Re-evaluate a logged decision from its recorded inputs
    Replay(ReplayArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExecArgs {
    /// Policy file (YAML)
    #[arg(long, env = "INTENT_GATE_POLICY", default_value = "policies/policy.yaml")]
    pub policy: PathBuf,

    /// Sandbox root; every path argument must stay inside it
    #[arg(long, env = "INTENT_GATE_SANDBOX", default_value = "sandbox")]
    pub sandbox: PathBuf,

    /// Intent record authorizing the command
    #[arg(long, env = "INTENT_GATE_INTENT")]
    pub intent: Option<PathBuf>,

    /// Audit log (NDJSON, append-only)
    #[arg(long, env = "INTENT_GATE_AUDIT", default_value = "audit.jsonl")]
    pub audit: PathBuf,

    /// Working directory for the command [default: sandbox root]
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Decide and log, but never execute
    #[arg(long)]
    pub dry_run: bool,

    /// Print the decision as JSON on stdout and exit without executing
    #[arg(long)]
    pub print_decision: bool,

    /// Print field/observed/expected/remedy on denial
    #[arg(long)]
    pub explain: bool,

    /// Command to gate, after `--`
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    pub command: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExplainArgs {
    #[arg(long, env = "INTENT_GATE_AUDIT", default_value = "audit.jsonl")]
    pub audit: PathBuf,

    /// Decision event id [default: last decision]
    #[arg(long)]
    pub event: Option<String>,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReplayArgs {
    #[arg(long, env = "INTENT_GATE_AUDIT", default_value = "audit.jsonl")]
    pub audit: PathBuf,

    /// Decision event id [default: last decision]
    #[arg(long)]
    pub event: Option<String>,
}
