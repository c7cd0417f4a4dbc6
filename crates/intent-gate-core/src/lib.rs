//! Intent-gated filesystem mutation.
//!
//! A mutating command runs only when an authorization record scoped to the
//! sandbox accompanies it and every path argument provably stays inside the
//! sandbox root. [`engine::evaluate`] produces one [`Decision`] per command;
//! [`audit::AuditLog`] records it; [`replay`] re-derives it offline.

pub mod audit;
pub mod classify;
pub mod containment;
pub mod engine;
pub mod exec;
pub mod explain;
pub mod merge;
pub mod policy;
pub mod record;
pub mod replay;
pub mod verdict;

// Convenience re-exports
pub use audit::{AuditError, AuditEvent, AuditLog, DecisionEvent, ExecutionEvent, InputRef};
pub use classify::{classify, ActionClass, CommandClass};
pub use containment::{ResolvedTarget, Sandbox};
pub use engine::{deny_malformed_policy, evaluate, CommandRequest, Evaluation, RecordInput};
pub use exec::{run_command, ExecutionOutcome};
pub use explain::DenialSnapshot;
pub use merge::{merge, EffectiveConstraints};
pub use policy::{builtin_default, Policy, PolicyError};
pub use record::{AuthorizationRecord, RecordError, RecordFormat};
pub use replay::{replay, ReplayError, ReplayReport};
pub use verdict::{Classification, Decision, Verdict, Violation};
