//! Exit codes for intent-gate.
//! These codes are part of the public contract; scripts branch on them.

pub const SUCCESS: i32 = 0;
pub const CHILD_FAILED: i32 = 1; // Child killed by a signal or could not be spawned
pub const DENIED: i32 = 2; // Gate denied the command
pub const INTERNAL_ERROR: i32 = 3; // Audit log unwritable or other gate failure

// `replay`
pub const REPLAY_DIVERGED: i32 = 2;
pub const REPLAY_INPUTS_CHANGED: i32 = 3;
