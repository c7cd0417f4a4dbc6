//! Policy merge: deny-globs are a union (deny-wins), `max_files` is an override.

use crate::policy::Policy;
use crate::record::AuthorizationRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Constraints in force for one command after merging policy and record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConstraints {
    pub deny_globs: BTreeSet<String>,
    pub max_files: u64,
}

pub fn merge(policy: &Policy, record: &AuthorizationRecord) -> EffectiveConstraints {
    let deny_globs = policy
        .default_deny_globs
        .union(&record.constraints.deny_globs)
        .cloned()
        .collect();
    let max_files = record
        .constraints
        .max_files
        .unwrap_or(policy.default_max_files);
    EffectiveConstraints {
        deny_globs,
        max_files,
    }
}
