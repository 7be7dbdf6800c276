//! In-memory policy and violation storage

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Policy, PolicyViolation};

/// CRUD over stored policy records, keyed by policy id.
pub trait PolicyStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Policy>;

    fn all(&self) -> Vec<Policy>;

    /// Stores the policy, assigning an id when it has none, and returns the
    /// stored record.
    fn save(&self, policy: Policy) -> Policy;

    fn save_all(&self, policies: Vec<Policy>) {
        for policy in policies {
            self.save(policy);
        }
    }

    fn delete(&self, id: &str) -> bool;
}

/// Append-only log of denied policy actions.
pub trait ViolationStore: Send + Sync {
    fn append(&self, violation: PolicyViolation);

    fn all(&self) -> Vec<PolicyViolation>;

    /// Deletes every record created before the cutoff and returns how many
    /// were removed.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> usize;
}

#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: RwLock<HashMap<String, Policy>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn get(&self, id: &str) -> Option<Policy> {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn all(&self) -> Vec<Policy> {
        let mut policies: Vec<Policy> = self
            .policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        policies.sort_by(|a, b| a.name.cmp(&b.name));
        policies
    }

    fn save(&self, mut policy: Policy) -> Policy {
        let id = policy
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        self.policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, policy.clone());
        policy
    }

    fn delete(&self, id: &str) -> bool {
        self.policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }
}

#[derive(Debug, Default)]
pub struct MemoryViolationStore {
    violations: RwLock<Vec<PolicyViolation>>,
}

impl MemoryViolationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViolationStore for MemoryViolationStore {
    fn append(&self, violation: PolicyViolation) {
        self.violations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(violation);
    }

    fn all(&self) -> Vec<PolicyViolation> {
        self.violations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut violations = self
            .violations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = violations.len();
        violations.retain(|v| v.created_at >= cutoff);
        before - violations.len()
    }
}
