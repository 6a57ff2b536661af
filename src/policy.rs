//! Policy model and store.
//!
//! A policy maps an AND-ed list of conditions to an ordered action list; only
//! the first action of a matched policy is ever used. The store hands out
//! copy-on-read snapshots so a mutation is never observed mid-evaluation.

use crate::context::PolicyValue;
use crate::error::{OrchestratorError, TrustResult};
use crate::event_bus::Severity;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Which sub-context a condition's field lookup resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Identity,
    Device,
    Network,
    Application,
    Data,
    Time,
    Location,
    Risk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub field: String,
    pub operator: ConditionOperator,
    pub value: PolicyValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Allow,
    Deny,
    Challenge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAction {
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters: HashMap<String, PolicyValue>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A named, prioritized rule. Higher priority evaluates first. An empty
/// condition list means "always applicable".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: u64,
    pub priority: u32,
    pub conditions: Vec<Condition>,
    pub actions: Vec<PolicyAction>,
    pub metadata: PolicyMetadata,
}

impl Policy {
    pub fn new(id: &str, name: &str, priority: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            version: 1,
            priority,
            conditions: Vec::new(),
            actions: Vec::new(),
            metadata: PolicyMetadata {
                created_at: now,
                updated_at: now,
                created_by: "system".into(),
                tags: Vec::new(),
            },
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_condition(
        mut self,
        condition_type: ConditionType,
        field: &str,
        operator: ConditionOperator,
        value: PolicyValue,
    ) -> Self {
        self.conditions.push(Condition {
            condition_type,
            field: field.to_string(),
            operator,
            value,
        });
        self
    }

    pub fn with_action(mut self, action_type: ActionType, severity: Severity) -> Self {
        self.actions.push(PolicyAction {
            action_type,
            parameters: HashMap::new(),
            severity,
        });
        self
    }
}

// ── Validation ──────────────────────────────────────────────────────────────

/// Shape checks performed at registration time, so malformed policies are
/// rejected loudly instead of silently evaluating false later.
pub fn validate_policy(policy: &Policy) -> TrustResult<()> {
    if policy.id.trim().is_empty() {
        return Err(OrchestratorError::PolicyValidation {
            policy_id: policy.id.clone(),
            reason: "empty policy id".into(),
        });
    }
    if policy.actions.is_empty() {
        return Err(OrchestratorError::PolicyValidation {
            policy_id: policy.id.clone(),
            reason: "policy has no actions".into(),
        });
    }
    for condition in &policy.conditions {
        match condition.operator {
            ConditionOperator::In | ConditionOperator::NotIn => {
                if condition.value.as_list().is_none() {
                    return Err(OrchestratorError::PolicyValidation {
                        policy_id: policy.id.clone(),
                        reason: format!(
                            "operator on field '{}' requires a list value",
                            condition.field
                        ),
                    });
                }
            }
            ConditionOperator::Regex => {
                let pattern = condition.value.to_string();
                if let Err(e) = regex::Regex::new(&pattern) {
                    return Err(OrchestratorError::PolicyValidation {
                        policy_id: policy.id.clone(),
                        reason: format!("invalid regex on field '{}': {}", condition.field, e),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Bootstrap set ───────────────────────────────────────────────────────────

pub const DEFAULT_DENY_POLICY_ID: &str = "default-deny-all";
pub const BASELINE_ALLOW_POLICY_ID: &str = "allow-authenticated-compliant";

/// The built-in bootstrap policies: a priority-1 unconditional deny backstop
/// and a priority-100 allow for authenticated users on compliant devices.
pub fn bootstrap_policies(now: DateTime<Utc>) -> Vec<Policy> {
    vec![
        Policy::new(DEFAULT_DENY_POLICY_ID, "Default Deny All", 1, now)
            .with_description("Zero trust backstop: deny anything no other policy allows")
            .with_action(ActionType::Deny, Severity::High),
        Policy::new(
            BASELINE_ALLOW_POLICY_ID,
            "Allow Authenticated Compliant Devices",
            100,
            now,
        )
        .with_description("Baseline access for authenticated users on compliant devices")
        .with_condition(
            ConditionType::Identity,
            "authenticated",
            ConditionOperator::Equals,
            PolicyValue::Bool(true),
        )
        .with_condition(
            ConditionType::Device,
            "compliance",
            ConditionOperator::Equals,
            PolicyValue::Bool(true),
        )
        .with_action(ActionType::Allow, Severity::Low),
    ]
}

// ── Store ───────────────────────────────────────────────────────────────────

/// Active policy set. Insertion order is preserved so the matcher's stable
/// sort breaks priority ties by registration order.
pub struct PolicyStore {
    policies: RwLock<Vec<Policy>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
        }
    }

    /// Add or replace a policy. Replacement keeps the original slot so tie
    /// ordering stays stable across updates.
    pub fn upsert(&self, policy: Policy) -> TrustResult<()> {
        validate_policy(&policy)?;
        let mut policies = self.policies.write();
        match policies.iter_mut().find(|p| p.id == policy.id) {
            Some(slot) => {
                debug!(policy_id = %policy.id, priority = policy.priority, "Policy replaced");
                *slot = policy;
            }
            None => {
                debug!(policy_id = %policy.id, priority = policy.priority, "Policy added");
                policies.push(policy);
            }
        }
        Ok(())
    }

    pub fn remove(&self, policy_id: &str) -> bool {
        let mut policies = self.policies.write();
        let before = policies.len();
        policies.retain(|p| p.id != policy_id);
        policies.len() < before
    }

    /// Copy-on-read snapshot of the active set, in insertion order.
    pub fn snapshot(&self) -> Vec<Policy> {
        self.policies.read().clone()
    }

    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let store = PolicyStore::new();
        store
            .upsert(Policy::new("a", "first", 10, now()).with_action(ActionType::Allow, Severity::Low))
            .unwrap();
        store
            .upsert(Policy::new("b", "second", 10, now()).with_action(ActionType::Deny, Severity::Low))
            .unwrap();
        store
            .upsert(Policy::new("a", "first-v2", 10, now()).with_action(ActionType::Deny, Severity::Low))
            .unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, "a");
        assert_eq!(snap[0].name, "first-v2");
        assert_eq!(snap[1].id, "b");
    }

    #[test]
    fn test_remove() {
        let store = PolicyStore::new();
        store
            .upsert(Policy::new("a", "a", 1, now()).with_action(ActionType::Deny, Severity::Low))
            .unwrap();
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_validation_rejects_empty_id() {
        let policy = Policy::new("  ", "bad", 1, now()).with_action(ActionType::Deny, Severity::Low);
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn test_validation_rejects_missing_actions() {
        let policy = Policy::new("no-actions", "bad", 1, now());
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn test_validation_rejects_non_list_in_operand() {
        let policy = Policy::new("bad-in", "bad", 1, now())
            .with_condition(
                ConditionType::Network,
                "segment",
                ConditionOperator::In,
                PolicyValue::from("corp"),
            )
            .with_action(ActionType::Allow, Severity::Low);
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn test_validation_rejects_invalid_regex() {
        let policy = Policy::new("bad-re", "bad", 1, now())
            .with_condition(
                ConditionType::Identity,
                "id",
                ConditionOperator::Regex,
                PolicyValue::from("[unclosed"),
            )
            .with_action(ActionType::Allow, Severity::Low);
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn test_bootstrap_set_is_valid() {
        for policy in bootstrap_policies(now()) {
            validate_policy(&policy).unwrap();
        }
        let snap = bootstrap_policies(now());
        assert_eq!(snap[0].id, DEFAULT_DENY_POLICY_ID);
        assert!(snap[0].conditions.is_empty());
        assert_eq!(snap[1].priority, 100);
    }
}
