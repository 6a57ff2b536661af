//! Policy matching.
//!
//! A policy applies iff it has zero conditions or every condition evaluates
//! true — AND-only composition is deliberate and matches the first-match-wins
//! decision model. Results are ordered by priority descending with insertion
//! order breaking ties (stable sort over the store snapshot).

use crate::condition::ConditionEvaluator;
use crate::context::AccessRequest;
use crate::policy::{Policy, PolicyStore};
use std::sync::Arc;
use tracing::trace;

pub struct PolicyMatcher {
    store: Arc<PolicyStore>,
    evaluator: ConditionEvaluator,
}

impl PolicyMatcher {
    pub fn new(store: Arc<PolicyStore>, evaluator: ConditionEvaluator) -> Self {
        Self { store, evaluator }
    }

    /// All policies satisfied by the request, highest priority first. Works
    /// on a snapshot, so concurrent policy mutation is never observed
    /// mid-traversal.
    pub fn applicable_policies(&self, request: &AccessRequest) -> Vec<Policy> {
        let mut matched: Vec<Policy> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|policy| self.is_applicable(policy, request))
            .collect();
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        trace!(request_id = %request.id, matched = matched.len(), "Policy matching complete");
        matched
    }

    fn is_applicable(&self, policy: &Policy, request: &AccessRequest) -> bool {
        policy
            .conditions
            .iter()
            .all(|condition| self.evaluator.evaluate(condition, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::context::{PolicyValue, Resource, SecurityContext};
    use crate::event_bus::Severity;
    use crate::policy::{ActionType, ConditionOperator, ConditionType};
    use crate::risk::RiskWeights;
    use chrono::Utc;

    fn matcher_with(policies: Vec<Policy>) -> PolicyMatcher {
        let store = Arc::new(PolicyStore::new());
        for policy in policies {
            store.upsert(policy).unwrap();
        }
        PolicyMatcher::new(
            store,
            ConditionEvaluator::new(Arc::new(SystemClock), RiskWeights::default()),
        )
    }

    fn request(authenticated: bool) -> AccessRequest {
        let mut context = SecurityContext::default();
        context.user.authenticated = authenticated;
        AccessRequest {
            id: "req-1".into(),
            timestamp: Utc::now(),
            context,
            resource: Resource::default(),
            action: "read".into(),
        }
    }

    fn policy(id: &str, priority: u32) -> Policy {
        Policy::new(id, id, priority, Utc::now()).with_action(ActionType::Allow, Severity::Low)
    }

    #[test]
    fn test_empty_conditions_always_apply() {
        let matcher = matcher_with(vec![policy("unconditional", 5)]);
        assert_eq!(matcher.applicable_policies(&request(false)).len(), 1);
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let p = policy("strict", 10)
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
            );
        let matcher = matcher_with(vec![p]);
        // Authenticated but device non-compliant: the AND fails.
        assert!(matcher.applicable_policies(&request(true)).is_empty());
    }

    #[test]
    fn test_priority_descending_with_stable_ties() {
        let matcher = matcher_with(vec![
            policy("low", 10),
            policy("tie-first", 50),
            policy("high", 200),
            policy("tie-second", 50),
        ]);
        let matched = matcher.applicable_policies(&request(true));
        let ids: Vec<&str> = matched.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "tie-first", "tie-second", "low"]);
    }
}
