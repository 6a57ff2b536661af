//! Decision engine.
//!
//! Walks applicable policies in priority order and lets the first usable
//! action decide: first-match-wins, not highest-severity-wins. A computed
//! risk score above the escalation threshold elevates `allow` to `challenge`
//! after matching. Any internal fault is converted into a deny — the engine
//! never propagates an error to the caller.

use crate::clock::Clock;
use crate::config::RiskConfig;
use crate::context::{AccessRequest, PolicyValue};
use crate::error::TrustResult;
use crate::matcher::PolicyMatcher;
use crate::policy::ActionType;
use crate::risk::{aggregate_risk, risk_factors};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error};

/// Confidence reported on policy-matched decisions.
const MATCHED_CONFIDENCE: f64 = 0.95;
/// Confidence on the default-deny fallback (nothing matched: certainty).
const DEFAULT_DENY_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Allow,
    Deny,
    Challenge,
}

impl From<ActionType> for DecisionOutcome {
    fn from(action: ActionType) -> Self {
        match action {
            ActionType::Allow => DecisionOutcome::Allow,
            ActionType::Deny => DecisionOutcome::Deny,
            ActionType::Challenge => DecisionOutcome::Challenge,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionMetadata {
    pub evaluation_time_ms: u64,
    pub applied_policies: Vec<String>,
    pub risk_factors: Vec<String>,
    pub confidence: f64,
    pub risk_score: f64,
}

/// Output of a single evaluation. Never mutated after creation; a fresh
/// decision is computed per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    pub decision: DecisionOutcome,
    pub reason: String,
    pub conditions: HashMap<String, PolicyValue>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: DecisionMetadata,
}

pub struct DecisionEngine {
    matcher: PolicyMatcher,
    risk_config: RiskConfig,
    clock: std::sync::Arc<dyn Clock>,
}

impl DecisionEngine {
    pub fn new(
        matcher: PolicyMatcher,
        risk_config: RiskConfig,
        clock: std::sync::Arc<dyn Clock>,
    ) -> Self {
        Self {
            matcher,
            risk_config,
            clock,
        }
    }

    /// Evaluate a request. Infallible by contract: an internal error becomes
    /// an opaque fail-closed deny, never a propagated fault.
    pub fn evaluate(&self, request: &AccessRequest) -> AccessDecision {
        let started = Instant::now();
        let mut decision = match self.try_evaluate(request) {
            Ok(decision) => decision,
            Err(e) => {
                error!(request_id = %request.id, error = %e, "Evaluation failed, denying");
                Self::fail_closed()
            }
        };
        decision.metadata.evaluation_time_ms = started.elapsed().as_millis() as u64;
        debug!(
            request_id = %request.id,
            outcome = ?decision.decision,
            risk = decision.metadata.risk_score,
            policies = ?decision.metadata.applied_policies,
            "Access decision"
        );
        decision
    }

    fn try_evaluate(&self, request: &AccessRequest) -> TrustResult<AccessDecision> {
        let risk_score = aggregate_risk(&request.context, &self.risk_config.weights);
        let matched = self.matcher.applicable_policies(request);

        // First policy carrying a usable action wins; later matches never
        // influence the outcome.
        let chosen = matched
            .iter()
            .find_map(|policy| policy.actions.first().map(|action| (policy, action)));

        let (policy, action) = match chosen {
            Some(pair) => pair,
            None => return Ok(self.default_deny(risk_score)),
        };

        let mut outcome = DecisionOutcome::from(action.action_type);
        let mut reason = format!("Policy '{}' matched", policy.name);
        if risk_score > self.risk_config.escalation_threshold
            && outcome == DecisionOutcome::Allow
        {
            outcome = DecisionOutcome::Challenge;
            reason.push_str(" (elevated due to high risk)");
        }

        Ok(AccessDecision {
            decision: outcome,
            reason,
            conditions: action.parameters.clone(),
            expires_at: Some(
                self.clock.now() + Duration::seconds(self.risk_config.decision_ttl_secs),
            ),
            metadata: DecisionMetadata {
                evaluation_time_ms: 0,
                applied_policies: vec![policy.id.clone()],
                risk_factors: risk_factors(risk_score),
                confidence: MATCHED_CONFIDENCE,
                risk_score,
            },
        })
    }

    fn default_deny(&self, risk_score: f64) -> AccessDecision {
        let mut factors = risk_factors(risk_score);
        factors.push("no_policy_match".to_string());
        AccessDecision {
            decision: DecisionOutcome::Deny,
            reason: "No matching allow policy found".to_string(),
            conditions: HashMap::new(),
            expires_at: None,
            metadata: DecisionMetadata {
                evaluation_time_ms: 0,
                applied_policies: Vec::new(),
                risk_factors: factors,
                confidence: DEFAULT_DENY_CONFIDENCE,
                risk_score,
            },
        }
    }

    fn fail_closed() -> AccessDecision {
        AccessDecision {
            decision: DecisionOutcome::Deny,
            reason: "Evaluation error".to_string(),
            conditions: HashMap::new(),
            expires_at: None,
            metadata: DecisionMetadata {
                evaluation_time_ms: 0,
                applied_policies: Vec::new(),
                risk_factors: vec!["evaluation_error".to_string()],
                confidence: 0.0,
                risk_score: 0.0,
            },
        }
    }
}
