//! Condition evaluation.
//!
//! Resolves a policy condition's dotted-path field against the sub-context
//! selected by its type, then applies the operator. Every failure mode —
//! unknown type, missing field, wrong operand shape, invalid regex — degrades
//! to "not satisfied" rather than aborting the matching pass.

use crate::clock::Clock;
use crate::context::{AccessRequest, PolicyValue};
use crate::policy::{Condition, ConditionOperator, ConditionType};
use crate::risk::{aggregate_risk, RiskWeights};
use chrono::Timelike;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

pub struct ConditionEvaluator {
    clock: Arc<dyn Clock>,
    weights: RiskWeights,
}

impl ConditionEvaluator {
    pub fn new(clock: Arc<dyn Clock>, weights: RiskWeights) -> Self {
        Self { clock, weights }
    }

    /// Evaluate one condition against a request. Deterministic for a fixed
    /// request except for `ConditionType::Time`, which reads the clock.
    pub fn evaluate(&self, condition: &Condition, request: &AccessRequest) -> bool {
        let field_value = match self.resolve(condition, request) {
            Some(v) => v,
            None => {
                trace!(
                    field = %condition.field,
                    condition_type = ?condition.condition_type,
                    "Condition field lookup failed, treating as unsatisfied"
                );
                return false;
            }
        };
        apply_operator(condition.operator, &field_value, &condition.value)
    }

    /// Project the condition's target sub-context to JSON and walk the dotted
    /// field path. Scalar roots (time, location, risk) ignore the path.
    fn resolve(&self, condition: &Condition, request: &AccessRequest) -> Option<Value> {
        let root = match condition.condition_type {
            ConditionType::Identity => serde_json::to_value(&request.context.user).ok()?,
            ConditionType::Device => serde_json::to_value(&request.context.device).ok()?,
            ConditionType::Network => serde_json::to_value(&request.context.network).ok()?,
            ConditionType::Application => {
                serde_json::to_value(&request.context.application).ok()?
            }
            ConditionType::Data => serde_json::to_value(&request.resource).ok()?,
            ConditionType::Time => Value::from(self.clock.now().hour()),
            ConditionType::Location => Value::String(request.context.network.location.clone()),
            ConditionType::Risk => Value::from(aggregate_risk(&request.context, &self.weights)),
        };

        if condition.field.is_empty() || !root.is_object() {
            return Some(root);
        }
        let mut current = root;
        for segment in condition.field.split('.') {
            current = current.as_object()?.get(segment)?.clone();
        }
        Some(current)
    }
}

fn apply_operator(operator: ConditionOperator, field: &Value, operand: &PolicyValue) -> bool {
    match operator {
        ConditionOperator::Equals => loose_eq(field, operand),
        ConditionOperator::NotEquals => !loose_eq(field, operand),
        ConditionOperator::Contains => stringify(field).contains(&operand.to_string()),
        ConditionOperator::NotContains => !stringify(field).contains(&operand.to_string()),
        ConditionOperator::GreaterThan => match (as_f64(field), operand_f64(operand)) {
            (Some(f), Some(v)) => f > v,
            _ => false,
        },
        ConditionOperator::LessThan => match (as_f64(field), operand_f64(operand)) {
            (Some(f), Some(v)) => f < v,
            _ => false,
        },
        // A non-list operand can never contain the field value.
        ConditionOperator::In => operand
            .as_list()
            .map(|items| items.iter().any(|i| *i == stringify(field)))
            .unwrap_or(false),
        // Dually, the field value is never in a non-list operand.
        ConditionOperator::NotIn => operand
            .as_list()
            .map(|items| !items.iter().any(|i| *i == stringify(field)))
            .unwrap_or(true),
        ConditionOperator::Regex => match regex::Regex::new(&operand.to_string()) {
            Ok(re) => re.is_match(&stringify(field)),
            Err(_) => false,
        },
    }
}

/// Loose equality: numeric when both sides are numeric, boolean for booleans,
/// otherwise stringified comparison.
fn loose_eq(field: &Value, operand: &PolicyValue) -> bool {
    if let (Some(f), Some(v)) = (as_f64(field), operand.as_number()) {
        return (f - v).abs() < f64::EPSILON;
    }
    if let (Value::Bool(f), PolicyValue::Bool(v)) = (field, operand) {
        return f == v;
    }
    stringify(field) == operand.to_string()
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn operand_f64(operand: &PolicyValue) -> Option<f64> {
    match operand {
        PolicyValue::Number(n) => Some(*n),
        PolicyValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Stringify a field value for substring / membership / regex comparison.
/// Whole numbers print without a trailing fraction so they match the operand
/// side's formatting.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", f as i64),
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SystemClock};
    use crate::context::{Resource, SecurityContext};
    use chrono::{TimeZone, Utc};

    fn request() -> AccessRequest {
        let mut context = SecurityContext::default();
        context.user.id = "u-100".into();
        context.user.authenticated = true;
        context.user.roles = vec!["admin".into(), "developer".into()];
        context.user.risk_score = 30.0;
        context.device.compliance = true;
        context.device.platform = "linux".into();
        context.network.location = "us-east".into();
        context.network.segment = "corp".into();
        context.network.risk_score = 50.0;
        AccessRequest {
            id: "req-1".into(),
            timestamp: Utc::now(),
            context,
            resource: Resource {
                id: "db-finance".into(),
                resource_type: "database".into(),
                classification: "confidential".into(),
                owner: "finance".into(),
                path: None,
            },
            action: "read".into(),
        }
    }

    fn evaluator() -> ConditionEvaluator {
        ConditionEvaluator::new(Arc::new(SystemClock), RiskWeights::default())
    }

    fn condition(
        condition_type: ConditionType,
        field: &str,
        operator: ConditionOperator,
        value: PolicyValue,
    ) -> Condition {
        Condition {
            condition_type,
            field: field.into(),
            operator,
            value,
        }
    }

    #[test]
    fn test_equals_on_bool_field() {
        let ev = evaluator();
        let req = request();
        assert!(ev.evaluate(
            &condition(ConditionType::Identity, "authenticated", ConditionOperator::Equals, true.into()),
            &req
        ));
        assert!(!ev.evaluate(
            &condition(ConditionType::Device, "compliance", ConditionOperator::Equals, false.into()),
            &req
        ));
    }

    #[test]
    fn test_missing_field_is_false() {
        let ev = evaluator();
        let req = request();
        let c = condition(ConditionType::Identity, "no.such.field", ConditionOperator::Equals, true.into());
        assert!(!ev.evaluate(&c, &req));
    }

    #[test]
    fn test_contains_on_role_list() {
        let ev = evaluator();
        let req = request();
        assert!(ev.evaluate(
            &condition(ConditionType::Identity, "roles", ConditionOperator::Contains, "admin".into()),
            &req
        ));
        assert!(ev.evaluate(
            &condition(ConditionType::Identity, "roles", ConditionOperator::NotContains, "auditor".into()),
            &req
        ));
    }

    #[test]
    fn test_numeric_range_operators() {
        let ev = evaluator();
        let req = request();
        assert!(ev.evaluate(
            &condition(ConditionType::Network, "risk_score", ConditionOperator::GreaterThan, 40.0.into()),
            &req
        ));
        assert!(ev.evaluate(
            &condition(ConditionType::Network, "risk_score", ConditionOperator::LessThan, 60.0.into()),
            &req
        ));
        // Non-numeric field degrades to false, never errors.
        assert!(!ev.evaluate(
            &condition(ConditionType::Device, "platform", ConditionOperator::GreaterThan, 1.0.into()),
            &req
        ));
    }

    #[test]
    fn test_in_requires_list_operand() {
        let ev = evaluator();
        let req = request();
        let list = PolicyValue::List(vec!["corp".into(), "dmz".into()]);
        assert!(ev.evaluate(
            &condition(ConditionType::Network, "segment", ConditionOperator::In, list),
            &req
        ));
        // Non-list operand: `in` is always false, `not_in` always true.
        assert!(!ev.evaluate(
            &condition(ConditionType::Network, "segment", ConditionOperator::In, "corp".into()),
            &req
        ));
        assert!(ev.evaluate(
            &condition(ConditionType::Network, "segment", ConditionOperator::NotIn, "corp".into()),
            &req
        ));
    }

    #[test]
    fn test_invalid_regex_degrades_to_false() {
        let ev = evaluator();
        let req = request();
        assert!(!ev.evaluate(
            &condition(ConditionType::Identity, "id", ConditionOperator::Regex, "[unclosed".into()),
            &req
        ));
        assert!(ev.evaluate(
            &condition(ConditionType::Identity, "id", ConditionOperator::Regex, "^u-\\d+$".into()),
            &req
        ));
    }

    #[test]
    fn test_data_type_resolves_against_resource() {
        let ev = evaluator();
        let req = request();
        assert!(ev.evaluate(
            &condition(ConditionType::Data, "classification", ConditionOperator::Equals, "confidential".into()),
            &req
        ));
    }

    #[test]
    fn test_location_ignores_field_path() {
        let ev = evaluator();
        let req = request();
        assert!(ev.evaluate(
            &condition(ConditionType::Location, "anything", ConditionOperator::Equals, "us-east".into()),
            &req
        ));
    }

    #[test]
    fn test_time_uses_injected_clock() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap(),
        ));
        let ev = ConditionEvaluator::new(clock, RiskWeights::default());
        let req = request();
        assert!(ev.evaluate(
            &condition(ConditionType::Time, "hour", ConditionOperator::GreaterThan, 9.0.into()),
            &req
        ));
        assert!(ev.evaluate(
            &condition(ConditionType::Time, "hour", ConditionOperator::LessThan, 18.0.into()),
            &req
        ));
        assert!(ev.evaluate(
            &condition(ConditionType::Time, "hour", ConditionOperator::Equals, 14.0.into()),
            &req
        ));
    }

    #[test]
    fn test_risk_type_uses_live_aggregate() {
        let ev = evaluator();
        let req = request();
        // user 30*0.30 + network 50*0.20 = 19.0
        assert!(ev.evaluate(
            &condition(ConditionType::Risk, "", ConditionOperator::LessThan, 20.0.into()),
            &req
        ));
        assert!(ev.evaluate(
            &condition(ConditionType::Risk, "", ConditionOperator::GreaterThan, 18.0.into()),
            &req
        ));
    }

    #[test]
    fn test_determinism_for_non_time_conditions() {
        let ev = evaluator();
        let req = request();
        let c = condition(ConditionType::Identity, "roles", ConditionOperator::Contains, "admin".into());
        let first = ev.evaluate(&c, &req);
        for _ in 0..10 {
            assert_eq!(ev.evaluate(&c, &req), first);
        }
    }
}
