//! Multi-factor risk scoring.
//!
//! Pure function over the five context dimensions. Sub-scores are clamped to
//! [0,100] before combination, so a malformed context can never push the
//! aggregate out of range.

use crate::context::SecurityContext;
use serde::{Deserialize, Serialize};

/// Risk score above which an `allow` outcome is elevated to `challenge`.
pub const HIGH_RISK_THRESHOLD: f64 = 80.0;
/// Risk score above which `elevated_risk` is reported as a factor.
pub const ELEVATED_RISK_THRESHOLD: f64 = 60.0;
/// Risk score above which `moderate_risk` is reported as a factor.
pub const MODERATE_RISK_THRESHOLD: f64 = 40.0;

/// Per-dimension weights for the aggregate score. The defaults are fixed by
/// the decision model: user 0.30, device 0.25, network 0.20, application
/// 0.15, session 0.10.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskWeights {
    pub user: f64,
    pub device: f64,
    pub network: f64,
    pub application: f64,
    pub session: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            user: 0.30,
            device: 0.25,
            network: 0.20,
            application: 0.15,
            session: 0.10,
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        100.0
    }
}

/// Weighted aggregate risk over the five dimensions, clamped to [0,100].
pub fn aggregate_risk(context: &SecurityContext, weights: &RiskWeights) -> f64 {
    let score = clamp_score(context.user.risk_score) * weights.user
        + clamp_score(context.device.risk_score) * weights.device
        + clamp_score(context.network.risk_score) * weights.network
        + clamp_score(context.application.risk_score) * weights.application
        + clamp_score(context.session.risk_score) * weights.session;
    score.clamp(0.0, 100.0)
}

/// Additive risk-factor labels for decision audit metadata. All tiers a score
/// exceeds are reported, not just the highest.
pub fn risk_factors(score: f64) -> Vec<String> {
    let mut factors = Vec::new();
    if score > HIGH_RISK_THRESHOLD {
        factors.push("high_risk_score".to_string());
    }
    if score > ELEVATED_RISK_THRESHOLD {
        factors.push("elevated_risk".to_string());
    }
    if score > MODERATE_RISK_THRESHOLD {
        factors.push("moderate_risk".to_string());
    }
    factors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_scores(user: f64, device: f64, network: f64, app: f64, session: f64) -> SecurityContext {
        let mut ctx = SecurityContext::default();
        ctx.user.risk_score = user;
        ctx.device.risk_score = device;
        ctx.network.risk_score = network;
        ctx.application.risk_score = app;
        ctx.session.risk_score = session;
        ctx
    }

    #[test]
    fn test_weighted_sum() {
        let ctx = context_with_scores(100.0, 100.0, 100.0, 100.0, 100.0);
        let score = aggregate_risk(&ctx, &RiskWeights::default());
        assert!((score - 100.0).abs() < 1e-9);

        let ctx = context_with_scores(50.0, 0.0, 0.0, 0.0, 0.0);
        let score = aggregate_risk(&ctx, &RiskWeights::default());
        assert!((score - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_sub_scores_are_clamped() {
        let ctx = context_with_scores(5000.0, -300.0, f64::NAN, 100.0, 100.0);
        let score = aggregate_risk(&ctx, &RiskWeights::default());
        assert!(score >= 0.0 && score <= 100.0);
    }

    #[test]
    fn test_risk_factors_are_additive() {
        assert_eq!(
            risk_factors(85.0),
            vec!["high_risk_score", "elevated_risk", "moderate_risk"]
        );
        assert_eq!(risk_factors(65.0), vec!["elevated_risk", "moderate_risk"]);
        assert_eq!(risk_factors(45.0), vec!["moderate_risk"]);
        assert!(risk_factors(20.0).is_empty());
    }
}
