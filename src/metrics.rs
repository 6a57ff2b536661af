//! Zero-trust metrics aggregation.
//!
//! Counters are incremented atomically, inline with decision and event
//! handling, and reset only on process restart. `snapshot()` returns an
//! owned value, never a view into live state.

use crate::decision::DecisionOutcome;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct MetricsRegistry {
    auth_attempts: AtomicU64,
    auth_successes: AtomicU64,
    auth_failures: AtomicU64,
    mfa_used: AtomicU64,
    authz_total: AtomicU64,
    authz_allowed: AtomicU64,
    authz_denied: AtomicU64,
    authz_challenged: AtomicU64,
    devices_compliant: AtomicU64,
    devices_non_compliant: AtomicU64,
    network_requests_inspected: AtomicU64,
    network_high_risk_flagged: AtomicU64,
    application_checks: AtomicU64,
    data_classified_accesses: AtomicU64,
    events_ingested: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub authentication: AuthenticationStats,
    pub authorization: AuthorizationStats,
    pub devices: DeviceStats,
    pub network: NetworkStats,
    pub application: ApplicationStats,
    pub data: DataStats,
    pub events_ingested: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticationStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub mfa_used: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationStats {
    pub total: u64,
    pub allowed: u64,
    pub denied: u64,
    pub challenged: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceStats {
    pub compliant_checks: u64,
    pub non_compliant_checks: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub requests_inspected: u64,
    pub high_risk_flagged: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationStats {
    pub checks: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataStats {
    pub classified_accesses: u64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_authentication(&self, success: bool, mfa_used: bool) {
        self.auth_attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.auth_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.auth_failures.fetch_add(1, Ordering::Relaxed);
        }
        if mfa_used {
            self.mfa_used.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_decision(&self, outcome: DecisionOutcome) {
        self.authz_total.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            DecisionOutcome::Allow => &self.authz_allowed,
            DecisionOutcome::Deny => &self.authz_denied,
            DecisionOutcome::Challenge => &self.authz_challenged,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_compliance(&self, compliant: bool) {
        let counter = if compliant {
            &self.devices_compliant
        } else {
            &self.devices_non_compliant
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_inspection(&self, high_risk: bool) {
        self.network_requests_inspected.fetch_add(1, Ordering::Relaxed);
        if high_risk {
            self.network_high_risk_flagged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_application_check(&self) {
        self.application_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_data_access(&self, classified: bool) {
        if classified {
            self.data_classified_accesses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_event_ingested(&self) {
        self.events_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            authentication: AuthenticationStats {
                attempts: self.auth_attempts.load(Ordering::Relaxed),
                successes: self.auth_successes.load(Ordering::Relaxed),
                failures: self.auth_failures.load(Ordering::Relaxed),
                mfa_used: self.mfa_used.load(Ordering::Relaxed),
            },
            authorization: AuthorizationStats {
                total: self.authz_total.load(Ordering::Relaxed),
                allowed: self.authz_allowed.load(Ordering::Relaxed),
                denied: self.authz_denied.load(Ordering::Relaxed),
                challenged: self.authz_challenged.load(Ordering::Relaxed),
            },
            devices: DeviceStats {
                compliant_checks: self.devices_compliant.load(Ordering::Relaxed),
                non_compliant_checks: self.devices_non_compliant.load(Ordering::Relaxed),
            },
            network: NetworkStats {
                requests_inspected: self.network_requests_inspected.load(Ordering::Relaxed),
                high_risk_flagged: self.network_high_risk_flagged.load(Ordering::Relaxed),
            },
            application: ApplicationStats {
                checks: self.application_checks.load(Ordering::Relaxed),
            },
            data: DataStats {
                classified_accesses: self.data_classified_accesses.load(Ordering::Relaxed),
            },
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_counters() {
        let metrics = MetricsRegistry::new();
        metrics.record_decision(DecisionOutcome::Allow);
        metrics.record_decision(DecisionOutcome::Deny);
        metrics.record_decision(DecisionOutcome::Deny);
        metrics.record_decision(DecisionOutcome::Challenge);

        let snap = metrics.snapshot();
        assert_eq!(snap.authorization.total, 4);
        assert_eq!(snap.authorization.allowed, 1);
        assert_eq!(snap.authorization.denied, 2);
        assert_eq!(snap.authorization.challenged, 1);
    }

    #[test]
    fn test_authentication_counters() {
        let metrics = MetricsRegistry::new();
        metrics.record_authentication(true, true);
        metrics.record_authentication(false, false);

        let snap = metrics.snapshot();
        assert_eq!(snap.authentication.attempts, 2);
        assert_eq!(snap.authentication.successes, 1);
        assert_eq!(snap.authentication.failures, 1);
        assert_eq!(snap.authentication.mfa_used, 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let metrics = MetricsRegistry::new();
        metrics.record_decision(DecisionOutcome::Allow);
        let snap = metrics.snapshot();
        metrics.record_decision(DecisionOutcome::Allow);
        assert_eq!(snap.authorization.total, 1);
        assert_eq!(metrics.snapshot().authorization.total, 2);
    }
}
