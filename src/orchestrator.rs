//! # Zero Trust Orchestrator — runtime entry point
//!
//! Owns the policy store, decision engine, event bus, metrics registry, and
//! threat-intelligence state, and drives the two background timers:
//!
//! - **Health tick** (default 30s) — health check, metrics republish, anomaly
//!   detection over the recent event window
//! - **Threat-intel refresh** (default 1h) — restamps and republishes the
//!   threat-intel snapshot; failures are logged, never fatal
//!
//! `initialize` is the only operation allowed to fail loudly (a misconfigured
//! deny-all bootstrap is a critical safety property). `evaluate_access` never
//! errors: the worst case is an opaque fail-closed deny.

use crate::clock::{Clock, SystemClock};
use crate::condition::ConditionEvaluator;
use crate::config::OrchestratorConfig;
use crate::context::AccessRequest;
use crate::decision::{AccessDecision, DecisionEngine, DecisionOutcome};
use crate::error::TrustResult;
use crate::event_bus::{
    EventType, Notification, NotificationFn, SecurityEvent, SecurityEventBus, Severity,
};
use crate::matcher::PolicyMatcher;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::policy::{bootstrap_policies, Policy, PolicyStore};
use crate::threat_intel::{IndicatorCounts, ThreatIntelStore, ThreatIntelligence};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Point-in-time system health snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub initialized: bool,
    pub policy_count: usize,
    pub event_count: usize,
    pub threat_indicators: IndicatorCounts,
    pub last_threat_intel_update: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

pub struct ZeroTrustOrchestrator {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    store: Arc<PolicyStore>,
    engine: DecisionEngine,
    bus: Arc<SecurityEventBus>,
    metrics: Arc<MetricsRegistry>,
    threat_intel: Arc<ThreatIntelStore>,
    initialized: AtomicBool,
    running: Arc<AtomicBool>,
    denied_event_seq: AtomicU64,
    started_at: RwLock<Option<std::time::Instant>>,
}

impl ZeroTrustOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Construct with an injected clock so time-dependent conditions and
    /// decision expiry are deterministic under test.
    pub fn with_clock(config: OrchestratorConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(PolicyStore::new());
        let engine = DecisionEngine::new(
            PolicyMatcher::new(
                store.clone(),
                ConditionEvaluator::new(clock.clone(), config.risk.weights),
            ),
            config.risk.clone(),
            clock.clone(),
        );
        let bus = Arc::new(SecurityEventBus::new(
            config.events.capacity,
            config.anomaly.window,
            config.anomaly.high_severity_threshold,
            clock.clone(),
        ));
        Self {
            threat_intel: Arc::new(ThreatIntelStore::new(clock.clone())),
            config,
            clock,
            store,
            engine,
            bus,
            metrics: Arc::new(MetricsRegistry::new()),
            initialized: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            denied_event_seq: AtomicU64::new(1),
            started_at: RwLock::new(None),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Idempotent startup: loads the bootstrap policy set and spawns the
    /// background timers. Bootstrap validation failure propagates — callers
    /// must not treat the engine as ready if this errors.
    pub fn initialize(&self) -> TrustResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            debug!("Orchestrator already initialized");
            return Ok(());
        }

        for policy in bootstrap_policies(self.clock.now()) {
            self.store.upsert(policy)?;
        }
        info!(policies = self.store.len(), "Bootstrap policies loaded");

        self.running.store(true, Ordering::SeqCst);
        *self.started_at.write() = Some(std::time::Instant::now());
        if self.config.enable_background_tasks {
            self.spawn_health_tick();
            self.spawn_threat_intel_refresh();
        }
        self.initialized.store(true, Ordering::SeqCst);
        info!("Zero trust orchestrator initialized");
        Ok(())
    }

    fn spawn_health_tick(&self) {
        let running = self.running.clone();
        let bus = self.bus.clone();
        let metrics = self.metrics.clone();
        let store = self.store.clone();
        let interval_secs = self.config.health_tick_secs;

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            ticker.tick().await;
            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                debug!(
                    policies = store.len(),
                    events = bus.len(),
                    "Health check"
                );
                bus.publish(&Notification::MetricsUpdated(metrics.snapshot()));
                if let Some(event) = bus.detect_anomalies() {
                    metrics.record_event_ingested();
                    debug!(event_id = %event.id, "Spike event synthesized");
                }
            }
        });
    }

    fn spawn_threat_intel_refresh(&self) {
        let running = self.running.clone();
        let bus = self.bus.clone();
        let intel = self.threat_intel.clone();
        let interval_secs = self.config.threat_intel_refresh_secs;

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            ticker.tick().await;
            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                let snapshot = intel.refresh();
                bus.publish(&Notification::ThreatIntelUpdated(snapshot));
            }
        });
    }

    /// Stop the background timers and mark the engine uninitialized.
    /// In-flight evaluations complete; they are never aborted.
    pub fn shutdown(&self) {
        info!("Shutting down zero trust orchestrator");
        self.running.store(false, Ordering::SeqCst);
        self.initialized.store(false, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    // ── Decision path ───────────────────────────────────────────────────────

    /// Evaluate a request. Never errors; every internal fault resolves to a
    /// fail-closed deny. A denied outcome is folded back into the event log
    /// as an `access_denied` audit event.
    pub fn evaluate_access(&self, request: &AccessRequest) -> AccessDecision {
        let decision = self.engine.evaluate(request);

        self.metrics.record_decision(decision.decision);
        self.metrics
            .record_device_compliance(request.context.device.compliance);
        self.metrics.record_network_inspection(
            decision.metadata.risk_score > self.config.risk.escalation_threshold,
        );
        self.metrics.record_application_check();
        let classification = request.resource.classification.as_str();
        self.metrics
            .record_data_access(!classification.is_empty() && classification != "public");

        if decision.decision == DecisionOutcome::Deny {
            self.emit_denied_event(request, &decision);
        }
        decision
    }

    fn emit_denied_event(&self, request: &AccessRequest, decision: &AccessDecision) {
        let seq = self.denied_event_seq.fetch_add(1, Ordering::Relaxed);
        let mut metadata = HashMap::new();
        metadata.insert("request_id".to_string(), request.id.clone());
        metadata.insert("resource_id".to_string(), request.resource.id.clone());
        metadata.insert("user_id".to_string(), request.context.user.id.clone());
        self.metrics.record_event_ingested();
        self.bus.handle(SecurityEvent {
            id: format!("denied-{}", seq),
            timestamp: self.clock.now(),
            event_type: EventType::AccessDenied,
            severity: Severity::Medium,
            source: "decision_engine".to_string(),
            description: format!(
                "Access denied for '{}' on '{}': {}",
                request.context.user.id, request.resource.id, decision.reason
            ),
            context: HashMap::new(),
            metadata,
        });
    }

    // ── Event path ──────────────────────────────────────────────────────────

    /// Fire-and-forget ingestion; dispatch failures inside the bus are
    /// logged, never surfaced.
    pub fn handle_security_event(&self, event: SecurityEvent) {
        self.metrics.record_event_ingested();
        self.bus.handle(event);
    }

    /// Feed from the external identity collaborator: one authentication
    /// outcome, folded into the metrics counters.
    pub fn record_authentication(&self, success: bool, mfa_used: bool) {
        self.metrics.record_authentication(success, mfa_used);
    }

    // ── Policy management ───────────────────────────────────────────────────

    pub fn set_policy(&self, policy: Policy) -> TrustResult<()> {
        let policy_id = policy.id.clone();
        self.store.upsert(policy)?;
        info!(policy_id = %policy_id, "Policy set");
        self.bus.publish(&Notification::PolicyChanged {
            policy_id,
            removed: false,
        });
        Ok(())
    }

    pub fn remove_policy(&self, policy_id: &str) -> bool {
        let removed = self.store.remove(policy_id);
        if removed {
            info!(policy_id, "Policy removed");
            self.bus.publish(&Notification::PolicyChanged {
                policy_id: policy_id.to_string(),
                removed: true,
            });
        } else {
            warn!(policy_id, "Policy removal requested for unknown id");
        }
        removed
    }

    // ── Read-only snapshots ─────────────────────────────────────────────────

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn security_events(&self, limit: usize) -> Vec<SecurityEvent> {
        self.bus.tail(limit)
    }

    pub fn policies(&self) -> Vec<Policy> {
        self.store.snapshot()
    }

    pub fn threat_intelligence(&self) -> ThreatIntelligence {
        self.threat_intel.snapshot()
    }

    pub fn status(&self) -> OrchestratorStatus {
        let uptime_secs = self
            .started_at
            .read()
            .map(|s| s.elapsed().as_secs())
            .unwrap_or(0);
        OrchestratorStatus {
            initialized: self.initialized.load(Ordering::SeqCst),
            policy_count: self.store.len(),
            event_count: self.bus.len(),
            threat_indicators: self.threat_intel.counts(),
            last_threat_intel_update: self.threat_intel.last_updated(),
            uptime_secs,
        }
    }

    // ── Collaborator access ─────────────────────────────────────────────────

    /// Subscribe to orchestrator notifications (incidents, tickets,
    /// investigations, policy changes, snapshot republishes).
    pub fn subscribe(
        &self,
        name: &str,
        min_event_severity: Option<Severity>,
        callback: NotificationFn,
    ) -> u64 {
        self.bus.subscribe(name, min_event_severity, callback)
    }

    pub fn unsubscribe(&self, subscriber_id: u64) -> bool {
        self.bus.unsubscribe(subscriber_id)
    }

    /// Threat-intelligence state, for indicator loading and lookups by the
    /// network-inspection collaborator.
    pub fn threat_intel(&self) -> &Arc<ThreatIntelStore> {
        &self.threat_intel
    }

    /// Event bus handle for external subscribers.
    pub fn event_bus(&self) -> &Arc<SecurityEventBus> {
        &self.bus
    }
}
