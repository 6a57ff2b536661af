//! Security event bus.
//!
//! Ingests security events into a fixed-capacity ring (oldest-first
//! eviction), notifies subscribers through a closed notification enum, and
//! dispatches high/critical events by type: threats open incidents,
//! compliance events open tickets, anomalies trigger investigations.
//! Periodic anomaly detection inspects the recent window and synthesizes at
//! most one spike event per cycle.

use crate::clock::Clock;
use crate::context::PolicyValue;
use crate::metrics::MetricsSnapshot;
use crate::threat_intel::ThreatIntelligence;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source tag on synthesized spike events; excluded from the spike count so
/// detection never amplifies its own output.
const ANOMALY_DETECTOR_SOURCE: &str = "anomaly_detector";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Threat,
    Compliance,
    Anomaly,
    Audit,
    AccessDenied,
    Vulnerability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub severity: Severity,
    pub source: String,
    pub description: String,
    #[serde(default)]
    pub context: HashMap<String, PolicyValue>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    Investigating,
    Resolved,
}

/// Incident or compliance-ticket record opened for a high-severity event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub event: SecurityEvent,
}

/// Everything the bus tells the outside world. A closed enum instead of
/// string-keyed event names, so subscribers match exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Notification {
    EventLogged(SecurityEvent),
    Incident(CaseRecord),
    ComplianceTicket(CaseRecord),
    Investigation {
        event: SecurityEvent,
        opened_at: DateTime<Utc>,
    },
    PolicyChanged {
        policy_id: String,
        removed: bool,
    },
    MetricsUpdated(MetricsSnapshot),
    ThreatIntelUpdated(ThreatIntelligence),
}

pub type NotificationFn = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Subscriber {
    id: u64,
    name: String,
    min_event_severity: Option<Severity>,
    callback: NotificationFn,
}

pub struct SecurityEventBus {
    log: RwLock<VecDeque<SecurityEvent>>,
    capacity: usize,
    incidents: RwLock<Vec<CaseRecord>>,
    tickets: RwLock<Vec<CaseRecord>>,
    subscribers: RwLock<Vec<Subscriber>>,
    anomaly_window: usize,
    anomaly_threshold: usize,
    next_sub_id: AtomicU64,
    next_case_id: AtomicU64,
    next_anomaly_id: AtomicU64,
    total_ingested: AtomicU64,
    total_evicted: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl SecurityEventBus {
    pub fn new(
        capacity: usize,
        anomaly_window: usize,
        anomaly_threshold: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            log: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            incidents: RwLock::new(Vec::new()),
            tickets: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
            anomaly_window,
            anomaly_threshold,
            next_sub_id: AtomicU64::new(1),
            next_case_id: AtomicU64::new(1),
            next_anomaly_id: AtomicU64::new(1),
            total_ingested: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
            clock,
        }
    }

    // ── Ingestion ───────────────────────────────────────────────────────────

    /// Append an event, notify subscribers, and dispatch severity-gated
    /// handlers. Fire-and-forget: handler failures are logged, never raised.
    pub fn handle(&self, event: SecurityEvent) {
        self.total_ingested.fetch_add(1, Ordering::Relaxed);
        debug!(
            event_id = %event.id,
            event_type = ?event.event_type,
            severity = ?event.severity,
            source = %event.source,
            "Security event ingested"
        );

        {
            let mut log = self.log.write();
            while log.len() >= self.capacity {
                log.pop_front();
                self.total_evicted.fetch_add(1, Ordering::Relaxed);
            }
            log.push_back(event.clone());
        }

        self.publish(&Notification::EventLogged(event.clone()));

        if event.severity >= Severity::High {
            self.dispatch_high_severity(event);
        }
    }

    fn dispatch_high_severity(&self, event: SecurityEvent) {
        match event.event_type {
            EventType::Threat => {
                let record = self.open_case(event, "incident");
                info!(case_id = %record.id, "Incident created for threat event");
                self.incidents.write().push(record.clone());
                self.publish(&Notification::Incident(record));
            }
            EventType::Compliance => {
                let record = self.open_case(event, "ticket");
                info!(case_id = %record.id, "Compliance ticket created");
                self.tickets.write().push(record.clone());
                self.publish(&Notification::ComplianceTicket(record));
            }
            EventType::Anomaly => {
                let opened_at = self.clock.now();
                warn!(event_id = %event.id, "Anomaly investigation opened");
                self.publish(&Notification::Investigation { event, opened_at });
            }
            _ => {
                debug!(event_type = ?event.event_type, "High-severity event logged only");
            }
        }
    }

    fn open_case(&self, event: SecurityEvent, prefix: &str) -> CaseRecord {
        let seq = self.next_case_id.fetch_add(1, Ordering::Relaxed);
        CaseRecord {
            id: format!("{}-{}", prefix, seq),
            status: CaseStatus::Open,
            created_at: self.clock.now(),
            event,
        }
    }

    // ── Anomaly detection ───────────────────────────────────────────────────

    /// One detection cycle over the most recent window. More than
    /// `anomaly_threshold` high/critical events synthesize exactly one spike
    /// event, which is fed back through `handle`. Previously synthesized
    /// events are excluded from the count, so the feedback path cannot
    /// amplify itself.
    pub fn detect_anomalies(&self) -> Option<SecurityEvent> {
        let spike_count = {
            let log = self.log.read();
            log.iter()
                .rev()
                .take(self.anomaly_window)
                .filter(|e| e.severity >= Severity::High && e.source != ANOMALY_DETECTOR_SOURCE)
                .count()
        };
        if spike_count <= self.anomaly_threshold {
            return None;
        }

        let seq = self.next_anomaly_id.fetch_add(1, Ordering::Relaxed);
        let event = SecurityEvent {
            id: format!("anomaly-{}", seq),
            timestamp: self.clock.now(),
            event_type: EventType::Anomaly,
            severity: Severity::High,
            source: ANOMALY_DETECTOR_SOURCE.to_string(),
            description: format!(
                "{} high-severity events within the last {} events",
                spike_count, self.anomaly_window
            ),
            context: HashMap::new(),
            metadata: HashMap::new(),
        };
        warn!(count = spike_count, window = self.anomaly_window, "Event spike detected");
        self.handle(event.clone());
        Some(event)
    }

    // ── Subscriptions ───────────────────────────────────────────────────────

    /// Register an observer. `min_event_severity` filters `EventLogged`
    /// notifications only; incidents, tickets, and the rest always deliver.
    pub fn subscribe(
        &self,
        name: &str,
        min_event_severity: Option<Severity>,
        callback: NotificationFn,
    ) -> u64 {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push(Subscriber {
            id,
            name: name.to_string(),
            min_event_severity,
            callback,
        });
        debug!(subscriber = name, id, "Subscriber registered");
        id
    }

    pub fn unsubscribe(&self, subscriber_id: u64) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|s| {
            if s.id == subscriber_id {
                debug!(subscriber = %s.name, id = s.id, "Subscriber removed");
                false
            } else {
                true
            }
        });
        subs.len() < before
    }

    pub fn publish(&self, notification: &Notification) {
        let subs = self.subscribers.read();
        for sub in subs.iter() {
            if let (Notification::EventLogged(event), Some(min)) =
                (notification, sub.min_event_severity)
            {
                if event.severity < min {
                    continue;
                }
            }
            (sub.callback)(notification);
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Most recent events, newest first, up to `limit`.
    pub fn tail(&self, limit: usize) -> Vec<SecurityEvent> {
        let log = self.log.read();
        log.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.read().is_empty()
    }

    pub fn incidents(&self) -> Vec<CaseRecord> {
        self.incidents.read().clone()
    }

    pub fn tickets(&self) -> Vec<CaseRecord> {
        self.tickets.read().clone()
    }

    pub fn total_ingested(&self) -> u64 {
        self.total_ingested.load(Ordering::Relaxed)
    }

    pub fn total_evicted(&self) -> u64 {
        self.total_evicted.load(Ordering::Relaxed)
    }
}
