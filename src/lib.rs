//! # Trustplane — Continuous zero-trust access decision engine
//!
//! Evaluates inbound resource-access requests against a prioritized set of
//! declarative policies, folds in a multi-factor risk score, and emits an
//! allow/deny/challenge decision with audit metadata. The same loop feeds a
//! bounded security-event log, a metrics aggregator, and in-memory threat
//! intelligence state.
//!
//! Components:
//! - **Policy Store** — active policies (condition trees + actions), keyed by
//!   id, evaluated in priority order
//! - **Risk Scorer** — weighted 0–100 aggregate over the five context dimensions
//! - **Condition Evaluator** — resolves policy conditions against a request's
//!   security context; degrades to false, never aborts
//! - **Policy Matcher** — all-conditions-AND match, stable priority ordering
//! - **Decision Engine** — first-match-wins with risk escalation and a
//!   fail-closed default deny
//! - **Security Event Bus** — bounded event log, severity-gated incident /
//!   ticket / investigation dispatch, periodic anomaly detection
//! - **Metrics Aggregator** — atomic counters for auth/authz/device outcomes
//! - **Threat Intelligence** — categorized indicator sets with periodic refresh
//!
//! The orchestrator ties these together behind a small in-process API:
//! `initialize`, `evaluate_access`, `handle_security_event`, policy mutation,
//! and read-only snapshots. Every fault inside the decision path resolves to a
//! denial — fail-closed is the core invariant.

pub mod clock;
pub mod condition;
pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod event_bus;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod policy;
pub mod risk;
pub mod threat_intel;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::OrchestratorConfig;
pub use context::{AccessRequest, PolicyValue, Resource, SecurityContext};
pub use decision::{AccessDecision, DecisionOutcome};
pub use error::{OrchestratorError, TrustResult};
pub use event_bus::{EventType, Notification, SecurityEvent, Severity};
pub use orchestrator::ZeroTrustOrchestrator;
pub use policy::{ActionType, Condition, ConditionOperator, ConditionType, Policy, PolicyAction};
