//! Security context and request types.
//!
//! A [`SecurityContext`] is the five-dimensional snapshot (user, device,
//! network, application, session) describing the principal and environment of
//! a request. Per-dimension `risk_score` fields are independently bounded to
//! [0,100]; the scorer clamps defensively on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Typed value for policy condition operands, action parameters, and context
/// attributes. Anything outside these four shapes is rejected at policy
/// registration, not at evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
}

impl PolicyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PolicyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PolicyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// JSON projection used by the condition evaluator's loose comparisons.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PolicyValue::Bool(b) => serde_json::Value::Bool(*b),
            PolicyValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PolicyValue::String(s) => serde_json::Value::String(s.clone()),
            PolicyValue::List(items) => serde_json::Value::Array(
                items.iter().cloned().map(serde_json::Value::String).collect(),
            ),
        }
    }
}

impl fmt::Display for PolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyValue::Bool(b) => write!(f, "{}", b),
            PolicyValue::Number(n) => write!(f, "{}", n),
            PolicyValue::String(s) => write!(f, "{}", s),
            PolicyValue::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<&str> for PolicyValue {
    fn from(s: &str) -> Self {
        PolicyValue::String(s.to_string())
    }
}

impl From<f64> for PolicyValue {
    fn from(n: f64) -> Self {
        PolicyValue::Number(n)
    }
}

impl From<bool> for PolicyValue {
    fn from(b: bool) -> Self {
        PolicyValue::Bool(b)
    }
}

impl From<Vec<String>> for PolicyValue {
    fn from(items: Vec<String>) -> Self {
        PolicyValue::List(items)
    }
}

// ── Sub-contexts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub id: String,
    pub authenticated: bool,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, PolicyValue>,
    pub risk_score: f64,
    pub auth_methods: Vec<String>,
    pub last_auth_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceContext {
    pub id: String,
    pub platform: String,
    pub compliance: bool,
    pub risk_score: f64,
    pub certificates: Vec<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkContext {
    pub source_ip: String,
    pub location: String,
    pub vpn: bool,
    pub segment: String,
    pub risk_score: f64,
    pub connection_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationContext {
    pub id: String,
    pub classification: String,
    pub risk_score: f64,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_secs: u64,
    pub activity: Vec<String>,
    pub anomalies: Vec<String>,
    pub risk_score: f64,
}

/// The full five-dimensional context embedded in every [`AccessRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityContext {
    pub user: UserContext,
    pub device: DeviceContext,
    pub network: NetworkContext,
    pub application: ApplicationContext,
    pub session: SessionContext,
}

// ── Request ─────────────────────────────────────────────────────────────────

/// Target of an access request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub resource_type: String,
    pub classification: String,
    pub owner: String,
    pub path: Option<String>,
}

/// Immutable per-call access request. Not persisted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub context: SecurityContext,
    pub resource: Resource,
    pub action: String,
}
