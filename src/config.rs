//! Typed orchestrator configuration.
//!
//! Loadable from TOML with every section optional; missing file falls back to
//! defaults with a warning so a bare deployment still comes up fail-closed.

use crate::error::{OrchestratorError, TrustResult};
use crate::risk::RiskWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Health/metrics/anomaly tick interval in seconds.
    pub health_tick_secs: u64,
    /// Threat-intelligence refresh interval in seconds.
    pub threat_intel_refresh_secs: u64,
    /// Whether initialize() spawns the background timers. Disabled in unit
    /// tests that run without a Tokio runtime.
    pub enable_background_tasks: bool,
    #[serde(default)]
    pub events: EventLogConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            health_tick_secs: 30,
            threat_intel_refresh_secs: 3600,
            enable_background_tasks: true,
            events: EventLogConfig::default(),
            anomaly: AnomalyConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Ring capacity of the in-memory security event log; oldest entries are
    /// evicted first.
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// How many recent events each detection cycle inspects.
    pub window: usize,
    /// High/critical event count above which a spike event is synthesized.
    pub high_severity_threshold: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window: 100,
            high_severity_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub weights: RiskWeights,
    /// Risk score above which a matched `allow` is elevated to `challenge`.
    pub escalation_threshold: f64,
    /// Lifetime of a matched decision before the caller must re-evaluate.
    pub decision_ttl_secs: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            escalation_threshold: crate::risk::HIGH_RISK_THRESHOLD,
            decision_ttl_secs: 3600,
        }
    }
}

impl OrchestratorConfig {
    /// Load from a TOML file. A missing file yields defaults; a malformed
    /// file is a configuration error.
    pub fn from_toml_file(path: impl AsRef<Path>) -> TrustResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| OrchestratorError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Configuration loaded");
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TrustResult<()> {
        if self.events.capacity == 0 {
            return Err(OrchestratorError::Config(
                "events.capacity must be at least 1".into(),
            ));
        }
        if self.anomaly.window == 0 {
            return Err(OrchestratorError::Config(
                "anomaly.window must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.risk.escalation_threshold) {
            return Err(OrchestratorError::Config(
                "risk.escalation_threshold must be within [0,100]".into(),
            ));
        }
        Ok(())
    }
}
