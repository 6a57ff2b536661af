//! In-memory threat intelligence state.
//!
//! Categorized indicator sets (IPs, domains, file hashes, signatures), a
//! campaign list, and a risk-score map. Actual feed ingestion is an external
//! collaborator; `refresh()` stamps the snapshot and is driven by the
//! orchestrator's refresh timer.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Ip,
    Domain,
    FileHash,
    Signature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub description: String,
    pub active: bool,
}

/// Owned snapshot handed to callers; mutating it has no effect on the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatIntelligence {
    pub ips: Vec<String>,
    pub domains: Vec<String>,
    pub file_hashes: Vec<String>,
    pub signatures: Vec<String>,
    pub campaigns: Vec<Campaign>,
    pub risk_scores: HashMap<String, f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IndicatorCounts {
    pub ips: usize,
    pub domains: usize,
    pub file_hashes: usize,
    pub signatures: usize,
}

pub struct ThreatIntelStore {
    ips: RwLock<HashSet<String>>,
    domains: RwLock<HashSet<String>>,
    file_hashes: RwLock<HashSet<String>>,
    signatures: RwLock<HashSet<String>>,
    campaigns: RwLock<Vec<Campaign>>,
    risk_scores: RwLock<HashMap<String, f64>>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl ThreatIntelStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ips: RwLock::new(HashSet::new()),
            domains: RwLock::new(HashSet::new()),
            file_hashes: RwLock::new(HashSet::new()),
            signatures: RwLock::new(HashSet::new()),
            campaigns: RwLock::new(Vec::new()),
            risk_scores: RwLock::new(HashMap::new()),
            last_updated: RwLock::new(None),
            clock,
        }
    }

    pub fn add_indicator(&self, kind: IndicatorKind, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        match kind {
            IndicatorKind::Ip => {
                self.ips.write().insert(value.to_string());
            }
            IndicatorKind::Domain => {
                self.domains.write().insert(value.to_lowercase());
            }
            IndicatorKind::FileHash => {
                self.file_hashes.write().insert(value.to_lowercase());
            }
            IndicatorKind::Signature => {
                self.signatures.write().insert(value.to_string());
            }
        }
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.campaigns.write().push(campaign);
    }

    pub fn set_risk_score(&self, key: &str, score: f64) {
        self.risk_scores
            .write()
            .insert(key.to_string(), score.clamp(0.0, 100.0));
    }

    pub fn is_known_malicious_ip(&self, ip: &str) -> bool {
        self.ips.read().contains(ip)
    }

    pub fn is_known_malicious_domain(&self, domain: &str) -> bool {
        self.domains.read().contains(&domain.to_lowercase())
    }

    pub fn is_known_malicious_hash(&self, hash: &str) -> bool {
        self.file_hashes.read().contains(&hash.to_lowercase())
    }

    /// Stamp the snapshot as refreshed. Feed ingestion happens outside this
    /// subsystem; a failed external pull simply means the previous indicator
    /// state carries over to the next tick.
    pub fn refresh(&self) -> ThreatIntelligence {
        let now = self.clock.now();
        *self.last_updated.write() = Some(now);
        debug!(at = %now, "Threat intelligence refreshed");
        self.snapshot()
    }

    pub fn snapshot(&self) -> ThreatIntelligence {
        let mut ips: Vec<String> = self.ips.read().iter().cloned().collect();
        let mut domains: Vec<String> = self.domains.read().iter().cloned().collect();
        let mut file_hashes: Vec<String> = self.file_hashes.read().iter().cloned().collect();
        let mut signatures: Vec<String> = self.signatures.read().iter().cloned().collect();
        ips.sort();
        domains.sort();
        file_hashes.sort();
        signatures.sort();
        ThreatIntelligence {
            ips,
            domains,
            file_hashes,
            signatures,
            campaigns: self.campaigns.read().clone(),
            risk_scores: self.risk_scores.read().clone(),
            last_updated: *self.last_updated.read(),
        }
    }

    pub fn counts(&self) -> IndicatorCounts {
        IndicatorCounts {
            ips: self.ips.read().len(),
            domains: self.domains.read().len(),
            file_hashes: self.file_hashes.read().len(),
            signatures: self.signatures.read().len(),
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn store() -> ThreatIntelStore {
        ThreatIntelStore::new(Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        )))
    }

    #[test]
    fn test_indicator_membership() {
        let intel = store();
        intel.add_indicator(IndicatorKind::Ip, "203.0.113.5");
        intel.add_indicator(IndicatorKind::Domain, "EVIL.example.COM");
        intel.add_indicator(IndicatorKind::FileHash, "ABCDEF");

        assert!(intel.is_known_malicious_ip("203.0.113.5"));
        assert!(!intel.is_known_malicious_ip("198.51.100.1"));
        assert!(intel.is_known_malicious_domain("evil.example.com"));
        assert!(intel.is_known_malicious_hash("abcdef"));
        assert_eq!(intel.counts().ips, 1);
    }

    #[test]
    fn test_refresh_stamps_last_updated() {
        let intel = store();
        assert!(intel.last_updated().is_none());
        let snap = intel.refresh();
        assert!(snap.last_updated.is_some());
        assert_eq!(intel.last_updated(), snap.last_updated);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let intel = store();
        intel.add_indicator(IndicatorKind::Ip, "203.0.113.5");
        let mut snap = intel.snapshot();
        snap.ips.clear();
        assert_eq!(intel.counts().ips, 1);
    }

    #[test]
    fn test_risk_scores_clamped() {
        let intel = store();
        intel.set_risk_score("campaign-x", 250.0);
        let snap = intel.snapshot();
        assert!((snap.risk_scores["campaign-x"] - 100.0).abs() < 1e-9);
    }
}
