//! Core data models for agent coverage reconciliation

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Ceiling on the number of identities a single collector will accept
/// before flagging the result set as potentially incomplete.
pub const MAX_RESULT_SET: usize = 500_000;

/// Default lookback window for a scan.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 1;

/// One discovered compute unit, independent of provider.
///
/// Equality and hashing are defined solely by `identity`; two records with
/// the same identity are the same entity regardless of other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Provider-native unique resource identifier (EC2 instance id, GCE
    /// numeric instance id, Azure vmId, or a serverless task identifier).
    pub identity: String,
    /// ISO-8601 creation timestamp, empty when unknown.
    pub creation_time: String,
    /// True when heuristics detect a managed-cluster node.
    pub is_container_orchestrated: bool,
    /// Sub-account this record belongs to.
    pub account_label: String,
    /// Best-effort OS image, empty when unparseable.
    pub os_image: String,
    /// Opaque tag bag, taken verbatim from the provider record.
    #[serde(default)]
    pub tags: serde_json::Value,
}

impl CanonicalRecord {
    /// Minimal record for an agent that has no matching inventory entry.
    /// The identity holds the best-effort hostname/label available.
    pub fn agent_only(identity: impl Into<String>, account_label: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            creation_time: String::new(),
            is_container_orchestrated: false,
            account_label: account_label.into(),
            os_image: String::new(),
            tags: serde_json::Value::Null,
        }
    }
}

impl PartialEq for CanonicalRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for CanonicalRecord {}

impl Hash for CanonicalRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// Three-way correlation outcome for one scope (a sub-account, or the
/// union of several). The categories are pairwise disjoint by identity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrelationResult {
    /// Present in inventory, no matching agent identity.
    pub inventory_only: Vec<CanonicalRecord>,
    /// Present in both inventory and agent telemetry.
    pub matched: Vec<CanonicalRecord>,
    /// Agent reported, no matching inventory identity.
    pub agent_only: Vec<CanonicalRecord>,
}

impl CorrelationResult {
    /// Union another result into this one. Deduplicates by identity within
    /// each category; first-seen wins.
    pub fn absorb(&mut self, other: CorrelationResult) {
        fn extend_dedup(dst: &mut Vec<CanonicalRecord>, src: Vec<CanonicalRecord>) {
            let mut seen: HashSet<String> = dst.iter().map(|r| r.identity.clone()).collect();
            for record in src {
                if seen.insert(record.identity.clone()) {
                    dst.push(record);
                }
            }
        }

        extend_dedup(&mut self.inventory_only, other.inventory_only);
        extend_dedup(&mut self.matched, other.matched);
        extend_dedup(&mut self.agent_only, other.agent_only);
    }

    /// Establish a total order by identity. Presentation only; the set
    /// semantics do not depend on ordering.
    pub fn sort_by_identity(&mut self) {
        self.inventory_only.sort_by(|a, b| a.identity.cmp(&b.identity));
        self.matched.sort_by(|a, b| a.identity.cmp(&b.identity));
        self.agent_only.sort_by(|a, b| a.identity.cmp(&b.identity));
    }

    /// Distinct hosts seen during inventory assessment.
    pub fn distinct_hosts(&self) -> usize {
        self.inventory_only.len() + self.matched.len()
    }

    /// Fraction of distinct inventoried hosts with a matching agent,
    /// as a percentage rounded to one decimal. Zero when nothing matched.
    pub fn coverage_percent(&self) -> f64 {
        if self.matched.is_empty() {
            return 0.0;
        }
        let pct = self.matched.len() as f64 / self.distinct_hosts() as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }
}

/// Half-open time window `[start, end)` over which inventory and agent
/// telemetry are assessed.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window ending now and starting `days` ago.
    pub fn lookback_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Cloud providers whose virtual-machine inventory participates in the
/// primary correlation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudProvider {
    Aws,
    Gcp,
    Azure,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 3] = [CloudProvider::Aws, CloudProvider::Gcp, CloudProvider::Azure];

    /// CSP tag the inventory search API expects.
    pub fn csp(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Gcp => "GCP",
            CloudProvider::Azure => "Azure",
        }
    }

    /// Resource-type filter value for virtual-machine inventory.
    pub fn instance_resource_type(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "ec2:instance",
            CloudProvider::Gcp => "compute.googleapis.com/Instance",
            CloudProvider::Azure => "microsoft.compute/virtualmachines",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.csp())
    }
}
