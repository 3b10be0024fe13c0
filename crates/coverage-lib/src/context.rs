//! Per-pipeline lookup caches
//!
//! Each sub-account pipeline gets its own context, constructed fresh per
//! run and passed by reference into the collectors and the correlator.
//! Sharing one context across concurrently executing pipelines would bleed
//! identities between accounts, so nothing here is global.

use crate::models::CanonicalRecord;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct PipelineContext {
    /// identity -> full canonical record, populated during inventory
    /// collection and consulted during correlation.
    inventory: HashMap<String, CanonicalRecord>,
    /// agent identifier -> composite display label
    /// (`provider/account-or-project/hostname`). Presentation only,
    /// never used for matching.
    agent_labels: HashMap<String, String>,
    /// instance identity -> managed-cluster name, where known.
    cluster_names: HashMap<String, String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache an inventory record. First-seen wins.
    pub fn insert_inventory(&mut self, record: CanonicalRecord) {
        self.inventory.entry(record.identity.clone()).or_insert(record);
    }

    pub fn inventory_record(&self, identity: &str) -> Option<&CanonicalRecord> {
        self.inventory.get(identity)
    }

    pub fn inventory_len(&self) -> usize {
        self.inventory.len()
    }

    pub fn insert_agent_label(&mut self, identifier: impl Into<String>, label: impl Into<String>) {
        self.agent_labels.insert(identifier.into(), label.into());
    }

    pub fn agent_label(&self, identifier: &str) -> Option<&str> {
        self.agent_labels.get(identifier).map(String::as_str)
    }

    pub fn insert_cluster_name(&mut self, identity: impl Into<String>, cluster: impl Into<String>) {
        self.cluster_names.insert(identity.into(), cluster.into());
    }

    pub fn cluster_name(&self, identity: &str) -> Option<&str> {
        self.cluster_names.get(identity).map(String::as_str)
    }
}
