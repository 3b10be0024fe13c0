//! In-memory `TelemetryApi` fake shared by the collector, overlay and
//! aggregation tests.

use crate::api::{AgentRecord, InventoryRecord, SearchFilter, TelemetryApi};
use crate::models::{CloudProvider, TimeWindow};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub(crate) struct FakeApi {
    accounts: Vec<String>,
    instances: HashMap<(String, &'static str), Vec<InventoryRecord>>,
    agents: HashMap<String, Vec<AgentRecord>>,
    serverless: HashMap<String, Vec<InventoryRecord>>,
    serverless_errors: HashSet<String>,
    agent_errors: HashSet<String>,
    agent_panics: HashSet<String>,
}

impl FakeApi {
    pub fn new(accounts: &[&str]) -> Self {
        Self {
            accounts: accounts.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_instances(
        mut self,
        account: &str,
        provider: CloudProvider,
        records: Vec<InventoryRecord>,
    ) -> Self {
        self.instances
            .insert((account.to_string(), provider.instance_resource_type()), records);
        self
    }

    pub fn with_agents(mut self, account: &str, records: Vec<AgentRecord>) -> Self {
        self.agents.insert(account.to_string(), records);
        self
    }

    pub fn with_serverless(mut self, account: &str, records: Vec<InventoryRecord>) -> Self {
        self.serverless.insert(account.to_string(), records);
        self
    }

    pub fn with_serverless_error(mut self, account: &str) -> Self {
        self.serverless_errors.insert(account.to_string());
        self
    }

    pub fn with_agent_error(mut self, account: &str) -> Self {
        self.agent_errors.insert(account.to_string());
        self
    }

    pub fn with_agent_panic(mut self, account: &str) -> Self {
        self.agent_panics.insert(account.to_string());
        self
    }
}

#[async_trait]
impl TelemetryApi for FakeApi {
    async fn inventory_search(
        &self,
        account: &str,
        _csp: &str,
        filters: &[SearchFilter],
        _window: &TimeWindow,
    ) -> Result<Vec<InventoryRecord>> {
        let resource_type = filters
            .iter()
            .find(|f| f.field == "resourceType")
            .map(|f| f.value.as_str())
            .unwrap_or_default();

        if resource_type == "ecs:task" {
            if self.serverless_errors.contains(account) {
                return Err(anyhow!("synthetic serverless fetch failure"));
            }
            return Ok(self.serverless.get(account).cloned().unwrap_or_default());
        }

        Ok(self
            .instances
            .get(&(account.to_string(), resource_type))
            .cloned()
            .unwrap_or_default())
    }

    async fn agent_telemetry_search(
        &self,
        account: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<AgentRecord>> {
        if self.agent_panics.contains(account) {
            panic!("synthetic agent telemetry panic");
        }
        if self.agent_errors.contains(account) {
            return Err(anyhow!("synthetic agent telemetry failure"));
        }
        Ok(self.agents.get(account).cloned().unwrap_or_default())
    }

    async fn identity_profile(&self) -> Result<Vec<String>> {
        Ok(self.accounts.clone())
    }
}

/// AWS instance inventory record with the given instance id.
pub(crate) fn aws_instance(instance_id: &str) -> InventoryRecord {
    InventoryRecord {
        urn: Some(format!("arn:aws:ec2:instance/{}", instance_id)),
        resource_config: serde_json::json!({
            "InstanceId": instance_id,
            "LaunchTime": "2026-01-01T00:00:00Z"
        }),
        resource_tags: None,
    }
}

/// AWS agent heartbeat record reporting the given instance id.
pub(crate) fn aws_agent(instance_id: &str) -> AgentRecord {
    AgentRecord {
        hostname: None,
        tags: Some(serde_json::json!({
            "VmProvider": "AWS",
            "InstanceId": instance_id,
            "Account": "123456789012",
            "Hostname": format!("host-{}", instance_id)
        })),
    }
}
