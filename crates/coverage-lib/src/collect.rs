//! Inventory and agent-telemetry collectors
//!
//! Each collector drains one search surface for one sub-account over one
//! time window, returning the ordered identifier list and filling the
//! pipeline context caches. Record-level parse failures are warned and
//! skipped; a result set at the ceiling gets a non-fatal truncation
//! warning and processing continues with the partial set.

use crate::api::{AgentRecord, SearchFilter, TelemetryApi};
use crate::context::PipelineContext;
use crate::models::{CloudProvider, TimeWindow, MAX_RESULT_SET};
use anyhow::{Context, Result};
use tracing::{debug, warn};

/// True when a result set reached the collector ceiling and may be
/// incomplete.
pub fn hit_result_ceiling(len: usize) -> bool {
    len >= MAX_RESULT_SET
}

/// Fetch virtual-machine inventory for one provider, normalize each record
/// into the context cache, and return the raw identity list in API order.
pub async fn collect_provider_inventory(
    api: &dyn TelemetryApi,
    provider: CloudProvider,
    account: &str,
    window: &TimeWindow,
    ctx: &mut PipelineContext,
) -> Result<Vec<String>> {
    let filters = [SearchFilter::eq(
        "resourceType",
        provider.instance_resource_type(),
    )];
    let records = api
        .inventory_search(account, provider.csp(), &filters, window)
        .await
        .with_context(|| format!("{} inventory search failed", provider))?;

    let mut identities = Vec::with_capacity(records.len());
    for record in &records {
        if let Some(normalized) = crate::normalize::normalize_inventory(provider, record, account, ctx)
        {
            identities.push(normalized.identity.clone());
            ctx.insert_inventory(normalized);
        }
    }

    if hit_result_ceiling(identities.len()) {
        warn!(
            provider = %provider,
            account,
            ceiling = MAX_RESULT_SET,
            "Inventory results truncated; coverage report may be incomplete"
        );
    }
    debug!(provider = %provider, account, instances = identities.len(), "Inventory collected");

    Ok(identities)
}

/// Fetch agent heartbeat records and extract the provider-native host
/// identifier from each. The returned list may contain duplicates;
/// matching is set-based so they are immaterial.
pub async fn collect_agent_identifiers(
    api: &dyn TelemetryApi,
    account: &str,
    window: &TimeWindow,
    ctx: &mut PipelineContext,
) -> Result<Vec<String>> {
    let records = api
        .agent_telemetry_search(account, window)
        .await
        .context("Agent telemetry search failed")?;

    let mut identifiers = Vec::with_capacity(records.len());
    for record in &records {
        match extract_agent_identifier(record, ctx) {
            Some(id) => identifiers.push(id),
            None => warn!(
                hostname = record.hostname.as_deref().unwrap_or(""),
                "Agent record could not be classified; skipping"
            ),
        }
    }

    if hit_result_ceiling(identifiers.len()) {
        warn!(
            account,
            ceiling = MAX_RESULT_SET,
            "Agent telemetry results truncated; coverage report may be incomplete"
        );
    }
    debug!(account, agents = identifiers.len(), "Agent identifiers collected");

    Ok(identifiers)
}

/// Classify one agent record by its `VmProvider` tag and pull out the
/// host identifier. Side effect: caches a composite display label
/// (`provider/account-or-project/hostname`) used only when rendering
/// agent-only records.
fn extract_agent_identifier(record: &AgentRecord, ctx: &mut PipelineContext) -> Option<String> {
    let hostname = record.tag("Hostname").or(record.hostname.as_deref());

    match record.tag("VmProvider") {
        Some("GCE") | Some("GCP") => {
            let id = record.tag("InstanceId")?.to_string();
            ctx.insert_agent_label(&id, composite_label("gcp", record, hostname));
            Some(id)
        }
        Some("AWS") => match record.tag("InstanceId") {
            Some(instance_id) => {
                // EC2: the instance id is the correlation key.
                let id = instance_id.to_string();
                ctx.insert_agent_label(&id, composite_label("aws", record, hostname));
                Some(id)
            }
            // Fargate agents have no instance id; the hostname carries the
            // composite task identifier instead.
            None => record.tag("Hostname").map(str::to_string),
        },
        Some("Microsoft.Compute") => {
            let id = record.tag("InstanceId")?.to_string();
            ctx.insert_agent_label(&id, composite_label("azure", record, hostname));
            Some(id)
        }
        _ => record.hostname.clone(),
    }
}

fn composite_label(provider: &str, record: &AgentRecord, hostname: Option<&str>) -> String {
    let scope = record.tag("Account").or_else(|| record.tag("ProjectId"));
    match scope {
        Some(scope) => format!("{}/{}/{}", provider, scope, hostname.unwrap_or("")),
        None => format!("{}/{}", provider, hostname.unwrap_or("")),
    }
}
