//! Serverless task overlay
//!
//! Fargate tasks do not appear in virtual-machine inventory, and their
//! agents report a composite `taskId_suffix` identifier, so they get a
//! second, independent matching pass folded back into the primary result.
//! Unlike the per-record leniency everywhere else, a failed or malformed
//! overlay fetch fails the whole account: a partial overlay would falsely
//! report full coverage for a modality it never inspected.

use crate::api::{InventoryRecord, SearchFilter, TelemetryApi};
use crate::error::PipelineError;
use crate::models::{CanonicalRecord, CorrelationResult, TimeWindow};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Substring of the monitoring agent's container image reference that
/// marks a task as agent-bearing.
pub const AGENT_IMAGE_MARKER: &str = "datacollector";

const SERVERLESS_RESOURCE_TYPE: &str = "ecs:task";
const SERVERLESS_LAUNCH_TYPE: &str = "FARGATE";

/// Fetch serverless task inventory for one sub-account and fold the
/// overlay match into `result`.
pub async fn apply_serverless_overlay(
    api: &dyn TelemetryApi,
    account: &str,
    window: &TimeWindow,
    result: &mut CorrelationResult,
) -> std::result::Result<(), PipelineError> {
    let filters = [
        SearchFilter::eq("resourceType", SERVERLESS_RESOURCE_TYPE),
        SearchFilter::eq("resourceConfig.launchType", SERVERLESS_LAUNCH_TYPE),
    ];
    let records = api
        .inventory_search(account, "AWS", &filters, window)
        .await
        .map_err(|source| PipelineError::Overlay {
            account: account.to_string(),
            source,
        })?;

    let (tasks_with_agent, tasks_without_agent) =
        classify_tasks(&records, account).map_err(|source| PipelineError::Overlay {
            account: account.to_string(),
            source,
        })?;

    // A task is matched via overlay when its identity is a substring of an
    // identifier already sitting in agent_only.
    let matched_tasks: Vec<CanonicalRecord> = tasks_with_agent
        .into_iter()
        .filter(|task| {
            result
                .agent_only
                .iter()
                .any(|agent| agent.identity.contains(&task.identity))
        })
        .collect();

    debug!(
        account,
        matched = matched_tasks.len(),
        missing = tasks_without_agent.len(),
        "Serverless overlay classified"
    );

    // Agents whose prefix (identifier up to the last underscore) equals a
    // matched task identity are the overlay's own heartbeats; drop them
    // from agent_only as the task moves to matched.
    let matched_ids: HashSet<&str> = matched_tasks.iter().map(|t| t.identity.as_str()).collect();
    result.agent_only.retain(|agent| {
        let prefix = match agent.identity.rfind('_') {
            Some(pos) => &agent.identity[..pos],
            None => agent.identity.as_str(),
        };
        !matched_ids.contains(prefix)
    });

    result.absorb(CorrelationResult {
        inventory_only: tasks_without_agent,
        matched: matched_tasks,
        agent_only: Vec::new(),
    });

    Ok(())
}

/// Split tasks into agent-bearing and agent-absent by scanning each task's
/// container list for the agent image marker. Tasks without a container
/// list are skipped; a container list entry missing its task identifier is
/// a malformed shape and fails the overlay.
fn classify_tasks(
    records: &[InventoryRecord],
    account: &str,
) -> Result<(Vec<CanonicalRecord>, Vec<CanonicalRecord>)> {
    let mut with_agent = Vec::new();
    let mut without_agent = Vec::new();

    for record in records {
        let config = &record.resource_config;
        let Some(containers) = config.get("containers").and_then(Value::as_array) else {
            continue;
        };
        let tags = config.get("tags").cloned().unwrap_or(Value::Null);

        let mut placed = false;
        for container in containers {
            let image = container.get("image").and_then(Value::as_str).unwrap_or("");
            if image.contains(AGENT_IMAGE_MARKER) {
                let identity = container
                    .get("taskArn")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("serverless container missing taskArn: {}", container))?;
                with_agent.push(task_record(identity, account, tags.clone()));
                placed = true;
                break;
            }
        }

        if !placed {
            let identity = config
                .get("taskArn")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("serverless task missing taskArn: {}", config))?;
            without_agent.push(task_record(identity, account, tags.clone()));
        }
    }

    Ok((with_agent, without_agent))
}

fn task_record(identity: &str, account: &str, tags: Value) -> CanonicalRecord {
    CanonicalRecord {
        identity: identity.to_string(),
        creation_time: String::new(),
        is_container_orchestrated: false,
        account_label: account.to_string(),
        os_image: String::new(),
        tags,
    }
}
