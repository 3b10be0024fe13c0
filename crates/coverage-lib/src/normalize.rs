//! Identifier normalization
//!
//! The single translation boundary from heterogeneous provider records
//! into the canonical model. All best-effort field scraping lives here:
//! a record missing a required field is logged with its raw payload and
//! skipped, never failing the batch.

use crate::api::InventoryRecord;
use crate::context::PipelineContext;
use crate::models::{CanonicalRecord, CloudProvider};
use serde_json::Value;
use tracing::warn;

/// Map one raw inventory record to a canonical record, or `None` when the
/// record lacks the fields the provider contract requires.
pub fn normalize_inventory(
    provider: CloudProvider,
    record: &InventoryRecord,
    account: &str,
    ctx: &mut PipelineContext,
) -> Option<CanonicalRecord> {
    let normalized = match provider {
        CloudProvider::Aws => normalize_aws(record, account, ctx),
        CloudProvider::Gcp => normalize_gcp(record, account),
        CloudProvider::Azure => normalize_azure(record, account),
    };

    if normalized.is_none() {
        warn!(
            provider = %provider,
            raw = %record.resource_config,
            "Host could not be parsed due to incomplete inventory information"
        );
    }

    normalized
}

fn normalize_aws(
    record: &InventoryRecord,
    account: &str,
    ctx: &mut PipelineContext,
) -> Option<CanonicalRecord> {
    let config = &record.resource_config;
    let identity = config.get("InstanceId")?.as_str()?.to_string();
    let creation_time = config
        .get("LaunchTime")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let tags = config.get("Tags").cloned().unwrap_or(Value::Null);

    let is_cluster_node = match aws_eks_cluster_name(&tags) {
        Some(cluster) => {
            ctx.insert_cluster_name(identity.clone(), cluster);
            true
        }
        None => false,
    };

    Some(CanonicalRecord {
        identity,
        creation_time,
        is_container_orchestrated: is_cluster_node,
        account_label: account.to_string(),
        os_image: String::new(),
        tags,
    })
}

fn normalize_gcp(record: &InventoryRecord, account: &str) -> Option<CanonicalRecord> {
    let config = &record.resource_config;
    // GCE instance ids are numeric; the API may send them as a number or a
    // string depending on the ingestion path.
    let identity = match config.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let creation_time = config
        .get("creationTimestamp")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // GCE network tags are the opaque bag; labels drive the GKE heuristic.
    let tags = config.get("tags").cloned().unwrap_or(Value::Null);
    let labels = config.get("labels").cloned().unwrap_or(Value::Null);

    Some(CanonicalRecord {
        identity,
        creation_time,
        is_container_orchestrated: gcp_is_gke_node(&labels),
        account_label: account.to_string(),
        os_image: gcp_os_image(config),
        tags,
    })
}

fn normalize_azure(record: &InventoryRecord, account: &str) -> Option<CanonicalRecord> {
    let config = &record.resource_config;
    let identity = config.get("vmId")?.as_str()?.to_string();
    let creation_time = config
        .get("timeCreated")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let tags = record.resource_tags.clone().unwrap_or(Value::Null);

    Some(CanonicalRecord {
        identity,
        creation_time,
        // No cluster-node heuristic for Azure.
        is_container_orchestrated: false,
        account_label: account.to_string(),
        os_image: String::new(),
        tags,
    })
}

/// EKS nodes carry an `eks:cluster-name` tag. Tags arrive as a list of
/// `{Key, Value}` objects.
fn aws_eks_cluster_name(tags: &Value) -> Option<String> {
    for tag in tags.as_array()? {
        if tag.get("Key").and_then(Value::as_str) == Some("eks:cluster-name") {
            return tag
                .get("Value")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
    }
    None
}

/// GKE nodes carry a label containing `goog-gke-node`, in the key or the
/// value depending on the image family. Best-effort heuristic.
fn gcp_is_gke_node(labels: &Value) -> bool {
    match labels {
        Value::Object(map) => map.iter().any(|(k, v)| {
            k.contains("goog-gke-node")
                || v.as_str().map(|s| s.contains("goog-gke-node")).unwrap_or(false)
        }),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.contains("goog-gke-node")),
        _ => false,
    }
}

/// Scan the instance's disk list for an OS image: a `licenses` array or an
/// `initializeParams.sourceImage` string, first match wins. Instances in a
/// terminated state routinely lack both, so only non-terminated instances
/// are worth a parse warning.
fn gcp_os_image(config: &Value) -> String {
    if let Some(disks) = config.get("disks").and_then(Value::as_array) {
        for disk in disks {
            if let Some(licenses) = disk.get("licenses").and_then(Value::as_array) {
                let joined: Vec<&str> = licenses.iter().filter_map(Value::as_str).collect();
                if !joined.is_empty() {
                    return joined.join(",");
                }
            }
            if let Some(image) = disk
                .get("initializeParams")
                .and_then(|p| p.get("sourceImage"))
                .and_then(Value::as_str)
            {
                return image.to_string();
            }
        }
    }

    let status = config.get("status").and_then(Value::as_str).unwrap_or_default();
    if status != "TERMINATED" {
        warn!(raw = %config, "Unable to parse os_image info for instance");
    }
    String::new()
}
