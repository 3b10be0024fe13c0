//! Three-way correlation between inventory and agent identities
//!
//! Matching policy: the deduplicated inventory pass is exact set
//! membership; the agent-only pass is substring containment against the
//! matched identities, tolerating agents whose reported identifier is only
//! a fragment of the inventory identity. The asymmetry is an approximate
//! policy inherited from production behavior, not a strict contract; it
//! can produce false positives when one identity is coincidentally a
//! substring of another.

use crate::context::PipelineContext;
use crate::models::{CanonicalRecord, CorrelationResult};
use std::collections::HashSet;
use tracing::debug;

/// Correlate the unioned inventory identity list of one sub-account with
/// its raw agent identifier list. Inventory identities are deduplicated
/// first-seen; duplicates in the agent list are immaterial.
pub fn correlate(
    inventory_identities: &[String],
    agent_identifiers: &[String],
    ctx: &PipelineContext,
    account: &str,
) -> CorrelationResult {
    let mut result = CorrelationResult::default();

    let agent_set: HashSet<&str> = agent_identifiers.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    for identity in inventory_identities {
        if !seen.insert(identity.as_str()) {
            continue;
        }
        // Every collected identity was normalized into the cache alongside
        // its list entry.
        let Some(record) = ctx.inventory_record(identity) else {
            continue;
        };
        if agent_set.contains(identity.as_str()) {
            result.matched.push(record.clone());
        } else {
            result.inventory_only.push(record.clone());
        }
    }

    let mut placed = HashSet::new();
    for identifier in agent_identifiers {
        let has_inventory = result
            .matched
            .iter()
            .any(|m| m.identity.contains(identifier.as_str()));
        if has_inventory {
            continue;
        }
        // Swap in the display label where we have one; the raw identifier
        // alone is not much use to a reader without an inventory record to
        // enrich it.
        let display = ctx
            .agent_label(identifier)
            .unwrap_or(identifier.as_str())
            .to_string();
        if placed.insert(display.clone()) {
            result.agent_only.push(CanonicalRecord::agent_only(display, account));
        }
    }

    debug!(
        account,
        inventory_only = result.inventory_only.len(),
        matched = result.matched.len(),
        agent_only = result.agent_only.len(),
        "Correlation complete"
    );

    result
}
