//! Multi-account aggregation
//!
//! Runs the full per-account pipeline (agent telemetry, three-provider
//! inventory, correlation, serverless overlay) either inline for a single
//! sub-account, or concurrently across every sub-account the caller can
//! access on a worker pool bounded by available parallelism. Each pipeline
//! owns its context; a failed pipeline is reported and excluded from the
//! union, never propagated past the aggregator.

use crate::api::TelemetryApi;
use crate::collect::{collect_agent_identifiers, collect_provider_inventory};
use crate::context::PipelineContext;
use crate::correlate::correlate;
use crate::error::PipelineError;
use crate::models::{CloudProvider, CorrelationResult, TimeWindow};
use crate::overlay::apply_serverless_overlay;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Aggregate outcome of a multi-account run. The report is always
/// producible; the caller decides whether partial results are acceptable.
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub result: CorrelationResult,
    /// Every sub-account discovered for the run, failed ones included. An
    /// account with no discovered hosts still belongs in per-account
    /// reporting.
    pub accounts: Vec<String>,
    /// Sub-accounts whose pipeline failed and are excluded from `result`.
    pub failed_accounts: Vec<String>,
}

/// Worker-pool size for concurrent per-account pipelines.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Run the whole pipeline for one sub-account. Fails fast on overlay
/// errors; record-level trouble inside the collectors is recovered there.
pub async fn run_single_account(
    api: &dyn TelemetryApi,
    account: &str,
    window: &TimeWindow,
) -> std::result::Result<CorrelationResult, PipelineError> {
    let account_err = |source: anyhow::Error| PipelineError::Account {
        account: account.to_string(),
        source,
    };

    let mut ctx = PipelineContext::new();

    let agent_identifiers = collect_agent_identifiers(api, account, window, &mut ctx)
        .await
        .map_err(account_err)?;

    let mut inventory_identities = Vec::new();
    for provider in CloudProvider::ALL {
        let ids = collect_provider_inventory(api, provider, account, window, &mut ctx)
            .await
            .map_err(account_err)?;
        inventory_identities.extend(ids);
    }

    let mut result = correlate(&inventory_identities, &agent_identifiers, &ctx, account);
    apply_serverless_overlay(api, account, window, &mut result).await?;

    info!(
        account,
        inventory_only = result.inventory_only.len(),
        matched = result.matched.len(),
        agent_only = result.agent_only.len(),
        "Sub-account pipeline complete"
    );

    Ok(result)
}

/// Discover every sub-account the caller may inspect and run one pipeline
/// per account on a bounded worker pool. Per-account failures are
/// collected, not propagated; only sub-account discovery itself can fail
/// the run.
pub async fn run_all_accounts(
    api: Arc<dyn TelemetryApi>,
    window: &TimeWindow,
    max_workers: usize,
) -> Result<AggregateReport> {
    let accounts = api
        .identity_profile()
        .await
        .context("Failed to list accessible sub-accounts")?;
    info!(accounts = accounts.len(), workers = max_workers, "Starting aggregation");

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks: JoinSet<std::result::Result<CorrelationResult, PipelineError>> = JoinSet::new();
    // A panicked task loses its return value, so the account label is kept
    // outside the task, keyed by task id.
    let mut task_accounts: HashMap<tokio::task::Id, String> = HashMap::new();

    let mut report = AggregateReport {
        accounts: accounts.clone(),
        ..Default::default()
    };

    for account in accounts {
        let api = Arc::clone(&api);
        let semaphore = Arc::clone(&semaphore);
        let window = window.clone();
        let handle = tasks.spawn({
            let account = account.clone();
            async move {
                // Closed only when the JoinSet is dropped, which never
                // happens while tasks are still being joined.
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                run_single_account(api.as_ref(), &account, &window).await
            }
        });
        task_accounts.insert(handle.id(), account);
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, Ok(partial))) => {
                task_accounts.remove(&id);
                report.result.absorb(partial);
            }
            Ok((id, Err(err))) => {
                let account = task_accounts.remove(&id).unwrap_or_default();
                warn!(account = %account, error = %err, "Sub-account pipeline failed; excluding from aggregate");
                report.failed_accounts.push(account);
            }
            Err(join_err) => {
                let account = task_accounts.remove(&join_err.id()).unwrap_or_default();
                error!(account = %account, error = %join_err, "Sub-account pipeline task aborted");
                report.failed_accounts.push(account);
            }
        }
    }

    report.result.sort_by_identity();
    report.accounts.sort();
    report.failed_accounts.sort();
    Ok(report)
}
