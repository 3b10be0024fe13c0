//! The `scan` command: run the coverage assessment and render the report

use crate::config::Credentials;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use coverage_lib::{
    default_worker_count, run_all_accounts, run_single_account, HttpTelemetryApi, TimeWindow,
};
use std::sync::Arc;
use tracing::info;

pub struct ScanArgs {
    pub current_sub_account_only: bool,
    pub format: OutputFormat,
    pub statistics: bool,
    pub lookback_days: i64,
}

pub async fn run(credentials: Credentials, args: ScanArgs) -> Result<()> {
    let api = HttpTelemetryApi::new(
        &credentials.account,
        &credentials.api_key,
        &credentials.api_secret,
    )?;
    let window = TimeWindow::lookback_days(args.lookback_days);
    info!(
        start = %window.start_str(),
        end = %window.end_str(),
        "Starting coverage scan"
    );

    let (mut result, accounts, failed_accounts) = if args.current_sub_account_only {
        // Inline single-account mode for interactive/debugging use. The
        // scope label is the sub-account when one is configured, else the
        // tenant account itself.
        let account = credentials
            .sub_account
            .as_deref()
            .unwrap_or(&credentials.account)
            .to_string();
        let result = run_single_account(&api, &account, &window)
            .await
            .with_context(|| format!("Coverage scan failed for {}", account))?;
        (result, Vec::new(), Vec::new())
    } else {
        let api: Arc<dyn coverage_lib::TelemetryApi> = Arc::new(api);
        let report = run_all_accounts(api, &window, default_worker_count()).await?;
        (report.result, report.accounts, report.failed_accounts)
    };

    result.sort_by_identity();

    if args.statistics {
        output::print_statistics(&result, &accounts);
    } else {
        output::render(&result, args.format);
    }

    if !failed_accounts.is_empty() {
        output::print_error(&format!(
            "{} sub-account(s) failed and are excluded from the report: {}",
            failed_accounts.len(),
            failed_accounts.join(", ")
        ));
    }

    Ok(())
}
