//! Error taxonomy for per-account pipelines
//!
//! Record-level parse failures and truncation are recovered locally in the
//! collectors (warn and continue) and never surface here. What does surface
//! is anything fatal to one sub-account's pipeline, split into the overlay
//! case (where partial data would misreport serverless coverage) and
//! everything else.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The serverless overlay fetch failed or returned an unexpected shape.
    /// The account's pipeline fails as a whole rather than silently
    /// omitting overlay coverage.
    #[error("serverless overlay failed for sub-account {account}: {source}")]
    Overlay {
        account: String,
        #[source]
        source: anyhow::Error,
    },

    /// Any other unrecoverable per-account error (auth failure, timeout).
    #[error("pipeline failed for sub-account {account}: {source}")]
    Account {
        account: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// Sub-account the failure belongs to.
    pub fn account_label(&self) -> &str {
        match self {
            PipelineError::Overlay { account, .. } => account,
            PipelineError::Account { account, .. } => account,
        }
    }
}
