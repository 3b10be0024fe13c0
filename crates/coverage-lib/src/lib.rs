//! Core library for the agent coverage scanner
//!
//! This crate provides:
//! - Canonical identity model for cross-provider compute inventory
//! - Per-provider identifier normalization
//! - Inventory and agent-telemetry collectors
//! - Three-way correlation with the serverless overlay
//! - Concurrent multi-account aggregation

pub mod aggregate;
pub mod api;
pub mod collect;
pub mod context;
pub mod correlate;
pub mod error;
pub mod models;
pub mod normalize;
pub mod overlay;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{default_worker_count, run_all_accounts, run_single_account, AggregateReport};
pub use api::{AgentRecord, HttpTelemetryApi, InventoryRecord, SearchFilter, TelemetryApi};
pub use context::PipelineContext;
pub use error::PipelineError;
pub use models::{
    CanonicalRecord, CloudProvider, CorrelationResult, TimeWindow, DEFAULT_LOOKBACK_DAYS,
    MAX_RESULT_SET,
};
