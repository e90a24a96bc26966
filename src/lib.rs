//! # sheetsift - Natural-language spreadsheet filtering
//!
//! sheetsift loads a spreadsheet whose first two rows form a combined
//! header, answers natural-language questions about it through an
//! AI-generated query plan, and exports matching rows in the original
//! row/column layout.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Spreadsheet │────▶│    Sheet    │────▶│    Query    │────▶│   Export    │
//! │ (xlsx/text) │     │ (two views) │     │ (AI + plan) │     │ (original   │
//! └─────────────┘     └─────────────┘     └─────────────┘     │   layout)   │
//!                                                             └─────────────┘
//! ```
//!
//! The file is loaded twice over the same rows: a raw view that keeps
//! every row verbatim, and an analysis view where rows 0-1 become flat
//! column names and data is re-indexed from 0. Queries run against the
//! analysis view; exports map the matches back onto the raw view, so
//! analysis row `i` always corresponds to raw row `i + 2`.
//!
//! Generated plans are data, not code: the AI returns a JSON plan in a
//! closed condition grammar, the plan is schema-validated, and a small
//! interpreter runs it. Nothing the model emits is ever executed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetsift::{analyze_file, AnalyzeOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let report = analyze_file(
//!         Path::new("results.xlsx"),
//!         "carbon at least 0.06",
//!         AnalyzeOptions::default(),
//!     ).await.unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`sheet`] - Loading, header flattening, the two table views
//! - [`query`] - Query plans and their interpreter
//! - [`reconcile`] - Mapping selections back onto raw rows
//! - [`export`] - Export serialization
//! - [`validation`] - Plan schema validation
//! - [`registry`] - Plan caching
//! - [`ai`] - AI-powered plan generation
//! - [`pipeline`] - End-to-end orchestration
//! - [`session`] - Per-upload session state
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod sheet;

// Querying
pub mod query;

// Reconciliation and export
pub mod export;
pub mod reconcile;

// Validation
pub mod validation;

// Caching
pub mod registry;

// AI
pub mod ai;

// Orchestration
pub mod pipeline;
pub mod session;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AiError, ExportError, PipelineError, PlanError, ReconcileError, RegistryError, ServerError,
    SheetError,
};

// =============================================================================
// Re-exports - Sheet
// =============================================================================

pub use sheet::{
    header::{flatten, Columns},
    load_bytes, load_file, AnalysisTable, Cell, LoadedSheet, RawTable, SheetFormat,
};

// =============================================================================
// Re-exports - Query
// =============================================================================

pub use query::{
    conditions_description, example_plan, execute, ChartData, ChartKind, ChartSpec, Condition,
    QueryOutcome, QueryPlan, RowSelection, SortKey,
};

// =============================================================================
// Re-exports - Reconcile / Export
// =============================================================================

pub use export::{to_bytes, to_csv_bytes, to_xlsx_bytes, ExportFormat};
pub use reconcile::{reconcile, ExportTable};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, is_valid_plan, validate, validate_plan};

// =============================================================================
// Re-exports - AI Client
// =============================================================================

pub use ai::{AiClient, GeneratedPlan};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use registry::{PlanRegistry, StoredPlan};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    analyze_bytes_query, analyze_file, analyze_sheet, analyze_with_plan, AnalyzeOptions,
    AnalyzeOutcome, AnalyzeReport,
};

// =============================================================================
// Re-exports - Session
// =============================================================================

pub use session::{QueryRun, Session, SessionStore};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, upload_response, QueryResponse, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
