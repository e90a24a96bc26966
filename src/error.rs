//! Error types for the sheetsift analysis pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`SheetError`] - Spreadsheet loading errors
//! - [`PlanError`] - Query plan errors
//! - [`AiError`] - AI client errors
//! - [`RegistryError`] - Plan registry errors
//! - [`ReconcileError`] - Row reconciliation errors
//! - [`ExportError`] - Export serialization errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Sheet Loading Errors
// =============================================================================

/// Errors while loading a spreadsheet into a raw table.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode text content.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Workbook could not be opened or read.
    #[error("Invalid workbook: {0}")]
    WorkbookError(String),

    /// Invalid delimited-text structure.
    #[error("Invalid delimited text: {0}")]
    ParseError(String),

    /// Empty file.
    #[error("Spreadsheet is empty")]
    EmptyFile,

    /// The file does not carry the two literal header rows.
    #[error("Spreadsheet has {found} row(s); at least 2 header rows are required")]
    TooFewRows { found: usize },
}

// =============================================================================
// Query Plan Errors
// =============================================================================

/// Errors in a query plan or during its interpretation.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Plan failed schema validation.
    #[error("Invalid query plan: {0}")]
    InvalidPlan(String),

    /// Plan references a column the sheet does not have.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A `matches` condition carries a malformed pattern.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A chart axis does not hold usable values.
    #[error("Chart axis '{column}' has no numeric values")]
    EmptyChartAxis { column: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// AI Client Errors
// =============================================================================

/// Errors from the AI client.
#[derive(Debug, Error)]
pub enum AiError {
    /// Missing API key.
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Invalid JSON response.
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// API-level error returned by the service.
    #[error("API error: {0}")]
    ApiError(String),

    /// The response did not contain a usable query plan.
    #[error("Failed to parse plan: {0}")]
    ParseError(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the plan registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Plan not found.
    #[error("Plan not found: {0}")]
    NotFound(String),

    /// Failed to save plan.
    #[error("Failed to save plan: {0}")]
    SaveError(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Reconciliation Errors
// =============================================================================

/// Errors while mapping selected rows back to the raw table.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A selected position resolves past the end of the raw table.
    ///
    /// This means the analysis table and the raw table disagree on row
    /// count; the export must fail rather than clip the selection.
    #[error(
        "Selected row {position} maps to raw row {} but the raw table has only {raw_rows} rows",
        .position + 2
    )]
    RowOutOfRange { position: usize, raw_rows: usize },

    /// The raw table is missing its header rows.
    #[error("Raw table has {found} row(s); 2 header rows are required")]
    MissingHeaderRows { found: usize },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors during export serialization.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Workbook writing failed.
    #[error("Failed to write workbook: {0}")]
    WorkbookError(String),

    /// Delimited-text writing failed.
    #[error("Failed to write delimited text: {0}")]
    CsvError(String),

    /// IO error.
    #[error("Export IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::pipeline::analyze_sheet`].
/// It wraps all lower-level errors and adds pipeline-specific variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Sheet loading error.
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    /// Query plan error.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// AI client error.
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Reconciliation error.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// The sheet has no data rows to query.
    #[error("Spreadsheet has no data rows")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No spreadsheet has been uploaded yet.
    #[error("No active session; upload a spreadsheet first")]
    NoSession,

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for sheet loading operations.
pub type SheetResult<T> = Result<T, SheetError>;

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
