//! High-level pipeline API for natural-language spreadsheet analysis.
//!
//! This module combines all steps: loading, plan lookup or generation,
//! interpretation, and reconciliation back onto the raw rows.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetsift::pipeline::{analyze_file, AnalyzeOptions, AnalyzeOutcome};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = analyze_file(
//!         Path::new("results.xlsx"),
//!         "carbon at least 0.06 and transverse elongation at most 50",
//!         AnalyzeOptions::default(),
//!     ).await?;
//!
//!     match report.outcome {
//!         AnalyzeOutcome::Matches { ref selection, .. } => {
//!             println!("{} matching rows", selection.len())
//!         }
//!         AnalyzeOutcome::NoMatches => println!("no matches"),
//!         AnalyzeOutcome::Chart(ref chart) => println!("{} points", chart.points.len()),
//!     }
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ai::AiClient;
use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{PipelineError, PipelineResult};
use crate::query::{execute, ChartData, QueryOutcome, QueryPlan, RowSelection};
use crate::reconcile::{reconcile, ExportTable};
use crate::registry::PlanRegistry;
use crate::sheet::{load_bytes, load_file, LoadedSheet, SheetFormat};

/// Options for the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    /// Use a specific plan file instead of AI/cache.
    pub plan_path: Option<String>,

    /// Don't use cached plans.
    pub no_cache: bool,

    /// Don't save generated plans to the cache.
    pub no_save: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            plan_path: None,
            no_cache: false,
            no_save: false,
        }
    }
}

/// What a query produced.
#[derive(Debug, Clone)]
pub enum AnalyzeOutcome {
    /// Matching rows, already reconciled into the original layout.
    Matches {
        /// Analysis positions in result order.
        selection: RowSelection,
        /// Header rows plus selected raw rows, ready for export.
        export: ExportTable,
    },

    /// Zero rows matched. Distinct from an error, and no export is
    /// produced for it.
    NoMatches,

    /// The plan requested a chart; series data replaces the row export.
    Chart(ChartData),
}

/// Result of a complete analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzeReport {
    /// What the query produced.
    pub outcome: AnalyzeOutcome,

    /// The plan that ran.
    pub plan: QueryPlan,

    /// Stored-plan ID when the cache supplied or kept the plan.
    pub plan_id: Option<String>,

    /// The prompt sent to the AI, when the AI was consulted.
    pub prompt: Option<String>,
}

/// Analyze a spreadsheet file with a natural-language question.
pub async fn analyze_file(
    path: &Path,
    question: &str,
    options: AnalyzeOptions,
) -> PipelineResult<AnalyzeReport> {
    let sheet = load_file(path)?;
    analyze_sheet(&sheet, question, &options).await
}

/// Analyze spreadsheet bytes with a natural-language question.
pub async fn analyze_bytes_query(
    bytes: &[u8],
    file_name: Option<&str>,
    question: &str,
    options: AnalyzeOptions,
) -> PipelineResult<AnalyzeReport> {
    let sheet = load_bytes(bytes, file_name)?;
    analyze_sheet(&sheet, question, &options).await
}

/// Analyze an already-loaded sheet with a natural-language question.
pub async fn analyze_sheet(
    sheet: &LoadedSheet,
    question: &str,
    options: &AnalyzeOptions,
) -> PipelineResult<AnalyzeReport> {
    describe_sheet(sheet);

    if sheet.analysis.row_count() == 0 {
        return Err(PipelineError::EmptyInput);
    }

    let (plan, plan_id, prompt) = obtain_plan(sheet, question, options).await?;
    let report = run_plan(sheet, plan.clone(), plan_id.clone(), prompt)?;

    // Feed the cache's success stats: a plan that found something is
    // worth trying again, one that found nothing may be stale.
    if let Some(ref id) = plan_id {
        let mut registry = PlanRegistry::new();
        let success = matches!(report.outcome, AnalyzeOutcome::Matches { .. } | AnalyzeOutcome::Chart(_));
        registry.update_stats(id, success);
    }

    Ok(report)
}

/// Apply an explicit plan to a loaded sheet (no AI, no cache).
pub fn analyze_with_plan(sheet: &LoadedSheet, plan: QueryPlan) -> PipelineResult<AnalyzeReport> {
    if sheet.analysis.row_count() == 0 {
        return Err(PipelineError::EmptyInput);
    }
    run_plan(sheet, plan, None, None)
}

/// Interpret a plan and reconcile the result.
fn run_plan(
    sheet: &LoadedSheet,
    plan: QueryPlan,
    plan_id: Option<String>,
    prompt: Option<String>,
) -> PipelineResult<AnalyzeReport> {
    log_info("Interpreting query plan...");
    let outcome = match execute(&plan, &sheet.analysis, &sheet.columns)? {
        QueryOutcome::Rows(selection) if selection.is_empty() => {
            log_warning("No rows matched the query");
            AnalyzeOutcome::NoMatches
        }
        QueryOutcome::Rows(selection) => {
            log_success(format!("{} matching row(s)", selection.len()));
            let export = reconcile(&sheet.raw, &selection)?;
            AnalyzeOutcome::Matches { selection, export }
        }
        QueryOutcome::Chart(chart) => {
            log_success(format!(
                "Chart series ready: {} point(s), {} skipped",
                chart.points.len(),
                chart.skipped
            ));
            AnalyzeOutcome::Chart(chart)
        }
    };

    Ok(AnalyzeReport {
        outcome,
        plan,
        plan_id,
        prompt,
    })
}

/// Find a plan: explicit file, then cache, then AI.
async fn obtain_plan(
    sheet: &LoadedSheet,
    question: &str,
    options: &AnalyzeOptions,
) -> PipelineResult<(QueryPlan, Option<String>, Option<String>)> {
    // Option 1: explicit plan file
    if let Some(ref plan_path) = options.plan_path {
        log_info(format!("Using provided plan file: {}", plan_path));
        let content = std::fs::read_to_string(plan_path)
            .map_err(crate::error::SheetError::IoError)
            .map_err(PipelineError::Sheet)?;
        let plan = QueryPlan::from_json(&content).map_err(crate::error::PlanError::JsonError)?;
        return Ok((plan, None, None));
    }

    let column_names = sheet.columns.aliased_names();

    // Option 2: cached plan for the same question and layout
    if !options.no_cache {
        log_info("Looking for a cached plan...");
        let registry = PlanRegistry::new();
        let matching = registry.find_matching(&column_names, question);

        if let Some((stored, score)) = matching.first() {
            log_success(format!(
                "Cached plan \"{}\" matches (score: {:.0}%, success rate: {:.0}%)",
                stored.name,
                score * 100.0,
                stored.success_rate * 100.0
            ));
            return Ok((stored.plan.clone(), Some(stored.id.clone()), None));
        }
        log_info("No cached plan found");
    }

    // Option 3: ask the AI
    log_info("Generating plan with AI...");
    let client = AiClient::from_env()?;
    let generated = client.generate_plan(sheet, question).await?;
    log_success("Plan generated");

    let plan_id = if !options.no_save {
        let mut registry = PlanRegistry::new();
        let name = sheet
            .file_name
            .as_deref()
            .and_then(|n| Path::new(n).file_stem().and_then(|s| s.to_str()))
            .unwrap_or("auto-generated");
        let id = registry
            .save(generated.plan.clone(), name, question, column_names)
            .ok();
        if let Some(ref id) = id {
            log_success(format!("Plan saved as: {}", id));
        }
        id
    } else {
        None
    };

    Ok((generated.plan, plan_id, Some(generated.prompt)))
}

/// Log the loaded sheet's shape, the way the upload path reports it.
fn describe_sheet(sheet: &LoadedSheet) {
    match &sheet.format {
        SheetFormat::Workbook => log_info("Format: xlsx workbook"),
        SheetFormat::Delimited {
            encoding,
            delimiter,
        } => log_info(format!(
            "Format: delimited text (encoding {}, delimiter '{}')",
            encoding,
            match delimiter {
                '\t' => "\\t".to_string(),
                c => c.to_string(),
            }
        )),
    }
    log_info(format!(
        "{} column(s), {} data row(s)",
        sheet.columns.len(),
        sheet.analysis.row_count()
    ));
}
