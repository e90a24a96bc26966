//! REST API types for client integration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::pipeline::{AnalyzeOutcome, AnalyzeReport};
use crate::query::ChartData;
use crate::sheet::{Cell, LoadedSheet, SheetFormat};

/// Data rows included in upload and query previews.
const PREVIEW_ROWS: usize = 5;

/// Response sent after a spreadsheet upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Session identifier for this upload.
    pub session_id: Uuid,

    /// Status: always "ready" on success.
    pub status: String,

    /// Original file name, when the client sent one.
    pub file_name: Option<String>,

    /// Sheet metadata.
    pub sheet: SheetMetadata,

    /// Flat column names with positional aliases for duplicates.
    pub columns: Vec<String>,

    /// First data rows, as display strings.
    pub preview: Vec<Vec<String>>,
}

/// Metadata about the loaded sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMetadata {
    /// "workbook" or "delimited".
    pub format: String,

    /// Detected encoding (delimited input only).
    pub encoding: Option<String>,

    /// Detected delimiter (delimited input only).
    pub delimiter: Option<String>,

    /// Number of data rows.
    pub row_count: usize,

    /// Number of columns.
    pub column_count: usize,
}

/// Response sent after a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Job identifier for this query.
    pub job_id: Uuid,

    /// "matched", "no_matches" or "chart".
    pub status: String,

    /// Number of matching rows ("matched" only).
    pub match_count: usize,

    /// The plan that ran, for diagnosis.
    pub plan: Value,

    /// Stored-plan ID when the cache was involved.
    pub plan_id: Option<String>,

    /// The prompt sent to the AI, when the AI was consulted.
    pub prompt: Option<String>,

    /// First matching rows in the original layout, as display strings
    /// ("matched" only).
    pub preview: Vec<Vec<String>>,

    /// Chart series data ("chart" only).
    pub chart: Option<ChartData>,
}

impl QueryResponse {
    /// Build the response envelope from a pipeline report.
    pub fn from_report(report: &AnalyzeReport) -> Self {
        let plan_json = serde_json::to_value(&report.plan).unwrap_or(Value::Null);

        let (status, match_count, preview, chart) = match &report.outcome {
            AnalyzeOutcome::Matches { selection, export } => (
                "matched",
                selection.len(),
                export
                    .rows()
                    .iter()
                    .skip(2)
                    .take(PREVIEW_ROWS)
                    .map(|row| row.iter().map(Cell::display).collect())
                    .collect(),
                None,
            ),
            AnalyzeOutcome::NoMatches => ("no_matches", 0, Vec::new(), None),
            AnalyzeOutcome::Chart(chart) => ("chart", 0, Vec::new(), Some(chart.clone())),
        };

        Self {
            job_id: Uuid::new_v4(),
            status: status.to_string(),
            match_count,
            plan: plan_json,
            plan_id: report.plan_id.clone(),
            prompt: report.prompt.clone(),
            preview,
            chart,
        }
    }
}

/// Build the upload response for a freshly loaded sheet.
pub fn upload_response(session_id: Uuid, sheet: &LoadedSheet) -> UploadResponse {
    let (format, encoding, delimiter) = match &sheet.format {
        SheetFormat::Workbook => ("workbook".to_string(), None, None),
        SheetFormat::Delimited {
            encoding,
            delimiter,
        } => (
            "delimited".to_string(),
            Some(encoding.clone()),
            Some(delimiter.to_string()),
        ),
    };

    let preview = sheet
        .analysis
        .rows()
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| row.iter().map(Cell::display).collect())
        .collect();

    UploadResponse {
        session_id,
        status: "ready".to_string(),
        file_name: sheet.file_name.clone(),
        sheet: SheetMetadata {
            format,
            encoding,
            delimiter,
            row_count: sheet.analysis.row_count(),
            column_count: sheet.columns.len(),
        },
        columns: sheet.columns.aliased_names(),
        preview,
    }
}

/// Create an error response.
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analyze_with_plan;
    use crate::query::{Condition, QueryPlan};
    use crate::sheet::load_bytes;
    use serde_json::json as j;

    fn sheet() -> LoadedSheet {
        let csv = b";Chem\nGrade;C\nSPHC;0.06\nSPCC;0.04\n";
        load_bytes(csv, Some("mill.csv")).unwrap()
    }

    #[test]
    fn test_upload_response_shape() {
        let sheet = sheet();
        let response = upload_response(Uuid::new_v4(), &sheet);

        assert_eq!(response.status, "ready");
        assert_eq!(response.sheet.format, "delimited");
        assert_eq!(response.sheet.row_count, 2);
        assert_eq!(response.columns, vec!["Grade", "Chem_C"]);
        assert_eq!(response.preview.len(), 2);
        assert_eq!(response.preview[0], vec!["SPHC", "0.06"]);
    }

    #[test]
    fn test_query_response_matched() {
        let sheet = sheet();
        let mut plan = QueryPlan::new();
        plan.filter = Some(Condition::Ge {
            column: "Chem_C".into(),
            value: j!(0.05),
        });
        let report = analyze_with_plan(&sheet, plan).unwrap();
        let response = QueryResponse::from_report(&report);

        assert_eq!(response.status, "matched");
        assert_eq!(response.match_count, 1);
        assert_eq!(response.preview, vec![vec!["SPHC", "0.06"]]);
        assert!(response.chart.is_none());
        assert!(response.plan.get("filter").is_some());
    }

    #[test]
    fn test_query_response_no_matches() {
        let sheet = sheet();
        let mut plan = QueryPlan::new();
        plan.filter = Some(Condition::Ge {
            column: "Chem_C".into(),
            value: j!(1.0),
        });
        let report = analyze_with_plan(&sheet, plan).unwrap();
        let response = QueryResponse::from_report(&report);

        assert_eq!(response.status, "no_matches");
        assert_eq!(response.match_count, 0);
        assert!(response.preview.is_empty());
    }

    #[test]
    fn test_error_response_shape() {
        let value = error_response("boom");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
    }
}
