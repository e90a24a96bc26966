//! Query plan definition.
//!
//! The plan is what the AI returns: a filter over the analysis table,
//! optional ordering and row limit, and optionally a chart request in
//! place of a filtered export.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::Condition;
use crate::sheet::header::Columns;

/// A complete query plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Version of the plan format.
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable restatement of the question.
    #[serde(default)]
    pub description: String,

    /// Row filter; absent means every row matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Condition>,

    /// Sort keys applied after filtering, first key outermost.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,

    /// Keep at most this many rows after sorting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Chart request; when present the result is chart series data
    /// rather than a filtered export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One sort key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortKey {
    /// Column reference to order by.
    pub column: String,

    /// Descending order when true.
    #[serde(default)]
    pub descending: bool,
}

/// Chart flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
}

/// A chart request: x labels and a numeric y series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart flavor.
    pub kind: ChartKind,

    /// Column supplying the x-axis labels.
    pub x: String,

    /// Column supplying the numeric y values.
    pub y: String,

    /// Chart title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl QueryPlan {
    /// Create an empty plan (matches every row, no chart).
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            filter: None,
            sort: Vec::new(),
            limit: None,
            chart: None,
        }
    }

    /// Parse a plan from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a plan from a JSON value.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// All column references used anywhere in the plan.
    pub fn referenced_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        if let Some(ref filter) = self.filter {
            columns.extend(filter.columns());
        }
        for key in &self.sort {
            columns.push(key.column.clone());
        }
        if let Some(ref chart) = self.chart {
            columns.push(chart.x.clone());
            columns.push(chart.y.clone());
        }
        columns.sort();
        columns.dedup();
        columns
    }

    /// Check that every referenced column resolves against the sheet.
    pub fn validate_columns(&self, columns: &Columns) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .referenced_columns()
            .into_iter()
            .filter(|c| columns.resolve(c).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

impl Default for QueryPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an example plan for documentation and AI prompts.
pub fn example_plan() -> QueryPlan {
    QueryPlan {
        version: default_version(),
        description: "Carbon at least 0.06 and transverse elongation at most 50".to_string(),
        filter: Some(Condition::All {
            conditions: vec![
                Condition::Ge {
                    column: "Chem_C".to_string(),
                    value: serde_json::json!(0.06),
                },
                Condition::Le {
                    column: "Tensile_T_EL".to_string(),
                    value: serde_json::json!(50),
                },
            ],
        }),
        sort: vec![SortKey {
            column: "Chem_C".to_string(),
            descending: true,
        }],
        limit: None,
        chart: None,
    }
}
