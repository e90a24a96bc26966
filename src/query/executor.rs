//! Query plan interpreter.
//!
//! Runs a plan against the analysis table and produces either an ordered
//! row selection or chart series data. Selections always carry analysis
//! positions, so the rows a plan picks keep their identity through any
//! sorting the plan applies.

use serde::{Deserialize, Serialize};

use super::plan::{ChartKind, ChartSpec, QueryPlan};
use crate::error::{PlanError, PlanResult};
use crate::sheet::header::Columns;
use crate::sheet::{AnalysisTable, Cell};

/// An ordered set of analysis-row positions matching a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowSelection(Vec<usize>);

impl RowSelection {
    pub fn new(positions: Vec<usize>) -> Self {
        Self(positions)
    }

    /// Positions in result order.
    pub fn positions(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One chart point: x label plus numeric y value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Chart-ready series computed from the matching rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub kind: ChartKind,
    pub x_column: String,
    pub y_column: String,
    pub title: Option<String>,
    pub points: Vec<ChartPoint>,
    /// Rows dropped because the y cell held no numeric value.
    pub skipped: usize,
}

/// Result of interpreting a plan.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Matching rows in result order.
    Rows(RowSelection),
    /// Chart series data; no row export is offered for chart plans.
    Chart(ChartData),
}

/// Interpret a query plan against the analysis table.
///
/// Column references are checked up front so a plan naming a missing
/// column fails before any row is touched. Filtering walks rows in
/// original order; sorting is stable over positions; the limit applies
/// last.
pub fn execute(
    plan: &QueryPlan,
    analysis: &AnalysisTable,
    columns: &Columns,
) -> PlanResult<QueryOutcome> {
    if let Err(missing) = plan.validate_columns(columns) {
        return Err(PlanError::UnknownColumn(missing.join(", ")));
    }

    let mut positions: Vec<usize> = Vec::new();
    for (position, row) in analysis.rows().iter().enumerate() {
        let keep = match plan.filter {
            Some(ref filter) => filter.evaluate(row, columns)?,
            None => true,
        };
        if keep {
            positions.push(position);
        }
    }

    for key in plan.sort.iter().rev() {
        // Column presence was checked above.
        let index = columns
            .resolve(&key.column)
            .ok_or_else(|| PlanError::UnknownColumn(key.column.clone()))?;
        positions.sort_by(|&a, &b| {
            let left = cell_of(analysis, a, index);
            let right = cell_of(analysis, b, index);
            let ordering = compare_cells(left, right);
            if key.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    if let Some(limit) = plan.limit {
        positions.truncate(limit);
    }

    match plan.chart {
        Some(ref spec) => Ok(QueryOutcome::Chart(build_chart(
            spec, analysis, columns, &positions,
        )?)),
        None => Ok(QueryOutcome::Rows(RowSelection::new(positions))),
    }
}

fn cell_of<'a>(analysis: &'a AnalysisTable, position: usize, index: usize) -> &'a Cell {
    analysis
        .row(position)
        .and_then(|row| row.get(index))
        .unwrap_or(&Cell::Empty)
}

/// Total order over cells: numeric when both sides coerce, textual
/// otherwise, with blank cells last.
fn compare_cells(a: &Cell, b: &Cell) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a.is_blank(), b.is_blank()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.display().cmp(&b.display()),
    }
}

fn build_chart(
    spec: &ChartSpec,
    analysis: &AnalysisTable,
    columns: &Columns,
    positions: &[usize],
) -> PlanResult<ChartData> {
    let x_index = columns
        .resolve(&spec.x)
        .ok_or_else(|| PlanError::UnknownColumn(spec.x.clone()))?;
    let y_index = columns
        .resolve(&spec.y)
        .ok_or_else(|| PlanError::UnknownColumn(spec.y.clone()))?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for &position in positions {
        let y = cell_of(analysis, position, y_index).as_number();
        match y {
            Some(value) => points.push(ChartPoint {
                label: cell_of(analysis, position, x_index).display(),
                value,
            }),
            None => skipped += 1,
        }
    }

    if points.is_empty() {
        return Err(PlanError::EmptyChartAxis {
            column: spec.y.clone(),
        });
    }

    Ok(ChartData {
        kind: spec.kind,
        x_column: spec.x.clone(),
        y_column: spec.y.clone(),
        title: spec.title.clone(),
        points,
        skipped,
    })
}
