//! Query plans over the analysis table.
//!
//! This module provides:
//! - `plan`: Query plan definition (what the AI returns)
//! - `condition`: The closed set of filter conditions
//! - `executor`: Interpret plans against loaded sheets
//!
//! ## Usage Flow
//!
//! ```text
//! bytes → sheet::load_bytes → AI generates QueryPlan → executor::execute
//!       → RowSelection → reconcile::reconcile → export
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sheetsift::query::{QueryPlan, execute, QueryOutcome};
//! use sheetsift::sheet::load_bytes;
//!
//! let sheet = load_bytes(&bytes, None)?;
//! let plan = QueryPlan::from_json(plan_json)?;
//!
//! match execute(&plan, &sheet.analysis, &sheet.columns)? {
//!     QueryOutcome::Rows(selection) if selection.is_empty() => println!("no matches"),
//!     QueryOutcome::Rows(selection) => println!("{} rows", selection.len()),
//!     QueryOutcome::Chart(chart) => println!("{} points", chart.points.len()),
//! }
//! ```

pub mod condition;
pub mod executor;
pub mod plan;

// Re-exports for convenience
pub use condition::{conditions_description, Condition};
pub use executor::{execute, ChartData, ChartPoint, QueryOutcome, RowSelection};
pub use plan::{example_plan, ChartKind, ChartSpec, QueryPlan, SortKey};
