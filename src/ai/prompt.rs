//! Prompt generation for query-plan generation.
//!
//! Builds the prompts that carry the sheet's column context and the
//! user's question to the AI and get back a query plan.

use std::collections::HashSet;

use serde_json::Value;

use crate::query::conditions_description;
use crate::sheet::header::Columns;
use crate::sheet::{AnalysisTable, Cell};
use crate::validation::plan_schema_text;

/// Sample values shown per column before switching to a truncated view.
const MAX_SAMPLE_VALUES: usize = 12;

/// Generate the system prompt for plan generation.
pub fn system_prompt() -> String {
    format!(
        r#"You are a data analyst. You translate a user's natural-language question about a spreadsheet into a structured query plan. You never write executable code; you only emit a JSON plan matching the schema below.

## Your Mission

Given:
1. The spreadsheet's column names with inferred types and sample values
2. A user question

You must return a valid JSON query plan that filters (and optionally sorts, limits, or charts) the rows.

## CRITICAL: Output Format

You MUST return ONLY valid JSON matching this schema EXACTLY:

```json
{plan_schema}
```

## Condition Reference

{conditions}

## Column Name Rules

1. Use EXACT column names from the context (case-sensitive).
2. Column names were flattened from a two-row header as "Group_Item" (e.g. "Chem_C" is the C item under the Chem group).
3. Duplicate column names carry a positional suffix: "C" is the first C column, "C.1" the second, "C.2" the third. ".1" usually means the second test of the same quantity.

## Rules

1. Use ONLY condition types listed in the reference. Do NOT invent new ones.
2. Numeric thresholds go in as JSON numbers, not strings.
3. If the question asks for ordering ("highest", "top 10", "sorted by"), use "sort" (and "limit" for top-N).
4. If the question asks for a chart or plot, fill "chart" with the axis columns; otherwise omit it.
5. Set "description" to a one-line restatement of the question.
6. Return ONLY the JSON object, no explanations or markdown."#,
        plan_schema = plan_schema_text(),
        conditions = conditions_description(),
    )
}

/// Generate the user prompt with column context and the question.
pub fn user_prompt(columns: &Columns, analysis: &AnalysisTable, question: &str) -> String {
    let context = column_context(columns, analysis);
    let row_count = analysis.row_count();

    format!(
        r#"## Spreadsheet Columns ({row_count} data rows)

{context}

## User Question

"{question}"

## Task

Translate the question into a query plan over these columns.

Return ONLY the JSON object matching the query plan schema. No explanations."#
    )
}

/// Describe each column: alias, inferred type, sample values.
///
/// Duplicate names are listed under their positional alias so every
/// column stays addressable.
fn column_context(columns: &Columns, analysis: &AnalysisTable) -> String {
    let mut out = String::new();

    for (position, alias) in columns.aliased_names().iter().enumerate() {
        let cells: Vec<&Cell> = analysis
            .rows()
            .iter()
            .filter_map(|row| row.get(position))
            .collect();

        let type_tag = infer_type(&cells);
        let samples = sample_values(&cells);

        let label = if alias.is_empty() { "(unnamed)" } else { alias };
        out.push_str(&format!("- **{}** ({}): {}\n", label, type_tag, samples));
    }

    out
}

/// Infer a coarse type tag from the non-blank cells of a column.
fn infer_type(cells: &[&Cell]) -> &'static str {
    let mut saw_value = false;
    let mut all_numeric = true;
    let mut all_boolean = true;

    for cell in cells {
        if cell.is_blank() {
            continue;
        }
        saw_value = true;
        if cell.as_number().is_none() {
            all_numeric = false;
        }
        if !matches!(cell, Cell::Bool(_)) {
            all_boolean = false;
        }
    }

    if !saw_value {
        "empty"
    } else if all_boolean {
        "boolean"
    } else if all_numeric {
        "number"
    } else {
        "text"
    }
}

/// Up to [`MAX_SAMPLE_VALUES`] distinct values, with a cardinality note
/// when the column holds more.
fn sample_values(cells: &[&Cell]) -> String {
    let mut seen = HashSet::new();
    let mut samples = Vec::new();

    for cell in cells {
        if cell.is_blank() {
            continue;
        }
        let display = cell.display();
        if seen.insert(display.clone()) {
            samples.push(display);
        }
    }

    let unique = samples.len();
    if unique == 0 {
        return "(no values)".to_string();
    }

    if unique > MAX_SAMPLE_VALUES {
        format!(
            "{}, ... ({} unique values, sample shown)",
            samples[..MAX_SAMPLE_VALUES].join(", "),
            unique
        )
    } else {
        samples.join(", ")
    }
}

/// Build the message list for the API request.
pub fn build_messages(columns: &Columns, analysis: &AnalysisTable, question: &str) -> Vec<Value> {
    vec![serde_json::json!({
        "role": "user",
        "content": user_prompt(columns, analysis, question)
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::RawTable;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn sample() -> (Columns, AnalysisTable) {
        let raw = RawTable::new(vec![
            vec![text("Chem"), Cell::Empty, Cell::Empty],
            vec![text("C"), text("C"), text("Grade")],
            vec![text("0.06"), text("0.05"), text("SPHC")],
            vec![text("0.04"), text("0.07"), text("SPCC")],
        ])
        .unwrap();
        let (g, i) = raw.header_rows();
        let columns = Columns::new(crate::sheet::header::flatten(g, i));
        (columns, AnalysisTable::from_raw(&raw))
    }

    #[test]
    fn test_system_prompt_embeds_schema_and_conditions() {
        let prompt = system_prompt();
        assert!(prompt.contains("\"const\": \"between\""));
        assert!(prompt.contains("| one_of |"));
        assert!(prompt.contains("\".1\" usually means the second test"));
    }

    #[test]
    fn test_user_prompt_lists_aliased_columns() {
        let (columns, analysis) = sample();
        let prompt = user_prompt(&columns, &analysis, "carbon above 0.05");

        // Forward fill makes both first columns "Chem_C"; the second
        // occurrence appears under its positional alias.
        assert!(prompt.contains("**Chem_C**"));
        assert!(prompt.contains("**Chem_C.1**"));
        assert!(prompt.contains("carbon above 0.05"));
        assert!(prompt.contains("2 data rows"));
    }

    #[test]
    fn test_type_inference() {
        let (columns, analysis) = sample();
        let prompt = user_prompt(&columns, &analysis, "q");
        assert!(prompt.contains("**Chem_C** (number)"));
        assert!(prompt.contains("(text): SPHC, SPCC"));
    }

    #[test]
    fn test_sample_values_capped() {
        let cells: Vec<Cell> = (0..40).map(|i| Cell::Number(i as f64)).collect();
        let refs: Vec<&Cell> = cells.iter().collect();
        let summary = sample_values(&refs);
        assert!(summary.contains("40 unique values"));
    }

    #[test]
    fn test_unnamed_column_label() {
        let columns = Columns::new(vec!["".to_string()]);
        let raw = RawTable::new(vec![
            vec![Cell::Empty],
            vec![Cell::Empty],
            vec![text("x")],
        ])
        .unwrap();
        let analysis = AnalysisTable::from_raw(&raw);
        let prompt = user_prompt(&columns, &analysis, "q");
        assert!(prompt.contains("**(unnamed)**"));
    }
}
