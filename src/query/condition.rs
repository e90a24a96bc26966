//! Filter conditions for query plans.
//!
//! The closed set of predicates a plan may use. Anything the AI returns
//! outside this grammar fails schema validation and is never interpreted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{PlanError, PlanResult};
use crate::sheet::header::Columns;
use crate::sheet::Cell;

/// All available filter conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Cell equals a value (numeric when both sides are numeric).
    Eq { column: String, value: Value },

    /// Cell differs from a value.
    Ne { column: String, value: Value },

    /// Cell is strictly greater than a value.
    Gt { column: String, value: Value },

    /// Cell is greater than or equal to a value.
    Ge { column: String, value: Value },

    /// Cell is strictly less than a value.
    Lt { column: String, value: Value },

    /// Cell is less than or equal to a value.
    Le { column: String, value: Value },

    /// Cell lies in the inclusive range [low, high].
    Between {
        column: String,
        low: Value,
        high: Value,
    },

    /// Cell text contains a substring.
    Contains {
        column: String,
        value: String,
        #[serde(default)]
        case_insensitive: bool,
    },

    /// Cell text starts with a prefix.
    StartsWith {
        column: String,
        value: String,
        #[serde(default)]
        case_insensitive: bool,
    },

    /// Cell text matches a regular expression.
    Matches { column: String, pattern: String },

    /// Cell is blank.
    IsEmpty { column: String },

    /// Cell is not blank.
    NotEmpty { column: String },

    /// Cell equals one of the listed values.
    OneOf { column: String, values: Vec<Value> },

    /// Every sub-condition holds.
    All { conditions: Vec<Condition> },

    /// At least one sub-condition holds.
    Any { conditions: Vec<Condition> },

    /// The sub-condition does not hold.
    Not { condition: Box<Condition> },
}

impl Condition {
    /// Evaluate this condition against one analysis row.
    pub fn evaluate(&self, row: &[Cell], columns: &Columns) -> PlanResult<bool> {
        match self {
            Condition::Eq { column, value } => Ok(equals(cell_at(row, columns, column)?, value)),
            Condition::Ne { column, value } => Ok(!equals(cell_at(row, columns, column)?, value)),
            Condition::Gt { column, value } => {
                Ok(compare(cell_at(row, columns, column)?, value) == Some(Ordering::Greater))
            }
            Condition::Ge { column, value } => Ok(matches!(
                compare(cell_at(row, columns, column)?, value),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            )),
            Condition::Lt { column, value } => {
                Ok(compare(cell_at(row, columns, column)?, value) == Some(Ordering::Less))
            }
            Condition::Le { column, value } => Ok(matches!(
                compare(cell_at(row, columns, column)?, value),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )),
            Condition::Between { column, low, high } => {
                let cell = cell_at(row, columns, column)?;
                let above = matches!(
                    compare(cell, low),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                );
                let below = matches!(
                    compare(cell, high),
                    Some(Ordering::Less) | Some(Ordering::Equal)
                );
                Ok(above && below)
            }
            Condition::Contains {
                column,
                value,
                case_insensitive,
            } => {
                let text = cell_at(row, columns, column)?.display();
                Ok(if *case_insensitive {
                    text.to_lowercase().contains(&value.to_lowercase())
                } else {
                    text.contains(value.as_str())
                })
            }
            Condition::StartsWith {
                column,
                value,
                case_insensitive,
            } => {
                let text = cell_at(row, columns, column)?.display();
                Ok(if *case_insensitive {
                    text.to_lowercase().starts_with(&value.to_lowercase())
                } else {
                    text.starts_with(value.as_str())
                })
            }
            Condition::Matches { column, pattern } => {
                let re = regex::Regex::new(pattern).map_err(|e| PlanError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Ok(re.is_match(&cell_at(row, columns, column)?.display()))
            }
            Condition::IsEmpty { column } => Ok(cell_at(row, columns, column)?.is_blank()),
            Condition::NotEmpty { column } => Ok(!cell_at(row, columns, column)?.is_blank()),
            Condition::OneOf { column, values } => {
                let cell = cell_at(row, columns, column)?;
                Ok(values.iter().any(|v| equals(cell, v)))
            }
            Condition::All { conditions } => {
                for c in conditions {
                    if !c.evaluate(row, columns)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { conditions } => {
                for c in conditions {
                    if c.evaluate(row, columns)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not { condition } => Ok(!condition.evaluate(row, columns)?),
        }
    }

    /// All column references used by this condition, in appearance order.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Condition::Eq { column, .. }
            | Condition::Ne { column, .. }
            | Condition::Gt { column, .. }
            | Condition::Ge { column, .. }
            | Condition::Lt { column, .. }
            | Condition::Le { column, .. }
            | Condition::Between { column, .. }
            | Condition::Contains { column, .. }
            | Condition::StartsWith { column, .. }
            | Condition::Matches { column, .. }
            | Condition::IsEmpty { column }
            | Condition::NotEmpty { column }
            | Condition::OneOf { column, .. } => out.push(column.clone()),
            Condition::All { conditions } | Condition::Any { conditions } => {
                for c in conditions {
                    c.collect_columns(out);
                }
            }
            Condition::Not { condition } => condition.collect_columns(out),
        }
    }
}

/// Resolve a column reference and fetch the row's cell. Rows shorter
/// than the column table yield blank cells rather than failing.
fn cell_at<'a>(row: &'a [Cell], columns: &Columns, reference: &str) -> PlanResult<&'a Cell> {
    let position = columns
        .resolve(reference)
        .ok_or_else(|| PlanError::UnknownColumn(reference.to_string()))?;
    Ok(row.get(position).unwrap_or(&Cell::Empty))
}

/// Compare a cell with a plan value: numeric when both sides coerce to a
/// number, textual otherwise.
pub(crate) fn compare(cell: &Cell, value: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (cell.as_number(), value_as_number(value)) {
        return a.partial_cmp(&b);
    }
    Some(cell.display().trim().cmp(value_as_string(value).trim()))
}

/// Equality with the same numeric-first coercion as [`compare`].
pub(crate) fn equals(cell: &Cell, value: &Value) -> bool {
    if let (Some(a), Some(b)) = (cell.as_number(), value_as_number(value)) {
        return a == b;
    }
    cell.display().trim() == value_as_string(value).trim()
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> std::borrow::Cow<'_, str> {
    match value {
        Value::String(s) => std::borrow::Cow::Borrowed(s),
        other => std::borrow::Cow::Owned(other.to_string()),
    }
}

/// Get a description of all available conditions for AI prompts.
pub fn conditions_description() -> String {
    r#"Available filter conditions:

| Condition | Description | Parameters |
|-----------|-------------|------------|
| eq | Cell equals value | column, value |
| ne | Cell differs from value | column, value |
| gt | Cell greater than value | column, value |
| ge | Cell greater than or equal | column, value |
| lt | Cell less than value | column, value |
| le | Cell less than or equal | column, value |
| between | Cell in inclusive range | column, low, high |
| contains | Cell text contains substring | column, value, case_insensitive: bool |
| starts_with | Cell text starts with prefix | column, value, case_insensitive: bool |
| matches | Cell text matches regex | column, pattern |
| is_empty | Cell is blank | column |
| not_empty | Cell is not blank | column |
| one_of | Cell equals any listed value | column, values: array |
| all | Every sub-condition holds | conditions: array |
| any | At least one sub-condition holds | conditions: array |
| not | Sub-condition does not hold | condition |

Example conditions in JSON:
[
  {"type": "ge", "column": "Chem_C", "value": 0.06},
  {"type": "le", "column": "Tensile_T_EL", "value": 50},
  {"type": "contains", "column": "Grade", "value": "SPHC", "case_insensitive": true},
  {"type": "all", "conditions": [
    {"type": "ge", "column": "Chem_C", "value": 0.06},
    {"type": "not_empty", "column": "Grade"}
  ]}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Columns {
        Columns::new(vec!["C".into(), "Grade".into(), "C".into()])
    }

    fn row() -> Vec<Cell> {
        vec![
            Cell::Text("0.06".into()),
            Cell::Text("SPHC-X".into()),
            Cell::Number(0.02),
        ]
    }

    #[test]
    fn test_numeric_comparison_over_text_cells() {
        let c = Condition::Ge {
            column: "C".into(),
            value: json!(0.05),
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());

        let c = Condition::Gt {
            column: "C".into(),
            value: json!(0.06),
        };
        assert!(!c.evaluate(&row(), &columns()).unwrap());
    }

    #[test]
    fn test_duplicate_column_suffix() {
        // "C.1" targets the second C column, which holds 0.02.
        let c = Condition::Lt {
            column: "C.1".into(),
            value: json!(0.05),
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());
    }

    #[test]
    fn test_eq_and_one_of() {
        let c = Condition::Eq {
            column: "Grade".into(),
            value: json!("SPHC-X"),
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());

        let c = Condition::OneOf {
            column: "Grade".into(),
            values: vec![json!("SPCC"), json!("SPHC-X")],
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());
    }

    #[test]
    fn test_contains_case_insensitive() {
        let c = Condition::Contains {
            column: "Grade".into(),
            value: "sphc".into(),
            case_insensitive: true,
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());

        let c = Condition::Contains {
            column: "Grade".into(),
            value: "sphc".into(),
            case_insensitive: false,
        };
        assert!(!c.evaluate(&row(), &columns()).unwrap());
    }

    #[test]
    fn test_between() {
        let c = Condition::Between {
            column: "C".into(),
            low: json!(0.05),
            high: json!(0.07),
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());
    }

    #[test]
    fn test_combinators() {
        let c = Condition::All {
            conditions: vec![
                Condition::Ge {
                    column: "C".into(),
                    value: json!(0.05),
                },
                Condition::Not {
                    condition: Box::new(Condition::IsEmpty {
                        column: "Grade".into(),
                    }),
                },
            ],
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());

        let c = Condition::Any {
            conditions: vec![
                Condition::Eq {
                    column: "Grade".into(),
                    value: json!("nope"),
                },
                Condition::Eq {
                    column: "Grade".into(),
                    value: json!("SPHC-X"),
                },
            ],
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());
    }

    #[test]
    fn test_matches_and_invalid_pattern() {
        let c = Condition::Matches {
            column: "Grade".into(),
            pattern: "^SPHC".into(),
        };
        assert!(c.evaluate(&row(), &columns()).unwrap());

        let c = Condition::Matches {
            column: "Grade".into(),
            pattern: "[".into(),
        };
        assert!(matches!(
            c.evaluate(&row(), &columns()),
            Err(PlanError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_unknown_column() {
        let c = Condition::Eq {
            column: "Mn".into(),
            value: json!(1),
        };
        assert!(matches!(
            c.evaluate(&row(), &columns()),
            Err(PlanError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_short_row_reads_blank() {
        let c = Condition::IsEmpty { column: "C.1".into() };
        let short = vec![Cell::Text("0.06".into())];
        assert!(c.evaluate(&short, &columns()).unwrap());
    }

    #[test]
    fn test_columns_collection() {
        let c = Condition::All {
            conditions: vec![
                Condition::Ge {
                    column: "C".into(),
                    value: json!(0.05),
                },
                Condition::Any {
                    conditions: vec![Condition::NotEmpty {
                        column: "Grade".into(),
                    }],
                },
            ],
        };
        assert_eq!(c.columns(), vec!["C", "Grade"]);
    }

    #[test]
    fn test_serde_tagged_form() {
        let json = r#"{"type": "ge", "column": "C", "value": 0.06}"#;
        let c: Condition = serde_json::from_str(json).unwrap();
        assert!(matches!(c, Condition::Ge { .. }));

        // Unknown condition types do not deserialize.
        let bad = r#"{"type": "exec", "code": "anything"}"#;
        assert!(serde_json::from_str::<Condition>(bad).is_err());
    }
}
