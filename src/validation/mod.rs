//! JSON Schema validation for AI-generated query plans.
//!
//! Generated plans are never interpreted as-is: they are first checked
//! against the embedded plan schema (JSON Schema Draft 7), so anything
//! outside the closed condition grammar is rejected with concrete
//! violations before deserialization is even attempted.
//!
//! # Embedded Schema
//!
//! The schema is embedded at compile time from `schemas/`:
//! - `query-plan-schema.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use sheetsift::validation::validate_plan;
//!
//! let plan = json!({
//!     "filter": { "type": "ge", "column": "Chem_C", "value": 0.06 }
//! });
//! assert!(validate_plan(&plan).is_ok());
//! ```

use serde_json::Value;

/// The query plan JSON schema, embedded at compile time.
const PLAN_SCHEMA: &str = include_str!("../../schemas/query-plan-schema.json");

/// Validate a JSON object against a schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with every violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Boolean shortcut over [`validate`].
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a candidate query plan against the embedded plan schema.
pub fn validate_plan(plan: &Value) -> Result<(), Vec<String>> {
    let schema = plan_schema().map_err(|e| vec![e])?;
    validate(&schema, plan)
}

/// Boolean shortcut over [`validate_plan`].
pub fn is_valid_plan(plan: &Value) -> bool {
    plan_schema()
        .map(|schema| is_valid(&schema, plan))
        .unwrap_or(false)
}

/// The embedded plan schema, parsed.
pub fn plan_schema() -> Result<Value, String> {
    serde_json::from_str(PLAN_SCHEMA).map_err(|e| format!("Embedded schema unreadable: {}", e))
}

/// The embedded plan schema as source text, for prompt embedding.
pub fn plan_schema_text() -> &'static str {
    PLAN_SCHEMA
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_schema_is_valid_json() {
        let schema = plan_schema().unwrap();
        assert!(schema.get("definitions").is_some());
        assert!(schema.get("properties").is_some());
    }

    #[test]
    fn test_valid_plan_passes() {
        let plan = json!({
            "version": "1.0",
            "filter": {
                "type": "all",
                "conditions": [
                    { "type": "ge", "column": "Chem_C", "value": 0.06 },
                    { "type": "le", "column": "Tensile_T_EL", "value": 50 }
                ]
            },
            "sort": [{ "column": "Chem_C", "descending": true }]
        });
        assert!(validate_plan(&plan).is_ok());
        assert!(is_valid_plan(&plan));
    }

    #[test]
    fn test_empty_plan_passes() {
        assert!(validate_plan(&json!({})).is_ok());
    }

    #[test]
    fn test_unknown_condition_type_rejected() {
        let plan = json!({
            "filter": { "type": "exec", "code": "open('/etc/passwd')" }
        });
        let errors = validate_plan(&plan).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_extra_top_level_key_rejected() {
        let plan = json!({
            "filter": { "type": "not_empty", "column": "Grade" },
            "script": "anything"
        });
        assert!(validate_plan(&plan).is_err());
    }

    #[test]
    fn test_chart_plan_passes() {
        let plan = json!({
            "chart": { "kind": "bar", "x": "Grade", "y": "Chem_C", "title": "Carbon" }
        });
        assert!(validate_plan(&plan).is_ok());

        let bad = json!({
            "chart": { "kind": "pie", "x": "Grade", "y": "Chem_C" }
        });
        assert!(validate_plan(&bad).is_err());
    }

    #[test]
    fn test_nested_not_condition() {
        let plan = json!({
            "filter": {
                "type": "not",
                "condition": { "type": "is_empty", "column": "Grade" }
            }
        });
        assert!(validate_plan(&plan).is_ok());
    }

    #[test]
    fn test_example_plan_matches_schema() {
        let plan = crate::query::example_plan();
        let value = serde_json::to_value(&plan).unwrap();
        assert!(validate_plan(&value).is_ok());
    }
}
