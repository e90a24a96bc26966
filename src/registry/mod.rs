//! Plan registry - store and reuse generated query plans.
//!
//! Saves plans to disk and matches them to later requests by column set
//! and question, so a repeated question against the same file layout
//! skips the AI round trip.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::query::QueryPlan;

/// Directory where plans are stored (relative to current dir).
const DEFAULT_REGISTRY_DIR: &str = ".sheetsift/plans";

/// A stored plan with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPlan {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The query plan.
    pub plan: QueryPlan,
    /// The question this plan answers.
    pub question: String,
    /// Column names the plan was created for.
    pub columns: Vec<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last time this plan was used.
    pub last_used: Option<String>,
    /// Success rate (0.0 to 1.0).
    pub success_rate: f64,
    /// Number of times used.
    pub use_count: u32,
}

/// Registry for managing stored query plans.
pub struct PlanRegistry {
    /// Directory where plans are stored.
    registry_dir: PathBuf,
    /// Loaded plans (id -> plan).
    plans: HashMap<String, StoredPlan>,
}

impl PlanRegistry {
    /// Create a new registry, loading existing plans from disk.
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Create a registry with a custom directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let registry_dir = PathBuf::from(dir.as_ref());
        let mut registry = Self {
            registry_dir,
            plans: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    /// Load all plans from the registry directory.
    fn load_all(&mut self) {
        if !self.registry_dir.exists() {
            return;
        }

        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(plan) = serde_json::from_str::<StoredPlan>(&content) {
                        self.plans.insert(plan.id.clone(), plan);
                    }
                }
            }
        }
    }

    /// Get all stored plans.
    pub fn list(&self) -> Vec<&StoredPlan> {
        self.plans.values().collect()
    }

    /// Get a plan by ID.
    pub fn get(&self, id: &str) -> Option<&StoredPlan> {
        self.plans.get(id)
    }

    /// Find stored plans answering the same question against a
    /// compatible column set, best first.
    pub fn find_matching(&self, columns: &[String], question: &str) -> Vec<(&StoredPlan, f64)> {
        let wanted = normalize_question(question);

        let mut matching: Vec<_> = self
            .plans
            .values()
            .filter(|p| normalize_question(&p.question) == wanted)
            .filter_map(|p| {
                let score = column_compatibility(&p.columns, columns);
                if score > 0.5 {
                    Some((p, score))
                } else {
                    None
                }
            })
            .collect();

        // Sort by: compatibility score * success rate (descending)
        matching.sort_by(|a, b| {
            let score_a = a.1 * a.0.success_rate;
            let score_b = b.1 * b.0.success_rate;
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        matching
    }

    /// Save a new plan to the registry.
    pub fn save(
        &mut self,
        plan: QueryPlan,
        name: &str,
        question: &str,
        columns: Vec<String>,
    ) -> Result<String, std::io::Error> {
        // Ensure directory exists
        fs::create_dir_all(&self.registry_dir)?;

        let id = self.generate_id(name);
        let stored = StoredPlan {
            id: id.clone(),
            name: name.to_string(),
            plan,
            question: question.to_string(),
            columns,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            success_rate: 1.0,
            use_count: 0,
        };

        let path = self.registry_dir.join(format!("{}.json", id));
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&path, content)?;

        self.plans.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a plan from a JSON file.
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> Result<String, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;

        let plan: QueryPlan =
            serde_json::from_str(&content).map_err(|e| format!("Invalid plan JSON: {}", e))?;

        let plan_name = name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
        });

        let columns = plan.referenced_columns();
        let question = plan.description.clone();

        self.save(plan, plan_name, &question, columns)
            .map_err(|e| format!("Failed to save: {}", e))
    }

    /// Update statistics after using a plan.
    pub fn update_stats(&mut self, id: &str, success: bool) {
        if let Some(plan) = self.plans.get_mut(id) {
            // Exponential moving average
            plan.success_rate = if success {
                plan.success_rate * 0.9 + 0.1
            } else {
                plan.success_rate * 0.9
            };
            plan.last_used = Some(chrono::Utc::now().to_rfc3339());
            plan.use_count += 1;

            let path = self.registry_dir.join(format!("{}.json", id));
            if let Ok(content) = serde_json::to_string_pretty(plan) {
                let _ = fs::write(&path, content);
            }
        }
    }

    /// Delete a plan from the registry.
    pub fn delete(&mut self, id: &str) -> Result<(), String> {
        if self.plans.remove(id).is_some() {
            let path = self.registry_dir.join(format!("{}.json", id));
            fs::remove_file(&path).map_err(|e| format!("Failed to delete file: {}", e))?;
            Ok(())
        } else {
            Err(format!("Plan not found: {}", id))
        }
    }

    /// Generate a unique ID from a name.
    fn generate_id(&self, name: &str) -> String {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        let timestamp = chrono::Utc::now().timestamp_millis();
        format!("{}-{}", slug, timestamp)
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased, whitespace-collapsed question text for cache matching.
fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Share of stored columns present in the sheet's columns.
fn column_compatibility(stored: &[String], sheet: &[String]) -> f64 {
    if stored.is_empty() {
        return 0.0;
    }

    let sheet_lower: Vec<String> = sheet.iter().map(|c| c.to_lowercase()).collect();
    let match_count = stored
        .iter()
        .filter(|col| sheet_lower.contains(&col.to_lowercase()))
        .count();

    match_count as f64 / stored.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::example_plan;
    use tempfile::tempdir;

    #[test]
    fn test_compatibility_score() {
        let stored = vec![
            "Chem_C".to_string(),
            "Tensile_T_EL".to_string(),
            "Grade".to_string(),
        ];
        let sheet = vec![
            "Chem_C".to_string(),
            "Tensile_T_EL".to_string(),
            "Other".to_string(),
        ];

        let score = column_compatibility(&stored, &sheet);
        assert!((score - 0.666).abs() < 0.01); // 2/3 match
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("  Carbon  ABOVE\t0.06 "),
            "carbon above 0.06"
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let mut registry = PlanRegistry::with_dir(dir.path());

        let id = registry
            .save(
                example_plan(),
                "carbon-check",
                "carbon above 0.06",
                vec!["Chem_C".to_string(), "Tensile_T_EL".to_string()],
            )
            .unwrap();

        // A fresh registry over the same directory sees the plan.
        let reloaded = PlanRegistry::with_dir(dir.path());
        let stored = reloaded.get(&id).unwrap();
        assert_eq!(stored.name, "carbon-check");
        assert_eq!(stored.use_count, 0);
    }

    #[test]
    fn test_find_matching_requires_same_question() {
        let dir = tempdir().unwrap();
        let mut registry = PlanRegistry::with_dir(dir.path());
        registry
            .save(
                example_plan(),
                "carbon-check",
                "Carbon above 0.06",
                vec!["Chem_C".to_string()],
            )
            .unwrap();

        let columns = vec!["Chem_C".to_string(), "Grade".to_string()];
        assert_eq!(registry.find_matching(&columns, "carbon  above 0.06").len(), 1);
        assert!(registry.find_matching(&columns, "carbon below 0.06").is_empty());
    }

    #[test]
    fn test_find_matching_requires_compatible_columns() {
        let dir = tempdir().unwrap();
        let mut registry = PlanRegistry::with_dir(dir.path());
        registry
            .save(
                example_plan(),
                "carbon-check",
                "carbon above 0.06",
                vec!["Chem_C".to_string(), "Tensile_T_EL".to_string()],
            )
            .unwrap();

        let unrelated = vec!["Name".to_string(), "Age".to_string()];
        assert!(registry.find_matching(&unrelated, "carbon above 0.06").is_empty());
    }

    #[test]
    fn test_update_stats_ema() {
        let dir = tempdir().unwrap();
        let mut registry = PlanRegistry::with_dir(dir.path());
        let id = registry
            .save(example_plan(), "p", "q", vec!["Chem_C".to_string()])
            .unwrap();

        registry.update_stats(&id, false);
        let rate = registry.get(&id).unwrap().success_rate;
        assert!((rate - 0.9).abs() < 1e-9);

        registry.update_stats(&id, true);
        let rate = registry.get(&id).unwrap().success_rate;
        assert!((rate - 0.91).abs() < 1e-9);
        assert_eq!(registry.get(&id).unwrap().use_count, 2);
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut registry = PlanRegistry::with_dir(dir.path());
        let id = registry
            .save(example_plan(), "p", "q", vec!["Chem_C".to_string()])
            .unwrap();

        registry.delete(&id).unwrap();
        assert!(registry.get(&id).is_none());
        assert!(registry.delete(&id).is_err());
    }
}
