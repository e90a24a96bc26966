//! Two-row header flattening and positional column resolution.
//!
//! Source files carry a (group, item) header pair per column: the first
//! row names a broad category, the second the specific measurement.
//! Spreadsheet authors merge or blank the group cell for repeated
//! categories, so the group label is forward-filled left to right.
//!
//! Flat names are NOT deduplicated. A file with two `C` columns keeps
//! both; downstream references disambiguate with the `C.1` suffix
//! convention, where `.1` means the second occurrence.

use crate::sheet::Cell;

/// Collapse a (group, item) header row pair into flat column names.
///
/// One name per column position, same length and order as the input.
///
/// - An absent group cell inherits the most recent group label seen
///   scanning left to right. Columns before any group label collapse to
///   item-only naming.
/// - An absent item cell suppresses the separator entirely.
/// - Both absent yields an empty name; malformed, but never an error.
pub fn flatten(group_row: &[Cell], item_row: &[Cell]) -> Vec<String> {
    let width = group_row.len().max(item_row.len());
    let mut names = Vec::with_capacity(width);
    let mut current_group: Option<String> = None;

    for position in 0..width {
        let group = label_at(group_row, position);
        let item = label_at(item_row, position);

        if let Some(g) = group {
            current_group = Some(g);
        }

        let name = match (current_group.as_deref(), item.as_deref()) {
            (Some(g), Some(i)) => format!("{}_{}", g, i),
            (Some(g), None) => g.to_string(),
            (None, Some(i)) => i.to_string(),
            (None, None) => String::new(),
        };
        names.push(name);
    }

    names
}

/// The header label at a column position, or `None` for missing and
/// blank cells (the unlabeled-column sentinel).
fn label_at(row: &[Cell], position: usize) -> Option<String> {
    let cell = row.get(position)?;
    if cell.is_blank() {
        return None;
    }
    let label = cell.display();
    let trimmed = label.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Positional column table over flat names.
///
/// Duplicate names are kept in place; [`Columns::resolve`] maps a plain
/// name to its first occurrence and `name.N` to occurrence N+1, unless a
/// column is literally named `name.N`, in which case the literal match
/// wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    names: Vec<String>,
}

impl Columns {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The flat names in column order, duplicates included.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve a column reference to its position.
    ///
    /// `"C"` resolves to the first column named `C`; `"C.1"` to the
    /// second, `"C.2"` to the third, and so on. A column literally named
    /// `C.1` shadows the suffix form.
    pub fn resolve(&self, reference: &str) -> Option<usize> {
        if let Some(position) = self.names.iter().position(|n| n == reference) {
            return Some(position);
        }

        let (base, occurrence) = split_occurrence(reference)?;
        self.names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_str() == base)
            .map(|(i, _)| i)
            .nth(occurrence)
    }

    /// Names as presented to the query layer: duplicates beyond the
    /// first carry their `.N` occurrence suffix so every column has an
    /// addressable reference.
    pub fn aliased_names(&self) -> Vec<String> {
        let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        self.names
            .iter()
            .map(|name| {
                let count = seen.entry(name.as_str()).or_insert(0);
                let alias = if *count == 0 {
                    name.clone()
                } else {
                    format!("{}.{}", name, count)
                };
                *count += 1;
                alias
            })
            .collect()
    }
}

/// Split `name.N` into (`name`, N). Returns `None` when the reference
/// carries no occurrence suffix.
fn split_occurrence(reference: &str) -> Option<(&str, usize)> {
    let (base, suffix) = reference.rsplit_once('.')?;
    if base.is_empty() || suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((base, suffix.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(labels: &[&str]) -> Vec<Cell> {
        labels
            .iter()
            .map(|l| {
                if l.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(l.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn test_forward_fill() {
        let groups = cells(&["A", "", "", "B", ""]);
        let items = cells(&["x", "y", "z", "w", "v"]);
        assert_eq!(
            flatten(&groups, &items),
            vec!["A_x", "A_y", "A_z", "B_w", "B_v"]
        );
    }

    #[test]
    fn test_item_absent_suppresses_separator() {
        let groups = cells(&["A"]);
        let items = cells(&[""]);
        assert_eq!(flatten(&groups, &items), vec!["A"]);
    }

    #[test]
    fn test_both_absent_yields_empty_name() {
        let groups = cells(&["", ""]);
        let items = cells(&["", ""]);
        assert_eq!(flatten(&groups, &items), vec!["", ""]);
    }

    #[test]
    fn test_leading_columns_before_any_group() {
        let groups = cells(&["", "", "Chem"]);
        let items = cells(&["No", "Heat", "C"]);
        assert_eq!(flatten(&groups, &items), vec!["No", "Heat", "Chem_C"]);
    }

    #[test]
    fn test_deterministic_and_length_preserving() {
        let groups = cells(&["Chem", "", "Mech", ""]);
        let items = cells(&["C", "Si", "YS", "TS"]);
        let first = flatten(&groups, &items);
        let second = flatten(&groups, &items);
        assert_eq!(first, second);
        assert_eq!(first.len(), groups.len());
    }

    #[test]
    fn test_duplicates_pass_through() {
        let groups = cells(&["Chem", "", "Chem", ""]);
        let items = cells(&["C", "", "C", ""]);
        // Forward fill plus repeated labels produce duplicate flat names.
        assert_eq!(
            flatten(&groups, &items),
            vec!["Chem_C", "Chem", "Chem_C", "Chem"]
        );
    }

    #[test]
    fn test_ragged_rows_use_longer_width() {
        let groups = cells(&["A", "B"]);
        let items = cells(&["x"]);
        assert_eq!(flatten(&groups, &items), vec!["A_x", "B"]);
    }

    #[test]
    fn test_whitespace_label_is_absent() {
        let groups = vec![Cell::Text("  ".into()), Cell::Text("A".into())];
        let items = cells(&["x", "y"]);
        assert_eq!(flatten(&groups, &items), vec!["x", "A_y"]);
    }

    #[test]
    fn test_numeric_header_cells_get_display_labels() {
        let groups = vec![Cell::Number(2024.0)];
        let items = cells(&["Q1"]);
        assert_eq!(flatten(&groups, &items), vec!["2024_Q1"]);
    }

    #[test]
    fn test_resolve_plain_and_suffixed() {
        let columns = Columns::new(vec![
            "C".to_string(),
            "Si".to_string(),
            "C".to_string(),
            "C".to_string(),
        ]);
        assert_eq!(columns.resolve("C"), Some(0));
        assert_eq!(columns.resolve("C.1"), Some(2));
        assert_eq!(columns.resolve("C.2"), Some(3));
        assert_eq!(columns.resolve("C.3"), None);
        assert_eq!(columns.resolve("Si"), Some(1));
        assert_eq!(columns.resolve("Mn"), None);
    }

    #[test]
    fn test_literal_name_shadows_suffix() {
        let columns = Columns::new(vec!["C".to_string(), "C.1".to_string(), "C".to_string()]);
        // "C.1" names a real column; the suffix reading would pick index 2.
        assert_eq!(columns.resolve("C.1"), Some(1));
    }

    #[test]
    fn test_aliased_names() {
        let columns = Columns::new(vec!["C".to_string(), "Si".to_string(), "C".to_string()]);
        assert_eq!(columns.aliased_names(), vec!["C", "Si", "C.1"]);
    }

    #[test]
    fn test_split_occurrence() {
        assert_eq!(split_occurrence("C.1"), Some(("C", 1)));
        assert_eq!(split_occurrence("T_EL.12"), Some(("T_EL", 12)));
        assert_eq!(split_occurrence("C"), None);
        assert_eq!(split_occurrence("C."), None);
        assert_eq!(split_occurrence(".1"), None);
        assert_eq!(split_occurrence("C.x"), None);
    }
}
