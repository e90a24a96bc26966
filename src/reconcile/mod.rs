//! Row reconciliation: mapping analysis-row selections back onto the
//! untouched raw table.
//!
//! The analysis table drops the two literal header rows and re-indexes
//! from 0, so analysis row `i` lives at raw row `i + 2`. Reconciliation
//! rebuilds an export view from that offset: the two header rows first,
//! then the selected data rows in selection order. Cells are copied as
//! loaded; only row membership changes, which is what keeps the export
//! in the original layout.

use crate::error::{ReconcileError, ReconcileResult};
use crate::query::RowSelection;
use crate::sheet::{Cell, RawTable};

/// Rows 0 and 1 of the raw table are literal header content.
const HEADER_ROWS: usize = 2;

/// The assembled export view: header rows plus selected data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    rows: Vec<Vec<Cell>>,
}

impl ExportTable {
    /// Total rows, always `2 + selection length`.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of selected data rows.
    pub fn data_row_count(&self) -> usize {
        self.rows.len() - HEADER_ROWS
    }

    /// All rows in export order.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

/// Map a selection of analysis rows back to raw rows and assemble the
/// export view.
///
/// Selection order is preserved, so any ordering the query applied
/// carries through to the export. A position that resolves past the end
/// of the raw table means the two views have fallen out of step; that is
/// an internal inconsistency and fails loudly instead of clipping.
///
/// An empty selection yields just the two header rows. Callers treat
/// that as "no matches" and must not offer the result as a download.
pub fn reconcile(raw: &RawTable, selection: &RowSelection) -> ReconcileResult<ExportTable> {
    if raw.row_count() < HEADER_ROWS {
        return Err(ReconcileError::MissingHeaderRows {
            found: raw.row_count(),
        });
    }

    let mut rows = Vec::with_capacity(HEADER_ROWS + selection.len());
    let (group_row, item_row) = raw.header_rows();
    rows.push(group_row.to_vec());
    rows.push(item_row.to_vec());

    for &position in selection.positions() {
        let raw_index = position + HEADER_ROWS;
        let row = raw
            .row(raw_index)
            .ok_or_else(|| ReconcileError::RowOutOfRange {
                position,
                raw_rows: raw.row_count(),
            })?;
        rows.push(row.to_vec());
    }

    Ok(ExportTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn num(n: f64) -> Cell {
        Cell::Number(n)
    }

    fn sample_raw() -> RawTable {
        RawTable::new(vec![
            vec![text("Group"), text("Group"), text("Item1")],
            vec![Cell::Empty, Cell::Empty, text("Val")],
            vec![num(1.0), num(2.0), num(3.0)],
            vec![num(4.0), num(5.0), num(6.0)],
            vec![num(7.0), num(8.0), num(9.0)],
        ])
        .unwrap()
    }

    #[test]
    fn test_row_offset_invariant() {
        let raw = sample_raw();
        let selection = RowSelection::new(vec![0, 2]);
        let export = reconcile(&raw, &selection).unwrap();

        assert_eq!(export.row_count(), 2 + selection.len());
        assert_eq!(export.rows()[0], raw.row(0).unwrap());
        assert_eq!(export.rows()[1], raw.row(1).unwrap());
        for (i, &position) in selection.positions().iter().enumerate() {
            assert_eq!(export.rows()[2 + i], raw.row(position + 2).unwrap());
        }
    }

    #[test]
    fn test_selection_order_preserved() {
        let raw = sample_raw();
        // Descending selection, as a sort would produce.
        let export = reconcile(&raw, &RowSelection::new(vec![2, 0, 1])).unwrap();

        assert_eq!(export.rows()[2][0], num(7.0));
        assert_eq!(export.rows()[3][0], num(1.0));
        assert_eq!(export.rows()[4][0], num(4.0));
    }

    #[test]
    fn test_full_selection_reproduces_raw_table() {
        let raw = sample_raw();
        let all = RowSelection::new((0..raw.data_row_count()).collect());
        let export = reconcile(&raw, &all).unwrap();

        assert_eq!(export.rows(), raw.rows());
    }

    #[test]
    fn test_empty_selection_yields_header_rows_only() {
        let raw = sample_raw();
        let export = reconcile(&raw, &RowSelection::new(vec![])).unwrap();

        assert_eq!(export.row_count(), 2);
        assert_eq!(export.data_row_count(), 0);
        assert_eq!(export.rows()[0], raw.row(0).unwrap());
        assert_eq!(export.rows()[1], raw.row(1).unwrap());
    }

    #[test]
    fn test_out_of_range_fails_loudly() {
        let raw = sample_raw();
        // Position 3 maps to raw row 5; the table ends at row 4.
        let result = reconcile(&raw, &RowSelection::new(vec![0, 3]));

        assert!(matches!(
            result,
            Err(ReconcileError::RowOutOfRange {
                position: 3,
                raw_rows: 5
            })
        ));
    }

    #[test]
    fn test_scenario_header_literal_rows() {
        // Raw table whose header rows read like the files in the wild:
        // a merged group row and a sparse item row.
        let raw = sample_raw();
        let export = reconcile(&raw, &RowSelection::new(vec![0, 2])).unwrap();

        assert_eq!(
            export.rows(),
            &[
                raw.row(0).unwrap().to_vec(),
                raw.row(1).unwrap().to_vec(),
                raw.row(2).unwrap().to_vec(),
                raw.row(4).unwrap().to_vec(),
            ]
        );
    }

    #[test]
    fn test_cells_copied_untouched() {
        let raw = RawTable::new(vec![
            vec![text("G")],
            vec![text("V")],
            vec![text("007")],
            vec![text(" padded ")],
        ])
        .unwrap();
        let export = reconcile(&raw, &RowSelection::new(vec![0, 1])).unwrap();

        assert_eq!(export.rows()[2][0], text("007"));
        assert_eq!(export.rows()[3][0], text(" padded "));
    }
}
