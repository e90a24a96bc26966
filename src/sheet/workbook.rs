//! Workbook (.xlsx) loading via calamine.
//!
//! Only the first worksheet is read; the used range arrives as a dense
//! grid, so every row already has one cell per column position.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use crate::error::{SheetError, SheetResult};
use crate::sheet::{Cell, RawTable};

/// Read the first worksheet of an xlsx workbook into a raw table.
pub fn read_workbook(bytes: &[u8]) -> SheetResult<RawTable> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook: Xlsx<_> =
        Xlsx::new(cursor).map_err(|e| SheetError::WorkbookError(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SheetError::WorkbookError("Workbook has no worksheets".to_string()))?
        .map_err(|e| SheetError::WorkbookError(e.to_string()))?;

    if range.is_empty() {
        return Err(SheetError::EmptyFile);
    }

    let rows: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    RawTable::new(rows)
}

/// Map a calamine cell to the crate's cell type.
fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        // Serial date numbers keep their numeric value; ISO strings stay text.
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
