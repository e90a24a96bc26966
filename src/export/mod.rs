//! Export serialization for reconciled tables.
//!
//! Exports are written without any computed header line: rows 0-1 of the
//! export table are the original header rows and already serve as the
//! visual header.

use std::io::Cursor;

use crate::error::{ExportError, ExportResult};
use crate::reconcile::ExportTable;
use crate::sheet::Cell;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    /// Parse a format name (`xlsx` / `csv`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "xlsx" | "excel" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    /// MIME type for download responses.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv",
        }
    }
}

/// Serialize an export table in the given format.
pub fn to_bytes(export: &ExportTable, format: ExportFormat) -> ExportResult<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => to_xlsx_bytes(export),
        ExportFormat::Csv => to_csv_bytes(export),
    }
}

/// Serialize an export table as an xlsx workbook.
pub fn to_xlsx_bytes(export: &ExportTable) -> ExportResult<Vec<u8>> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_mut(&0)
        .ok_or_else(|| ExportError::WorkbookError("Workbook has no worksheet".to_string()))?;

    for (row_index, row) in export.rows().iter().enumerate() {
        for (col_index, cell) in row.iter().enumerate() {
            // umya coordinates are 1-based (column, row).
            let coordinate = ((col_index + 1) as u32, (row_index + 1) as u32);
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    sheet.get_cell_mut(coordinate).set_value_number(*n);
                }
                Cell::Bool(b) => {
                    sheet.get_cell_mut(coordinate).set_value_bool(*b);
                }
                Cell::Text(s) => {
                    sheet.get_cell_mut(coordinate).set_value_string(s.clone());
                }
            }
        }
    }

    let mut cursor = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut cursor)
        .map_err(|e| ExportError::WorkbookError(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Serialize an export table as comma-delimited text.
pub fn to_csv_bytes(export: &ExportTable) -> ExportResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for row in export.rows() {
        let record: Vec<String> = row.iter().map(Cell::display).collect();
        writer
            .write_record(&record)
            .map_err(|e| ExportError::CsvError(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::CsvError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RowSelection;
    use crate::reconcile::reconcile;
    use crate::sheet::RawTable;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn sample_export() -> ExportTable {
        let raw = RawTable::new(vec![
            vec![text("Group"), text("Group")],
            vec![text("Val"), Cell::Empty],
            vec![text("007"), Cell::Number(2.0)],
            vec![text("b"), Cell::Number(4.0)],
        ])
        .unwrap();
        reconcile(&raw, &RowSelection::new(vec![0, 1])).unwrap()
    }

    #[test]
    fn test_csv_has_no_computed_header_line() {
        let bytes = to_csv_bytes(&sample_export()).unwrap();
        let content = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        // First line is the original group row, not synthesized names.
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Group,Group");
        assert_eq!(lines[1], "Val,");
        assert_eq!(lines[2], "007,2");
    }

    #[test]
    fn test_xlsx_bytes_are_a_zip_archive() {
        let bytes = to_xlsx_bytes(&sample_export()).unwrap();
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(ExportFormat::from_name("xlsx"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::from_name("Excel"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::from_name("CSV"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_name("pdf"), None);
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ExportFormat::Xlsx.extension(), "xlsx");
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
    }
}
