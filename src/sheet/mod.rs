//! Spreadsheet loading with format auto-detection.
//!
//! A source file is parsed twice, into two views of the same rows:
//!
//! - [`RawTable`]: every row verbatim, no semantic header. Rows 0 and 1
//!   are literal header content; rows >= 2 are data. Never modified after
//!   loading, so exports can copy rows back out byte-for-byte.
//! - [`AnalysisTable`]: the data rows re-indexed from 0, with flat column
//!   names synthesized from the two header rows. Row `i` of the analysis
//!   table is row `i + 2` of the raw table; everything downstream relies
//!   on that offset.

pub mod delimited;
pub mod header;
pub mod workbook;

use serde::{Deserialize, Serialize};

use crate::error::{SheetError, SheetResult};
use header::Columns;

/// XLSX files are ZIP archives; sniff the local-file-header magic.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// A single cell value.
///
/// Delimited text keeps every field as [`Cell::Text`] exactly as read, so
/// re-serializing a raw row reproduces the original field. Workbook cells
/// carry the types the file stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing or blank cell.
    Empty,
    /// Numeric cell.
    Number(f64),
    /// Boolean cell.
    Bool(bool),
    /// Text cell.
    Text(String),
}

impl Cell {
    /// Parse a delimited-text field. Only the empty string maps to
    /// [`Cell::Empty`]; everything else stays text, untouched.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(field.to_string())
        }
    }

    /// True for blank cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view, coercing numeric-looking text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Display form used for header labels, previews and delimited export.
    ///
    /// Integer-valued floats print without the trailing `.0` so workbook
    /// cells round-trip the way the file shows them.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// The untouched source rows. Rows 0-1 are literal header content.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build a raw table, requiring the two literal header rows.
    pub fn new(rows: Vec<Vec<Cell>>) -> SheetResult<Self> {
        if rows.is_empty() {
            return Err(SheetError::EmptyFile);
        }
        if rows.len() < 2 {
            return Err(SheetError::TooFewRows { found: rows.len() });
        }
        Ok(Self { rows })
    }

    /// Total row count, header rows included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of data rows (everything past the two header rows).
    pub fn data_row_count(&self) -> usize {
        self.rows.len() - 2
    }

    /// A single row by absolute position.
    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// The two literal header rows.
    pub fn header_rows(&self) -> (&[Cell], &[Cell]) {
        (&self.rows[0], &self.rows[1])
    }

    /// All rows in order.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

/// The data rows of a raw table, re-indexed from 0.
///
/// Row `i` here is row `i + 2` of the originating raw table. Nothing in
/// this crate reorders or rewrites these rows in place; query results are
/// expressed as positions into this table.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTable {
    rows: Vec<Vec<Cell>>,
}

impl AnalysisTable {
    /// Derive the analysis view from a raw table.
    pub fn from_raw(raw: &RawTable) -> Self {
        Self {
            rows: raw.rows()[2..].to_vec(),
        }
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// A single data row by analysis position.
    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// All data rows in order.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

/// Detected source format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SheetFormat {
    /// OOXML workbook (first worksheet).
    Workbook,
    /// Delimited text with the detected encoding and delimiter.
    Delimited { encoding: String, delimiter: char },
}

/// A loaded spreadsheet: both views plus column metadata.
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    /// Verbatim source rows.
    pub raw: RawTable,
    /// Data rows re-indexed from 0.
    pub analysis: AnalysisTable,
    /// Flat column names with positional duplicate resolution.
    pub columns: Columns,
    /// Detected source format.
    pub format: SheetFormat,
    /// Original file name, when known.
    pub file_name: Option<String>,
}

impl LoadedSheet {
    fn from_raw(raw: RawTable, format: SheetFormat, file_name: Option<String>) -> Self {
        let (group_row, item_row) = raw.header_rows();
        let columns = Columns::new(header::flatten(group_row, item_row));
        let analysis = AnalysisTable::from_raw(&raw);
        Self {
            raw,
            analysis,
            columns,
            format,
            file_name,
        }
    }
}

/// Load a spreadsheet from raw bytes, sniffing the format.
///
/// Workbooks are recognized by the ZIP magic; anything else is treated as
/// delimited text with encoding and delimiter auto-detection.
///
/// # Example
/// ```ignore
/// let sheet = sheetsift::sheet::load_bytes(&bytes, Some("results.xlsx"))?;
/// println!("{} columns, {} data rows", sheet.columns.len(), sheet.analysis.row_count());
/// ```
pub fn load_bytes(bytes: &[u8], file_name: Option<&str>) -> SheetResult<LoadedSheet> {
    if bytes.is_empty() {
        return Err(SheetError::EmptyFile);
    }

    let name = file_name.map(|s| s.to_string());
    if bytes.len() >= 4 && &bytes[..4] == ZIP_MAGIC {
        let raw = workbook::read_workbook(bytes)?;
        return Ok(LoadedSheet::from_raw(raw, SheetFormat::Workbook, name));
    }

    let parsed = delimited::read_delimited(bytes)?;
    Ok(LoadedSheet::from_raw(
        parsed.raw,
        SheetFormat::Delimited {
            encoding: parsed.encoding,
            delimiter: parsed.delimiter,
        },
        name,
    ))
}

/// Load a spreadsheet from a file path.
pub fn load_file<P: AsRef<std::path::Path>>(path: P) -> SheetResult<LoadedSheet> {
    let bytes = std::fs::read(path.as_ref())?;
    let name = path
        .as_ref()
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());
    load_bytes(&bytes, name.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_raw_table_requires_header_rows() {
        assert!(matches!(RawTable::new(vec![]), Err(SheetError::EmptyFile)));
        assert!(matches!(
            RawTable::new(vec![vec![text("only")]]),
            Err(SheetError::TooFewRows { found: 1 })
        ));
        // Two header rows and no data is a valid, empty sheet.
        let raw = RawTable::new(vec![vec![text("g")], vec![text("i")]]).unwrap();
        assert_eq!(raw.data_row_count(), 0);
    }

    #[test]
    fn test_analysis_offset_invariant() {
        let raw = RawTable::new(vec![
            vec![text("Group")],
            vec![text("Item")],
            vec![text("a")],
            vec![text("b")],
        ])
        .unwrap();
        let analysis = AnalysisTable::from_raw(&raw);

        assert_eq!(analysis.row_count(), raw.data_row_count());
        for i in 0..analysis.row_count() {
            assert_eq!(analysis.row(i), raw.row(i + 2));
        }
    }

    #[test]
    fn test_cell_from_field_keeps_text_verbatim() {
        assert_eq!(Cell::from_field(""), Cell::Empty);
        assert_eq!(Cell::from_field("007"), text("007"));
        assert_eq!(Cell::from_field("  padded  "), text("  padded  "));
    }

    #[test]
    fn test_cell_number_coercion() {
        assert_eq!(text("0.06").as_number(), Some(0.06));
        assert_eq!(text(" 42 ").as_number(), Some(42.0));
        assert_eq!(text("n/a").as_number(), None);
        assert_eq!(Cell::Number(1.5).as_number(), Some(1.5));
        assert_eq!(Cell::Empty.as_number(), None);
    }

    #[test]
    fn test_cell_display_integers_without_fraction() {
        assert_eq!(Cell::Number(3.0).display(), "3");
        assert_eq!(Cell::Number(3.25).display(), "3.25");
        assert_eq!(Cell::Empty.display(), "");
        assert_eq!(Cell::Bool(true).display(), "true");
    }

    #[test]
    fn test_is_blank() {
        assert!(Cell::Empty.is_blank());
        assert!(text("   ").is_blank());
        assert!(!text("x").is_blank());
        assert!(!Cell::Number(0.0).is_blank());
    }

    #[test]
    fn test_load_bytes_detects_delimited() {
        let csv = b"Group;Group\nVal;Other\n1;2\n";
        let sheet = load_bytes(csv, Some("test.csv")).unwrap();
        assert!(matches!(sheet.format, SheetFormat::Delimited { .. }));
        assert_eq!(sheet.analysis.row_count(), 1);
    }

    #[test]
    fn test_load_empty_bytes() {
        assert!(matches!(load_bytes(b"", None), Err(SheetError::EmptyFile)));
    }
}
