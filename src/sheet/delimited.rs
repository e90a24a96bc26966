//! Delimited-text loading with encoding and delimiter auto-detection.
//!
//! Every row lands in the raw table as-is; no row is promoted to a
//! semantic header here. Fields keep their exact text so the export path
//! can reproduce them.

use std::io::Cursor;

use crate::error::{SheetError, SheetResult};
use crate::sheet::{Cell, RawTable};

/// Result of parsing delimited text, with detection metadata.
#[derive(Debug, Clone)]
pub struct DelimitedResult {
    /// All rows, verbatim.
    pub raw: RawTable,
    /// Detected or used encoding.
    pub encoding: String,
    /// Detected or used delimiter.
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SheetResult<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => Ok(String::from_utf8(bytes.to_vec())
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).to_string())),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.to_string())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()),
        "euc-kr" | "cp949" => Ok(encoding_rs::EUC_KR.decode(bytes).0.to_string()),
        _ => {
            // Fallback: UTF-8 with lossy conversion
            Ok(String::from_utf8_lossy(bytes).to_string())
        }
    }
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn read_delimited(bytes: &[u8]) -> SheetResult<DelimitedResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    let raw = parse_rows(&content, delimiter)?;
    Ok(DelimitedResult {
        raw,
        encoding,
        delimiter,
    })
}

/// Parse delimited text with an explicit delimiter.
///
/// Ragged rows are padded with empty cells to the widest row so every
/// row has one cell per column position.
pub fn parse_rows(content: &str, delimiter: char) -> SheetResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(content.as_bytes()));

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut width = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| SheetError::ParseError(e.to_string()))?;
        let row: Vec<Cell> = record.iter().map(Cell::from_field).collect();
        // Skip fully blank lines, the way spreadsheet tools do.
        if row.iter().all(|c| matches!(c, Cell::Empty)) {
            continue;
        }
        width = width.max(row.len());
        rows.push(row);
    }

    for row in &mut rows {
        while row.len() < width {
            row.push(Cell::Empty);
        }
    }

    RawTable::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_detect_delimiter_pipe() {
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_two_header_rows_stay_data() {
        let content = "Chem;Chem;Mech\nC;Si;YS\n0.05;0.2;350\n";
        let raw = parse_rows(content, ';').unwrap();

        assert_eq!(raw.row_count(), 3);
        assert_eq!(raw.data_row_count(), 1);
        // Header rows are plain rows here, not column names.
        assert_eq!(raw.row(0).unwrap()[0], Cell::Text("Chem".into()));
        assert_eq!(raw.row(1).unwrap()[2], Cell::Text("YS".into()));
    }

    #[test]
    fn test_fields_kept_verbatim() {
        let content = "a;b\nc;d\n007; padded \n";
        let raw = parse_rows(content, ';').unwrap();
        assert_eq!(raw.row(2).unwrap()[0], Cell::Text("007".into()));
        assert_eq!(raw.row(2).unwrap()[1], Cell::Text(" padded ".into()));
    }

    #[test]
    fn test_quoted_fields() {
        let content = "a;b\nc;d\n\"x;y\";z\n";
        let raw = parse_rows(content, ';').unwrap();
        assert_eq!(raw.row(2).unwrap()[0], Cell::Text("x;y".into()));
    }

    #[test]
    fn test_blank_lines_skipped_and_rows_padded() {
        let content = "a;b;c\nd;e;f\n\n1;2\n";
        let raw = parse_rows(content, ';').unwrap();
        assert_eq!(raw.row_count(), 3);
        // Short row padded to the table width.
        assert_eq!(raw.row(2).unwrap().len(), 3);
        assert_eq!(raw.row(2).unwrap()[2], Cell::Empty);
    }

    #[test]
    fn test_too_few_rows() {
        let result = parse_rows("only;one;row\n", ';');
        assert!(matches!(result, Err(SheetError::TooFewRows { found: 1 })));
    }

    #[test]
    fn test_empty_content() {
        assert!(matches!(parse_rows("", ';'), Err(SheetError::EmptyFile)));
    }

    #[test]
    fn test_read_delimited_auto() {
        let bytes = b"Group,Group\nVal,Other\n1,2\n4,5\n";
        let result = read_delimited(bytes).unwrap();
        assert_eq!(result.delimiter, ',');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.raw.data_row_count(), 2);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.contains("Soci"));
    }
}
