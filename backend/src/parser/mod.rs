//! CSV row source with encoding and delimiter auto-detection.
//!
//! Reads raw bytes, decodes them to UTF-8 and turns every record into a
//! [`Row`] of raw cells. Header cells follow the `name:type` convention; the
//! type part becomes the column hint. No value is coerced here.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::EngineOptions;
use crate::error::{CsvError, CsvResult};
use crate::models::{Cell, Column, Row};
use crate::transform::builder::is_blank;
use crate::transform::coerce::lookup_type;

/// Delimiters tried by [`detect_delimiter`], in tie-break order.
const SEPARATORS: [char; 4] = [',', ';', '\t', '|'];

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Data rows, blank rows removed
    pub rows: Vec<Row>,
    /// Header columns in file order
    pub columns: Vec<Column>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

impl ParseResult {
    /// Field names of the header, hints stripped.
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Rows as JSON objects of raw strings, in header order.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = row
                    .cells
                    .iter()
                    .map(|cell| (cell.column.name.clone(), cell.raw.clone().into()))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string. Unknown encodings fall back to lossy UTF-8.
///
/// A leading byte order mark is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoder = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => encoding_rs::UTF_8,
        // windows-1252 agrees with Latin-1 on every printable byte.
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252,
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc,
            None => {
                warn!("Unknown encoding '{}', decoding as UTF-8", other);
                encoding_rs::UTF_8
            }
        },
    };
    decoder.decode(bytes).0.into_owned()
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Comma wins ties and is the fallback for single-column files.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = SEPARATORS[0];
    let mut best_count = 0;

    for &sep in &SEPARATORS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Split a header cell into field name and type hint.
///
/// `"age:int"` gives a hint, `"age:"` and `"age"` none. An unknown hint is
/// dropped with a warning and the column falls back to auto-detection.
pub fn parse_column(header: &str) -> Column {
    let header = header.trim_start_matches('\u{feff}').trim();

    let Some((name, hint)) = header.split_once(':') else {
        return Column::new(header);
    };
    let name = name.trim();
    let hint = hint.trim();

    if hint.is_empty() {
        return Column::new(name);
    }

    match lookup_type(hint) {
        Some(tag) => Column::new(name).with_hint(tag),
        None => {
            warn!(
                "Unknown type hint '{}' in header '{}', auto-detecting '{}'",
                hint, header, name
            );
            Column::new(name)
        }
    }
}

/// Parse CSV text with the given delimiter.
pub fn parse_with_delimiter(
    content: &str,
    delimiter: char,
    identifier_column: &str,
) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::InvalidDelimiter(delimiter));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let columns: Vec<Column> = reader.headers()?.iter().map(parse_column).collect();
    if columns.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.name.as_str()) {
            return Err(CsvError::DuplicateColumn(column.name.clone()));
        }
    }

    if !columns.iter().any(|c| c.name == identifier_column) {
        return Err(CsvError::MissingIdentifierColumn(identifier_column.to_string()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

        if record.iter().all(is_blank) {
            debug!("Skipping blank row at line {}", line);
            continue;
        }

        let cells = columns
            .iter()
            .enumerate()
            .map(|(i, column)| Cell {
                column: column.clone(),
                raw: record.get(i).unwrap_or("").to_string(),
            })
            .collect();
        rows.push(Row::new(line, cells));
    }

    Ok(ParseResult {
        rows,
        columns,
        encoding: "utf-8".to_string(),
        delimiter,
    })
}

/// Parse CSV text, detecting the delimiter unless the options fix one.
pub fn parse_str(content: &str, options: &EngineOptions) -> CsvResult<ParseResult> {
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(content));
    parse_with_delimiter(content, delimiter, &options.identifier_column)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], options: &EngineOptions) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);

    let mut result = parse_str(&content, options)?;
    debug!(
        "Parsed {} rows (encoding {}, delimiter {:?})",
        result.rows.len(),
        encoding,
        result.delimiter
    );
    result.encoding = encoding;
    Ok(result)
}

/// Parse CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("/path/to/users.csv", &EngineOptions::default())?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.rows.len());
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(
    path: P,
    options: &EngineOptions,
) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TypeTag;

    fn parse(csv: &str) -> CsvResult<ParseResult> {
        parse_str(csv, &EngineOptions::default())
    }

    #[test]
    fn test_simple_csv() {
        let result = parse("DocumentId,name,age\nd1,Alice,30\nd2,Bob,25").unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].raw("name"), Some("Alice"));
        assert_eq!(result.rows[0].raw("age"), Some("30"));
        assert_eq!(result.rows[1].raw("DocumentId"), Some("d2"));
        assert_eq!(result.rows[0].line, 2);
        assert_eq!(result.rows[1].line, 3);
    }

    #[test]
    fn test_semicolon_detected() {
        let result = parse("DocumentId;name\nd1;Alice").unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.rows[0].raw("name"), Some("Alice"));
    }

    #[test]
    fn test_explicit_delimiter() {
        let options = EngineOptions {
            delimiter: Some('|'),
            ..EngineOptions::default()
        };
        let result = parse_str("DocumentId|a,b\nd1|1,2", &options).unwrap();
        assert_eq!(result.rows[0].raw("a,b"), Some("1,2"));
    }

    #[test]
    fn test_rfc4180_quoting() {
        let csv = "DocumentId,note,code\nd1,\"Hello, World\",\"\"\"00501\"\"\"";
        let result = parse(csv).unwrap();

        assert_eq!(result.rows[0].raw("note"), Some("Hello, World"));
        // Doubled quotes survive decoding and force a string downstream.
        assert_eq!(result.rows[0].raw("code"), Some("\"00501\""));
    }

    #[test]
    fn test_header_hints() {
        let result = parse("DocumentId,age:int,zip:str,score:,misc:unknown\nd1,1,2,3,4").unwrap();
        let columns = &result.columns;

        assert_eq!(columns[1], Column::new("age").with_hint(TypeTag::Integer));
        assert_eq!(columns[2], Column::new("zip").with_hint(TypeTag::String));
        assert_eq!(columns[3], Column::new("score"));
        assert_eq!(columns[4], Column::new("misc"));
        assert_eq!(result.headers(), vec!["DocumentId", "age", "zip", "score", "misc"]);
    }

    #[test]
    fn test_parse_column_variants() {
        assert_eq!(parse_column(" loc : GEO "), Column::new("loc").with_hint(TypeTag::GeoPoint));
        assert_eq!(parse_column("\u{feff}DocumentId"), Column::new("DocumentId"));
        assert_eq!(parse_column("url:map:x"), Column::new("url"));
    }

    #[test]
    fn test_blank_rows_skipped() {
        let result = parse("DocumentId,a\nd1,1\n\n , \nd2,2\n").unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1].raw("DocumentId"), Some("d2"));
    }

    #[test]
    fn test_short_and_long_rows() {
        let result = parse("DocumentId,a,b\nd1,1\nd2,1,2,3,4").unwrap();

        assert_eq!(result.rows[0].raw("b"), Some(""));
        assert_eq!(result.rows[1].cells.len(), 3);
        assert_eq!(result.rows[1].raw("b"), Some("2"));
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(parse(""), Err(CsvError::EmptyFile)));
        assert!(matches!(parse("  \n"), Err(CsvError::EmptyFile)));
        assert!(matches!(
            parse("id,name\n1,a"),
            Err(CsvError::MissingIdentifierColumn(col)) if col == "DocumentId"
        ));
        assert!(matches!(
            parse("documentid,name\n1,a"),
            Err(CsvError::MissingIdentifierColumn(_))
        ));
        assert!(matches!(
            parse("DocumentId,age,age:int\nd1,1,2"),
            Err(CsvError::DuplicateColumn(col)) if col == "age"
        ));
    }

    #[test]
    fn test_custom_identifier_column() {
        let options = EngineOptions {
            identifier_column: "key".to_string(),
            ..EngineOptions::default()
        };
        let result = parse_str("key,v\nk1,1", &options).unwrap();
        assert_eq!(result.rows[0].raw("key"), Some("k1"));
    }

    #[test]
    fn test_records_keep_header_order() {
        let result = parse("DocumentId,zeta,alpha\nd1,1,2").unwrap();
        let records = result.records();
        let keys: Vec<&String> = records[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["DocumentId", "zeta", "alpha"]);
        assert_eq!(records[0]["alpha"], "2");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("a,b;c\n"), ',');
        assert_eq!(detect_delimiter("single\n1"), ',');
    }

    #[test]
    fn test_auto_parse_bytes() {
        let csv = "DocumentId;name\nd1;Alice\nd2;Bob";
        let result = parse_bytes_auto(csv.as_bytes(), &EngineOptions::default()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.headers(), vec!["DocumentId", "name"]);
    }

    #[test]
    fn test_utf8_bom_dropped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"DocumentId,name\nd1,Zoe");
        let result = parse_bytes_auto(&bytes, &EngineOptions::default()).unwrap();
        assert_eq!(result.columns[0].name, "DocumentId");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");

        // Latin-1 symbols that ISO-8859-15 remaps
        assert_eq!(decode_content(&[0xA4, 0xBD, 0xBC, 0xBE], "latin1"), "¤½¼¾");
        assert_eq!(decode_content(&[0xA4], "iso-8859-15"), "€");
    }

    #[test]
    fn test_file_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "DocumentId,age:int\nu1,30\n").unwrap();

        let result = parse_csv_file_auto(&path, &EngineOptions::default()).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.encoding, "utf-8");

        let missing = parse_csv_file_auto(dir.path().join("nope.csv"), &EngineOptions::default());
        assert!(matches!(missing, Err(CsvError::IoError(_))));
    }
}
