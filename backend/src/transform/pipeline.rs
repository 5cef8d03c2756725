//! High-level pipeline API for CSV to document transformation.
//!
//! This module provides easy-to-use functions that combine all steps:
//! parsing, grouping, building (or folding), assembly and writing.
//!
//! # Example
//!
//! ```rust,ignore
//! use docload::{load_collection, CollectionSpec, DirectoryStore, EngineOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = CollectionSpec::new("quiz.csv");
//!     let mut store = DirectoryStore::new("out");
//!     let summary = load_collection(&spec, &EngineOptions::default(), &mut store)?;
//!
//!     println!("Wrote {} documents", summary.documents_written);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use super::assembler::{assemble, DocumentSet};
use super::builder::StructureBuilder;
use super::grouper::{fold_rows, group_rows};
use super::schema::Schema;
use crate::config::{CollectionSpec, EngineOptions};
use crate::error::{PipelineResult, RowIssue};
use crate::models::Row;
use crate::parser::{parse_csv_file_auto, ParseResult};
use crate::store::DocumentSink;

/// Documents built from one row set, with everything recovered on the way.
#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub documents: DocumentSet,
    /// Recorded row and cell problems, in the order they were met.
    pub issues: Vec<RowIssue>,
    /// Input rows seen.
    pub row_count: usize,
}

impl TransformResult {
    /// Rows excluded from every document.
    pub fn skipped_count(&self) -> usize {
        self.issues.iter().filter(|i| i.skips_row()).count()
    }

    /// Cells that degraded to a String.
    pub fn conversion_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, RowIssue::Conversion { .. }))
            .count()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Transformed: {} rows into {} documents, {} rows skipped, {} values kept as strings",
            self.row_count,
            self.documents.len(),
            self.skipped_count(),
            self.conversion_count()
        )
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers(),
            row_count: parsed.rows.len(),
        }
    }
}

/// Outcome of [`load_collection`].
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub collection: String,
    pub csv_info: CsvInfo,
    pub documents_written: usize,
    pub rows_skipped: usize,
    pub issues: Vec<RowIssue>,
}

/// Group rows by identifier and build one document per identifier.
///
/// With a schema every group goes through the [`StructureBuilder`]; without
/// one, rows are folded flat (one row) or into `items` (several rows).
pub fn transform_rows(
    rows: &[Row],
    schema: Option<&Schema>,
    options: &EngineOptions,
) -> TransformResult {
    let grouping = group_rows(rows, &options.identifier_column);
    let mut issues = grouping.skipped;
    let mut builder = StructureBuilder::new();
    let mut built = Vec::with_capacity(grouping.groups.len());

    for group in grouping.groups {
        debug!(
            "Building document '{}' from {} row(s)",
            group.identifier,
            group.rows.len()
        );
        let data = match schema {
            Some(schema) => builder.build_document(schema, &group.rows),
            None => fold_rows(&group.rows, &options.identifier_column, &mut issues),
        };
        built.push((group.identifier, data));
    }
    issues.extend(builder.into_issues());

    let result = TransformResult {
        documents: assemble(built),
        issues,
        row_count: rows.len(),
    };
    info!("{}", result.summary());
    result
}

/// Parse a CSV file and transform its rows.
///
/// Columns the schema references but the header lacks resolve to Null; they
/// are reported once here rather than per row.
pub fn transform_csv(
    path: &Path,
    schema: Option<&Schema>,
    options: &EngineOptions,
) -> PipelineResult<(CsvInfo, TransformResult)> {
    info!("Reading {}", path.display());
    let parsed = parse_csv_file_auto(path, options)?;
    let csv_info = CsvInfo::from(&parsed);
    info!(
        "Detected encoding {}, separator '{}', {} rows, {} columns",
        csv_info.encoding,
        format_delimiter(csv_info.delimiter),
        csv_info.row_count,
        csv_info.headers.len()
    );

    if let Some(schema) = schema {
        if let Err(missing) = schema.validate_headers(&csv_info.headers) {
            warn!(
                "Schema references columns missing from the header: {}",
                missing.join(", ")
            );
        }
    }

    let result = transform_rows(&parsed.rows, schema, options);
    Ok((csv_info, result))
}

/// Load one collection: schema, CSV, transform, then write every document.
///
/// The schema is loaded before any row is read, so a malformed schema aborts
/// the run with nothing written.
pub fn load_collection<S: DocumentSink + ?Sized>(
    spec: &CollectionSpec,
    options: &EngineOptions,
    sink: &mut S,
) -> PipelineResult<LoadSummary> {
    let collection = spec.name();
    info!("Targeting collection '{}'", collection);

    let schema = spec.load_schema()?;
    let (csv_info, result) = transform_csv(&spec.file_path, schema, options)?;

    let documents_written = result.documents.write_all(sink, &collection, spec.merge)?;
    info!(
        "Wrote {} documents to '{}' ({})",
        documents_written,
        collection,
        if spec.merge { "merge" } else { "overwrite" }
    );

    Ok(LoadSummary {
        collection,
        csv_info,
        documents_written,
        rows_skipped: result.skipped_count(),
        issues: result.issues,
    })
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}
