//! Error types for the docload transformation pipeline.
//!
//! - [`ConversionError`] - One cell could not be parsed as its requested type (non-fatal)
//! - [`RowIssue`] - Recorded row/cell problems; the run continues
//! - [`SchemaError`] - Malformed schema (fatal, raised before any row is built)
//! - [`CsvError`] - Unreadable row source (fatal)
//! - [`WriteError`] - Persistence boundary failures
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::TypeTag;

// =============================================================================
// Cell Conversion Errors
// =============================================================================

/// A cell that could not be converted; the value degrades to a String.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("cannot convert '{value}' to {target}")]
    Invalid { value: String, target: TypeTag },

    #[error("cannot parse {target} '{value}': {message}")]
    Malformed {
        value: String,
        target: TypeTag,
        message: String,
    },

    #[error("invalid GeoPoint '{value}': {message}")]
    GeoPoint { value: String, message: String },
}

impl ConversionError {
    pub(crate) fn invalid(value: &str, target: TypeTag) -> Self {
        Self::Invalid { value: value.to_string(), target }
    }

    pub(crate) fn malformed(value: &str, target: TypeTag, message: impl ToString) -> Self {
        Self::Malformed {
            value: value.to_string(),
            target,
            message: message.to_string(),
        }
    }

    pub(crate) fn geopoint(value: &str, message: impl Into<String>) -> Self {
        Self::GeoPoint { value: value.to_string(), message: message.into() }
    }
}

// =============================================================================
// Row Issues (recorded, non-fatal)
// =============================================================================

/// A problem recovered locally while building documents.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowIssue {
    /// Row without a usable identifier; it contributes to no document.
    #[error("line {line}: identifier column '{column}' is missing or empty, row skipped")]
    EmptyIdentifier { line: usize, column: String },

    /// Row lacking a `key_column` value at one grouping level; excluded from all groups.
    #[error("line {line}: key column '{key_column}' is missing or empty, row skipped")]
    MissingKeyColumn { line: usize, key_column: String },

    /// Cell degraded to a String.
    #[error("line {line}, column '{column}': {error}")]
    Conversion {
        line: usize,
        column: String,
        error: ConversionError,
    },

    /// A column referenced once per partition held different values across its rows.
    #[error("column '{column}' differs across rows (line {first_line} vs line {line}), first row wins")]
    InconsistentColumn {
        column: String,
        first_line: usize,
        line: usize,
    },

    /// Two distinct key values rendered to the same map key; the later one keeps its raw text.
    #[error("line {line}: key column '{key_column}' value '{raw}' renders as '{key}', already taken, kept as '{raw}'")]
    KeyCollision {
        line: usize,
        key_column: String,
        raw: String,
        key: String,
    },
}

impl RowIssue {
    /// Whether the issue excluded a row from the output.
    pub fn skips_row(&self) -> bool {
        matches!(
            self,
            RowIssue::EmptyIdentifier { .. } | RowIssue::MissingKeyColumn { .. }
        )
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while loading or parsing a transformation schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON in schema: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema is missing the required 'structure' key")]
    MissingStructure,

    #[error("Unknown top-level schema key '{0}'")]
    UnknownKey(String),

    #[error("Invalid 'key_column' at {path}: expected a non-empty string")]
    InvalidKeyColumn { path: String },

    #[error("Unsupported schema node at {path}: {found}")]
    UnsupportedNode { path: String, found: String },

    #[error("Schema root must produce a map, found {0}")]
    InvalidRoot(String),
}

// =============================================================================
// Row Source Errors
// =============================================================================

/// Errors while reading the tabular input.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid CSV format: {0}")]
    ParseError(#[from] csv::Error),

    #[error("CSV file is empty")]
    EmptyFile,

    #[error("Unsupported delimiter '{0}': must be a single ASCII character")]
    InvalidDelimiter(char),

    #[error("Identifier column '{0}' not found in header")]
    MissingIdentifierColumn(String),

    #[error("Duplicate column '{0}' in header")]
    DuplicateColumn(String),
}

// =============================================================================
// Persistence Errors
// =============================================================================

/// Errors reported by a [`crate::store::DocumentSink`].
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Store IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Store JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid document id '{0}'")]
    InvalidDocumentId(String),

    #[error("Invalid collection name '{0}'")]
    InvalidCollection(String),

    #[error("Failed to write document '{document_id}' to '{collection}': {message}")]
    Rejected {
        collection: String,
        document_id: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::load_collection`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type CsvResult<T> = Result<T, CsvError>;

pub type SchemaResult<T> = Result<T, SchemaError>;

pub type WriteResult<T> = Result<T, WriteError>;

pub type PipelineResult<T> = Result<T, PipelineError>;
