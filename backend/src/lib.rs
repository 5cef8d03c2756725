//! # Docload - Schema-driven CSV to typed document transformation
//!
//! Docload turns flat CSV rows into typed, hierarchical documents, one per
//! identifier, ready for a document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│    Store    │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (schema)   │     │ (documents) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docload::{load_collection, CollectionSpec, EngineOptions, MemoryStore};
//!
//! let spec = CollectionSpec::new("quiz.csv"); // schema read from quiz.json if present
//! let mut store = MemoryStore::new();
//! let summary = load_collection(&spec, &EngineOptions::default(), &mut store).unwrap();
//! println!("Wrote {} documents", summary.documents_written);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Typed values, rows and columns
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Coercion, schema, building, grouping and pipeline
//! - [`store`] - Persistence boundary
//! - [`config`] - Engine options and collection specs
//! - [`logging`] - Subscriber setup for the binary

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Persistence
pub mod store;

// Logging
pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConversionError,
    CsvError,
    PipelineError,
    RowIssue,
    SchemaError,
    WriteError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Column, GeoPoint, Row, TypeTag, Value, ValueMap};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{CollectionSpec, EngineOptions, DEFAULT_IDENTIFIER_COLUMN};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    parse_str,
    parse_csv_file_auto,
    parse_bytes_auto,
    parse_column,
    detect_encoding,
    detect_delimiter,
    decode_content,
    ParseResult,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    assemble,
    coerce,
    coerce_detailed,
    fold_rows,
    group_rows,
    prefixes_description,
    Document,
    DocumentSet,
    Schema,
    SchemaNode,
    StructureBuilder,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    load_collection,
    transform_csv,
    transform_rows,
    CsvInfo,
    LoadSummary,
    TransformResult,
};

// =============================================================================
// Re-exports - Stores
// =============================================================================

pub use store::{DirectoryStore, DocumentSink, MemoryStore};
