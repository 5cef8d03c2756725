//! Transformation module.
//!
//! This module handles CSV rows to typed documents:
//! - Coerce: raw cell text to typed values
//! - Schema: parsed schema tree
//! - Builder: schema-driven document building
//! - Grouper: rows by identifier, schema-less folding
//! - Assembler: identifiers paired with document bodies
//! - Pipeline: Main transformation pipeline

pub mod assembler;
pub mod builder;
pub mod coerce;
pub mod grouper;
pub mod pipeline;
pub mod schema;

pub use assembler::{assemble, Document, DocumentSet};
pub use builder::{is_blank, is_effectively_empty, is_empty_value, StructureBuilder};
pub use coerce::{coerce, coerce_detailed, prefixes_description, Coerced, TYPE_PREFIXES};
pub use grouper::{fold_rows, group_rows, Grouping, RowGroup};
pub use pipeline::*;
pub use schema::{Schema, SchemaNode};
