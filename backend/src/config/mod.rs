//! Run configuration.
//!
//! - [`EngineOptions`] - Identifier column and delimiter shared by every run
//! - [`CollectionSpec`] - One CSV file, its target collection and its schema

use once_cell::unsync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::SchemaResult;
use crate::transform::schema::Schema;

/// Column holding the document identifier unless configured otherwise.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "DocumentId";

/// Options for reading and grouping rows.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Case-sensitive name of the identifier column.
    pub identifier_column: String,
    /// Fixed delimiter; `None` detects it from the header line.
    pub delimiter: Option<char>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            delimiter: None,
        }
    }
}

/// A CSV file to load into one collection.
///
/// The collection name defaults to the file stem and the schema to a `.json`
/// file next to the CSV. The schema is read at most once.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    pub file_path: PathBuf,
    /// Overlay fields on existing documents instead of replacing them.
    pub merge: bool,
    name: Option<String>,
    schema_path: Option<PathBuf>,
    schema: OnceCell<Option<Schema>>,
}

impl CollectionSpec {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: PathBuf::from(file_path.as_ref()),
            merge: true,
            name: None,
            schema_path: None,
            schema: OnceCell::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Use an explicit schema file. Unlike the default path, it must exist.
    pub fn with_schema_path(mut self, path: impl AsRef<Path>) -> Self {
        self.schema_path = Some(PathBuf::from(path.as_ref()));
        self.schema = OnceCell::new();
        self
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// Target collection name.
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("documents")
                .to_string()
        })
    }

    /// Schema file location: the explicit one, else the CSV path with a `.json` extension.
    pub fn schema_path(&self) -> PathBuf {
        self.schema_path
            .clone()
            .unwrap_or_else(|| self.file_path.with_extension("json"))
    }

    /// Load (once) the schema for this collection.
    ///
    /// `Ok(None)` when no explicit schema was given and the default file does
    /// not exist; documents are then built without a schema.
    pub fn load_schema(&self) -> SchemaResult<Option<&Schema>> {
        let schema = self.schema.get_or_try_init(|| {
            let path = self.schema_path();
            if self.schema_path.is_none() && !path.exists() {
                info!("No schema at {}, grouping rows without one", path.display());
                return Ok(None);
            }
            info!("Loading schema from {}", path.display());
            Schema::from_file(&path).map(Some)
        })?;
        Ok(schema.as_ref())
    }
}
