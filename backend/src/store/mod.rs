//! Document stores - the persistence boundary.
//!
//! The engine only talks to a [`DocumentSink`]; merge/overwrite semantics are
//! the sink's business.
//!
//! - [`MemoryStore`] - In-memory collections plus a write log (tests, dry runs)
//! - [`DirectoryStore`] - One pretty-printed JSON file per document on disk

use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{WriteError, WriteResult};
use crate::models::ValueMap;

/// Receives assembled documents, one call per identifier.
pub trait DocumentSink {
    /// Store `data` as `collection/document_id`.
    ///
    /// With `merge`, top-level fields are overlaid on an existing document;
    /// without it the document is replaced.
    fn write(
        &mut self,
        collection: &str,
        document_id: &str,
        data: &ValueMap,
        merge: bool,
    ) -> WriteResult<()>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// One entry of the [`MemoryStore`] write log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRecord {
    pub collection: String,
    pub document_id: String,
    pub merge: bool,
}

/// Collections kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, BTreeMap<String, ValueMap>>,
    writes: Vec<WriteRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, document_id: &str) -> Option<&ValueMap> {
        self.collections.get(collection)?.get(document_id)
    }

    /// Document ids of a collection, sorted.
    pub fn document_ids(&self, collection: &str) -> Vec<&str> {
        self.collections
            .get(collection)
            .map(|docs| docs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every write received, in call order.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    pub fn clear(&mut self) {
        self.collections.clear();
        self.writes.clear();
    }
}

impl DocumentSink for MemoryStore {
    fn write(
        &mut self,
        collection: &str,
        document_id: &str,
        data: &ValueMap,
        merge: bool,
    ) -> WriteResult<()> {
        let stored = self
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(document_id.to_string())
            .or_default();
        if !merge {
            stored.clear();
        }
        stored.extend(data.clone());

        self.writes.push(WriteRecord {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            merge,
        });
        Ok(())
    }
}

// =============================================================================
// Directory store
// =============================================================================

/// Persists documents as `<root>/<collection>/<document_id>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Store rooted at `root`. Directories are created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: PathBuf::from(root.as_ref()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a document file, after checking both path components.
    pub fn document_path(&self, collection: &str, document_id: &str) -> WriteResult<PathBuf> {
        if !is_safe_component(collection) {
            return Err(WriteError::InvalidCollection(collection.to_string()));
        }
        if !is_safe_component(document_id) {
            return Err(WriteError::InvalidDocumentId(document_id.to_string()));
        }
        Ok(self
            .root
            .join(collection)
            .join(format!("{}.json", document_id)))
    }

    /// Read a stored document back, `None` if it was never written.
    pub fn read(&self, collection: &str, document_id: &str) -> WriteResult<Option<Json>> {
        let path = self.document_path(collection, document_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Ids of the documents stored in a collection, sorted.
    pub fn list(&self, collection: &str) -> WriteResult<Vec<String>> {
        let dir = self.root.join(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = fs::read_dir(&dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl DocumentSink for DirectoryStore {
    fn write(
        &mut self,
        collection: &str,
        document_id: &str,
        data: &ValueMap,
        merge: bool,
    ) -> WriteResult<()> {
        let path = self.document_path(collection, document_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut fields: Map<String, Json> = match (merge, self.read(collection, document_id)?) {
            (true, Some(Json::Object(existing))) => existing,
            (true, Some(_)) => {
                return Err(WriteError::Rejected {
                    collection: collection.to_string(),
                    document_id: document_id.to_string(),
                    message: "existing document is not a JSON object".to_string(),
                })
            }
            _ => Map::new(),
        };
        for (key, value) in data {
            fields.insert(key.clone(), value.to_json());
        }

        let content = serde_json::to_string_pretty(&Json::Object(fields))?;
        fs::write(&path, content)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

fn is_safe_component(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use serde_json::json;
    use tempfile::tempdir;

    fn doc(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_memory_merge_overlays_fields() {
        let mut store = MemoryStore::new();
        store
            .write("users", "u1", &doc(&[("a", Value::Integer(1)), ("b", Value::Integer(2))]), true)
            .unwrap();
        store
            .write("users", "u1", &doc(&[("b", Value::Integer(3))]), true)
            .unwrap();

        let stored = store.get("users", "u1").unwrap();
        assert_eq!(stored["a"], Value::Integer(1));
        assert_eq!(stored["b"], Value::Integer(3));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_memory_overwrite_replaces() {
        let mut store = MemoryStore::new();
        store
            .write("users", "u1", &doc(&[("a", Value::Integer(1))]), false)
            .unwrap();
        store
            .write("users", "u1", &doc(&[("b", Value::Integer(2))]), false)
            .unwrap();

        let stored = store.get("users", "u1").unwrap();
        assert!(!stored.contains_key("a"));
        assert_eq!(stored["b"], Value::Integer(2));
        assert_eq!(store.document_ids("users"), vec!["u1"]);

        store.clear();
        assert!(store.get("users", "u1").is_none());
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_directory_write_and_read() {
        let dir = tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());

        store
            .write("quiz", "q1", &doc(&[("title", Value::string("Geo")), ("n", Value::Integer(2))]), true)
            .unwrap();

        assert!(dir.path().join("quiz").join("q1.json").exists());
        assert_eq!(
            store.read("quiz", "q1").unwrap(),
            Some(json!({"n": 2, "title": "Geo"}))
        );
        assert_eq!(store.list("quiz").unwrap(), vec!["q1"]);
        assert!(store.read("quiz", "q2").unwrap().is_none());
        assert!(store.list("other").unwrap().is_empty());
    }

    #[test]
    fn test_directory_merge_and_overwrite() {
        let dir = tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());

        store.write("c", "d", &doc(&[("a", Value::Integer(1))]), true).unwrap();
        store.write("c", "d", &doc(&[("b", Value::Integer(2))]), true).unwrap();
        assert_eq!(store.read("c", "d").unwrap(), Some(json!({"a": 1, "b": 2})));

        store.write("c", "d", &doc(&[("z", Value::Null)]), false).unwrap();
        assert_eq!(store.read("c", "d").unwrap(), Some(json!({"z": null})));
    }

    #[test]
    fn test_directory_rejects_unsafe_ids() {
        let dir = tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());
        let data = doc(&[("a", Value::Integer(1))]);

        for id in ["../escape", "a/b", "a\\b", "", "  "] {
            assert!(
                matches!(store.write("c", id, &data, true), Err(WriteError::InvalidDocumentId(_))),
                "{id:?}"
            );
        }
        assert!(matches!(
            store.write("../c", "d", &data, true),
            Err(WriteError::InvalidCollection(_))
        ));
    }
}
