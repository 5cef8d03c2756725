//! Pair identifiers with their built bodies.
//!
//! Assembly performs no transformation. A [`DocumentSet`] can be inspected,
//! serialized or diffed before anything reaches a store.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::WriteResult;
use crate::models::ValueMap;
use crate::store::DocumentSink;

/// One output document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: ValueMap,
}

/// Documents in first-seen identifier order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSet {
    documents: Vec<Document>,
}

/// Pair each identifier with its body, keeping the given order.
pub fn assemble<I>(built: I) -> DocumentSet
where
    I: IntoIterator<Item = (String, ValueMap)>,
{
    DocumentSet {
        documents: built
            .into_iter()
            .map(|(id, data)| Document { id, data })
            .collect(),
    }
}

impl DocumentSet {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    pub fn get(&self, id: &str) -> Option<&ValueMap> {
        self.documents.iter().find(|d| d.id == id).map(|d| &d.data)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.id.as_str()).collect()
    }

    /// `{ "<id>": { ...data } }`, identifiers in assembly order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Hand every document to the sink, once each, in order.
    pub fn write_all<S: DocumentSink + ?Sized>(
        &self,
        sink: &mut S,
        collection: &str,
        merge: bool,
    ) -> WriteResult<usize> {
        for doc in &self.documents {
            debug!("Writing document '{}' to '{}'", doc.id, collection);
            sink.write(collection, &doc.id, &doc.data, merge)?;
        }
        Ok(self.documents.len())
    }
}

impl<'a> IntoIterator for &'a DocumentSet {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

impl Serialize for DocumentSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.documents.len()))?;
        for doc in &self.documents {
            map.serialize_entry(&doc.id, &doc.data)?;
        }
        map.end()
    }
}
