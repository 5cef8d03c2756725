//! Transformation schema.
//!
//! A schema file describes the nested shape of every document:
//!
//! ```json
//! {
//!   "key_column": "id",
//!   "structure": {
//!     "question": "question",
//!     "options": [
//!       { "id": "literal:a", "text": "opt_a" },
//!       { "id": "literal:b", "text": "opt_b" }
//!     ]
//!   }
//! }
//! ```
//!
//! - a string leaf names a column; `literal:` strings are fixed values
//! - an object with `key_column` and `structure` groups rows by that column
//! - any other object is a map, an array is a list
//!
//! The JSON is parsed once into a closed [`SchemaNode`] tree; any other shape
//! is rejected before a single row is processed.

use serde_json::Value as Json;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};
use crate::models::Value;

const LITERAL_PREFIX: &str = "literal:";
const KEY_COLUMN: &str = "key_column";
const STRUCTURE: &str = "structure";

/// One node of a parsed schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Coerced value of a column of the current row set.
    Column(String),
    /// Fixed value, independent of the rows.
    Literal(Value),
    /// Map of named sub-nodes, in declared order.
    Map(Vec<(String, SchemaNode)>),
    /// Array of item templates, in declared order.
    List(Vec<SchemaNode>),
    /// Partition the rows by `key_column`, one map entry per distinct key.
    Group {
        key_column: String,
        inner: Box<SchemaNode>,
    },
}

impl SchemaNode {
    pub fn column(name: impl Into<String>) -> Self {
        SchemaNode::Column(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        SchemaNode::Literal(value.into())
    }

    pub fn map<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        SchemaNode::Map(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn group(key_column: impl Into<String>, inner: SchemaNode) -> Self {
        SchemaNode::Group {
            key_column: key_column.into(),
            inner: Box::new(inner),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, SchemaNode::Literal(_))
    }

    /// Whether building this node always yields a map.
    pub fn produces_map(&self) -> bool {
        matches!(self, SchemaNode::Map(_) | SchemaNode::Group { .. })
    }

    fn kind(&self) -> &'static str {
        match self {
            SchemaNode::Column(_) => "column",
            SchemaNode::Literal(_) => "literal",
            SchemaNode::Map(_) => "map",
            SchemaNode::List(_) => "list",
            SchemaNode::Group { .. } => "group",
        }
    }

    /// Every column the node reads, key columns included.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns.sort();
        columns.dedup();
        columns
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            SchemaNode::Column(name) => out.push(name.clone()),
            SchemaNode::Literal(_) => {}
            SchemaNode::Map(fields) => {
                for (_, node) in fields {
                    node.collect_columns(out);
                }
            }
            SchemaNode::List(items) => {
                for item in items {
                    item.collect_columns(out);
                }
            }
            SchemaNode::Group { key_column, inner } => {
                out.push(key_column.clone());
                inner.collect_columns(out);
            }
        }
    }

    /// Indented outline of the tree.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        match self {
            SchemaNode::Column(name) => out.push_str(&format!("{}column '{}'\n", pad, name)),
            SchemaNode::Literal(value) => {
                out.push_str(&format!("{}literal {}\n", pad, value.to_json()))
            }
            SchemaNode::Map(fields) => {
                out.push_str(&format!("{}map\n", pad));
                for (name, node) in fields {
                    out.push_str(&format!("{}  {}:\n", pad, name));
                    node.write_outline(out, depth + 2);
                }
            }
            SchemaNode::List(items) => {
                out.push_str(&format!("{}list ({} items)\n", pad, items.len()));
                for item in items {
                    item.write_outline(out, depth + 1);
                }
            }
            SchemaNode::Group { key_column, inner } => {
                out.push_str(&format!("{}group by '{}'\n", pad, key_column));
                inner.write_outline(out, depth + 1);
            }
        }
    }
}

/// A parsed schema file.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Root node; always a map or a group.
    root: SchemaNode,
}

impl Schema {
    /// Wrap an already-built tree, checking that it yields a map.
    pub fn new(root: SchemaNode) -> SchemaResult<Self> {
        if !root.produces_map() {
            return Err(SchemaError::InvalidRoot(root.kind().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Parse a schema from a JSON string.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let value: Json = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse a schema from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse a schema from a decoded JSON document.
    pub fn from_value(value: &Json) -> SchemaResult<Self> {
        let obj = value.as_object().ok_or_else(|| SchemaError::UnsupportedNode {
            path: "$".to_string(),
            found: describe(value),
        })?;

        if let Some(unknown) = obj.keys().find(|k| *k != KEY_COLUMN && *k != STRUCTURE) {
            return Err(SchemaError::UnknownKey(unknown.clone()));
        }

        let structure = obj.get(STRUCTURE).ok_or(SchemaError::MissingStructure)?;
        let inner = parse_node(structure, STRUCTURE)?;

        let root = match obj.get(KEY_COLUMN) {
            Some(key) => SchemaNode::group(parse_key_column(key, KEY_COLUMN)?, inner),
            None => inner,
        };

        Self::new(root)
    }

    /// Top-level key column, if the root groups rows.
    pub fn key_column(&self) -> Option<&str> {
        match &self.root {
            SchemaNode::Group { key_column, .. } => Some(key_column),
            _ => None,
        }
    }

    pub fn source_columns(&self) -> Vec<String> {
        self.root.source_columns()
    }

    /// Check that every referenced column exists in the CSV header.
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .source_columns()
            .into_iter()
            .filter(|col| !headers.iter().any(|h| h == col))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

fn parse_node(value: &Json, path: &str) -> SchemaResult<SchemaNode> {
    match value {
        Json::String(s) => match s.strip_prefix(LITERAL_PREFIX) {
            Some(rest) => Ok(SchemaNode::Literal(Value::string(rest))),
            None if s.trim().is_empty() => Err(SchemaError::UnsupportedNode {
                path: path.to_string(),
                found: "empty column name".to_string(),
            }),
            None => Ok(SchemaNode::Column(s.clone())),
        },
        Json::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_node(item, &format!("{}[{}]", path, i)))
            .collect::<SchemaResult<Vec<_>>>()
            .map(SchemaNode::List),
        Json::Object(obj) if obj.contains_key(KEY_COLUMN) && obj.contains_key(STRUCTURE) => {
            if obj.len() != 2 {
                return Err(SchemaError::UnsupportedNode {
                    path: path.to_string(),
                    found: "group with keys other than 'key_column' and 'structure'".to_string(),
                });
            }
            let key_column = parse_key_column(&obj[KEY_COLUMN], &format!("{}.{}", path, KEY_COLUMN))?;
            let inner = parse_node(&obj[STRUCTURE], &format!("{}.{}", path, STRUCTURE))?;
            Ok(SchemaNode::group(key_column, inner))
        }
        Json::Object(obj) => obj
            .iter()
            .map(|(name, node)| {
                parse_node(node, &format!("{}.{}", path, name)).map(|n| (name.clone(), n))
            })
            .collect::<SchemaResult<Vec<_>>>()
            .map(SchemaNode::Map),
        other => Err(SchemaError::UnsupportedNode {
            path: path.to_string(),
            found: describe(other),
        }),
    }
}

fn parse_key_column(value: &Json, path: &str) -> SchemaResult<String> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(SchemaError::InvalidKeyColumn { path: path.to_string() }),
    }
}

fn describe(value: &Json) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(b) => format!("boolean {}", b),
        Json::Number(n) => format!("number {}", n),
        Json::String(_) => "string".to_string(),
        Json::Array(_) => "array".to_string(),
        Json::Object(_) => "object".to_string(),
    }
}
