//! Schema-driven document building.
//!
//! Evaluates a [`SchemaNode`] tree against the rows of one document:
//!
//! ```text
//! rows (one DocumentId)          schema                      document
//! ┌──────────────────────┐      ┌────────────────────┐      ┌─────────────────────┐
//! │ id=1, question=Q1    │      │ group by id        │      │ "1": { question,    │
//! │ id=2, question=Q2    │  +   │   question: column │  →   │        options: [] }│
//! └──────────────────────┘      │   options: [...]   │      │ "2": { ... }        │
//!                               └────────────────────┘      └─────────────────────┘
//! ```
//!
//! Every recursive call receives the explicit subset of rows it works on and
//! returns a fresh [`Value`]. Row problems are collected on the builder as
//! [`RowIssue`]s and never abort the build.

use std::collections::HashMap;
use tracing::warn;

use super::coerce::coerce_cell;
use super::schema::{Schema, SchemaNode};
use crate::error::RowIssue;
use crate::models::{Row, Value, ValueMap};

/// Whether raw cell text carries no data.
pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// Null, a blank String, or an Array of nothing but empty values.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => is_blank(s),
        Value::Array(items) => items.iter().all(is_empty_value),
        _ => false,
    }
}

/// Emptiness of a built value, judged against the node that produced it.
///
/// Literals are never empty. A map is empty when every non-literal field is;
/// a map made only of literals is kept.
pub fn is_effectively_empty(node: &SchemaNode, value: &Value) -> bool {
    match (node, value) {
        (SchemaNode::Literal(_), _) => false,
        (SchemaNode::Map(fields), Value::Map(map)) => {
            let mut data_fields = fields.iter().filter(|(_, n)| !n.is_literal()).peekable();
            if data_fields.peek().is_none() {
                return false;
            }
            data_fields.all(|(name, n)| match map.get(name) {
                Some(v) => is_effectively_empty(n, v),
                None => true,
            })
        }
        // Items were already filtered while the list was built.
        (SchemaNode::List(_), Value::Array(items)) => items.is_empty(),
        (SchemaNode::Group { .. }, Value::Map(map)) => map.is_empty(),
        _ => is_empty_value(value),
    }
}

/// Builds typed values from a schema, collecting row issues on the way.
#[derive(Debug, Default)]
pub struct StructureBuilder {
    issues: Vec<RowIssue>,
}

impl StructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one node against `rows`. Deterministic for a given input.
    pub fn build(&mut self, node: &SchemaNode, rows: &[&Row]) -> Value {
        match node {
            SchemaNode::Column(name) => self.build_column(name, rows),
            SchemaNode::Literal(value) => value.clone(),
            SchemaNode::Map(fields) => Value::Map(
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), self.build(field, rows)))
                    .collect(),
            ),
            SchemaNode::List(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| {
                        let value = self.build(item, rows);
                        (!is_effectively_empty(item, &value)).then_some(value)
                    })
                    .collect(),
            ),
            SchemaNode::Group { key_column, inner } => self.build_group(key_column, inner, rows),
        }
    }

    /// Build the document body for one identifier.
    pub fn build_document(&mut self, schema: &Schema, rows: &[&Row]) -> ValueMap {
        match self.build(schema.root(), rows) {
            Value::Map(map) => map,
            // Schema::new only accepts roots that produce a map.
            _ => ValueMap::new(),
        }
    }

    pub fn issues(&self) -> &[RowIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<RowIssue> {
        self.issues
    }

    fn record(&mut self, issue: RowIssue) {
        warn!("{}", issue);
        self.issues.push(issue);
    }

    fn build_column(&mut self, name: &str, rows: &[&Row]) -> Value {
        let Some((first, rest)) = rows.split_first() else {
            return Value::Null;
        };
        let Some(cell) = first.cell(name) else {
            return Value::Null;
        };

        let expected = cell.raw.trim();
        if let Some(other) = rest
            .iter()
            .find(|row| row.raw(name).unwrap_or("").trim() != expected)
        {
            self.record(RowIssue::InconsistentColumn {
                column: name.to_string(),
                first_line: first.line,
                line: other.line,
            });
        }

        coerce_cell(first.line, cell, &mut self.issues)
    }

    fn build_group(&mut self, key_column: &str, inner: &SchemaNode, rows: &[&Row]) -> Value {
        // Partitions keyed by the trimmed raw cell, in first-seen order.
        let mut partitions: Vec<(String, Vec<&Row>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let Some(cell) = row.cell(key_column).filter(|c| !is_blank(&c.raw)) else {
                self.record(RowIssue::MissingKeyColumn {
                    line: row.line,
                    key_column: key_column.to_string(),
                });
                continue;
            };

            let raw = cell.raw.trim();
            match index.get(raw) {
                Some(&i) => partitions[i].1.push(*row),
                None => {
                    index.insert(raw.to_string(), partitions.len());
                    partitions.push((raw.to_string(), vec![*row]));
                }
            }
        }

        let keys = self.render_keys(key_column, &partitions);

        let mut out = ValueMap::new();
        for (key, (_, members)) in keys.into_iter().zip(partitions) {
            let value = self.build(inner, &members);
            out.insert(key, value);
        }
        Value::Map(out)
    }

    /// One map key per partition, rendered from the coerced key value.
    ///
    /// When several partitions render the same key, the one whose raw text
    /// already equals it (else the first seen) owns the key; the others are
    /// keyed by their raw text and a `KeyCollision` is recorded.
    fn render_keys(&mut self, key_column: &str, partitions: &[(String, Vec<&Row>)]) -> Vec<String> {
        let rendered: Vec<String> = partitions
            .iter()
            .map(|(_, members)| {
                let first = members[0];
                match first.cell(key_column) {
                    Some(cell) => coerce_cell(first.line, cell, &mut self.issues).to_key_string(),
                    None => String::new(),
                }
            })
            .collect();

        let mut claims: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, key) in rendered.iter().enumerate() {
            claims.entry(key.as_str()).or_default().push(i);
        }

        let mut keys = Vec::with_capacity(partitions.len());
        for (i, key) in rendered.iter().enumerate() {
            let claimants = &claims[key.as_str()];
            let owner = claimants
                .iter()
                .copied()
                .find(|&j| partitions[j].0 == *key)
                .unwrap_or(claimants[0]);

            if owner == i {
                keys.push(key.clone());
            } else {
                let (raw, members) = &partitions[i];
                self.record(RowIssue::KeyCollision {
                    line: members[0].line,
                    key_column: key_column.to_string(),
                    raw: raw.clone(),
                    key: key.clone(),
                });
                keys.push(raw.clone());
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use serde_json::json;

    fn row(line: usize, pairs: &[(&str, &str)]) -> Row {
        Row::from_pairs(
            line,
            pairs.iter().map(|(name, raw)| (Column::new(*name), *raw)),
        )
    }

    fn schema(json: serde_json::Value) -> Schema {
        Schema::from_value(&json).unwrap()
    }

    #[test]
    fn test_blank_predicates() {
        assert!(is_blank(""));
        assert!(is_blank("  \t"));
        assert!(!is_blank(" x "));

        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&Value::string("   ")));
        assert!(is_empty_value(&Value::Array(vec![Value::Null, Value::string("")])));
        assert!(!is_empty_value(&Value::Boolean(false)));
        assert!(!is_empty_value(&Value::Integer(0)));
        assert!(!is_empty_value(&Value::Float(0.0)));
    }

    #[test]
    fn test_list_filters_empty_options() {
        let schema = schema(json!({
            "structure": {
                "question": "question",
                "options": [
                    {"id": "literal:a", "text": "opt_a"},
                    {"id": "literal:b", "text": "opt_b"},
                    {"id": "literal:c", "text": "opt_c"},
                    {"id": "literal:d", "text": "opt_d"}
                ]
            }
        }));
        let r = row(
            2,
            &[
                ("question", "Capital of France?"),
                ("opt_a", "Paris"),
                ("opt_b", ""),
                ("opt_c", "Lyon"),
                ("opt_d", "   "),
            ],
        );

        let mut builder = StructureBuilder::new();
        let doc = builder.build_document(&schema, &[&r]);
        let options = doc["options"].as_array().unwrap();

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].get("id"), Some(&Value::string("a")));
        assert_eq!(options[0].get("text"), Some(&Value::string("Paris")));
        assert_eq!(options[1].get("id"), Some(&Value::string("c")));
        assert!(builder.issues().is_empty());
    }

    #[test]
    fn test_false_and_zero_are_kept() {
        let schema = schema(json!({
            "structure": {"flags": [{"k": "literal:x", "v": "flag"}, {"k": "literal:y", "v": "count"}]}
        }));
        let r = row(2, &[("flag", "false"), ("count", "0")]);

        let doc = StructureBuilder::new().build_document(&schema, &[&r]);
        let flags = doc["flags"].as_array().unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].get("v"), Some(&Value::Boolean(false)));
        assert_eq!(flags[1].get("v"), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_literal_only_items_kept() {
        let schema = schema(json!({
            "structure": {"tags": [{"name": "literal:fixed"}, "missing_col", "literal:plain"]}
        }));
        let r = row(2, &[("other", "1")]);

        let doc = StructureBuilder::new().build_document(&schema, &[&r]);
        let tags = doc["tags"].as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].get("name"), Some(&Value::string("fixed")));
        assert_eq!(tags[1], Value::string("plain"));
    }

    #[test]
    fn test_all_filtered_list_is_empty_array() {
        let schema = schema(json!({"structure": {"items": [{"id": "literal:1", "v": "a"}]}}));
        let r = row(2, &[("a", "")]);

        let doc = StructureBuilder::new().build_document(&schema, &[&r]);
        assert_eq!(doc["items"], Value::Array(vec![]));
    }

    #[test]
    fn test_two_level_grouping() {
        let schema = schema(json!({
            "key_column": "category",
            "structure": {"key_column": "item_id", "structure": {"name": "name"}}
        }));
        let rows = vec![
            row(2, &[("category", "10"), ("item_id", "1"), ("name", "apple")]),
            row(3, &[("category", "10"), ("item_id", "2"), ("name", "pear")]),
            row(4, &[("category", "20"), ("item_id", "3"), ("name", "kale")]),
            row(5, &[("category", "10"), ("item_id", "1"), ("name", "apple")]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();

        let doc = StructureBuilder::new().build_document(&schema, &refs);

        assert_eq!(doc.len(), 2);
        assert_eq!(doc["10"].as_map().unwrap().len(), 2);
        assert_eq!(doc["20"].as_map().unwrap().len(), 1);
        assert_eq!(
            doc["10"].get("1").and_then(|v| v.get("name")),
            Some(&Value::string("apple"))
        );
        assert_eq!(
            doc["20"].get("3").and_then(|v| v.get("name")),
            Some(&Value::string("kale"))
        );
    }

    #[test]
    fn test_missing_key_column_skips_row() {
        let schema = schema(json!({"key_column": "id", "structure": {"q": "question"}}));
        let rows = vec![
            row(2, &[("id", "1"), ("question", "Q1")]),
            row(3, &[("id", " "), ("question", "Q2")]),
            row(4, &[("question", "Q3")]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();

        let mut builder = StructureBuilder::new();
        let doc = builder.build_document(&schema, &refs);

        assert_eq!(doc.len(), 1);
        assert_eq!(doc["1"].get("q"), Some(&Value::string("Q1")));

        let issues = builder.into_issues();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(RowIssue::skips_row));
        assert!(matches!(issues[0], RowIssue::MissingKeyColumn { line: 3, .. }));
        assert!(matches!(issues[1], RowIssue::MissingKeyColumn { line: 4, .. }));
    }

    #[test]
    fn test_groups_split_on_raw_key() {
        let schema = schema(json!({"key_column": "k", "structure": {"v": "v"}}));
        let rows = vec![
            row(2, &[("k", "Y"), ("v", "first")]),
            row(3, &[("k", "yes"), ("v", "second")]),
            row(4, &[("k", "1"), ("v", "third")]),
            row(5, &[("k", "1.0"), ("v", "fourth")]),
            row(6, &[("k", " Y "), ("v", "first")]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();

        let mut builder = StructureBuilder::new();
        let doc = builder.build_document(&schema, &refs);

        assert_eq!(doc.len(), 4);
        assert_eq!(doc["true"].get("v"), Some(&Value::string("first")));
        assert_eq!(doc["yes"].get("v"), Some(&Value::string("second")));
        assert_eq!(doc["1"].get("v"), Some(&Value::string("third")));
        assert_eq!(doc["1.0"].get("v"), Some(&Value::string("fourth")));

        let issues = builder.into_issues();
        assert_eq!(issues.len(), 2);
        assert!(matches!(
            &issues[0],
            RowIssue::KeyCollision { line: 3, raw, key, .. } if raw == "yes" && key == "true"
        ));
        assert!(matches!(
            &issues[1],
            RowIssue::KeyCollision { line: 5, raw, key, .. } if raw == "1.0" && key == "1"
        ));
        assert!(!issues[0].skips_row());
    }

    #[test]
    fn test_key_owned_by_matching_raw_text() {
        let schema = schema(json!({"key_column": "k", "structure": {"v": "v"}}));
        let rows = vec![
            row(2, &[("k", "007"), ("v", "padded")]),
            row(3, &[("k", "7"), ("v", "plain")]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();

        let doc = StructureBuilder::new().build_document(&schema, &refs);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc["7"].get("v"), Some(&Value::string("plain")));
        assert_eq!(doc["007"].get("v"), Some(&Value::string("padded")));
    }

    #[test]
    fn test_inconsistent_column_first_row_wins() {
        let schema = schema(json!({"structure": {"title": "title"}}));
        let rows = vec![
            row(2, &[("title", "First")]),
            row(3, &[("title", " First ")]),
            row(4, &[("title", "Second")]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();

        let mut builder = StructureBuilder::new();
        let doc = builder.build_document(&schema, &refs);

        assert_eq!(doc["title"], Value::string("First"));
        assert_eq!(
            builder.issues(),
            &[RowIssue::InconsistentColumn {
                column: "title".into(),
                first_line: 2,
                line: 4
            }]
        );
    }

    #[test]
    fn test_missing_column_is_null() {
        let schema = schema(json!({"structure": {"a": "nope", "b": "literal:b"}}));
        let r = row(2, &[("x", "1")]);

        let doc = StructureBuilder::new().build_document(&schema, &[&r]);
        assert!(doc["a"].is_null());
        assert_eq!(doc["b"], Value::string("b"));
    }

    #[test]
    fn test_conversion_issue_recorded() {
        let schema = schema(json!({"structure": {"n": "n"}}));
        let r = row(6, &[("n", "int: many")]);

        let mut builder = StructureBuilder::new();
        let doc = builder.build_document(&schema, &[&r]);
        assert_eq!(doc["n"], Value::string("many"));
        assert!(matches!(builder.issues()[0], RowIssue::Conversion { line: 6, .. }));
    }

    #[test]
    fn test_build_is_deterministic() {
        let schema = schema(json!({
            "key_column": "g",
            "structure": {"vals": ["a", "b"], "meta": {"x": "literal:1", "y": "b"}}
        }));
        let rows = vec![
            row(2, &[("g", "b"), ("a", "1"), ("b", "")]),
            row(3, &[("g", "a"), ("a", ""), ("b", "2.5")]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();

        let first = StructureBuilder::new().build_document(&schema, &refs);
        let second = StructureBuilder::new().build_document(&schema, &refs);
        assert_eq!(first, second);
        assert_eq!(first["a"].get("vals"), Some(&Value::Array(vec![Value::Float(2.5)])));
    }
}
