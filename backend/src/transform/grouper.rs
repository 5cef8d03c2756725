//! Group flat rows by document identifier.
//!
//! Several CSV rows can share one identifier; they end up in the same document.
//!
//! # Architecture
//!
//! ```text
//! CSV Input (flat rows)          →  Documents (no schema)
//! ┌────────────────────────┐       ┌─────────────────────────┐
//! │ DocumentId: d1, a: 1   │       │ d1                      │
//! │ DocumentId: d1, a: 2   │  →    │ items: [{a: 1}, {a: 2}] │
//! │ DocumentId: d2, a: 3   │       ├─────────────────────────┤
//! └────────────────────────┘       │ d2                      │
//!                                  │ a: 3                    │
//!                                  └─────────────────────────┘
//! ```
//!
//! Grouping keeps the first-seen order of identifiers and the input order of
//! rows inside each group. With a schema, each group is handed to the
//! [`StructureBuilder`](super::builder::StructureBuilder) instead of
//! [`fold_rows`].

use std::collections::HashMap;
use tracing::warn;

use super::builder::is_blank;
use super::coerce::coerce_cell;
use crate::error::RowIssue;
use crate::models::{Row, Value, ValueMap};

/// Field holding the per-row maps of a multi-row document.
pub const ITEMS_FIELD: &str = "items";

/// The rows of one document, in input order.
#[derive(Debug, Clone)]
pub struct RowGroup<'a> {
    pub identifier: String,
    pub rows: Vec<&'a Row>,
}

/// Result of partitioning rows by identifier.
#[derive(Debug, Default)]
pub struct Grouping<'a> {
    pub groups: Vec<RowGroup<'a>>,
    /// Rows without a usable identifier.
    pub skipped: Vec<RowIssue>,
}

/// Partition rows by the trimmed value of `identifier_column`.
pub fn group_rows<'a>(rows: &'a [Row], identifier_column: &str) -> Grouping<'a> {
    let mut grouping = Grouping::default();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for row in rows {
        let identifier = row.raw(identifier_column).map(str::trim).unwrap_or("");
        if is_blank(identifier) {
            let issue = RowIssue::EmptyIdentifier {
                line: row.line,
                column: identifier_column.to_string(),
            };
            warn!("{}", issue);
            grouping.skipped.push(issue);
            continue;
        }

        match index.get(identifier) {
            Some(&i) => grouping.groups[i].rows.push(row),
            None => {
                index.insert(identifier, grouping.groups.len());
                grouping.groups.push(RowGroup {
                    identifier: identifier.to_string(),
                    rows: vec![row],
                });
            }
        }
    }

    grouping
}

/// Fold a group without a schema.
///
/// One row becomes a flat map of column to coerced value; two or more rows
/// become `{"items": [...]}` with one flat map per row. The identifier column
/// is left out either way.
pub fn fold_rows(rows: &[&Row], identifier_column: &str, issues: &mut Vec<RowIssue>) -> ValueMap {
    match rows {
        [single] => flat_map(single, identifier_column, issues),
        _ => {
            let items = rows
                .iter()
                .map(|row| Value::Map(flat_map(row, identifier_column, issues)))
                .collect();
            let mut doc = ValueMap::new();
            doc.insert(ITEMS_FIELD.to_string(), Value::Array(items));
            doc
        }
    }
}

fn flat_map(row: &Row, identifier_column: &str, issues: &mut Vec<RowIssue>) -> ValueMap {
    row.cells
        .iter()
        .filter(|cell| cell.column.name != identifier_column)
        .map(|cell| (cell.column.name.clone(), coerce_cell(row.line, cell, issues)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, TypeTag};

    fn row(line: usize, id: &str, a: &str) -> Row {
        Row::from_pairs(
            line,
            vec![
                (Column::new("DocumentId"), id),
                (Column::new("a").with_hint(TypeTag::Integer), a),
            ],
        )
    }

    #[test]
    fn test_group_first_seen_order() {
        let rows = vec![
            row(2, "d2", "1"),
            row(3, "d1", "2"),
            row(4, " d2 ", "3"),
        ];

        let grouping = group_rows(&rows, "DocumentId");
        let ids: Vec<&str> = grouping.groups.iter().map(|g| g.identifier.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1"]);

        let lines: Vec<usize> = grouping.groups[0].rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 4]);
        assert!(grouping.skipped.is_empty());
    }

    #[test]
    fn test_empty_identifier_skipped() {
        let rows = vec![row(2, "", "1"), row(3, "  ", "2"), row(4, "d1", "3")];

        let grouping = group_rows(&rows, "DocumentId");
        assert_eq!(grouping.groups.len(), 1);
        assert_eq!(grouping.skipped.len(), 2);
        assert!(matches!(grouping.skipped[0], RowIssue::EmptyIdentifier { line: 2, .. }));
    }

    #[test]
    fn test_fold_items_and_flat() {
        let rows = vec![
            row(2, "d1", "1"),
            row(3, "d1", "2"),
            row(4, "d1", "3"),
            row(5, "d2", "4"),
        ];
        let grouping = group_rows(&rows, "DocumentId");
        assert_eq!(grouping.groups.len(), 2);

        let mut issues = Vec::new();
        let d1 = fold_rows(&grouping.groups[0].rows, "DocumentId", &mut issues);
        let items = d1[ITEMS_FIELD].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].get("a"), Some(&Value::Integer(3)));
        assert!(items[0].get("DocumentId").is_none());

        let d2 = fold_rows(&grouping.groups[1].rows, "DocumentId", &mut issues);
        assert!(!d2.contains_key(ITEMS_FIELD));
        assert!(!d2.contains_key("DocumentId"));
        assert_eq!(d2["a"], Value::Integer(4));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_fold_records_conversion_issues() {
        let rows = vec![row(7, "d1", "seven")];
        let refs: Vec<&Row> = rows.iter().collect();

        let mut issues = Vec::new();
        let doc = fold_rows(&refs, "DocumentId", &mut issues);
        assert_eq!(doc["a"], Value::string("seven"));
        assert!(matches!(issues[0], RowIssue::Conversion { line: 7, .. }));
    }
}
