//! One parsed input record.

use serde::Serialize;

use super::TypeTag;

/// A header column: field name plus the optional `:type` hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<TypeTag>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: TypeTag) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// A raw cell together with its column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub column: Column,
    pub raw: String,
}

/// An immutable input row, cells in header order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// 1-based line in the source, 0 when the row was built in memory.
    pub line: usize,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(line: usize, cells: Vec<Cell>) -> Self {
        Self { line, cells }
    }

    /// Build a row from `(column, raw)` pairs; handy for in-memory sources.
    pub fn from_pairs<I, S>(line: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (Column, S)>,
        S: Into<String>,
    {
        let cells = pairs
            .into_iter()
            .map(|(column, raw)| Cell { column, raw: raw.into() })
            .collect();
        Self { line, cells }
    }

    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column.name == name)
    }

    /// Raw text of a column, if the row has it.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.cell(name).map(|c| c.raw.as_str())
    }
}
