//! Notebook data model for lab content.
//!
//! A lab is an ordered sequence of cells plus notebook-level metadata and a
//! format version pair. Cell ids are regenerated by the host editor on every
//! edit session, so change detection must go through [`canonical_cells`],
//! which blanks them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Cell kind. Mirrors the host notebook format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

/// One unit of lab content with its own source and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub outputs: Vec<Value>,
    #[serde(default, deserialize_with = "string_or_lines")]
    pub source: Vec<String>,
}

impl Cell {
    /// Create a cell with a freshly minted id and no outputs.
    pub fn new(cell_type: CellType, source: &[&str]) -> Self {
        Self {
            cell_type,
            id: Uuid::new_v4().to_string(),
            metadata: Map::new(),
            outputs: Vec::new(),
            source: source.iter().map(|line| line.to_string()).collect(),
        }
    }
}

/// A lab document: ordered cells, a metadata map, and the format version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabNotebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub nbformat: u64,
    pub nbformat_minor: u64,
}

impl LabNotebook {
    /// Create a notebook at the current format version.
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: Map::new(),
            nbformat: 4,
            nbformat_minor: 5,
        }
    }
}

/// Content-bearing projection of a cell.
///
/// The id is regenerated per edit session and outputs and cell metadata
/// churn on every execution; all three are blanked here while the fields
/// stay present in the serialized form. Struct field order fixes the
/// serialization order, and the only map left in the projection is always
/// empty, so equal inputs modulo ids serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalCell {
    pub cell_type: CellType,
    pub id: String,
    pub metadata: Map<String, Value>,
    pub outputs: Vec<Value>,
    pub source: Vec<String>,
}

/// Project a notebook's cells into their canonical, hashable form.
pub fn canonical_cells(notebook: &LabNotebook) -> Vec<CanonicalCell> {
    notebook
        .cells
        .iter()
        .map(|cell| CanonicalCell {
            cell_type: cell.cell_type,
            id: String::new(),
            metadata: Map::new(),
            outputs: Vec::new(),
            source: cell.source.clone(),
        })
        .collect()
}

/// A cell's source arrives either as a single string or as a list of
/// lines; normalize the bare string to a one-element list.
fn string_or_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SourceRepr {
        Line(String),
        Lines(Vec<String>),
    }

    Ok(match SourceRepr::deserialize(deserializer)? {
        SourceRepr::Line(line) => vec![line],
        SourceRepr::Lines(lines) => lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notebook_json() {
        let raw = r##"{
            "cells": [
                {
                    "cell_type": "code",
                    "id": "c852569f",
                    "metadata": {},
                    "outputs": [],
                    "source": ["print(\"hello\")"]
                },
                {
                    "cell_type": "markdown",
                    "id": "5a2dc856",
                    "metadata": {},
                    "source": ["# Title"]
                }
            ],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5
        }"##;

        let notebook: LabNotebook = serde_json::from_str(raw).unwrap();
        assert_eq!(notebook.cells.len(), 2);
        assert_eq!(notebook.cells[0].cell_type, CellType::Code);
        assert_eq!(notebook.cells[1].cell_type, CellType::Markdown);
        assert_eq!(notebook.nbformat, 4);
    }

    #[test]
    fn test_source_string_normalized_to_lines() {
        let raw = r#"{
            "cells": [
                {"cell_type": "raw", "id": "a", "source": "one line"}
            ],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5
        }"#;

        let notebook: LabNotebook = serde_json::from_str(raw).unwrap();
        assert_eq!(notebook.cells[0].source, vec!["one line".to_string()]);
    }

    #[test]
    fn test_canonical_cells_blank_volatile_fields() {
        let mut cell = Cell::new(CellType::Code, &["x = 1"]);
        cell.outputs.push(serde_json::json!({"output_type": "stream"}));
        cell.metadata
            .insert("collapsed".to_string(), Value::Bool(true));

        let notebook = LabNotebook::new(vec![cell]);
        let canonical = canonical_cells(&notebook);

        assert_eq!(canonical.len(), 1);
        assert!(canonical[0].id.is_empty());
        assert!(canonical[0].metadata.is_empty());
        assert!(canonical[0].outputs.is_empty());
        assert_eq!(canonical[0].source, vec!["x = 1".to_string()]);
    }

    #[test]
    fn test_canonical_cells_deterministic_across_id_churn() {
        let notebook_a = LabNotebook::new(vec![
            Cell::new(CellType::Code, &["x = 1"]),
            Cell::new(CellType::Markdown, &["# Title"]),
        ]);
        let mut notebook_b = notebook_a.clone();
        for cell in &mut notebook_b.cells {
            cell.id = Uuid::new_v4().to_string();
        }

        let bytes_a = serde_json::to_vec(&canonical_cells(&notebook_a)).unwrap();
        let bytes_b = serde_json::to_vec(&canonical_cells(&notebook_b)).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }
}
