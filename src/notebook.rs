//! Jupyter notebook text extraction
//!
//! Only markdown and raw cells can carry wiki-links or front matter; code
//! cells and outputs are ignored.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    cell_type: String,
    #[serde(default)]
    source: Source,
}

/// nbformat stores cell sources either as one string or as a list of lines
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Source {
    Text(String),
    Lines(Vec<String>),
}

impl Default for Source {
    fn default() -> Self {
        Source::Text(String::new())
    }
}

impl Source {
    fn into_text(self) -> String {
        match self {
            Source::Text(text) => text,
            Source::Lines(lines) => lines.concat(),
        }
    }
}

/// Concatenate the markdown and raw cells of a notebook, separated by blank lines
pub fn extract_text(json: &str) -> Result<String> {
    let notebook: Notebook =
        serde_json::from_str(json).map_err(|e| Error::Validation(format!("Invalid notebook: {}", e)))?;

    let texts: Vec<String> = notebook
        .cells
        .into_iter()
        .filter(|cell| cell.cell_type == "markdown" || cell.cell_type == "raw")
        .map(|cell| cell.source.into_text())
        .collect();

    Ok(texts.join("\n\n"))
}
