//! Core data models used throughout Folio.
//!
//! These types describe the files discovered on disk and the text that
//! flows from them into document indices.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The two families of data sources Folio can turn into tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Tabular,
    Document,
}

impl SourceKind {
    /// Lowercase identifier used in tool names (`tabular_data_1`).
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Tabular => "tabular",
            SourceKind::Document => "document",
        }
    }

    /// Label used in generated tool descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Tabular => "CSV",
            SourceKind::Document => "PDF",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A data file discovered at scan time. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// File stem; doubles as the index name for document sources.
    pub logical_name: String,
}

impl DataSource {
    pub fn new(path: &Path, kind: SourceKind) -> Self {
        let logical_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            kind,
            logical_name,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Text read from a document source, ready to be indexed.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_path: PathBuf,
    pub content_type: String,
    pub body: String,
}

/// A chunk of a document's text, as stored inside a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}
