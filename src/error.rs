//! Error taxonomy for the startup pipeline and the note sink.
//!
//! Each variant corresponds to one failure policy:
//!
//! | Variant | Policy |
//! |---------|--------|
//! | [`FolioError::SourceRead`] | skip the file, keep scanning |
//! | [`FolioError::IndexLoad`] / [`FolioError::IndexPersist`] / [`FolioError::IndexBuild`] | fatal for that logical name |
//! | [`FolioError::DescriptionQuery`] | aborts catalog construction |
//! | [`FolioError::NoteSink`] | reported back as the note tool's return text |
//! | [`FolioError::NotReady`] | queries refused until startup succeeds |

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FolioError {
    #[error("failed to read source {path}: {detail}")]
    SourceRead { path: PathBuf, detail: String },

    #[error("failed to load index '{name}': {detail}")]
    IndexLoad { name: String, detail: String },

    #[error("failed to persist index '{name}': {detail}")]
    IndexPersist { name: String, detail: String },

    #[error("failed to build index '{name}': {detail}")]
    IndexBuild { name: String, detail: String },

    #[error("description query failed for {kind} data file {ordinal}: {detail}")]
    DescriptionQuery {
        kind: String,
        ordinal: usize,
        detail: String,
    },

    #[error("failed to save note to {path}: {detail}")]
    NoteSink { path: PathBuf, detail: String },

    #[error("agent is not ready; startup has not completed")]
    NotReady,

    #[error("unknown tool: {0}")]
    ToolNotFound(String),
}

impl FolioError {
    /// Short machine-friendly label for logs and JSON progress output.
    pub fn kind(&self) -> &'static str {
        match self {
            FolioError::SourceRead { .. } => "source_read",
            FolioError::IndexLoad { .. } => "index_load",
            FolioError::IndexPersist { .. } => "index_persist",
            FolioError::IndexBuild { .. } => "index_build",
            FolioError::DescriptionQuery { .. } => "description_query",
            FolioError::NoteSink { .. } => "note_sink",
            FolioError::NotReady => "not_ready",
            FolioError::ToolNotFound(_) => "tool_not_found",
        }
    }
}
