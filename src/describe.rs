//! Tool description generation.
//!
//! Each engine is asked once for a summary of its source; that summary is
//! then condensed by the LLM into a short capability description. There
//! is no retry: a failure aborts catalog construction.

use std::sync::Arc;

use crate::engine::QueryEngine;
use crate::error::FolioError;
use crate::llm::LlmClient;
use crate::models::SourceKind;

/// The fixed-intent sample query issued against every engine.
pub const SAMPLE_QUERY: &str = "Provide a brief summary or key points of this document.";

pub struct DescriptionGenerator {
    llm: Arc<dyn LlmClient>,
}

impl DescriptionGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Describe the `ordinal`-th (1-based) engine of `kind`.
    pub async fn describe(
        &self,
        engine: &dyn QueryEngine,
        kind: SourceKind,
        ordinal: usize,
    ) -> Result<String, FolioError> {
        let fail = |e: anyhow::Error| FolioError::DescriptionQuery {
            kind: kind.as_str().to_string(),
            ordinal,
            detail: format!("{:#}", e),
        };

        let sample = engine.query(SAMPLE_QUERY).await.map_err(fail)?;
        let prompt = format!(
            "Based on the following content from {} data file {}, provide a brief description: {}",
            kind.label(),
            ordinal,
            sample
        );
        let description = self.llm.complete(&prompt).await.map_err(fail)?;
        Ok(description.trim().to_string())
    }
}

/// Final tool description text for the `ordinal`-th tool of `kind`.
pub fn tool_description(kind: SourceKind, ordinal: usize, generated: &str) -> String {
    format!(
        "This tool provides insights from {} data file {}. {}",
        kind.label(),
        ordinal,
        generated
    )
}
