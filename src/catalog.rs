//! Tool catalog: the named, described capabilities handed to the agent.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     ToolRegistry                     │
//! │  ┌────────────────┐ ┌─────────────────┐ ┌──────────┐ │
//! │  │ tabular_data_1 │ │ document_data_1 │ │note_saver│ │
//! │  │ tabular_data_2 │ │ document_data_2 │ │ (fixed)  │ │
//! │  └────────────────┘ └─────────────────┘ └──────────┘ │
//! └──────────────────────────┬───────────────────────────┘
//!                            ▼
//!                  agent::assemble() → ReActAgent
//! ```
//!
//! Insertion order is tabular tools, then document tools, then the note
//! tool. Names are `{kind}_data_{n}` with `n` restarting at 1 per kind.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::describe::{tool_description, DescriptionGenerator};
use crate::engine::SharedEngine;
use crate::llm::LlmClient;
use crate::models::SourceKind;
use crate::notes::{NoteContent, NoteSink};
use crate::progress::{StartupEvent, StartupReporter};

pub const NOTE_TOOL_NAME: &str = "note_saver";

const NOTE_TOOL_DESCRIPTION: &str = "This tool saves a note when the user asks for saving a note. \
The user can save any content they want. The tool is designed to be used in the LLM context.";

/// A capability the agent can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique within a catalog; lowercase with underscores.
    fn name(&self) -> &str;

    /// Free text the agent uses to decide whether to call the tool.
    fn description(&self) -> &str;

    /// JSON Schema of the tool's input.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. The returned text becomes the agent's observation.
    async fn execute(&self, params: Value) -> Result<String>;
}

/// An engine wrapped with its generated name and description.
pub struct ToolRecord {
    name: String,
    description: String,
    kind: SourceKind,
    engine: SharedEngine,
}

impl ToolRecord {
    pub fn new(name: String, description: String, kind: SourceKind, engine: SharedEngine) -> Self {
        Self {
            name,
            description,
            kind,
            engine,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }
}

#[async_trait]
impl Tool for ToolRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "A natural-language question about the file" }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let question = query_text(&params);
        if question.trim().is_empty() {
            anyhow::bail!("input must not be empty");
        }
        self.engine.query(&question).await
    }
}

// Agents send `{"input": "..."}`, sometimes a bare string, sometimes
// another single-key object.
fn query_text(params: &Value) -> String {
    match params {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("input")
            .or_else(|| map.get("query"))
            .or_else(|| map.values().next())
            .map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string()))
            .unwrap_or_default(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The fixed note-saving tool. Failures are returned as text, never raised.
pub struct NoteTool {
    sink: Arc<NoteSink>,
}

impl NoteTool {
    pub fn new(sink: Arc<NoteSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for NoteTool {
    fn name(&self) -> &str {
        NOTE_TOOL_NAME
    }

    fn description(&self) -> &str {
        NOTE_TOOL_DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "note": {
                    "description": "Note text, or an object with `title` and `content`",
                    "oneOf": [
                        { "type": "string" },
                        {
                            "type": "object",
                            "properties": {
                                "title": { "type": "string" },
                                "content": { "type": "string" }
                            },
                            "required": ["content"]
                        }
                    ]
                }
            },
            "required": ["note"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let note = NoteContent::from_value(&params);
        match self.sink.save(&note) {
            Ok(_) => Ok("note saved".to_string()),
            Err(e) => {
                tracing::warn!(kind = e.kind(), "{}", e);
                Ok(format!("An error occurred: {}", e))
            }
        }
    }
}

/// Ordered collection of tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Wrap engines into described tools and append the note tool.
///
/// Absent (`None`) engines are dropped before numbering. A description
/// failure aborts the whole catalog.
pub async fn build_catalog(
    tabular: Vec<Option<SharedEngine>>,
    document: Vec<Option<SharedEngine>>,
    llm: Arc<dyn LlmClient>,
    notes: Arc<NoteSink>,
    reporter: &dyn StartupReporter,
) -> Result<ToolRegistry> {
    let describer = DescriptionGenerator::new(llm);
    let mut registry = ToolRegistry::new();

    for (kind, engines) in [(SourceKind::Tabular, tabular), (SourceKind::Document, document)] {
        for (i, engine) in engines.into_iter().flatten().enumerate() {
            let ordinal = i + 1;
            let name = format!("{}_data_{}", kind.as_str(), ordinal);
            reporter.report(StartupEvent::Describing { tool: name.clone() });

            let generated = describer.describe(engine.as_ref(), kind, ordinal).await?;
            let description = tool_description(kind, ordinal, &generated);
            tracing::debug!(tool = %name, file = %engine.source().file_name(), "tool described");

            registry.register(Arc::new(ToolRecord::new(name, description, kind, engine)));
        }
    }

    registry.register(Arc::new(NoteTool::new(notes)));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::QueryEngine;
    use crate::error::FolioError;
    use crate::models::DataSource;
    use crate::notes::NoteFormat;
    use crate::progress::NoProgress;
    use std::path::Path;
    use tempfile::TempDir;

    struct StubEngine {
        source: DataSource,
        fail: bool,
    }

    #[async_trait]
    impl QueryEngine for StubEngine {
        fn source(&self) -> &DataSource {
            &self.source
        }
        async fn query(&self, question: &str) -> Result<String> {
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(format!("{} <- {}", self.source.logical_name, question))
        }
    }

    struct Plain;

    #[async_trait]
    impl LlmClient for Plain {
        fn model_name(&self) -> &str {
            "plain"
        }
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("Generated.".to_string())
        }
    }

    fn stub(path: &str, kind: SourceKind, fail: bool) -> Option<SharedEngine> {
        Some(Arc::new(StubEngine {
            source: DataSource::new(Path::new(path), kind),
            fail,
        }))
    }

    fn sink(tmp: &TempDir) -> Arc<NoteSink> {
        Arc::new(NoteSink::new(tmp.path().join("notes.csv"), NoteFormat::Csv))
    }

    #[tokio::test]
    async fn names_restart_per_kind_and_note_tool_is_last() {
        let tmp = TempDir::new().unwrap();
        let registry = build_catalog(
            vec![stub("a.csv", SourceKind::Tabular, false), stub("b.csv", SourceKind::Tabular, false)],
            vec![None, stub("c.pdf", SourceKind::Document, false)],
            Arc::new(Plain),
            sink(&tmp),
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(
            registry.names(),
            vec!["tabular_data_1", "tabular_data_2", "document_data_1", "note_saver"]
        );
        let doc = registry.find("document_data_1").unwrap();
        assert_eq!(
            doc.description(),
            "This tool provides insights from PDF data file 1. Generated."
        );
    }

    #[tokio::test]
    async fn description_failure_aborts_catalog() {
        let tmp = TempDir::new().unwrap();
        let err = build_catalog(
            vec![stub("a.csv", SourceKind::Tabular, true)],
            vec![],
            Arc::new(Plain),
            sink(&tmp),
            &NoProgress,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<FolioError>(),
            Some(FolioError::DescriptionQuery { .. })
        ));
    }

    #[tokio::test]
    async fn engine_tool_accepts_input_shapes() {
        let tool = ToolRecord::new(
            "tabular_data_1".to_string(),
            String::new(),
            SourceKind::Tabular,
            stub("pop.csv", SourceKind::Tabular, false).unwrap(),
        );
        assert_eq!(tool.execute(json!({"input": "q"})).await.unwrap(), "pop <- q");
        assert_eq!(tool.execute(json!("q")).await.unwrap(), "pop <- q");
        assert!(tool.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn note_tool_reports_errors_as_text() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let tool = NoteTool::new(Arc::new(NoteSink::new(
            blocker.join("notes.csv"),
            NoteFormat::Csv,
        )));

        let reply = tool.execute(json!({"note": "hello"})).await.unwrap();
        assert!(reply.starts_with("An error occurred: "));

        let ok = NoteTool::new(sink(&tmp));
        assert_eq!(ok.execute(json!({"note": "hello"})).await.unwrap(), "note saved");
    }

    #[tokio::test]
    async fn note_tool_stores_input_text_verbatim() {
        let tmp = TempDir::new().unwrap();
        let tool = NoteTool::new(sink(&tmp));
        assert_eq!(tool.execute(json!({"input": "buy milk"})).await.unwrap(), "note saved");

        let mut reader = csv::Reader::from_path(tmp.path().join("notes.csv")).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "");
        assert_eq!(&rows[0][2], "buy milk");
    }
}
