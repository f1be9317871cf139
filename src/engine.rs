//! Query engines: one callable capability per data source.
//!
//! An engine answers a natural-language question against exactly one
//! source. Tabular engines hold the whole table in memory; document
//! engines hold an [`IndexHandle`] resolved through the index store.
//! Engines keep no state between calls.
//!
//! [`EngineFactory::build`] turns a kind's folder into engines:
//!
//! ```text
//! scan (sorted) ──▶ tabular:  Table::from_csv_path ──▶ TabularEngine   (failure: skipped)
//!               └─▶ document: load_document ──▶ IndexResolver ──▶ DocumentEngine
//!                                                              (failure: None slot)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::{Config, EmbeddingConfig};
use crate::error::FolioError;
use crate::extract::load_document;
use crate::index::{IndexHandle, IndexResolver, IndexStore};
use crate::llm::LlmClient;
use crate::models::{DataSource, SourceKind};
use crate::progress::{StartupEvent, StartupReporter};
use crate::sources::scan_sources;
use crate::table::{ColumnType, Table};

#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// The source this engine is bound to.
    fn source(&self) -> &DataSource;

    async fn query(&self, question: &str) -> Result<String>;
}

pub type SharedEngine = Arc<dyn QueryEngine>;

// ============ Tabular ============

pub struct TabularEngine {
    source: DataSource,
    table: Table,
    llm: Arc<dyn LlmClient>,
    max_rows: usize,
}

impl TabularEngine {
    pub fn new(source: DataSource, table: Table, llm: Arc<dyn LlmClient>, max_rows: usize) -> Self {
        Self {
            source,
            table,
            llm,
            max_rows,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

#[async_trait]
impl QueryEngine for TabularEngine {
    fn source(&self) -> &DataSource {
        &self.source
    }

    async fn query(&self, question: &str) -> Result<String> {
        let prompt = tabular_prompt(&self.source, &self.table, question, self.max_rows);
        self.llm.complete(&prompt).await
    }
}

fn tabular_prompt(source: &DataSource, table: &Table, question: &str, max_rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are answering questions about the table `{}` ({} rows, {} columns).",
        source.file_name(),
        table.row_count(),
        table.column_count()
    );
    out.push_str("\nColumns:\n");
    for col in table.profile() {
        let _ = write!(out, "- {} ({}", col.name, col.column_type.as_str());
        if matches!(col.column_type, ColumnType::Integer | ColumnType::Float) {
            if let (Some(min), Some(max)) = (col.min, col.max) {
                let _ = write!(out, ", min {}, max {}", min, max);
            }
        }
        let _ = writeln!(out, ", {} distinct values)", col.distinct);
    }

    let shown = table.row_count().min(max_rows);
    if shown < table.row_count() {
        let _ = writeln!(out, "\nFirst {} of {} rows:", shown, table.row_count());
    } else {
        out.push_str("\nRows:\n");
    }
    out.push_str(&table.to_markdown(max_rows));

    out.push_str(
        "\nAnswer the question using only the data above. \
         If the data does not contain the answer, say so.\n",
    );
    let _ = write!(out, "\nQuestion: {}", question);
    out
}

// ============ Document ============

pub struct DocumentEngine {
    source: DataSource,
    handle: IndexHandle,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
    embedding: EmbeddingConfig,
}

impl DocumentEngine {
    pub fn new(
        source: DataSource,
        handle: IndexHandle,
        llm: Arc<dyn LlmClient>,
        top_k: usize,
        embedding: EmbeddingConfig,
    ) -> Self {
        Self {
            source,
            handle,
            llm,
            top_k,
            embedding,
        }
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }
}

#[async_trait]
impl QueryEngine for DocumentEngine {
    fn source(&self) -> &DataSource {
        &self.source
    }

    async fn query(&self, question: &str) -> Result<String> {
        let hits = self
            .handle
            .retrieve(question, self.top_k, &self.embedding)
            .await?;
        tracing::debug!(index = self.handle.name(), hits = hits.len(), "retrieved context");

        let mut prompt = String::from("Context information is below.\n---------------------\n");
        for hit in &hits {
            prompt.push_str(&hit.text);
            prompt.push_str("\n\n");
        }
        prompt.push_str("---------------------\n");
        let _ = write!(
            prompt,
            "Given the context information from `{}` and no prior knowledge, \
             answer the query.\nQuery: {}\nAnswer: ",
            self.source.file_name(),
            question
        );
        self.llm.complete(&prompt).await
    }
}

// ============ Factory ============

/// Produces engines for every source of a kind.
pub struct EngineFactory {
    config: Arc<Config>,
    llm: Arc<dyn LlmClient>,
    resolver: IndexResolver,
}

impl EngineFactory {
    pub fn new(config: Arc<Config>, llm: Arc<dyn LlmClient>) -> Self {
        let resolver = IndexResolver::new(
            IndexStore::new(config.index.dir.clone()),
            config.chunking.max_tokens,
            config.embedding.clone(),
        );
        Self {
            config,
            llm,
            resolver,
        }
    }

    pub fn resolver(&self) -> &IndexResolver {
        &self.resolver
    }

    /// Build engines for every matching file of `kind`, in file name order.
    ///
    /// Tabular files that fail to load are skipped. Document files that
    /// fail to load or index leave a `None` slot; callers flatten.
    pub async fn build(
        &self,
        kind: SourceKind,
        reporter: &dyn StartupReporter,
    ) -> Result<Vec<Option<SharedEngine>>> {
        reporter.report(StartupEvent::Scanning { kind });
        let sources = scan_sources(&self.config, kind)?;
        let total = sources.len();

        let mut engines = Vec::with_capacity(total);
        for (i, source) in sources.into_iter().enumerate() {
            let name = source.file_name();
            let built = match kind {
                SourceKind::Tabular => self.tabular_engine(source),
                SourceKind::Document => self.document_engine(source).await,
            };

            let ok = built.is_ok();
            match built {
                Ok(engine) => engines.push(Some(engine)),
                Err(e) => {
                    tracing::warn!(file = %name, kind = e.kind(), "{}", e);
                    if kind == SourceKind::Document {
                        engines.push(None);
                    }
                }
            }
            reporter.report(StartupEvent::Engine {
                kind,
                n: i + 1,
                total,
                name,
                ok,
            });
        }

        Ok(engines)
    }

    fn tabular_engine(&self, source: DataSource) -> Result<SharedEngine, FolioError> {
        let table = Table::from_csv_path(&source.path)?;
        tracing::debug!(file = %source.file_name(), rows = table.row_count(), "loaded table");
        Ok(Arc::new(TabularEngine::new(
            source,
            table,
            self.llm.clone(),
            self.config.tabular.max_prompt_rows,
        )))
    }

    async fn document_engine(&self, source: DataSource) -> Result<SharedEngine, FolioError> {
        let docs = load_document(&source.path)?;
        let handle = self.resolver.resolve(&docs, &source.logical_name).await?;
        Ok(Arc::new(DocumentEngine::new(
            source,
            handle,
            self.llm.clone(),
            self.config.index.top_k,
            self.config.embedding.clone(),
        )))
    }
}
