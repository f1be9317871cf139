//! TOML configuration parsing and validation.
//!
//! Folio reads a single TOML file (default `config/folio.toml`). Every
//! section is optional except `[data]`; missing keys fall back to the
//! defaults below. [`load_config`] validates the parsed values and fails
//! fast with a descriptive message.
//!
//! ```toml
//! [data]
//! root = "data"
//!
//! [llm]
//! provider = "groq"
//! model = "llama-3.1-8b-instant"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::SourceKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tabular: TabularConfig,
    #[serde(default)]
    pub notes: NotesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub root: PathBuf,
    #[serde(default = "default_tabular_dir")]
    pub tabular_dir: String,
    #[serde(default = "default_document_dir")]
    pub document_dir: String,
    #[serde(default = "default_tabular_globs")]
    pub tabular_globs: Vec<String>,
    #[serde(default = "default_document_globs")]
    pub document_globs: Vec<String>,
}

fn default_tabular_dir() -> String {
    "csv".to_string()
}
fn default_document_dir() -> String {
    "pdf".to_string()
}
fn default_tabular_globs() -> Vec<String> {
    vec!["*.csv".to_string()]
}
fn default_document_globs() -> Vec<String> {
    vec!["*.pdf".to_string()]
}

impl DataConfig {
    /// Folder scanned for sources of the given kind.
    pub fn folder(&self, kind: SourceKind) -> PathBuf {
        match kind {
            SourceKind::Tabular => self.root.join(&self.tabular_dir),
            SourceKind::Document => self.root.join(&self.document_dir),
        }
    }

    /// File-name globs that select sources of the given kind.
    pub fn globs(&self, kind: SourceKind) -> &[String] {
        match kind {
            SourceKind::Tabular => &self.tabular_globs,
            SourceKind::Document => &self.document_globs,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            top_k: default_top_k(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("storage")
}
fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    512
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            api_key_env: None,
            temperature: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "groq".to_string()
}
fn default_llm_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

impl LlmConfig {
    /// Base URL of the provider's API, honoring an explicit override.
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "openai" => "https://api.openai.com/v1".to_string(),
            "ollama" => "http://localhost:11434".to_string(),
            _ => "https://api.groq.com/openai/v1".to_string(),
        }
    }

    /// Name of the environment variable holding the API key.
    pub fn resolved_api_key_env(&self) -> String {
        if let Some(var) = &self.api_key_env {
            return var.clone();
        }
        match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY".to_string(),
            _ => "GROQ_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            max_iterations: default_max_iterations(),
            history_capacity: default_history_capacity(),
        }
    }
}

fn default_context() -> String {
    "Purpose: The primary role of this agent is to assist users by providing accurate \
     information about the data files it has tools for, and to save notes when asked."
        .to_string()
}
fn default_max_iterations() -> usize {
    8
}
fn default_history_capacity() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct TabularConfig {
    #[serde(default = "default_max_prompt_rows")]
    pub max_prompt_rows: usize,
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            max_prompt_rows: default_max_prompt_rows(),
        }
    }
}

fn default_max_prompt_rows() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotesConfig {
    #[serde(default = "default_notes_path")]
    pub path: PathBuf,
    #[serde(default = "default_notes_format")]
    pub format: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            path: default_notes_path(),
            format: default_notes_format(),
        }
    }
}

fn default_notes_path() -> PathBuf {
    PathBuf::from("data").join("notes.csv")
}
fn default_notes_format() -> String {
    "csv".to_string()
}

impl Config {
    /// Defaults rooted at `./data`, for commands that run without a config file.
    pub fn minimal() -> Self {
        Self {
            data: DataConfig {
                root: PathBuf::from("data"),
                tabular_dir: default_tabular_dir(),
                document_dir: default_document_dir(),
                tabular_globs: default_tabular_globs(),
                document_globs: default_document_globs(),
            },
            index: IndexConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            tabular: TabularConfig::default(),
            notes: NotesConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.index.top_k < 1 {
        anyhow::bail!("index.top_k must be >= 1");
    }

    if config.agent.max_iterations < 1 {
        anyhow::bail!("agent.max_iterations must be >= 1");
    }

    if config.agent.history_capacity < 1 {
        anyhow::bail!("agent.history_capacity must be >= 1");
    }

    if config.data.tabular_globs.is_empty() || config.data.document_globs.is_empty() {
        anyhow::bail!("data.tabular_globs and data.document_globs must not be empty");
    }

    match config.llm.provider.as_str() {
        "groq" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be groq, openai, or ollama.",
            other
        ),
    }

    match config.notes.format.as_str() {
        "csv" | "text" => {}
        other => anyhow::bail!("Unknown notes format: '{}'. Must be csv or text.", other),
    }

    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}
