//! Index Store and Index Resolver for document sources.
//!
//! A document index is persisted as one directory per logical name:
//!
//! ```text
//! <index.dir>/
//! └── canada/
//!     ├── manifest.json   logical name, source fingerprint, chunk count, build time
//!     └── index.json      chunks + optional embedding vectors
//! ```
//!
//! [`IndexResolver::resolve`] is a cache-or-build operation: if the
//! directory exists it is loaded and returned as-is, otherwise the index
//! is built from the raw documents and persisted before returning. The
//! directory's existence is the only staleness signal. A changed source
//! file keeps using the persisted index; the mismatch is logged, never
//! acted on.
//!
//! Builds are written to a temporary sibling directory and renamed into
//! place, so an interrupted build never leaves a half-written directory
//! that would later be treated as authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::chunk::{chunk_text, content_hash};
use crate::config::EmbeddingConfig;
use crate::embedding::{cosine_similarity, create_provider, embed_query, embed_texts};
use crate::error::FolioError;
use crate::models::{Chunk, Document};

const INDEX_FILE: &str = "index.json";
const MANIFEST_FILE: &str = "manifest.json";
const FORMAT_VERSION: u32 = 1;

/// Persisted index payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIndex {
    pub chunks: Vec<Chunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vec<Vec<f32>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

/// Descriptive metadata written next to the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub logical_name: String,
    /// SHA-256 of the raw text the index was built from.
    pub fingerprint: String,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

/// A usable index, either freshly built or loaded from the store.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    pub manifest: IndexManifest,
    pub index: StoredIndex,
}

/// How [`IndexResolver::resolve_with_outcome`] obtained the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Loaded,
    Built,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Loaded => "loaded",
            Resolution::Built => "built",
        }
    }
}

/// A retrieved chunk with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
}

/// On-disk store of persisted indices, keyed by logical name.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    pub fn load(&self, name: &str) -> Result<IndexHandle, FolioError> {
        let dir = self.path_for(name);
        let load_err = |detail: String| FolioError::IndexLoad {
            name: name.to_string(),
            detail,
        };

        let manifest: IndexManifest = read_json(&dir.join(MANIFEST_FILE)).map_err(load_err)?;
        let index: StoredIndex = read_json(&dir.join(INDEX_FILE)).map_err(load_err)?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(load_err(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if let Some(vectors) = &index.vectors {
            if vectors.len() != index.chunks.len() {
                return Err(load_err(format!(
                    "{} vectors for {} chunks",
                    vectors.len(),
                    index.chunks.len()
                )));
            }
        }

        Ok(IndexHandle { manifest, index })
    }

    pub fn persist(&self, handle: &IndexHandle) -> Result<(), FolioError> {
        let name = &handle.manifest.logical_name;
        let persist_err = |detail: String| FolioError::IndexPersist {
            name: name.clone(),
            detail,
        };

        std::fs::create_dir_all(&self.root).map_err(|e| persist_err(e.to_string()))?;

        let staging = self
            .root
            .join(format!(".{}.tmp-{}", name, Uuid::new_v4().simple()));
        std::fs::create_dir(&staging).map_err(|e| persist_err(e.to_string()))?;

        let written = write_json(&staging.join(INDEX_FILE), &handle.index)
            .and_then(|_| write_json(&staging.join(MANIFEST_FILE), &handle.manifest))
            .and_then(|_| {
                std::fs::rename(&staging, self.path_for(name)).map_err(|e| e.to_string())
            });

        if let Err(detail) = written {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(persist_err(detail));
        }
        Ok(())
    }

    /// Delete the persisted index for `name`, if any. Returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool, FolioError> {
        let dir = self.path_for(name);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir).map_err(|e| FolioError::IndexPersist {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        Ok(true)
    }
}

/// Loads persisted indices or builds and persists new ones.
#[derive(Debug, Clone)]
pub struct IndexResolver {
    store: IndexStore,
    max_tokens: usize,
    embedding: EmbeddingConfig,
}

impl IndexResolver {
    pub fn new(store: IndexStore, max_tokens: usize, embedding: EmbeddingConfig) -> Self {
        Self {
            store,
            max_tokens,
            embedding,
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn embedding(&self) -> &EmbeddingConfig {
        &self.embedding
    }

    pub async fn resolve(&self, raw: &[Document], name: &str) -> Result<IndexHandle, FolioError> {
        self.resolve_with_outcome(raw, name)
            .await
            .map(|(handle, _)| handle)
    }

    pub async fn resolve_with_outcome(
        &self,
        raw: &[Document],
        name: &str,
    ) -> Result<(IndexHandle, Resolution), FolioError> {
        if self.store.exists(name) {
            let handle = self.store.load(name)?;
            let fingerprint = fingerprint(raw);
            if handle.manifest.fingerprint != fingerprint {
                tracing::warn!(
                    index = name,
                    built_at = %handle.manifest.built_at,
                    "source changed since index was built; using persisted index"
                );
            }
            tracing::info!(index = name, chunks = handle.index.chunks.len(), "loaded index");
            return Ok((handle, Resolution::Loaded));
        }

        tracing::info!(index = name, "building index");
        let handle = self.build(raw, name).await?;
        self.store.persist(&handle)?;
        Ok((handle, Resolution::Built))
    }

    async fn build(&self, raw: &[Document], name: &str) -> Result<IndexHandle, FolioError> {
        let chunks = chunk_text(&joined_text(raw), self.max_tokens);

        if chunks.is_empty() {
            return Err(FolioError::IndexBuild {
                name: name.to_string(),
                detail: "no text to index".to_string(),
            });
        }

        let (vectors, embedding_model) = if self.embedding.is_enabled() {
            let build_err = |e: anyhow::Error| FolioError::IndexBuild {
                name: name.to_string(),
                detail: format!("{:#}", e),
            };
            let provider = create_provider(&self.embedding).map_err(build_err)?;
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embed_texts(&self.embedding, &texts)
                .await
                .map_err(build_err)?;
            if let Some(v) = vectors.iter().find(|v| v.len() != provider.dims()) {
                return Err(build_err(anyhow::anyhow!(
                    "expected {}-dimensional vectors from {}, got {}",
                    provider.dims(),
                    provider.model_name(),
                    v.len()
                )));
            }
            (Some(vectors), Some(provider.model_name().to_string()))
        } else {
            (None, None)
        };

        Ok(IndexHandle {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                logical_name: name.to_string(),
                fingerprint: fingerprint(raw),
                chunk_count: chunks.len(),
                built_at: Utc::now(),
            },
            index: StoredIndex {
                chunks,
                vectors,
                embedding_model,
            },
        })
    }
}

impl IndexHandle {
    pub fn name(&self) -> &str {
        &self.manifest.logical_name
    }

    /// Retrieve the `top_k` most relevant chunks for `query`.
    ///
    /// Uses cosine similarity when the index carries vectors from the
    /// configured embedding model; term-overlap scoring otherwise.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        embedding: &EmbeddingConfig,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let mut scored = match (&self.index.vectors, embedding.is_enabled()) {
            (Some(vectors), true) if self.embedded_with(embedding) => {
                let query_vec = embed_query(embedding, query).await?;
                self.index
                    .chunks
                    .iter()
                    .zip(vectors.iter())
                    .map(|(c, v)| ScoredChunk {
                        chunk_index: c.chunk_index,
                        text: c.text.clone(),
                        score: cosine_similarity(&query_vec, v) as f64,
                    })
                    .collect::<Vec<_>>()
            }
            (Some(_), true) => {
                tracing::warn!(
                    index = %self.name(),
                    stored = self.index.embedding_model.as_deref().unwrap_or("unknown"),
                    configured = embedding.model.as_deref().unwrap_or("unknown"),
                    "index vectors come from another embedding model; using keyword retrieval"
                );
                self.keyword_scores(query)
            }
            _ => self.keyword_scores(query),
        };

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    fn embedded_with(&self, embedding: &EmbeddingConfig) -> bool {
        let Ok(provider) = create_provider(embedding) else {
            return false;
        };
        let dims_match = self
            .index
            .vectors
            .as_ref()
            .and_then(|v| v.first())
            .map_or(true, |v| v.len() == provider.dims());
        dims_match && self.index.embedding_model.as_deref() == Some(provider.model_name())
    }

    // Leading chunks still come back for queries with no overlapping terms
    // (e.g. "summarize this document"), so every query gets some context.
    fn keyword_scores(&self, query: &str) -> Vec<ScoredChunk> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
            .collect();

        self.index
            .chunks
            .iter()
            .map(|c| {
                let text_lower = c.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                ScoredChunk {
                    chunk_index: c.chunk_index,
                    text: c.text.clone(),
                    score: matches as f64,
                }
            })
            .collect()
    }
}

/// Fingerprint of a raw document batch.
pub fn fingerprint(raw: &[Document]) -> String {
    content_hash(&joined_text(raw))
}

fn joined_text(raw: &[Document]) -> String {
    raw.iter()
        .map(|d| d.body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let content = serde_json::to_string(value).map_err(|e| e.to_string())?;
    std::fs::write(path, content).map_err(|e| format!("{}: {}", path.display(), e))
}
