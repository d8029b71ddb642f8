//! Knowledge base orchestration: the document set plus its derived index.
//!
//! Uploads of new documents take the incremental path when an index exists;
//! everything else (removals, replaced documents, missing or unreadable
//! index) re-derives the whole index from the document set. Each mutation
//! holds the index write lock from the first document-set change to the save.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::{KnowledgeBaseConfig, RagConfig};
use crate::docset::DocumentSet;
use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::IndexHandle;
use crate::loader::{FileLoader, LoadReport};
use crate::retriever::Retriever;
use crate::store::{IndexStore, IndexWriter};

/// How an operation changed the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Only the new documents were embedded and appended.
    Incremental,
    /// The index was rebuilt from the whole document set.
    Full,
    /// The document set produced no chunks, so the index was deleted.
    Deleted,
    /// Nothing changed.
    Unchanged,
}

/// Outcome of an upload, removal or rebuild.
#[derive(Debug)]
pub struct IngestReport {
    pub mode: IngestMode,
    /// Names written to the document set by this operation.
    pub stored: Vec<String>,
    /// Documents loaded and chunked.
    pub documents: usize,
    /// Chunks embedded.
    pub chunks: usize,
    /// Per-file problems that did not stop the operation.
    pub warnings: Vec<RagError>,
    /// The index after the operation, `None` if there is none.
    pub index: Option<IndexHandle>,
}

impl IngestReport {
    fn unchanged(stored: Vec<String>, warnings: Vec<RagError>, index: Option<IndexHandle>) -> Self {
        Self { mode: IngestMode::Unchanged, stored, documents: 0, chunks: 0, warnings, index }
    }
}

/// Summary of the persisted index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub entries: usize,
    pub sources: usize,
    pub embedding_model: String,
    pub dimensions: usize,
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

/// What is in the knowledge base right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeBaseStatus {
    pub documents: Vec<String>,
    pub index: Option<IndexSummary>,
    /// Why the index could not be loaded, when it exists but is unreadable.
    pub index_error: Option<String>,
}

/// The document set and the vector index derived from it.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    documents: DocumentSet,
    store: IndexStore,
    chunker: RecursiveChunker,
    config: RagConfig,
}

impl KnowledgeBase {
    /// Open the knowledge base at the locations in `locations`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `config` is invalid or both locations
    /// are the same directory.
    pub fn open(
        locations: &KnowledgeBaseConfig,
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let absolute = |dir: &PathBuf| std::path::absolute(dir).unwrap_or_else(|_| dir.clone());
        if absolute(&locations.documents_dir) == absolute(&locations.index_dir) {
            return Err(RagError::Config(format!(
                "documents and index cannot share the directory {}",
                locations.documents_dir.display()
            )));
        }
        let chunker = RecursiveChunker::from_config(&config)?;
        let store = IndexStore::open(&locations.index_dir, embedder).with_embedding_timeout(config.embedding_timeout);
        Ok(Self { documents: DocumentSet::open(&locations.documents_dir), store, chunker, config })
    }

    pub fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Load the persisted index, `None` on first run.
    pub async fn load_index(&self) -> Result<Option<IndexHandle>> {
        self.store.load().await
    }

    /// A retriever bound to the latest persisted index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrieverNotReady`] if no index exists, or
    /// [`RagError::IndexCorrupt`] if it cannot be loaded.
    pub async fn retriever(&self) -> Result<Retriever> {
        let index = self.store.load().await?.ok_or(RagError::RetrieverNotReady)?;
        Ok(self.bind(index))
    }

    pub(crate) fn bind(&self, index: IndexHandle) -> Retriever {
        Retriever::from_config(index, self.store.embedder().clone(), &self.config)
    }

    /// Add files to the document set and update the index.
    ///
    /// Files with an unsupported extension or that cannot be copied are
    /// skipped and reported in [`IngestReport::warnings`]. If an index exists
    /// and no stored name replaced an existing document, only the new files
    /// are embedded; otherwise the index is rebuilt from the whole set.
    ///
    /// The document set and the index are updated under the index write
    /// lock, so concurrent mutations on the same index apply one after the
    /// other.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailed`] or [`RagError::Storage`] if the
    /// index update fails. Documents already copied stay in the set.
    pub async fn upload(&self, files: &[PathBuf]) -> Result<IngestReport> {
        let writer = self.store.writer().await;
        let mut warnings = Vec::new();
        let mut stored = Vec::new();
        let mut replaced_any = false;

        for file in files {
            if !FileLoader::is_supported(file) {
                warn!(path = %file.display(), "unsupported format, not stored");
                warnings.push(RagError::UnsupportedFormat { path: file.clone() });
                continue;
            }
            match self.documents.add_file(file).await {
                Ok((name, replaced)) => {
                    replaced_any |= replaced;
                    stored.push(name);
                }
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "could not store file");
                    warnings.push(err);
                }
            }
        }

        if stored.is_empty() {
            let index = writer.load().await.ok().flatten();
            return Ok(IngestReport::unchanged(stored, warnings, index));
        }

        let existing = if replaced_any {
            info!("re-uploaded document replaces an indexed one, rebuilding");
            None
        } else {
            match writer.load().await {
                Ok(index) => index,
                Err(err) => {
                    warn!(error = %err, "existing index unreadable, rebuilding");
                    None
                }
            }
        };

        let mut report = match existing {
            Some(index) => match self.add_to_index(&writer, &index, &stored).await {
                Ok(report) => report,
                Err(err @ RagError::IndexCorrupt { .. }) => {
                    warn!(error = %err, "index became unreadable, rebuilding");
                    self.rebuild_from_set(&writer).await?
                }
                Err(err) => return Err(err),
            },
            None => self.rebuild_from_set(&writer).await?,
        };

        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        report.stored = stored;
        Ok(report)
    }

    /// Delete a document and rebuild the index from the remaining set.
    ///
    /// Removing an unknown name changes nothing.
    pub async fn remove(&self, name: &str) -> Result<IngestReport> {
        let writer = self.store.writer().await;
        if !self.documents.remove(name).await? {
            let index = writer.load().await.ok().flatten();
            return Ok(IngestReport::unchanged(Vec::new(), Vec::new(), index));
        }
        self.rebuild_from_set(&writer).await
    }

    /// Re-derive the index from the document set.
    pub async fn rebuild(&self) -> Result<IngestReport> {
        let writer = self.store.writer().await;
        self.rebuild_from_set(&writer).await
    }

    /// Documents and index metadata.
    pub async fn status(&self) -> Result<KnowledgeBaseStatus> {
        let documents = self.documents.list().await?;
        let (index, index_error) = match self.store.load().await {
            Ok(Some(index)) => (
                Some(IndexSummary {
                    entries: index.len(),
                    sources: index.sources().len(),
                    embedding_model: index.embedding_model().to_string(),
                    dimensions: index.dimensions(),
                    generation: index.generation(),
                    updated_at: index.updated_at(),
                }),
                None,
            ),
            Ok(None) => (None, None),
            Err(err) => (None, Some(err.to_string())),
        };
        Ok(KnowledgeBaseStatus { documents, index, index_error })
    }

    async fn add_to_index(
        &self,
        writer: &IndexWriter<'_>,
        index: &IndexHandle,
        names: &[String],
    ) -> Result<IngestReport> {
        let paths = names.iter().map(|name| self.documents.path_of(name)).collect::<Result<Vec<_>>>()?;
        let loaded = self.load_documents(paths).await?;
        let chunks = self.chunker.chunk_all(&loaded.documents);
        let chunk_count = chunks.len();

        let updated = writer.add_incremental(index, chunks).await?;
        info!(
            index = %self.store.index_path().display(),
            documents = loaded.documents.len(),
            chunks = chunk_count,
            "incremental index update"
        );

        Ok(IngestReport {
            mode: IngestMode::Incremental,
            stored: Vec::new(),
            documents: loaded.documents.len(),
            chunks: chunk_count,
            warnings: loaded.warnings,
            index: Some(updated),
        })
    }

    async fn rebuild_from_set(&self, writer: &IndexWriter<'_>) -> Result<IngestReport> {
        let paths = self.documents.paths().await?;
        let loaded = self.load_documents(paths).await?;
        let chunks: Vec<Chunk> = self.chunker.chunk_all(&loaded.documents);
        let chunk_count = chunks.len();

        let index = writer.rebuild_full(chunks).await?;
        let mode = if index.is_some() { IngestMode::Full } else { IngestMode::Deleted };
        info!(
            index = %self.store.index_path().display(),
            ?mode,
            documents = loaded.documents.len(),
            chunks = chunk_count,
            "full index rebuild"
        );

        Ok(IngestReport {
            mode,
            stored: Vec::new(),
            documents: loaded.documents.len(),
            chunks: chunk_count,
            warnings: loaded.warnings,
            index,
        })
    }

    async fn load_documents(&self, paths: Vec<PathBuf>) -> Result<LoadReport> {
        tokio::task::spawn_blocking(move || FileLoader::load_all(&paths))
            .await
            .map_err(|err| RagError::storage(self.documents.dir(), err))
    }
}
