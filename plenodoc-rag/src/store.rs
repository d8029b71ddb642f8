//! Persistence for the vector index.
//!
//! The index lives in a single JSON file inside its directory. Writes go to a
//! temporary file that is synced and then renamed over the previous file, so
//! a crash mid-write leaves the last complete snapshot in place. Embeddings are
//! always computed before anything is written: an embedding failure never
//! touches the persisted index.
//!
//! All stores opened on the same directory within a process share one
//! reader-writer lock and one mutation epoch. Loads take the read side; every
//! embed-build-save sequence and deletion takes the write side and advances
//! the epoch. [`IndexStore::writer`] hands out the write side so callers can
//! keep the document set and the index consistent under one critical section.

use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::document::Chunk;
use crate::embedding::{EmbeddingProvider, embed_checked};
use crate::error::{RagError, Result};
use crate::index::{IndexHandle, VectorIndex};

/// File name of the persisted index inside the index directory.
pub const INDEX_FILE_NAME: &str = "index.json";

const TEMP_FILE_NAME: &str = "index.json.tmp";
const FORMAT_VERSION: u32 = 1;
const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    index: &'a VectorIndex,
}

#[derive(Deserialize)]
struct PersistedIndex {
    format_version: u32,
    index: VectorIndex,
}

/// Per-directory state shared by every store in this process.
#[derive(Debug, Default)]
struct Shared {
    lock: RwLock<()>,
    /// Bumped after every save or deletion, under the write lock.
    epoch: AtomicU64,
}

type Registry = Mutex<HashMap<PathBuf, Arc<Shared>>>;

fn shared_for(dir: &Path) -> Arc<Shared> {
    static DIRS: OnceLock<Registry> = OnceLock::new();
    let key = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    let mut dirs = DIRS.get_or_init(Default::default).lock().unwrap_or_else(PoisonError::into_inner);
    dirs.entry(key).or_default().clone()
}

/// Loads, builds and saves the vector index kept in one directory.
#[derive(Clone)]
pub struct IndexStore {
    dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_timeout: Duration,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("dir", &self.dir)
            .field("embedder", &self.embedder.name())
            .field("embedding_timeout", &self.embedding_timeout)
            .finish()
    }
}

impl IndexStore {
    /// A store for the index in `dir`, embedding with `embedder`.
    ///
    /// Nothing is read or created until the first operation.
    pub fn open(dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let dir = dir.into();
        let shared = shared_for(&dir);
        Self { dir, embedder, embedding_timeout: DEFAULT_EMBEDDING_TIMEOUT, shared }
    }

    /// Set the deadline for each embedding call.
    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Whether an index file is present. Says nothing about whether it loads.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(self.index_path()).await.unwrap_or(false)
    }

    /// Whether no store in this process has changed the index since `handle`
    /// was produced.
    pub fn is_current(&self, handle: &IndexHandle) -> bool {
        handle.epoch() == self.shared.epoch.load(Ordering::Acquire)
    }

    /// Take the write side of the directory lock.
    ///
    /// Every other load or mutation on this directory waits until the
    /// returned writer is dropped.
    pub async fn writer(&self) -> IndexWriter<'_> {
        IndexWriter { store: self, _guard: self.shared.lock.write().await }
    }

    /// Load the persisted index.
    ///
    /// Returns `Ok(None)` when no index has been built.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexCorrupt`] if the file cannot be read, does not
    /// parse, fails validation, or was built by a different embedding model.
    pub async fn load(&self) -> Result<Option<IndexHandle>> {
        let _guard = self.shared.lock.read().await;
        self.load_unlocked().await
    }

    /// Replace the index with one built from `chunks`.
    ///
    /// An empty `chunks` deletes the index and returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailed`] if embedding fails, in which case
    /// the persisted index is left untouched, or [`RagError::Storage`] if the
    /// new index cannot be written.
    pub async fn rebuild_full(&self, chunks: Vec<Chunk>) -> Result<Option<IndexHandle>> {
        self.writer().await.rebuild_full(chunks).await
    }

    /// Append `new_chunks` to the index and persist the result.
    ///
    /// Only the new chunks are embedded. The append is applied to the latest
    /// persisted snapshot, not to `existing`, so an outdated handle cannot
    /// discard another writer's changes. Entries whose source matches a
    /// source of `new_chunks` are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailed`] before anything is written,
    /// [`RagError::IndexCorrupt`] if the persisted snapshot cannot be loaded,
    /// or [`RagError::Storage`] if the result cannot be written.
    pub async fn add_incremental(&self, existing: &IndexHandle, new_chunks: Vec<Chunk>) -> Result<IndexHandle> {
        self.writer().await.add_incremental(existing, new_chunks).await
    }

    /// Remove the persisted index. Succeeds if there is none.
    ///
    /// Only the index files are removed; the directory itself goes only if
    /// nothing else is left in it.
    pub async fn delete(&self) -> Result<()> {
        self.writer().await.delete().await
    }

    async fn load_unlocked(&self) -> Result<Option<IndexHandle>> {
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        Ok(self.read_unlocked().await?.map(|index| IndexHandle::new(index, epoch)))
    }

    fn advance_epoch(&self) -> u64 {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    async fn embed(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        debug!(count = texts.len(), embedder = self.embedder.name(), "embedding chunks");
        embed_checked(self.embedder.as_ref(), &texts, self.embedding_timeout).await
    }

    async fn read_unlocked(&self) -> Result<Option<VectorIndex>> {
        let path = self.index_path();
        let corrupt = |message: String| RagError::IndexCorrupt { path: path.clone(), message };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(corrupt(err.to_string())),
        };

        let persisted: PersistedIndex =
            serde_json::from_slice(&bytes).map_err(|err| corrupt(err.to_string()))?;
        if persisted.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                persisted.format_version
            )));
        }

        let index = persisted.index;
        index.validate().map_err(corrupt)?;
        if index.embedding_model() != self.embedder.name() || index.dimensions() != self.embedder.dimensions() {
            return Err(corrupt(format!(
                "built with '{}' ({} dimensions) but the current embedder is '{}' ({} dimensions)",
                index.embedding_model(),
                index.dimensions(),
                self.embedder.name(),
                self.embedder.dimensions()
            )));
        }

        debug!(entries = index.len(), generation = index.generation(), "loaded index");
        Ok(Some(index))
    }

    /// Returns the epoch of the saved snapshot.
    async fn save_unlocked(&self, index: &VectorIndex) -> Result<u64> {
        index.validate().map_err(|message| RagError::IndexCorrupt { path: self.index_path(), message })?;

        let json = serde_json::to_vec(&PersistedIndexRef { format_version: FORMAT_VERSION, index })
            .map_err(|err| RagError::storage(self.index_path(), err))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| RagError::storage(&self.dir, err))?;

        let tmp = self.dir.join(TEMP_FILE_NAME);
        if let Err(err) = write_synced(&tmp, &json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(RagError::storage(&tmp, err));
        }
        if let Err(err) = tokio::fs::rename(&tmp, self.index_path()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(RagError::storage(self.index_path(), err));
        }
        Ok(self.advance_epoch())
    }

    async fn delete_unlocked(&self) -> Result<()> {
        for path in [self.dir.join(TEMP_FILE_NAME), self.index_path()] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(RagError::storage(&path, err)),
            }
        }
        // Fails unless empty, which leaves anything else in the directory alone.
        if tokio::fs::remove_dir(&self.dir).await.is_ok() {
            debug!(dir = %self.dir.display(), "removed empty index directory");
        }
        self.advance_epoch();
        Ok(())
    }
}

/// Exclusive access to one index directory.
///
/// Obtained from [`IndexStore::writer`]. Loads through a writer see the
/// latest persisted snapshot and nothing else can change it until the writer
/// is dropped.
pub struct IndexWriter<'a> {
    store: &'a IndexStore,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl IndexWriter<'_> {
    /// [`IndexStore::load`] without re-taking the lock.
    pub async fn load(&self) -> Result<Option<IndexHandle>> {
        self.store.load_unlocked().await
    }

    /// [`IndexStore::rebuild_full`] under this writer.
    pub async fn rebuild_full(&self, chunks: Vec<Chunk>) -> Result<Option<IndexHandle>> {
        let store = self.store;
        if chunks.is_empty() {
            info!(dir = %store.dir.display(), "no chunks left, deleting index");
            store.delete_unlocked().await?;
            return Ok(None);
        }

        let embeddings = store.embed(&chunks).await?;

        let previous_generation = match store.read_unlocked().await {
            Ok(previous) => previous.map(|index| index.generation()).unwrap_or(0),
            Err(err) => {
                warn!(error = %err, "replacing unreadable index");
                0
            }
        };

        let mut index = VectorIndex::new(store.embedder.name(), store.embedder.dimensions());
        index.extend(chunks, embeddings);
        index.stamp(previous_generation + 1);
        let epoch = store.save_unlocked(&index).await?;

        info!(entries = index.len(), generation = index.generation(), "rebuilt index");
        Ok(Some(IndexHandle::new(index, epoch)))
    }

    /// [`IndexStore::add_incremental`] under this writer.
    pub async fn add_incremental(&self, existing: &IndexHandle, new_chunks: Vec<Chunk>) -> Result<IndexHandle> {
        let store = self.store;
        if new_chunks.is_empty() {
            return Ok(self.load().await?.unwrap_or_else(|| existing.clone()));
        }

        let embeddings = store.embed(&new_chunks).await?;

        let mut index = match store.read_unlocked().await? {
            Some(index) => {
                if index.generation() != existing.generation() {
                    warn!(
                        handle_generation = existing.generation(),
                        persisted_generation = index.generation(),
                        "index handle is outdated, appending to the persisted snapshot"
                    );
                }
                index
            }
            None => {
                warn!(dir = %store.dir.display(), "index disappeared, starting a new one");
                VectorIndex::new(store.embedder.name(), store.embedder.dimensions())
            }
        };

        let sources: BTreeSet<String> = new_chunks.iter().map(|chunk| chunk.source.clone()).collect();
        let replaced = index.remove_sources(&sources);
        if replaced > 0 {
            debug!(replaced, "replacing entries of re-added sources");
        }

        let added = new_chunks.len();
        index.extend(new_chunks, embeddings);
        index.stamp(index.generation() + 1);
        let epoch = store.save_unlocked(&index).await?;

        info!(added, entries = index.len(), generation = index.generation(), "extended index");
        Ok(IndexHandle::new(index, epoch))
    }

    /// [`IndexStore::delete`] under this writer.
    pub async fn delete(&self) -> Result<()> {
        self.store.delete_unlocked().await
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
