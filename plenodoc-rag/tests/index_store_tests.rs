//! Tests for the persisted index lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use plenodoc_rag::{
    Chunk, Document, EmbeddingProvider, HashingEmbedder, INDEX_FILE_NAME, IndexStore, RagError, Retriever, split,
};

const DIMS: usize = 64;

fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbedder::new(DIMS))
}

fn chunks_of(documents: &[(&str, &str)]) -> Vec<Chunk> {
    let documents: Vec<Document> = documents.iter().map(|(name, text)| Document::new(*name, *text)).collect();
    split(&documents, 60, 10).unwrap()
}

const SKY: (&str, &str) = ("sky.txt", "The sky is blue on a clear day. At sunset the sky turns orange and red.");
const GRASS: (&str, &str) = ("grass.txt", "Grass is green because of chlorophyll. Dry grass turns yellow in summer.");
const SEA: (&str, &str) = ("sea.txt", "The sea is salty. Waves are driven by wind blowing across the water.");

async fn top_ids(retriever: &Retriever, query: &str, k: usize) -> Vec<String> {
    retriever.retrieve(query, k).await.unwrap().into_iter().map(|c| c.id).collect()
}

#[tokio::test]
async fn load_without_index_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path().join("vector_index"), embedder());
    assert!(store.load().await.unwrap().is_none());
    assert!(!store.exists().await);
}

#[tokio::test]
async fn incremental_add_matches_full_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let incremental = IndexStore::open(dir.path().join("incremental"), embedder());
    let full = IndexStore::open(dir.path().join("full"), embedder());

    let first = incremental.rebuild_full(chunks_of(&[SKY])).await.unwrap().unwrap();
    let grown = incremental.add_incremental(&first, chunks_of(&[GRASS])).await.unwrap();
    let rebuilt = full.rebuild_full(chunks_of(&[SKY, GRASS])).await.unwrap().unwrap();

    assert_eq!(grown.len(), rebuilt.len());
    assert_eq!(grown.generation(), 2);

    let a = Retriever::new(grown, embedder());
    let b = Retriever::new(rebuilt, embedder());
    for query in ["what color is the sky", "why is grass green", "summer", "orange sunset"] {
        assert_eq!(top_ids(&a, query, 3).await, top_ids(&b, query, 3).await, "query {query:?}");
    }
}

#[tokio::test]
async fn add_incremental_only_embeds_new_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let counting = Arc::new(CountingEmbedder::default());
    let store = IndexStore::open(dir.path(), counting.clone());

    let sky = chunks_of(&[SKY]);
    let grass = chunks_of(&[GRASS]);
    let grass_len = grass.len();

    let first = store.rebuild_full(sky).await.unwrap().unwrap();
    let before = counting.embedded();
    store.add_incremental(&first, grass).await.unwrap();
    assert_eq!(counting.embedded() - before, grass_len);
}

#[tokio::test]
async fn persisted_index_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path(), embedder());
    let built = store.rebuild_full(chunks_of(&[SKY, SEA])).await.unwrap().unwrap();

    assert!(store.exists().await);
    let loaded = IndexStore::open(dir.path(), embedder()).load().await.unwrap().unwrap();
    assert_eq!(loaded.entries(), built.entries());
    assert_eq!(loaded.embedding_model(), "hashing-64");
    assert_eq!(loaded.generation(), 1);
}

#[tokio::test]
async fn truncated_index_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path(), embedder());
    store.rebuild_full(chunks_of(&[SKY])).await.unwrap();

    let path = dir.path().join(INDEX_FILE_NAME);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let err = store.load().await.unwrap_err();
    assert!(matches!(err, RagError::IndexCorrupt { .. }), "got {err:?}");
    assert!(err.is_recoverable());

    // A full rebuild recovers.
    let rebuilt = store.rebuild_full(chunks_of(&[SKY])).await.unwrap().unwrap();
    assert_eq!(rebuilt.generation(), 1);
    assert!(store.load().await.unwrap().is_some());
}

#[tokio::test]
async fn index_from_another_embedder_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    IndexStore::open(dir.path(), embedder()).rebuild_full(chunks_of(&[SKY])).await.unwrap();

    let other = IndexStore::open(dir.path(), Arc::new(HashingEmbedder::new(32)));
    assert!(matches!(other.load().await, Err(RagError::IndexCorrupt { .. })));
}

#[tokio::test]
async fn embedding_failure_leaves_index_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path(), embedder());
    let first = store.rebuild_full(chunks_of(&[SKY])).await.unwrap().unwrap();
    let before = std::fs::read(dir.path().join(INDEX_FILE_NAME)).unwrap();

    let failing = IndexStore::open(dir.path(), Arc::new(FailingEmbedder));
    assert!(matches!(failing.rebuild_full(chunks_of(&[GRASS])).await, Err(RagError::EmbeddingFailed { .. })));
    assert!(matches!(
        failing.add_incremental(&first, chunks_of(&[GRASS])).await,
        Err(RagError::EmbeddingFailed { .. })
    ));

    assert_eq!(std::fs::read(dir.path().join(INDEX_FILE_NAME)).unwrap(), before);
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "no temporary files left behind");
}

#[tokio::test]
async fn empty_rebuild_deletes_index() {
    let dir = tempfile::tempdir().unwrap();
    let index_dir = dir.path().join("vector_index");
    let store = IndexStore::open(&index_dir, embedder());
    store.rebuild_full(chunks_of(&[SKY])).await.unwrap();

    assert!(store.rebuild_full(Vec::new()).await.unwrap().is_none());
    assert!(!index_dir.exists());
    assert!(store.load().await.unwrap().is_none());

    store.delete().await.unwrap();
}

#[tokio::test]
async fn deleting_the_index_keeps_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "not part of the index").unwrap();
    let store = IndexStore::open(dir.path(), embedder());
    store.rebuild_full(chunks_of(&[SKY])).await.unwrap();
    std::fs::write(dir.path().join("index.json.tmp"), b"leftover").unwrap();

    assert!(store.rebuild_full(Vec::new()).await.unwrap().is_none());
    assert!(notes.is_file());
    assert!(!dir.path().join(INDEX_FILE_NAME).exists());
    assert!(!dir.path().join("index.json.tmp").exists());

    store.delete().await.unwrap();
    assert!(notes.is_file());
}

#[tokio::test]
async fn handles_go_stale_when_another_store_mutates() {
    let dir = tempfile::tempdir().unwrap();
    let first = IndexStore::open(dir.path().join("vector_index"), embedder());
    let second = IndexStore::open(dir.path().join("vector_index"), embedder());

    let handle = first.rebuild_full(chunks_of(&[SKY])).await.unwrap().unwrap();
    assert!(first.is_current(&handle));
    assert!(second.is_current(&second.load().await.unwrap().unwrap()));

    second.add_incremental(&handle, chunks_of(&[GRASS])).await.unwrap();
    assert!(!first.is_current(&handle));
    let reloaded = first.load().await.unwrap().unwrap();
    assert!(first.is_current(&reloaded));

    second.delete().await.unwrap();
    assert!(!first.is_current(&reloaded));
}

#[tokio::test]
async fn outdated_handle_appends_to_latest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path(), embedder());
    let stale = store.rebuild_full(chunks_of(&[SKY])).await.unwrap().unwrap();

    store.add_incremental(&stale, chunks_of(&[GRASS])).await.unwrap();
    let latest = store.add_incremental(&stale, chunks_of(&[SEA])).await.unwrap();

    let sources: Vec<_> = latest.sources().into_iter().collect();
    assert_eq!(sources, vec!["grass.txt", "sea.txt", "sky.txt"]);
    assert_eq!(latest.generation(), 3);
}

#[tokio::test]
async fn re_added_source_replaces_its_entries() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path(), embedder());
    let first = store.rebuild_full(chunks_of(&[SKY, GRASS])).await.unwrap().unwrap();

    let updated = store.add_incremental(&first, chunks_of(&[("sky.txt", "The sky is grey.")])).await.unwrap();
    let sky: Vec<_> = updated.entries().iter().filter(|e| e.chunk.source == "sky.txt").collect();
    assert_eq!(sky.len(), 1);
    assert_eq!(sky[0].chunk.text, "The sky is grey.");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_do_not_lose_updates() {
    let dir = tempfile::tempdir().unwrap();
    let base = IndexStore::open(dir.path(), embedder()).rebuild_full(chunks_of(&[SKY])).await.unwrap().unwrap();

    let a = IndexStore::open(dir.path(), embedder());
    let b = IndexStore::open(dir.path(), embedder());
    let (base_a, base_b) = (base.clone(), base.clone());
    let first = tokio::spawn(async move { a.add_incremental(&base_a, chunks_of(&[GRASS])).await });
    let second = tokio::spawn(async move { b.add_incremental(&base_b, chunks_of(&[SEA])).await });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let latest = IndexStore::open(dir.path(), embedder()).load().await.unwrap().unwrap();
    assert_eq!(latest.sources().len(), 3);
    assert_eq!(latest.generation(), 3);
}

#[tokio::test]
async fn zero_entry_index_retrieves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(INDEX_FILE_NAME),
        r#"{"format_version":1,"index":{"embedding_model":"hashing-64","dimensions":64,"generation":1,
            "updated_at":"2026-01-01T00:00:00Z","entries":[]}}"#,
    )
    .unwrap();

    let index = IndexStore::open(dir.path(), embedder()).load().await.unwrap().unwrap();
    assert!(index.is_empty());
    let retriever = Retriever::new(index, embedder());
    assert!(retriever.retrieve("anything", 4).await.unwrap().is_empty());
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "hashing-64"
    }

    async fn embed(&self, _text: &str) -> plenodoc_rag::Result<Vec<f32>> {
        Err(RagError::EmbeddingFailed { provider: "failing".into(), message: "offline".into() })
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

#[derive(Default)]
struct CountingEmbedder {
    inner: HashingEmbedder,
    count: std::sync::atomic::AtomicUsize,
}

impl CountingEmbedder {
    fn embedded(&self) -> usize {
        self.count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> plenodoc_rag::Result<Vec<f32>> {
        self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
