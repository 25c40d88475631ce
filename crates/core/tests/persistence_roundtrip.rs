use edurag_core::{
    ArtifactPaths, CharacterNgramEmbedder, ChunkingConfig, Document, RetrievalError,
    RetrievalStore, SourceType,
};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn store(dimensions: usize) -> RetrievalStore {
    RetrievalStore::new(
        Arc::new(CharacterNgramEmbedder::new(dimensions)),
        ChunkingConfig::new(12, 3).unwrap(),
    )
    .unwrap()
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "os.txt",
            "a process owns an address space and one or more threads; the scheduler picks \
             which thread runs next and context switches save registers to the process \
             control block",
            SourceType::Txt,
        ),
        Document::new(
            "db.txt",
            "a b-tree keeps keys sorted in wide nodes so lookups touch few disk pages; \
             write ahead logging makes commits durable before pages are flushed",
            SourceType::Txt,
        ),
        Document::new(
            "net.txt",
            "tcp retransmits lost segments and uses a sliding window for flow control \
             while udp sends datagrams without delivery guarantees",
            SourceType::Txt,
        ),
    ]
}

#[test]
fn reload_in_fresh_store_reproduces_search_results() {
    let dir = tempdir().unwrap();
    let original = store(128);
    let summary = original.index_documents(&corpus()).unwrap();
    assert_eq!(summary.documents, 3);
    original.persist(dir.path()).unwrap();

    let restored = store(128);
    assert!(restored.reload(dir.path()));
    assert_eq!(restored.chunk_count(), summary.chunks);
    assert_eq!(restored.filenames(), original.filenames());

    for query in [
        "how does the scheduler switch threads",
        "durable commits",
        "sliding window flow control",
    ] {
        assert_eq!(
            original.search(query, 4).unwrap(),
            restored.search(query, 4).unwrap(),
            "results differ for {query:?}"
        );
    }
}

#[test]
fn missing_artifact_keeps_previous_state() {
    let dir = tempdir().unwrap();
    let original = store(128);
    original.index_documents(&corpus()).unwrap();
    original.persist(dir.path()).unwrap();
    fs::remove_file(ArtifactPaths::new(dir.path()).metadata()).unwrap();

    let restored = store(128);
    restored
        .index_documents(&[Document::new("kept.txt", "kept content", SourceType::Txt)])
        .unwrap();
    assert!(!restored.reload(dir.path()));
    assert_eq!(restored.filenames(), vec!["kept.txt"]);
}

#[test]
fn tampered_metadata_is_refused() {
    let dir = tempdir().unwrap();
    let original = store(128);
    original.index_documents(&corpus()).unwrap();
    original.persist(dir.path()).unwrap();

    let metadata = ArtifactPaths::new(dir.path()).metadata();
    let edited = fs::read_to_string(&metadata).unwrap().replace("tcp", "xyz");
    fs::write(&metadata, edited).unwrap();

    let restored = store(128);
    assert!(!restored.reload(dir.path()));
    assert!(!restored.is_loaded());
}

#[test]
fn different_embedder_dimension_is_refused() {
    let dir = tempdir().unwrap();
    let original = store(128);
    original.index_documents(&corpus()).unwrap();
    original.persist(dir.path()).unwrap();

    let other = store(64);
    assert!(!other.reload(dir.path()));
    assert!(other.search("tcp", 3).unwrap().is_empty());
}

#[test]
fn persisting_without_an_index_fails() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        store(128).persist(dir.path()),
        Err(RetrievalError::IndexNotBuilt)
    ));
    assert!(!ArtifactPaths::new(dir.path()).index_exists());
}
