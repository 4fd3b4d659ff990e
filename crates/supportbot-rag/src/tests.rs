//! Pipeline tests over a temporary knowledge base

use std::path::Path;
use std::sync::Arc;

use insta::assert_snapshot;
use serde_json::json;
use tempfile::TempDir;

use supportbot_core::{
    AppConfig, DocumentIndexer, IndexingConfig, RAGEngine, RAGQuery, VectorDocument,
};

use crate::{DirectoryIndexer, FlatL2Index, HashingEmbedder, RagPipeline};

const RETURNS: &str = "Our return policy allows returns within 30 days of delivery. \
Items must be unused and in the original packaging. Refunds are issued to the original payment method.";

const SHIPPING: &str = "# Shipping\n\nStandard shipping takes 5-7 business days. \
Express shipping arrives in 2 business days. Orders over $50 ship free.";

async fn knowledge_base() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("returns.txt"), RETURNS).await.unwrap();
    tokio::fs::write(dir.path().join("shipping.md"), SHIPPING).await.unwrap();
    tokio::fs::write(dir.path().join("notes.csv"), "ignored,file").await.unwrap();
    dir
}

fn pipeline(data_dir: &Path, store_path: &Path) -> RagPipeline {
    RagPipeline::new(
        data_dir,
        store_path,
        Arc::new(HashingEmbedder::default()),
        IndexingConfig::default(),
        3,
    )
    .unwrap()
}

#[tokio::test]
async fn builds_and_persists_index() {
    let kb = knowledge_base().await;
    let store_path = kb.path().join("index").join("vector_store.json");

    let mut rag = pipeline(kb.path(), &store_path);
    assert!(!rag.is_ready());

    rag.initialize(false).await.unwrap();
    assert!(rag.is_ready());
    assert_eq!(rag.chunk_count(), 2);
    assert!(tokio::fs::try_exists(&store_path).await.unwrap());

    let stats = rag.stats().await.unwrap();
    assert_eq!(stats["chunks"], json!(2));
    assert_eq!(stats["dimension"], json!(384));
}

#[tokio::test]
async fn retrieves_the_relevant_document_first() {
    let kb = knowledge_base().await;
    let mut rag = pipeline(kb.path(), &kb.path().join("vector_store.json"));
    rag.initialize(false).await.unwrap();

    let result = rag
        .retrieve(&RAGQuery::new("what is your return policy for refunds", 1))
        .await
        .unwrap();

    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].source(), "returns.txt");
    assert!(result.context.starts_with("[Source: returns.txt]\n"));
}

#[tokio::test]
async fn reuses_persisted_index_unless_forced() {
    let kb = knowledge_base().await;
    let store_path = kb.path().join("vector_store.json");

    let mut first = pipeline(kb.path(), &store_path);
    first.initialize(false).await.unwrap();

    // New documents are only picked up by a forced rebuild
    tokio::fs::write(kb.path().join("warranty.txt"), "All electronics carry a one year warranty.")
        .await
        .unwrap();

    let mut second = pipeline(kb.path(), &store_path);
    second.initialize(false).await.unwrap();
    assert_eq!(second.chunk_count(), 2);

    second.initialize(true).await.unwrap();
    assert_eq!(second.chunk_count(), 3);
}

#[tokio::test]
async fn extra_files_extend_the_saved_index() {
    let kb = knowledge_base().await;
    let extra = tempfile::tempdir().unwrap();
    let warranty = extra.path().join("warranty.txt");
    tokio::fs::write(&warranty, "All electronics carry a one year warranty.")
        .await
        .unwrap();
    let store_path = kb.path().join("vector_store.json");

    let mut rag = pipeline(kb.path(), &store_path);
    rag.initialize(false).await.unwrap();

    let files = vec![warranty.clone(), extra.path().join("missing.txt")];
    let result = rag.index_files(&files).await.unwrap();
    assert_eq!(result.documents_indexed, 1);
    assert_eq!(result.chunks_indexed, 1);
    assert_eq!(result.documents_failed, 1);
    assert_eq!(rag.chunk_count(), 3);

    // Indexing the same file again replaces its chunk
    rag.index_files(&[warranty]).await.unwrap();
    assert_eq!(rag.chunk_count(), 3);

    let mut reloaded = pipeline(kb.path(), &store_path);
    reloaded.initialize(false).await.unwrap();
    assert_eq!(reloaded.chunk_count(), 3);
}

#[tokio::test]
async fn empty_knowledge_base_retrieves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("vector_store.json");

    let mut rag = pipeline(dir.path(), &store_path);
    rag.initialize(false).await.unwrap();

    assert!(!rag.is_ready());
    assert_eq!(rag.chunk_count(), 0);
    assert!(!tokio::fs::try_exists(&store_path).await.unwrap());

    let result = rag.retrieve(&RAGQuery::new("shipping", 3)).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(rag.get_context_for_query("shipping").await, "");
}

#[tokio::test]
async fn missing_data_dir_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut rag = pipeline(&dir.path().join("nope"), &dir.path().join("vs.json"));
    rag.initialize(false).await.unwrap();
    assert_eq!(rag.chunk_count(), 0);
}

#[tokio::test]
async fn corrupt_index_is_rebuilt() {
    let kb = knowledge_base().await;
    let store_path = kb.path().join("vector_store.json");
    tokio::fs::write(&store_path, "{not json").await.unwrap();

    let mut rag = pipeline(kb.path(), &store_path);
    rag.initialize(false).await.unwrap();
    assert_eq!(rag.chunk_count(), 2);
}

#[test]
fn context_format() {
    let rag = pipeline(Path::new("data"), Path::new("data/vector_store.json"));
    let docs = vec![
        VectorDocument {
            id: "a-0".to_string(),
            content: "Returns within 30 days.".to_string(),
            embedding: None,
            metadata: json!({"source": "returns.txt", "chunk_id": 0}),
            score: Some(0.5),
        },
        VectorDocument {
            id: "b-0".to_string(),
            content: "Free shipping over $50.".to_string(),
            embedding: None,
            metadata: json!({"source": "shipping.md", "chunk_id": 0}),
            score: Some(0.75),
        },
    ];

    assert_snapshot!(rag.build_context(&docs), @r"
    [Source: returns.txt]
    Returns within 30 days.

    ---

    [Source: shipping.md]
    Free shipping over $50.
    ");
    assert_eq!(rag.build_context(&[]), "");
}

#[tokio::test]
async fn indexer_chunks_with_metadata() {
    let kb = knowledge_base().await;
    let store = Arc::new(FlatL2Index::new());
    let indexer = DirectoryIndexer::new(
        store.clone(),
        Arc::new(HashingEmbedder::new(32)),
        IndexingConfig {
            chunk_size: 60,
            chunk_overlap: 10,
            batch_size: 2,
        },
    )
    .unwrap();

    let result = indexer.index_directory(kb.path()).await.unwrap();
    assert_eq!(result.documents_indexed, 2);
    assert_eq!(result.documents_failed, 0);
    assert!(result.chunks_indexed > 2);

    let (documents, _) = indexer.load_documents(kb.path()).await.unwrap();
    let sources: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(sources, vec!["returns.txt", "shipping.md"]);

    let chunks = indexer.chunk_documents(&documents);
    assert_eq!(chunks[0].metadata, json!({"source": "returns.txt", "chunk_id": 0}));
    assert_eq!(chunks[1].metadata["chunk_id"], json!(1));
    assert_eq!(store.len(), result.chunks_indexed);
}

#[test]
fn overlapping_config_is_rejected() {
    let err = DirectoryIndexer::new(
        Arc::new(FlatL2Index::new()),
        Arc::new(HashingEmbedder::default()),
        IndexingConfig {
            chunk_size: 50,
            chunk_overlap: 50,
            batch_size: 4,
        },
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("chunk_overlap"));
}

#[test]
fn from_config_uses_json_store_path() {
    let rag = RagPipeline::from_config(&AppConfig::default()).unwrap();
    assert_eq!(rag.store_path(), Path::new("data/vector_store.json"));
    assert_eq!(rag.default_top_k(), 3);
}
