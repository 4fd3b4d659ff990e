//! RAG pipeline: load, chunk, embed, index, retrieve

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use supportbot_core::{
    AppConfig, DocumentIndexer, Embedder, IndexingConfig, IndexingResult, RAGEngine, RAGQuery,
    RAGResult, Result, SearchConfig, VectorDocument, VectorStore,
};

use crate::document_indexer::DirectoryIndexer;
use crate::embedding::embedder_from_config;
use crate::vector_store::FlatL2Index;

/// Separator placed between retrieved chunks in the prompt context
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Retrieval pipeline over a local document directory
pub struct RagPipeline {
    store: Arc<FlatL2Index>,
    embedder: Arc<dyn Embedder>,
    indexer: DirectoryIndexer<FlatL2Index>,
    data_dir: PathBuf,
    store_path: PathBuf,
    top_k: usize,
    initialized: bool,
}

impl RagPipeline {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        indexing: IndexingConfig,
        top_k: usize,
    ) -> Result<Self> {
        let store = Arc::new(FlatL2Index::new());
        let indexer = DirectoryIndexer::new(store.clone(), embedder.clone(), indexing)?;

        Ok(Self {
            store,
            embedder,
            indexer,
            data_dir: data_dir.into(),
            store_path: store_path.into(),
            top_k: top_k.max(1),
            initialized: false,
        })
    }

    /// Build a pipeline from the application settings
    ///
    /// The index is persisted next to `vector_store_path` with a `.json` extension.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder = embedder_from_config(config)?;
        let indexing = IndexingConfig {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            ..IndexingConfig::default()
        };

        Self::new(
            config.data_dir.clone(),
            config.vector_store_path.with_extension("json"),
            embedder,
            indexing,
            config.top_k_retrieval,
        )
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Try the persisted index; `false` means it must be rebuilt
    async fn load_persisted(&self) -> bool {
        if !tokio::fs::try_exists(&self.store_path).await.unwrap_or(false) {
            return false;
        }

        match self.store.load(&self.store_path).await {
            Ok(0) => false,
            Ok(count) => {
                let expected = self.embedder.dimension();
                if self.store.dimension() != Some(expected) {
                    warn!(
                        stored = ?self.store.dimension(),
                        expected,
                        "persisted index was built with a different embedder, rebuilding"
                    );
                    return false;
                }
                info!(chunks = count, "loaded existing vector store");
                true
            }
            Err(e) => {
                warn!(error = %e, "could not load persisted vector store, rebuilding");
                false
            }
        }
    }

    async fn rebuild(&self) -> Result<usize> {
        info!(dir = %self.data_dir.display(), "building new vector store");
        self.store.clear().await?;

        let result = self.indexer.index_directory(&self.data_dir).await?;
        if result.chunks_indexed == 0 {
            warn!(dir = %self.data_dir.display(), "no documents found to index");
            return Ok(0);
        }

        self.store.save(&self.store_path).await?;
        info!(
            documents = result.documents_indexed,
            chunks = result.chunks_indexed,
            failed = result.documents_failed,
            "built vector store"
        );
        Ok(result.chunks_indexed)
    }

    /// Context string for a query, empty when nothing is retrieved or retrieval fails
    pub async fn get_context_for_query(&self, query: &str) -> String {
        match self.retrieve(&RAGQuery::new(query, self.top_k)).await {
            Ok(result) => result.context,
            Err(e) => {
                error!(error = %e, "error getting context");
                String::new()
            }
        }
    }

    /// Add individual files to the current index and persist it
    ///
    /// A file indexed again replaces its earlier chunks. Files that fail are
    /// logged and counted in the result.
    pub async fn index_files(&self, paths: &[PathBuf]) -> Result<IndexingResult> {
        let mut total = IndexingResult::default();

        for path in paths {
            match self.indexer.index_from_file(path).await {
                Ok(result) => {
                    info!(file = %path.display(), chunks = result.chunks_indexed, "indexed file");
                    total.merge(result);
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "error indexing file");
                    total.merge(IndexingResult {
                        documents_failed: 1,
                        errors: vec![format!("{}: {}", path.display(), e)],
                        ..IndexingResult::default()
                    });
                }
            }
        }

        if total.chunks_indexed > 0 {
            self.store.save(&self.store_path).await?;
        }
        Ok(total)
    }

    pub fn default_top_k(&self) -> usize {
        self.top_k
    }
}

#[async_trait]
impl RAGEngine for RagPipeline {
    async fn initialize(&mut self, force_rebuild: bool) -> Result<()> {
        self.initialized = false;

        if force_rebuild || !self.load_persisted().await {
            self.rebuild().await?;
        }

        self.initialized = true;
        Ok(())
    }

    async fn retrieve(&self, query: &RAGQuery) -> Result<RAGResult> {
        if !self.is_ready() {
            warn!("vector store not initialized");
            return Ok(RAGResult::default());
        }

        let vector = self.embedder.embed_query(&query.query).await?;
        let search = SearchConfig {
            top_k: if query.top_k == 0 { self.top_k } else { query.top_k },
            max_distance: query.max_distance,
        };

        let result = self.store.search_by_vector(&vector, &search).await?;
        let context = self.build_context(&result.documents);

        Ok(RAGResult {
            documents: result.documents,
            context,
        })
    }

    fn build_context(&self, documents: &[VectorDocument]) -> String {
        documents
            .iter()
            .map(|doc| format!("[Source: {}]\n{}", doc.source(), doc.content))
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        Ok(json!({
            "initialized": self.initialized,
            "chunks": self.store.count().await?,
            "dimension": self.store.dimension(),
            "embedding_model": self.embedder.model_name(),
            "data_dir": self.data_dir.display().to_string(),
            "vector_store_path": self.store_path.display().to_string(),
            "generated_at": chrono::Local::now().to_rfc3339(),
        }))
    }

    fn is_ready(&self) -> bool {
        self.initialized && !self.store.is_empty()
    }

    fn chunk_count(&self) -> usize {
        self.store.len()
    }
}
