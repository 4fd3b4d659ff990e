//! Exact nearest-neighbour index persisted as JSON

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use supportbot_core::{
    Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexData {
    dimension: Option<usize>,
    chunks: Vec<StoredChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    id: String,
    content: String,
    metadata: serde_json::Value,
    embedding: Vec<f32>,
}

/// Brute-force index ranked by squared L2 distance
///
/// Every search scans all vectors, which is fine for a knowledge base of a
/// few thousand chunks.
#[derive(Debug, Default)]
pub struct FlatL2Index {
    data: RwLock<IndexData>,
}

impl FlatL2Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.chunks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the whole index to `path` as JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = {
            let data = self.read()?;
            serde_json::to_string(&*data).map_err(|e| Error::Serialization(e.to_string()))?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;

        info!(path = %path.display(), chunks = self.len(), "saved vector store");
        Ok(())
    }

    /// Replace the index contents with the file at `path`, returning the chunk count
    pub async fn load(&self, path: &Path) -> Result<usize> {
        let content = tokio::fs::read_to_string(path).await?;
        let loaded: IndexData = serde_json::from_str(&content)
            .map_err(|e| Error::VectorStore(format!("corrupt index {}: {}", path.display(), e)))?;

        if let Some(dim) = loaded.dimension {
            if let Some(bad) = loaded.chunks.iter().find(|c| c.embedding.len() != dim) {
                return Err(Error::VectorStore(format!(
                    "chunk {} has dimension {}, index expects {}",
                    bad.id,
                    bad.embedding.len(),
                    dim
                )));
            }
        }

        let count = loaded.chunks.len();
        *self.write()? = loaded;
        info!(path = %path.display(), chunks = count, "loaded vector store");
        Ok(count)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, IndexData>> {
        self.data
            .read()
            .map_err(|_| Error::VectorStore("index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IndexData>> {
        self.data
            .write()
            .map_err(|_| Error::VectorStore("index lock poisoned".to_string()))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl VectorStore for FlatL2Index {
    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        let mut data = self.write()?;

        // Validate the whole batch before touching the index
        let mut dimension = data.dimension;
        for doc in &documents {
            let Some(embedding) = doc.embedding.as_ref() else {
                return Err(Error::VectorStore(format!("document {} has no embedding", doc.id)));
            };
            match dimension {
                Some(dim) if dim != embedding.len() => {
                    return Err(Error::VectorStore(format!(
                        "dimension mismatch: index holds {}-d vectors, got {}",
                        dim,
                        embedding.len()
                    )));
                }
                Some(_) => {}
                None => dimension = Some(embedding.len()),
            }
        }
        data.dimension = dimension;

        let mut ids = Vec::with_capacity(documents.len());
        for doc in documents {
            // Re-indexing a chunk replaces it
            data.chunks.retain(|c| c.id != doc.id);
            ids.push(doc.id.clone());
            data.chunks.push(StoredChunk {
                id: doc.id,
                content: doc.content,
                metadata: doc.metadata,
                embedding: doc.embedding.unwrap_or_default(),
            });
        }

        debug!(stored = ids.len(), total = data.chunks.len(), "stored vectors");
        Ok(ids)
    }

    async fn search_by_vector(&self, vector: &[f32], config: &SearchConfig) -> Result<SearchResult> {
        let data = self.read()?;

        if let Some(dim) = data.dimension {
            if dim != vector.len() {
                return Err(Error::VectorStore(format!(
                    "query has dimension {}, index expects {}",
                    vector.len(),
                    dim
                )));
            }
        }

        let mut scored: Vec<(f32, &StoredChunk)> = data
            .chunks
            .iter()
            .map(|chunk| (squared_l2(vector, &chunk.embedding), chunk))
            .filter(|(distance, _)| config.max_distance.is_none_or(|max| *distance <= max))
            .collect();

        // Stable sort keeps insertion order for equal distances
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let documents: Vec<VectorDocument> = scored
            .into_iter()
            .take(config.top_k)
            .map(|(distance, chunk)| VectorDocument {
                id: chunk.id.clone(),
                content: chunk.content.clone(),
                embedding: None,
                metadata: chunk.metadata.clone(),
                score: Some(distance),
            })
            .collect();

        Ok(SearchResult {
            total: documents.len(),
            documents,
        })
    }

    async fn clear(&self) -> Result<()> {
        *self.write()? = IndexData::default();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.chunks.len())
    }

    fn dimension(&self) -> Option<usize> {
        self.data.read().ok().and_then(|d| d.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, embedding: Vec<f32>) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            content: format!("content of {}", id),
            embedding: Some(embedding),
            metadata: json!({"source": format!("{}.txt", id), "chunk_id": 0}),
            score: None,
        }
    }

    #[tokio::test]
    async fn nearest_first() {
        let index = FlatL2Index::new();
        index
            .store_batch(vec![
                doc("far", vec![10.0, 10.0]),
                doc("near", vec![1.0, 0.0]),
                doc("mid", vec![3.0, 0.0]),
            ])
            .await
            .unwrap();

        let config = SearchConfig { top_k: 2, max_distance: None };
        let result = index.search_by_vector(&[0.0, 0.0], &config).await.unwrap();
        let ids: Vec<&str> = result.documents.iter().map(|d| d.id.as_str()).collect();

        assert_eq!(ids, vec!["near", "mid"]);
        assert_eq!(result.documents[0].score, Some(1.0));
        assert_eq!(result.documents[1].score, Some(9.0));
    }

    #[tokio::test]
    async fn max_distance_filters() {
        let index = FlatL2Index::new();
        index
            .store_batch(vec![doc("a", vec![1.0]), doc("b", vec![5.0])])
            .await
            .unwrap();

        let config = SearchConfig { top_k: 5, max_distance: Some(4.0) };
        let result = index.search_by_vector(&[0.0], &config).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.documents[0].id, "a");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let index = FlatL2Index::new();
        index.store_batch(vec![doc("a", vec![1.0, 2.0])]).await.unwrap();

        assert!(index.store_batch(vec![doc("b", vec![1.0])]).await.is_err());
        assert!(index
            .search_by_vector(&[1.0, 2.0, 3.0], &SearchConfig::default())
            .await
            .is_err());
        assert_eq!(index.dimension(), Some(2));
    }

    #[tokio::test]
    async fn rejected_batch_stores_nothing() {
        let index = FlatL2Index::new();
        let batch = vec![
            doc("a", vec![1.0, 0.0]),
            doc("b", vec![0.0, 1.0]),
            doc("c", vec![1.0]),
        ];

        assert!(matches!(index.store_batch(batch).await, Err(Error::VectorStore(_))));
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
    }

    #[tokio::test]
    async fn same_id_replaces() {
        let index = FlatL2Index::new();
        index.store_batch(vec![doc("a", vec![1.0])]).await.unwrap();
        index.store_batch(vec![doc("a", vec![2.0])]).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let result = index
            .search_by_vector(&[2.0], &SearchConfig::default())
            .await
            .unwrap();
        assert_eq!(result.documents[0].score, Some(0.0));
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("vector_store.json");

        let index = FlatL2Index::new();
        index
            .store_batch(vec![doc("a", vec![0.0, 1.0]), doc("b", vec![1.0, 0.0])])
            .await
            .unwrap();
        index.save(&path).await.unwrap();

        let restored = FlatL2Index::new();
        assert_eq!(restored.load(&path).await.unwrap(), 2);
        assert_eq!(restored.dimension(), Some(2));

        let result = restored
            .search_by_vector(&[1.0, 0.0], &SearchConfig { top_k: 1, max_distance: None })
            .await
            .unwrap();
        assert_eq!(result.documents[0].source(), "b.txt");

        restored.clear().await.unwrap();
        assert!(restored.is_empty());
        assert_eq!(restored.dimension(), None);
    }
}
