//! Knowledge-base loading and indexing

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pulldown_cmark::{Event, Parser, TagEnd};
use scraper::{Html, Selector};
use serde_json::json;
use tracing::{debug, error, info, warn};

use supportbot_core::{
    Document, DocumentIndexer, Embedder, Error, IndexingConfig, IndexingResult, Result,
    VectorDocument, VectorStore,
};

use crate::chunker::chunk_text;

/// File extensions the indexer reads
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "html", "htm", "pdf"];

/// Load one file as a `Document`
///
/// Returns `Ok(None)` for unsupported extensions and for files with no
/// text after conversion.
pub async fn load_document(path: &Path) -> Result<Option<Document>> {
    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
    else {
        return Ok(None);
    };
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(None);
    }

    let content = if ext == "pdf" {
        let bytes = tokio::fs::read(path).await?;
        tokio::task::spawn_blocking(move || pdf_to_text(&bytes))
            .await
            .map_err(|e| Error::DocumentIndexer(format!("PDF extraction task failed: {e}")))?
            .map_err(|e| Error::DocumentIndexer(format!("error reading PDF {}: {e}", path.display())))?
    } else {
        let raw = tokio::fs::read_to_string(path).await?;
        match ext.as_str() {
            "md" | "markdown" => markdown_to_text(&raw),
            "html" | "htm" => html_to_text(&raw),
            _ => raw,
        }
    };

    if content.trim().is_empty() {
        return Ok(None);
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(Document {
        id: format!("{:x}", md5::compute(filename.as_bytes())),
        metadata: json!({ "source": filename, "format": ext }),
        source: filename,
        content,
    }))
}

/// Render markdown to plain text, one line per block
pub(crate) fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::TableRow) => text.push('\n'),
            Event::End(TagEnd::TableCell) => text.push(' '),
            _ => {}
        }
    }

    text.trim().to_string()
}

/// Text of every page, one page per line block
pub(crate) fn pdf_to_text(bytes: &[u8]) -> std::result::Result<String, lopdf::Error> {
    let pdf = lopdf::Document::load_mem(bytes)?;
    let mut text = String::new();
    for page_number in pdf.get_pages().into_keys() {
        text.push_str(&pdf.extract_text(&[page_number])?);
        text.push('\n');
    }
    Ok(text)
}

/// Extract the visible text blocks of an HTML page
pub(crate) fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();

    if let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6, p, li, td, th, blockquote, pre") {
        for element in document.select(&selector) {
            let text = element.text().collect::<String>();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                blocks.push(text);
            }
        }
    }

    if blocks.is_empty() {
        if let Ok(body) = Selector::parse("body") {
            for element in document.select(&body) {
                let text = element.text().collect::<String>();
                blocks.push(text.split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }
    }

    blocks.join("\n")
}

/// Chunks, embeds and stores documents from a local directory
pub struct DirectoryIndexer<V: VectorStore> {
    store: Arc<V>,
    embedder: Arc<dyn Embedder>,
    config: IndexingConfig,
}

impl<V: VectorStore> DirectoryIndexer<V> {
    pub fn new(store: Arc<V>, embedder: Arc<dyn Embedder>, config: IndexingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            embedder,
            config,
        })
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    /// Load every supported file in `dir`, sorted by file name
    ///
    /// Files that fail to load are logged and reported in the second element.
    pub async fn load_documents(&self, dir: &Path) -> Result<(Vec<Document>, Vec<String>)> {
        let mut documents = Vec::new();
        let mut errors = Vec::new();

        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            warn!(dir = %dir.display(), "data directory not found");
            return Ok((documents, errors));
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        for path in paths {
            match load_document(&path).await {
                Ok(Some(document)) => {
                    info!(file = %document.source, "loaded document");
                    documents.push(document);
                }
                Ok(None) => debug!(file = %path.display(), "skipped file"),
                Err(e) => {
                    error!(file = %path.display(), error = %e, "error loading document");
                    errors.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        info!(count = documents.len(), "loaded documents");
        Ok((documents, errors))
    }

    /// Split documents into chunk records with `{source, chunk_id}` metadata
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<VectorDocument> {
        let chunks: Vec<VectorDocument> = documents
            .iter()
            .flat_map(|doc| {
                chunk_text(&doc.content, self.config.chunk_size, self.config.chunk_overlap)
                    .into_iter()
                    .enumerate()
                    .map(|(idx, chunk)| VectorDocument {
                        id: format!("{}-{}", doc.id, idx),
                        content: chunk,
                        embedding: None,
                        metadata: json!({ "source": doc.source, "chunk_id": idx }),
                        score: None,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        info!(
            chunks = chunks.len(),
            documents = documents.len(),
            "created chunks"
        );
        chunks
    }

    async fn embed_and_store(&self, mut chunks: Vec<VectorDocument>) -> Result<usize> {
        let mut stored = 0;

        for batch in chunks.chunks_mut(self.config.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = Some(embedding);
            }
            stored += self.store.store_batch(batch.to_vec()).await?.len();
            debug!(stored, "embedded batch");
        }

        Ok(stored)
    }
}

#[async_trait]
impl<V: VectorStore + 'static> DocumentIndexer for DirectoryIndexer<V> {
    async fn index_documents(&self, documents: Vec<Document>) -> Result<IndexingResult> {
        let chunks = self.chunk_documents(&documents);
        let chunks_indexed = self.embed_and_store(chunks).await?;

        Ok(IndexingResult {
            documents_indexed: documents.len(),
            chunks_indexed,
            documents_failed: 0,
            errors: Vec::new(),
        })
    }

    async fn index_from_file(&self, path: &Path) -> Result<IndexingResult> {
        match load_document(path).await? {
            Some(document) => self.index_documents(vec![document]).await,
            None => Err(Error::DocumentIndexer(format!(
                "{} is empty or not a supported format ({})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }

    async fn index_directory(&self, dir: &Path) -> Result<IndexingResult> {
        let (documents, errors) = self.load_documents(dir).await?;
        let mut result = if documents.is_empty() {
            IndexingResult::default()
        } else {
            self.index_documents(documents).await?
        };

        result.documents_failed += errors.len();
        result.errors.extend(errors);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn markdown_becomes_plain_text() {
        let md = "# Returns\n\nItems can be returned within **30 days**.\n\n- Keep the receipt\n- Use the `RMA` form\n";
        assert_snapshot!(markdown_to_text(md), @r"
        Returns
        Items can be returned within 30 days.
        Keep the receipt
        Use the RMA form
        ");
    }

    #[test]
    fn html_keeps_visible_blocks() {
        let html = "<html><head><script>var x = 1;</script></head><body>\
            <h1>Shipping</h1><p>Orders ship   within <b>2 days</b>.</p><ul><li>Express available</li></ul>\
            </body></html>";
        assert_snapshot!(html_to_text(html), @r"
        Shipping
        Orders ship within 2 days.
        Express available
        ");
    }

    fn one_page_pdf(line: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Object, Stream, dictionary};

        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        pdf.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        pdf.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn pdf_pages_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warranty.pdf");
        tokio::fs::write(&path, one_page_pdf("Warranty covers two years"))
            .await
            .unwrap();

        let document = load_document(&path).await.unwrap().unwrap();
        assert_eq!(document.source, "warranty.pdf");
        assert!(document.content.contains("Warranty covers two years"), "{}", document.content);
    }

    #[tokio::test]
    async fn broken_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.pdf");
        tokio::fs::write(&path, b"%PDF-1.4 truncated").await.unwrap();
        assert!(matches!(load_document(&path).await, Err(Error::DocumentIndexer(_))));
    }

    #[tokio::test]
    async fn unsupported_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        for (name, bytes) in [("orders.csv", &b"id,total\n1,20"[..]), ("blob.bin", &[0u8, 159, 146, 150][..])] {
            let path = dir.path().join(name);
            tokio::fs::write(&path, bytes).await.unwrap();
            assert!(load_document(&path).await.unwrap().is_none(), "{name}");
        }
    }
}
