use crate::embedder::BatchEmbedder;
use crate::error::RagError;
use crate::index::{DistanceMetric, SourceInfo, VectorIndex};
use crate::indexer::chunker::Chunker;
use crate::indexer::loader::{LoadReport, Loader};
use crate::models::{Chunk, Document};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents that produced at least one chunk.
    pub documents: usize,
    pub chunks: usize,
    /// Documents skipped because they hold only whitespace.
    pub blank_documents: usize,
    /// Files the loader could not decode.
    pub skipped_files: usize,
}

/// Turns documents into a finished [`VectorIndex`].
///
/// The indexer owns the index exclusively until `build` returns, so no
/// reader can observe a half-built index.
pub struct Indexer<'a> {
    pub embedder: &'a BatchEmbedder,
    pub chunker: Chunker,
    pub metric: DistanceMetric,
}

impl<'a> Indexer<'a> {
    pub fn new(embedder: &'a BatchEmbedder, chunker: Chunker, metric: DistanceMetric) -> Self {
        Self {
            embedder,
            chunker,
            metric,
        }
    }

    /// Describes what indexing `dir` through `loader` would produce.
    ///
    /// A saved index is only reused when this matches its recorded source.
    pub fn source_info(&self, loader: &Loader, dir: &Path) -> Result<SourceInfo, RagError> {
        Ok(SourceInfo {
            source_dir: fs::canonicalize(dir).map_err(|e| RagError::io(dir, e))?,
            chunk_size: self.chunker.chunk_size(),
            chunk_overlap: self.chunker.overlap(),
            loader: loader.settings(),
        })
    }

    /// Loads, chunks and embeds every document under `dir`.
    pub async fn index_directory(
        &self,
        loader: &Loader,
        dir: &Path,
    ) -> Result<(VectorIndex, BuildReport), RagError> {
        let LoadReport { documents, skipped } = loader.load_directory(dir)?;
        let source = self.source_info(loader, dir)?;
        let (index, mut report) = self.build(&documents).await?;
        report.skipped_files = skipped.len();
        Ok((index.with_source(source), report))
    }

    /// Builds an index from already-loaded documents.
    ///
    /// All or nothing: if any embedding batch fails for good, the error is
    /// returned and no index is produced.
    pub async fn build(&self, documents: &[Document]) -> Result<(VectorIndex, BuildReport), RagError> {
        let mut report = BuildReport::default();
        let mut chunks: Vec<Chunk> = Vec::new();

        for doc in documents {
            if doc.raw_text.trim().is_empty() {
                debug!("Skipping blank document {}", doc.id);
                report.blank_documents += 1;
                continue;
            }
            let doc_chunks = self.chunker.chunk_document(doc);
            debug!("{}: {} chunks", doc.id, doc_chunks.len());
            report.documents += 1;
            chunks.extend(doc_chunks);
        }

        let mut index = VectorIndex::new(self.metric, self.embedder.model());
        if let Some(dimensions) = self.embedder.dimensions() {
            index = index.with_dimensions(dimensions);
        }
        if chunks.is_empty() {
            info!("No chunks to embed; index is empty");
            return Ok((index, report));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_all(&texts)
            .await
            .map_err(|e| RagError::provider("embed", e))?;

        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.insert(chunk, vector)?;
        }
        report.chunks = index.len();

        info!(
            "Indexed {} chunks from {} documents with {}",
            report.chunks,
            report.documents,
            index.model()
        );
        Ok((index, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::Embedder;
    use crate::embedder::mock::{MOCK_MODEL, MockEmbedder};
    use crate::error::ProviderError;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    fn mock_embedder() -> BatchEmbedder {
        BatchEmbedder::new(Arc::new(MockEmbedder::default()), fast_policy()).with_batching(2, 2)
    }

    #[tokio::test]
    async fn test_index_directory() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();
        fs::write(dir_path.join("file1.md"), "Content 1").unwrap();
        fs::write(dir_path.join("file2.txt"), "Content 2 is a little longer. ".repeat(10)).unwrap();
        fs::write(dir_path.join("blank.txt"), "  \n\n ").unwrap();
        fs::write(dir_path.join("binary.bin"), [0u8, 1, 2]).unwrap();

        let embedder = mock_embedder();
        let indexer = Indexer::new(&embedder, Chunker::new(100, 0.1), DistanceMetric::Cosine);
        let (index, report) = indexer.index_directory(&Loader::new(), dir_path).await.unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.blank_documents, 1);
        assert_eq!(report.skipped_files, 1);
        assert!(report.chunks > 2);
        assert_eq!(index.len(), report.chunks);
        assert_eq!(index.model(), MOCK_MODEL);
        assert_eq!(index.dimensions(), Some(384));
        assert!(index.get("file1.md#0").is_some());
        assert!(index.get("file2.txt#1").is_some());

        let source = index.source().unwrap();
        assert_eq!(source, &indexer.source_info(&Loader::new(), dir_path).unwrap());
        assert_eq!(source.source_dir, fs::canonicalize(dir_path).unwrap());
        assert_eq!(source.chunk_size, 100);
        assert_eq!(source.chunk_overlap, 10);
    }

    #[tokio::test]
    async fn test_source_info_tracks_settings() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let embedder = mock_embedder();
        let indexer = Indexer::new(&embedder, Chunker::new(100, 0.1), DistanceMetric::Cosine);
        let loader = Loader::new();

        let base = indexer.source_info(&loader, first.path()).unwrap();
        let relative = first.path().join(".");
        assert_eq!(indexer.source_info(&loader, &relative).unwrap(), base);
        assert_ne!(indexer.source_info(&loader, second.path()).unwrap(), base);

        let resized = Indexer::new(&embedder, Chunker::new(200, 0.1), DistanceMetric::Cosine);
        assert_ne!(resized.source_info(&loader, first.path()).unwrap(), base);

        let missing = first.path().join("missing");
        assert!(matches!(
            indexer.source_info(&loader, &missing),
            Err(RagError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_directory_builds_empty_index() {
        let temp_dir = tempdir().unwrap();
        let embedder = mock_embedder();
        let indexer = Indexer::new(&embedder, Chunker::new(100, 0.0), DistanceMetric::Euclidean);
        let (index, report) = indexer
            .index_directory(&Loader::new(), temp_dir.path())
            .await
            .unwrap();
        assert!(index.is_empty());
        assert_eq!(report, BuildReport::default());
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::Http {
                status: 401,
                body: "unauthorized".to_string(),
            })
        }

        fn dimensions(&self) -> Option<usize> {
            None
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_build() {
        let embedder = BatchEmbedder::new(Arc::new(FailingEmbedder), fast_policy());
        let indexer = Indexer::new(&embedder, Chunker::new(100, 0.0), DistanceMetric::Cosine);
        let doc = Document {
            id: "a.txt".to_string(),
            raw_text: "some text".to_string(),
            source_path: "a.txt".into(),
            metadata: Default::default(),
        };
        let err = indexer.build(&[doc]).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::Provider {
                operation: "embed",
                ..
            }
        ));
    }
}
