//! Batching, bounded concurrency and retries around any [`Embedder`].
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::debug;

use super::Embedder;
use crate::error::ProviderError;
use crate::retry::RetryPolicy;

const DEFAULT_MAX_BATCH_SIZE: usize = 64;
const DEFAULT_CONCURRENCY: usize = 4;

pub struct BatchEmbedder {
    inner: Arc<dyn Embedder>,
    policy: RetryPolicy,
    max_batch_size: usize,
    concurrency: usize,
    progress: Option<ProgressBar>,
}

impl BatchEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            progress: None,
        }
    }

    /// Limit inputs per request and requests in flight. Zeros are raised to 1.
    #[must_use]
    pub fn with_batching(mut self, max_batch_size: usize, concurrency: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self.concurrency = concurrency.max(1);
        self
    }

    /// Advance `progress` by the number of texts embedded.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.inner.dimensions()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Embed every text, splitting into batches transparently.
    ///
    /// Output order matches input order no matter which batch finishes
    /// first. The first batch to fail for good aborts the whole call.
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(progress) = &self.progress {
            progress.set_length(texts.len() as u64);
        }
        let batches: Vec<&[String]> = texts.chunks(self.max_batch_size).collect();
        debug!(
            "Embedding {} texts in {} batches ({} in flight)",
            texts.len(),
            batches.len(),
            self.concurrency
        );

        let mut slots: Vec<Option<Vec<Vec<f32>>>> = vec![None; batches.len()];
        let mut pending = stream::iter(batches.into_iter().enumerate())
            .map(|(slot, batch)| async move {
                let vectors = self
                    .policy
                    .run("embed", || self.inner.embed_batch(batch))
                    .await?;
                if vectors.len() != batch.len() {
                    return Err(ProviderError::InvalidResponse(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    )));
                }
                Ok((slot, vectors))
            })
            .buffer_unordered(self.concurrency);

        while let Some(result) = pending.next().await {
            let (slot, vectors) = result?;
            if let Some(progress) = &self.progress {
                progress.inc(vectors.len() as u64);
            }
            slots[slot] = Some(vectors);
        }

        let vectors: Vec<Vec<f32>> = slots.into_iter().flatten().flatten().collect();
        self.check_dimensions(&vectors)?;
        Ok(vectors)
    }

    /// Embed a single query string under the same retry policy.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let vector = self
            .policy
            .run("embed query", || self.inner.embed(text))
            .await?;
        self.check_dimensions(std::slice::from_ref(&vector))?;
        Ok(vector)
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<(), ProviderError> {
        let Some(expected) = self
            .inner
            .dimensions()
            .or_else(|| vectors.first().map(Vec::len))
        else {
            return Ok(());
        };

        match vectors.iter().position(|v| v.len() != expected) {
            Some(i) => Err(ProviderError::InvalidResponse(format!(
                "embedding {i} has {} dimensions, expected {expected}",
                vectors[i].len()
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            timeout: Duration::from_secs(5),
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text number {i}")).collect()
    }

    /// Records batch sizes; later batches finish first.
    struct RecordingEmbedder {
        inner: MockEmbedder,
        batch_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            let call = {
                let mut sizes = self.batch_sizes.lock().unwrap();
                sizes.push(texts.len());
                sizes.len()
            };
            sleep(Duration::from_millis(40 / call as u64)).await;
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> Option<usize> {
            self.inner.dimensions()
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_splits_batches_and_preserves_order() {
        let recording = Arc::new(RecordingEmbedder {
            inner: MockEmbedder::new(32),
            batch_sizes: Mutex::new(Vec::new()),
        });
        let embedder =
            BatchEmbedder::new(recording.clone(), fast_policy()).with_batching(3, 4);

        let inputs = texts(10);
        let vectors = embedder.embed_all(&inputs).await.unwrap();

        let mut sizes = recording.batch_sizes.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 3, 3, 3]);

        let mock = MockEmbedder::new(32);
        for (text, vector) in inputs.iter().zip(&vectors) {
            assert_eq!(vector, &mock.vector_for(text));
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
        }

        fn dimensions(&self) -> Option<usize> {
            None
        }

        fn model(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let embedder = BatchEmbedder::new(Arc::new(ShortEmbedder), fast_policy());
        let err = embedder.embed_all(&texts(3)).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    struct RaggedEmbedder;

    #[async_trait]
    impl Embedder for RaggedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().map(|t| vec![1.0; t.len()]).collect())
        }

        fn dimensions(&self) -> Option<usize> {
            None
        }

        fn model(&self) -> &str {
            "ragged"
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let embedder = BatchEmbedder::new(Arc::new(RaggedEmbedder), fast_policy());
        let inputs = vec!["ab".to_string(), "abc".to_string()];
        assert!(embedder.embed_all(&inputs).await.is_err());
    }

    /// Fails the first `failures` calls with a timeout.
    struct FlakyEmbedder {
        failures: Mutex<u32>,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            {
                let mut left = self.failures.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(ProviderError::Timeout(Duration::from_millis(1)));
                }
            }
            MockEmbedder::new(8).embed_batch(texts).await
        }

        fn dimensions(&self) -> Option<usize> {
            Some(8)
        }

        fn model(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let flaky = FlakyEmbedder {
            failures: Mutex::new(2),
        };
        let embedder = BatchEmbedder::new(Arc::new(flaky), fast_policy());
        let vectors = embedder.embed_all(&texts(2)).await.unwrap();
        assert_eq!(vectors.len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail() {
        let flaky = FlakyEmbedder {
            failures: Mutex::new(10),
        };
        let embedder = BatchEmbedder::new(Arc::new(flaky), fast_policy());
        assert!(matches!(
            embedder.embed_all(&texts(2)).await,
            Err(ProviderError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_embed_query() {
        let embedder = BatchEmbedder::new(Arc::new(MockEmbedder::new(16)), fast_policy());
        let vector = embedder.embed_query("hello").await.unwrap();
        assert_eq!(vector.len(), 16);
        assert!(embedder.embed_all(&[]).await.unwrap().is_empty());
    }
}
