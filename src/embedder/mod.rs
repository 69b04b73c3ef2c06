//! Embedder trait and implementations.
//!
//! Vectors come from an external model; failures are always reported as
//! errors, never replaced by placeholder vectors.
pub mod batch;
pub mod mock;
pub mod openai;

use async_trait::async_trait;

use crate::error::ProviderError;

pub use batch::BatchEmbedder;

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed multiple texts; one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match (vectors.pop(), vectors.is_empty()) {
            (Some(vector), true) => Ok(vector),
            _ => Err(ProviderError::InvalidResponse(
                "expected exactly one embedding".to_string(),
            )),
        }
    }

    /// Dimensionality of the vectors, when known ahead of the first call.
    fn dimensions(&self) -> Option<usize>;

    /// Identifier of the model producing the vectors.
    fn model(&self) -> &str;
}
