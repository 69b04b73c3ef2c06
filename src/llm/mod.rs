//! Text-generation providers.
pub mod mock;
pub mod openai;

use async_trait::async_trait;

use crate::error::ProviderError;

/// An external language model that turns a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}
