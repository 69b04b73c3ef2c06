//! Mock language model for tests and offline runs.
//!
//! Returns a canned answer and remembers every prompt it was given.
use std::sync::Mutex;

use async_trait::async_trait;

use super::LanguageModel;
use crate::error::ProviderError;

pub struct MockLanguageModel {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Prompts received, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new("mock answer")
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .map_err(|e| ProviderError::InvalidResponse(format!("lock poisoned: {e}")))?
            .push(prompt.to_string());
        Ok(self.answer.clone())
    }

    fn model(&self) -> &str {
        "mock"
    }
}
