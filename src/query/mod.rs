//! Question answering over a built index.
//!
//! The engine holds the index behind an `Arc` and never mutates it, so any
//! number of queries may run at once and a cancelled query leaves nothing
//! behind.
pub mod prompt;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Config, EmptyRetrievalPolicy};
use crate::embedder::BatchEmbedder;
use crate::error::RagError;
use crate::index::{SearchHit, VectorIndex};
use crate::llm::LanguageModel;
use crate::models::{QueryResult, SourceChunk};

pub use prompt::{Prompt, PromptBuilder};

/// Answer returned under [`EmptyRetrievalPolicy::NoContextAnswer`].
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub max_prompt_chars: usize,
    pub empty_retrieval: EmptyRetrievalPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        (&Config::default()).into()
    }
}

impl From<&Config> for QueryOptions {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
            max_prompt_chars: config.max_prompt_chars,
            empty_retrieval: config.empty_retrieval,
        }
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<BatchEmbedder>,
    llm: Arc<dyn LanguageModel>,
    options: QueryOptions,
}

impl QueryEngine {
    /// Fails when the index holds vectors from a different embedding model.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<BatchEmbedder>,
        llm: Arc<dyn LanguageModel>,
        options: QueryOptions,
    ) -> Result<Self, RagError> {
        if !index.is_empty() && index.model() != embedder.model() {
            return Err(RagError::ModelMismatch {
                index: index.model().to_string(),
                embedder: embedder.model().to_string(),
            });
        }
        Ok(Self {
            index,
            embedder,
            llm,
            options,
        })
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Chunks relevant to `question`, best first, without generating.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SourceChunk>, RagError> {
        let hits = self.search(question).await?;
        Ok(hits.iter().map(source_chunk).collect())
    }

    /// Answer `question` from the indexed documents.
    pub async fn query(&self, question: &str) -> Result<QueryResult, RagError> {
        let hits = self.search(question).await?;
        let question = question.trim();
        let builder = PromptBuilder::new(self.options.max_prompt_chars);

        let prompt = builder.build(question, &hits);
        if prompt.included == 0 {
            if !hits.is_empty() {
                warn!(
                    "max_prompt_chars ({}) leaves no room for context",
                    self.options.max_prompt_chars
                );
            }
            return match self.options.empty_retrieval {
                EmptyRetrievalPolicy::Error => Err(RagError::EmptyRetrieval),
                EmptyRetrievalPolicy::NoContextAnswer => Ok(QueryResult {
                    answer: NO_CONTEXT_ANSWER.to_string(),
                    sources: Vec::new(),
                }),
                EmptyRetrievalPolicy::ForwardQuestion => {
                    info!("No context retrieved; forwarding the bare question");
                    let answer = self.generate(&builder.bare(question)).await?;
                    Ok(QueryResult {
                        answer,
                        sources: Vec::new(),
                    })
                }
            };
        }

        debug!(
            "Prompting {} with {} of {} hits ({} chars)",
            self.llm.model(),
            prompt.included,
            hits.len(),
            prompt.text.chars().count()
        );
        let answer = self.generate(&prompt.text).await?;

        Ok(QueryResult {
            answer,
            sources: hits[..prompt.included].iter().map(source_chunk).collect(),
        })
    }

    async fn search(&self, question: &str) -> Result<Vec<SearchHit<'_>>, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }
        if self.index.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let vector = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|e| RagError::provider("embed", e))?;

        let mut hits = self.index.search(&vector, self.options.top_k)?;
        if let Some(min_score) = self.options.min_score {
            let before = hits.len();
            hits.retain(|hit| hit.score >= min_score);
            debug!("min_score {min_score} kept {} of {before} hits", hits.len());
        }
        Ok(hits)
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.embedder
            .policy()
            .run("generate", || self.llm.generate(prompt))
            .await
            .map_err(|e| RagError::provider("generate", e))
    }
}

fn source_chunk(hit: &SearchHit<'_>) -> SourceChunk {
    SourceChunk {
        chunk: hit.entry.chunk.clone(),
        score: hit.score,
    }
}
