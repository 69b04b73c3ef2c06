//! # docquery - retrieval-augmented question answering over a folder
//!
//! Loads the text files of a directory, splits them into overlapping
//! chunks, embeds the chunks through an OpenAI-compatible embeddings API
//! and answers questions by prompting a chat model with the closest chunks.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading, defaults and validation
//! - **[`indexer`]**: Directory loading, chunking and the index build pipeline
//! - **[`embedder`]**: Embedding providers plus batching, concurrency and retries
//! - **[`index`]**: In-memory vector index, distance metrics, JSON snapshots
//! - **[`query`]**: Retrieval, prompt assembly and answer generation
//! - **[`llm`]**: Text-generation providers
//! - **[`retry`]**: Per-call deadlines and exponential backoff
//! - **[`frontmatter`]**: YAML frontmatter of markdown files as document metadata

pub mod config;
pub mod embedder;
pub mod error;
pub mod frontmatter;
pub mod index;
pub mod indexer;
pub mod llm;
pub mod models;
pub mod query;
pub mod retry;

pub use error::{ProviderError, RagError};
pub use models::{Chunk, Document, QueryResult, SourceChunk};
