//! In-memory vector index over embedded chunks.
//!
//! Built once by a single writer, then shared read-only (`Arc<VectorIndex>`)
//! by any number of concurrent queries.
use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LoaderConfig;
use crate::models::Chunk;

pub mod distance;
pub mod search;
pub mod snapshot;

pub use distance::DistanceMetric;
pub use search::SearchHit;

#[derive(Error, Debug, PartialEq)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid vector: {0}")]
    InvalidVector(String),

    #[error("chunk id must not be empty")]
    EmptyChunkId,
}

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Where an index's chunks came from and how they were cut.
///
/// An index is only reusable for a source that matches this exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Canonical path of the directory that was loaded.
    pub source_dir: PathBuf,
    pub chunk_size: usize,
    /// Overlap in chars.
    pub chunk_overlap: usize,
    pub loader: LoaderConfig,
}

impl SourceInfo {
    /// The first setting that differs from `other`, as `"name (a vs b)"`.
    pub fn difference(&self, other: &SourceInfo) -> Option<String> {
        if self.source_dir != other.source_dir {
            return Some(format!(
                "source directory ({} vs {})",
                self.source_dir.display(),
                other.source_dir.display()
            ));
        }
        if self.chunk_size != other.chunk_size {
            return Some(format!("chunk size ({} vs {})", self.chunk_size, other.chunk_size));
        }
        if self.chunk_overlap != other.chunk_overlap {
            return Some(format!(
                "chunk overlap ({} vs {} chars)",
                self.chunk_overlap, other.chunk_overlap
            ));
        }
        if self.loader != other.loader {
            return Some(format!("loader settings ({:?} vs {:?})", self.loader, other.loader));
        }
        None
    }
}

/// Insertion-ordered collection of entries, unique by chunk id.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metric: DistanceMetric,
    /// Embedding model that produced every vector in the index.
    model: String,
    dimensions: Option<usize>,
    source: Option<SourceInfo>,
    entries: Vec<IndexEntry>,
    slots: HashMap<String, usize>,
}

impl VectorIndex {
    pub fn new(metric: DistanceMetric, model: impl Into<String>) -> Self {
        Self {
            metric,
            model: model.into(),
            dimensions: None,
            source: None,
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Fix the vector length up front instead of learning it on first insert.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Record the directory and settings the entries were built from.
    #[must_use]
    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = Some(source);
        self
    }

    /// Add an entry, or replace the one with the same chunk id in place.
    pub fn insert(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<(), IndexError> {
        if chunk.id.is_empty() {
            return Err(IndexError::EmptyChunkId);
        }
        self.check_vector(&embedding)?;
        if self.dimensions.is_none() {
            self.dimensions = Some(embedding.len());
        }

        let entry = IndexEntry { chunk, embedding };
        match self.slots.get(&entry.chunk.id) {
            Some(&slot) => self.entries[slot] = entry,
            None => {
                self.slots.insert(entry.chunk.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    /// Validate a vector against the index's dimension and metric.
    pub fn check_vector(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.is_empty() {
            return Err(IndexError::InvalidVector("empty vector".to_string()));
        }
        if let Some(expected) = self.dimensions {
            if vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::InvalidVector(
                "contains NaN or infinite values".to_string(),
            ));
        }
        if self.metric.requires_nonzero() && vector.iter().all(|v| *v == 0.0) {
            return Err(IndexError::InvalidVector(format!(
                "zero vector has no direction under {} distance",
                self.metric
            )));
        }
        Ok(())
    }

    pub fn get(&self, chunk_id: &str) -> Option<&IndexEntry> {
        self.slots.get(chunk_id).map(|&slot| &self.entries[slot])
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// `None` for indexes built from documents rather than a directory.
    pub fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }
}
