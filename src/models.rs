//! Records that flow through the pipeline: documents, chunks and answers.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A scalar metadata value attached to a document or chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// A text file read from the source directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Path relative to the source directory, `/`-separated.
    pub id: String,
    pub raw_text: String,
    pub source_path: PathBuf,
    pub metadata: Metadata,
}

/// A span of a document's text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub position: usize,
    /// Offset of the first char of `text` within the document, in chars.
    pub start: usize,
    /// Number of leading chars of `text` repeated from the previous chunk.
    pub overlap: usize,
    pub metadata: Metadata,
}

impl Chunk {
    /// The part of `text` not shared with the preceding chunk.
    #[must_use]
    pub fn novel_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((idx, _)) => &self.text[idx..],
            None if self.overlap == 0 => &self.text,
            None => "",
        }
    }

    /// Number of chars in `text`.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk used as evidence for an answer, with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceChunk {
    pub chunk: Chunk,
    /// Higher means more relevant.
    pub score: f32,
}

/// Answer to a question together with the chunks placed in the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, overlap: usize) -> Chunk {
        Chunk {
            id: "a.txt#1".to_string(),
            document_id: "a.txt".to_string(),
            text: text.to_string(),
            position: 1,
            start: 10,
            overlap,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_novel_text_strips_overlap() {
        assert_eq!(chunk("hello world", 6).novel_text(), "world");
        assert_eq!(chunk("hello", 0).novel_text(), "hello");
        assert_eq!(chunk("hello", 5).novel_text(), "");
    }

    #[test]
    fn test_novel_text_multibyte() {
        assert_eq!(chunk("日本語です", 3).novel_text(), "です");
    }

    #[test]
    fn test_metadata_untagged_json() {
        let mut meta = Metadata::new();
        meta.insert("author".into(), "Paul".into());
        meta.insert("year".into(), 1998.into());
        meta.insert("draft".into(), false.into());
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"author":"Paul","draft":false,"year":1998}"#);

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_query_result_display_is_answer() {
        let result = QueryResult {
            answer: "He studied philosophy.".to_string(),
            sources: vec![],
        };
        assert_eq!(result.to_string(), "He studied philosophy.");
    }
}
