use crate::models::{Chunk, Document, MetadataValue};

/// Char range of one chunk within a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// Chars shared with the previous span.
    pub overlap: usize,
}

/// Splits text into overlapping windows of at most `chunk_size` chars.
///
/// Windows prefer to end on a paragraph break, then a sentence end, then
/// whitespace, searching back no further than half a window. The text is
/// never trimmed, so dropping each chunk's overlapping prefix and
/// concatenating gives back the original exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap_fraction` is the share of `chunk_size` repeated between
    /// consecutive chunks; it is clamped so a window always moves forward.
    pub fn new(chunk_size: usize, overlap_fraction: f32) -> Self {
        let chunk_size = chunk_size.max(1);
        let fraction = if overlap_fraction.is_finite() {
            overlap_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let overlap = ((chunk_size as f64) * f64::from(fraction)).floor() as usize;
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap in chars.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Compute chunk boundaries for `text`, in chars.
    pub fn spans(&self, text: &str) -> Vec<Span> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut spans = Vec::new();
        if n == 0 {
            return spans;
        }

        let mut start: usize = 0;
        let mut prev_end: usize = 0;
        loop {
            let limit = start + self.chunk_size;
            let end = if limit >= n {
                n
            } else {
                self.find_cut(&chars, start, limit)
            };

            spans.push(Span {
                start,
                end,
                overlap: prev_end.saturating_sub(start),
            });
            if end == n {
                break;
            }

            prev_end = end;
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        spans
    }

    /// Best cut point in `(start + chunk_size / 2)..=limit`; `limit` if none.
    fn find_cut(&self, chars: &[char], start: usize, limit: usize) -> usize {
        let min_cut = start + (self.chunk_size / 2).max(1);
        let candidates = || (min_cut..=limit).rev();

        // Paragraph break
        if let Some(cut) = candidates().find(|&c| c >= 2 && chars[c - 2] == '\n' && chars[c - 1] == '\n') {
            return cut;
        }

        // Sentence end followed by whitespace (CJK full stop needs none)
        let sentence_end = |c: usize| {
            let r = chars[c - 1];
            r == '。' || r == '\n' || (matches!(r, '.' | '!' | '?') && chars[c].is_whitespace())
        };
        if let Some(cut) = candidates().find(|&c| sentence_end(c)) {
            return cut;
        }

        // Any whitespace
        if let Some(cut) = candidates().find(|&c| chars[c - 1].is_whitespace()) {
            return cut;
        }

        limit
    }

    /// Split a document into chunks that inherit its metadata.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let offsets: Vec<usize> = doc
            .raw_text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(doc.raw_text.len()))
            .collect();

        self.spans(&doc.raw_text)
            .into_iter()
            .enumerate()
            .map(|(position, span)| {
                let mut metadata = doc.metadata.clone();
                metadata.insert(
                    "chunk_position".into(),
                    MetadataValue::Integer(position as i64),
                );
                Chunk {
                    id: format!("{}#{position}", doc.id),
                    document_id: doc.id.clone(),
                    text: doc.raw_text[offsets[span.start]..offsets[span.end]].to_string(),
                    position,
                    start: span.start,
                    overlap: span.overlap,
                    metadata,
                }
            })
            .collect()
    }
}
