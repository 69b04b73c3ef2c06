use super::{IndexEntry, IndexError, VectorIndex};

/// One search result, borrowed from the index.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub entry: &'a IndexEntry,
    pub distance: f32,
    /// Relevance derived from `distance`; higher is better.
    pub score: f32,
}

impl VectorIndex {
    /// Return the `k` entries closest to `query`, nearest first.
    ///
    /// Ties keep insertion order. Fewer than `k` hits only when the index
    /// holds fewer than `k` entries.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>, IndexError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_vector(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (slot, self.metric.distance(query, &entry.embedding)))
            .collect();

        // Stable sort on slot order keeps ties in insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(slot, distance)| SearchHit {
                entry: &self.entries[slot],
                distance,
                score: self.metric.score(distance),
            })
            .collect())
    }
}
