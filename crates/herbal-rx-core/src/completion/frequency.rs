//! Frequency counting with stable ranking.

use std::collections::HashMap;

/// Counts occurrences of terms, remembering first-seen order for ties.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    /// term → (count, first_seen)
    counts: HashMap<String, (usize, usize)>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `term`.
    pub fn add(&mut self, term: &str) {
        let next = self.counts.len();
        self.counts
            .entry(term.to_string())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, next));
    }

    pub fn count(&self, term: &str) -> usize {
        self.counts.get(term).map(|(count, _)| *count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Distinct terms, in no particular order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// The `n` most frequent terms; ties keep first-seen order.
    pub fn most_common(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<(&String, &(usize, usize))> = self.counts.iter().collect();
        ranked.sort_by(|(_, (count_a, seen_a)), (_, (count_b, seen_b))| {
            count_b.cmp(count_a).then(seen_a.cmp(seen_b))
        });
        ranked
            .into_iter()
            .take(n)
            .map(|(term, _)| term.clone())
            .collect()
    }
}
