//! Smart completion vocabulary.
//!
//! Pipeline: record history → term extraction → frequency ranking → snapshot
//!
//! The index is rebuilt from the complete record set every time; there is no
//! incremental update. Building is infallible. Reading the records is not, so
//! [`Vocabulary::refresh`] keeps the last good snapshot when the store fails.

mod frequency;
mod tokenizer;

pub use frequency::*;
pub use tokenizer::*;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::db::RecordSource;
use crate::layout::prescription_lines;
use crate::models::PrescriptionRecord;

/// Default number of results returned by [`VocabularyIndex::filter`].
pub const DEFAULT_FILTER_LIMIT: usize = 50;

/// Suggestion tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VocabularyCategory {
    Medicines,
    Diagnoses,
    Phrases,
    Usages,
    /// Union of medicines, diagnoses and usages
    All,
}

impl VocabularyCategory {
    pub const ALL: [VocabularyCategory; 5] = [
        VocabularyCategory::Medicines,
        VocabularyCategory::Diagnoses,
        VocabularyCategory::Phrases,
        VocabularyCategory::Usages,
        VocabularyCategory::All,
    ];

    /// Tab label.
    pub fn label(self) -> &'static str {
        match self {
            VocabularyCategory::Medicines => "常用药材",
            VocabularyCategory::Diagnoses => "常用诊断",
            VocabularyCategory::Phrases => "常用处方",
            VocabularyCategory::Usages => "常用用法",
            VocabularyCategory::All => "全部词条",
        }
    }

    /// Ranked size of the category; `None` for the unbounded union.
    pub fn limit(self) -> Option<usize> {
        match self {
            VocabularyCategory::Medicines => Some(100),
            VocabularyCategory::Diagnoses => Some(50),
            VocabularyCategory::Phrases => Some(30),
            VocabularyCategory::Usages => Some(20),
            VocabularyCategory::All => None,
        }
    }
}

/// Ranked suggestion lists mined from the record history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyIndex {
    pub medicines: Vec<String>,
    pub diagnoses: Vec<String>,
    pub phrases: Vec<String>,
    pub usages: Vec<String>,
    /// Sorted, deduplicated union of medicines, diagnoses and usages
    pub all: Vec<String>,
}

impl VocabularyIndex {
    /// Build the index from the full record set.
    pub fn build(records: &[PrescriptionRecord]) -> Self {
        let mut medicines = FrequencyTable::new();
        let mut diagnoses = FrequencyTable::new();
        let mut phrases = FrequencyTable::new();
        let mut usages = FrequencyTable::new();

        for record in records {
            if let Some(diagnosis) = record.diagnosis.as_deref() {
                for term in diagnosis_terms(diagnosis) {
                    diagnoses.add(term);
                }
            }

            for line in prescription_lines(&record.prescription) {
                for name in medicine_terms(line) {
                    medicines.add(name);
                }
                if is_phrase(line) {
                    phrases.add(line);
                }
            }

            if let Some(usage) = record.usage.as_deref().map(str::trim) {
                if !usage.is_empty() {
                    usages.add(usage);
                }
            }
        }

        let all: BTreeSet<&str> = medicines
            .terms()
            .chain(diagnoses.terms())
            .chain(usages.terms())
            .collect();

        Self {
            medicines: ranked(&medicines, VocabularyCategory::Medicines),
            diagnoses: ranked(&diagnoses, VocabularyCategory::Diagnoses),
            phrases: ranked(&phrases, VocabularyCategory::Phrases),
            usages: ranked(&usages, VocabularyCategory::Usages),
            all: all.into_iter().map(str::to_string).collect(),
        }
    }

    /// Terms of one category, in display order.
    pub fn terms(&self, category: VocabularyCategory) -> &[String] {
        match category {
            VocabularyCategory::Medicines => &self.medicines,
            VocabularyCategory::Diagnoses => &self.diagnoses,
            VocabularyCategory::Phrases => &self.phrases,
            VocabularyCategory::Usages => &self.usages,
            VocabularyCategory::All => &self.all,
        }
    }

    /// Case-insensitive substring filter over one category.
    ///
    /// A blank query returns the whole category (up to `limit`).
    pub fn filter(&self, category: VocabularyCategory, query: &str, limit: usize) -> Vec<&str> {
        let query = query.trim().to_lowercase();
        self.terms(category)
            .iter()
            .filter(|term| query.is_empty() || term.to_lowercase().contains(&query))
            .take(limit)
            .map(String::as_str)
            .collect()
    }

    /// Number of distinct terms in the union list.
    pub fn total_terms(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.phrases.is_empty()
    }
}

fn ranked(table: &FrequencyTable, category: VocabularyCategory) -> Vec<String> {
    table.most_common(category.limit().unwrap_or(usize::MAX))
}

/// Current vocabulary snapshot plus the refresh policy around it.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    index: VocabularyIndex,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn index(&self) -> &VocabularyIndex {
        &self.index
    }

    /// Rebuild from the full record set.
    ///
    /// Returns `false` when the records could not be read; the failure is
    /// logged and the previous snapshot stays in place.
    pub fn refresh<S: RecordSource + ?Sized>(&mut self, source: &S) -> bool {
        match source.fetch_all_records() {
            Ok(records) => {
                self.index = VocabularyIndex::build(&records);
                tracing::debug!(
                    records = records.len(),
                    terms = self.index.total_terms(),
                    "Vocabulary refreshed"
                );
                true
            }
            Err(e) => {
                tracing::warn!("Vocabulary refresh failed, keeping previous snapshot: {e}");
                false
            }
        }
    }
}
