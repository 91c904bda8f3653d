//! Explorer - the shared dataset resource
//!
//! One `Explorer` is constructed at startup around the loaded collision
//! table and reused for every user action. It owns the table behind an `Arc`
//! (concurrent readers in a threaded host all see the same immutable data),
//! and it precomputes the two search vocabularies once so each keystroke does
//! not rescan the person-type and injury columns.

use crate::aggregate::Report;
use crate::dataset::{roles, Dataset};
use crate::filter::{apply_filters, FilterSpec};
use crate::query::{parse_query, ParsedQuery};
use log::debug;
use std::sync::Arc;

/// Read-only session state: the dataset plus its derived vocabularies
#[derive(Debug, Clone)]
pub struct Explorer {
    dataset: Arc<Dataset>,
    person_type_vocab: Vec<String>,
    injury_vocab: Vec<String>,
}

impl Explorer {
    pub fn new(dataset: Dataset) -> Self {
        Self::from_shared(Arc::new(dataset))
    }

    /// Wrap an already-shared dataset (tests hand in small fresh tables this
    /// way instead of re-reading anything)
    pub fn from_shared(dataset: Arc<Dataset>) -> Self {
        let person_type_vocab = dataset.vocabulary(roles::PERSON_TYPE);
        let injury_vocab = dataset.vocabulary(roles::PERSON_INJURY);
        debug!(
            "explorer ready: {} rows, {} person types, {} injury labels",
            dataset.len(),
            person_type_vocab.len(),
            injury_vocab.len()
        );
        Self {
            dataset,
            person_type_vocab,
            injury_vocab,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Person-type labels present in the data, parser vocabulary
    pub fn person_type_vocabulary(&self) -> &[String] {
        &self.person_type_vocab
    }

    /// Injury labels present in the data, parser vocabulary
    pub fn injury_vocabulary(&self) -> &[String] {
        &self.injury_vocab
    }

    /// Parse a search line against this dataset's vocabularies
    pub fn parse(&self, query: &str) -> ParsedQuery {
        parse_query(query, &self.person_type_vocab, &self.injury_vocab)
    }

    /// Filtered view of the shared dataset
    pub fn filter(&self, spec: &FilterSpec) -> Dataset {
        apply_filters(&self.dataset, spec)
    }

    /// Filter once, then compute every chart's aggregate from that one view
    pub fn report(&self, spec: &FilterSpec) -> Report {
        let filtered = self.filter(spec);
        Report::build(&filtered)
    }
}
