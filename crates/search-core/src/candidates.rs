use std::sync::Arc;

use anyhow::Result;
use common::{Document, Metadata, RetrievalError};

/// A row as returned by a candidate store: the primary text plus whatever
/// passthrough columns the store selected.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub content: String,
    pub columns: Metadata,
}

impl RawCandidate {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            columns: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    /// Builds the output document, keeping only `metadata_columns` in that
    /// order. `row` is the fetch position, used in the error.
    pub fn project(
        self,
        row: usize,
        metadata_columns: &[String],
    ) -> Result<Document, RetrievalError> {
        let Self {
            content,
            mut columns,
        } = self;
        let mut metadata = Metadata::new();
        for column in metadata_columns {
            let value = columns
                .remove(column)
                .ok_or_else(|| RetrievalError::MalformedRow {
                    row,
                    column: column.clone(),
                })?;
            metadata.insert(column.clone(), value);
        }
        Ok(Document { content, metadata })
    }
}

/// Store-side candidate filter.
///
/// Implementations return rows whose content contains at least one of
/// `tokens` as a case-insensitive substring, at most `limit` of them, in any
/// order. Tokens are always bound as values, never spliced into query text.
pub trait CandidateFetcher: Send + Sync {
    fn fetch(&self, tokens: &[String], limit: usize) -> Result<Vec<RawCandidate>>;
}

impl<T: CandidateFetcher + ?Sized> CandidateFetcher for Arc<T> {
    fn fetch(&self, tokens: &[String], limit: usize) -> Result<Vec<RawCandidate>> {
        (**self).fetch(tokens, limit)
    }
}

impl<T: CandidateFetcher + ?Sized> CandidateFetcher for &T {
    fn fetch(&self, tokens: &[String], limit: usize) -> Result<Vec<RawCandidate>> {
        (**self).fetch(tokens, limit)
    }
}

/// Candidate store over documents held in memory, scanned in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandidateStore {
    documents: Vec<Document>,
    lowered: Vec<String>,
}

impl InMemoryCandidateStore {
    pub fn new(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut store = Self::default();
        for doc in documents {
            store.push(doc);
        }
        store
    }

    pub fn push(&mut self, document: Document) {
        self.lowered.push(document.content.to_lowercase());
        self.documents.push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl CandidateFetcher for InMemoryCandidateStore {
    fn fetch(&self, tokens: &[String], limit: usize) -> Result<Vec<RawCandidate>> {
        let rows = self
            .documents
            .iter()
            .zip(&self.lowered)
            .filter(|(_, lowered)| tokens.iter().any(|t| lowered.contains(t.as_str())))
            .take(limit)
            .map(|(doc, _)| RawCandidate {
                content: doc.content.clone(),
                columns: doc.metadata.clone(),
            })
            .collect();
        Ok(rows)
    }
}
