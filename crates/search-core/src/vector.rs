use std::sync::Arc;

use anyhow::Result;
use common::Document;

/// Semantic search collaborator: best matches first, scoring opaque.
pub trait VectorSimilarity: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

impl<T: VectorSimilarity + ?Sized> VectorSimilarity for Arc<T> {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        (**self).search(query, k)
    }
}

impl<T: VectorSimilarity + ?Sized> VectorSimilarity for &T {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        (**self).search(query, k)
    }
}

/// Returns the same precomputed ranking for every query, truncated to `k`.
/// Useful when semantic results are produced out of process.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedSimilarity {
    ranked: Vec<Document>,
}

impl PrecomputedSimilarity {
    pub const fn new(ranked: Vec<Document>) -> Self {
        Self { ranked }
    }
}

impl VectorSimilarity for PrecomputedSimilarity {
    fn search(&self, _query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self.ranked.iter().take(k).cloned().collect())
    }
}
