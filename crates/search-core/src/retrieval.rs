use common::{ConfigError, Document, RetrievalError, RetrieverConfig};
use tracing::debug;

use crate::{
    fusion::{FusedDocument, RankedList, rrf_fuse},
    vector::VectorSimilarity,
};

pub const SEMANTIC_SOURCE: &str = "semantic";
pub const LEXICAL_SOURCE: &str = "lexical";

/// A retrieval strategy that turns a query into ranked documents.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str) -> Result<Vec<Document>, RetrievalError>;
}

impl<T: Retriever + ?Sized> Retriever for &T {
    fn retrieve(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        (**self).retrieve(query)
    }
}

impl<T: Retriever + ?Sized> Retriever for Box<T> {
    fn retrieve(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        (**self).retrieve(query)
    }
}

/// Fuses a semantic ranking (weight `alpha`) with a lexical ranking
/// (weight `1 - alpha`) by reciprocal rank. `alpha = 0` ranks by keywords
/// alone, `alpha = 1` by semantics alone.
///
/// Holds no per-request state; each call is independent.
pub struct HybridRetriever<L, V> {
    lexical: L,
    semantic: V,
    alpha: f64,
    k: usize,
    rrf_constant: f64,
}

impl<L: Retriever, V: VectorSimilarity> HybridRetriever<L, V> {
    pub fn new(lexical: L, semantic: V, config: &RetrieverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            lexical,
            semantic,
            alpha: config.alpha,
            k: config.k,
            rrf_constant: config.rrf_constant,
        })
    }

    pub fn retrieve_fused(&self, query: &str) -> Result<Vec<FusedDocument>, RetrievalError> {
        let semantic = self.semantic.search(query, self.k)?;
        let lexical = self.lexical.retrieve(query)?;
        debug!(
            semantic = semantic.len(),
            lexical = lexical.len(),
            alpha = self.alpha,
            "fusing hybrid rankings"
        );

        let lists = [
            RankedList::new(SEMANTIC_SOURCE, self.alpha, semantic),
            RankedList::new(LEXICAL_SOURCE, 1.0 - self.alpha, lexical),
        ];
        Ok(rrf_fuse(&lists, self.k, self.rrf_constant))
    }
}

impl<L: Retriever, V: VectorSimilarity> Retriever for HybridRetriever<L, V> {
    fn retrieve(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        Ok(self
            .retrieve_fused(query)?
            .into_iter()
            .map(|fused| fused.document)
            .collect())
    }
}
