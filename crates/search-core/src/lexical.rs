use common::{ConfigError, Document, RetrievalError, RetrieverConfig};
use tracing::{debug, warn};

use crate::{
    bm25::{Bm25Scorer, ScoredDocument},
    candidates::CandidateFetcher,
    retrieval::Retriever,
    tokenize::{select_filter_tokens, tokenize},
};

/// Keyword retrieval: tokenize, filter candidates in the store, score the
/// candidates with BM25.
pub struct Bm25Retriever<F> {
    fetcher: F,
    scorer: Bm25Scorer,
    k: usize,
    candidate_limit: usize,
    max_tokens_in_query: usize,
    metadata_columns: Vec<String>,
}

impl<F: CandidateFetcher> Bm25Retriever<F> {
    pub fn new(fetcher: F, config: &RetrieverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            scorer: Bm25Scorer::new(config.bm25),
            k: config.k,
            candidate_limit: config.candidate_limit,
            max_tokens_in_query: config.max_tokens_in_query,
            metadata_columns: config.metadata_columns.clone(),
        })
    }

    pub const fn k(&self) -> usize {
        self.k
    }

    pub fn retrieve_scored(&self, query: &str) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            debug!("query produced no tokens, skipping candidate fetch");
            return Ok(Vec::new());
        }

        let filter_tokens = select_filter_tokens(&tokens, self.max_tokens_in_query);
        let mut rows = self.fetcher.fetch(&filter_tokens, self.candidate_limit)?;
        if rows.is_empty() {
            debug!(tokens = ?filter_tokens, "no lexical candidates");
            return Ok(Vec::new());
        }
        if rows.len() > self.candidate_limit {
            warn!(
                returned = rows.len(),
                limit = self.candidate_limit,
                "candidate fetcher exceeded its row cap, truncating"
            );
            rows.truncate(self.candidate_limit);
        }

        let candidates = rows
            .into_iter()
            .enumerate()
            .map(|(row, candidate)| candidate.project(row, &self.metadata_columns))
            .collect::<Result<Vec<Document>, _>>()?;
        let candidate_count = candidates.len();

        let ranked = self.scorer.score(&filter_tokens, candidates, self.k);
        debug!(
            tokens = ?filter_tokens,
            candidates = candidate_count,
            returned = ranked.len(),
            "bm25 retrieval complete"
        );
        Ok(ranked)
    }
}

impl<F: CandidateFetcher> Retriever for Bm25Retriever<F> {
    fn retrieve(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        Ok(self
            .retrieve_scored(query)?
            .into_iter()
            .map(|scored| scored.document)
            .collect())
    }
}
