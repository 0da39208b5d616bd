pub mod bm25;
pub mod candidates;
pub mod fusion;
pub mod lexical;
pub mod retrieval;
pub mod sqlite;
pub mod tokenize;
pub mod vector;

pub use bm25::{BM25_SCORE_KEY, Bm25Index, Bm25Scorer, ScoredDocument};
pub use candidates::{CandidateFetcher, InMemoryCandidateStore, RawCandidate};
pub use fusion::{DEFAULT_RRF_CONSTANT, FusedDocument, RankedList, rrf_fuse};
pub use lexical::Bm25Retriever;
pub use retrieval::{HybridRetriever, Retriever};
pub use sqlite::SqliteCandidateStore;
pub use tokenize::{select_filter_tokens, tokenize};
pub use vector::{PrecomputedSimilarity, VectorSimilarity};
