//! Okapi BM25 over a per-query candidate set.
//!
//! Corpus statistics (document frequency, IDF, average length) come only from
//! the candidates fetched for the current query, not from the whole
//! collection. IDF is therefore query-dependent and scores are not comparable
//! across requests; only the ordering within one request is meaningful.

use ahash::AHashMap;
use common::{Bm25Params, Document};
use serde::Serialize;

use crate::tokenize::tokenize;

/// Metadata key carrying the raw BM25 score on lexical results.
pub const BM25_SCORE_KEY: &str = "bm25_score";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
    pub source: String,
}

/// Term statistics for one tokenized candidate corpus.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    params: Bm25Params,
    doc_freqs: Vec<AHashMap<String, usize>>,
    doc_len: Vec<usize>,
    avgdl: f64,
    idf: AHashMap<String, f64>,
}

impl Bm25Index {
    pub fn new(corpus: &[Vec<String>], params: Bm25Params) -> Self {
        let mut doc_freqs = Vec::with_capacity(corpus.len());
        let mut doc_len = Vec::with_capacity(corpus.len());
        let mut vocabulary = Vocabulary::default();
        let mut total_len = 0usize;

        for document in corpus {
            let mut frequencies = AHashMap::<String, usize>::new();
            for term in document {
                let count = frequencies.entry(term.clone()).or_insert(0);
                if *count == 0 {
                    vocabulary.record(term);
                }
                *count += 1;
            }
            total_len += document.len();
            doc_len.push(document.len());
            doc_freqs.push(frequencies);
        }

        let avgdl = if corpus.is_empty() {
            0.0
        } else {
            total_len as f64 / corpus.len() as f64
        };
        let idf = vocabulary.idf(corpus.len(), params.epsilon);

        Self {
            params,
            doc_freqs,
            doc_len,
            avgdl,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_len.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_len.is_empty()
    }

    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    /// One score per corpus document, in corpus order.
    pub fn scores(&self, query: &[String]) -> Vec<f64> {
        let Bm25Params { k1, b, .. } = self.params;
        let mut scores = vec![0.0; self.len()];
        for term in query {
            let idf = self.idf(term);
            for (idx, frequencies) in self.doc_freqs.iter().enumerate() {
                let Some(&freq) = frequencies.get(term.as_str()) else {
                    continue;
                };
                let freq = freq as f64;
                let norm = 1.0 - b + b * self.doc_len[idx] as f64 / self.avgdl;
                scores[idx] += idf * (freq * (k1 + 1.0)) / (freq + k1 * norm);
            }
        }
        scores
    }
}

/// Document frequencies in first-seen order, so the IDF average is summed
/// in the same order on every run.
#[derive(Default)]
struct Vocabulary {
    terms: Vec<(String, usize)>,
    positions: AHashMap<String, usize>,
}

impl Vocabulary {
    fn record(&mut self, term: &str) {
        if let Some(&pos) = self.positions.get(term) {
            self.terms[pos].1 += 1;
        } else {
            self.positions.insert(term.to_string(), self.terms.len());
            self.terms.push((term.to_string(), 1));
        }
    }

    /// `ln(N - n + 0.5) - ln(n + 0.5)` per term. Terms at or below zero are
    /// raised to `epsilon * mean(idf)`; when that product is itself not
    /// positive (tiny candidate sets where most terms are common) the floor
    /// is `epsilon`.
    fn idf(self, corpus_size: usize, epsilon: f64) -> AHashMap<String, f64> {
        let n = corpus_size as f64;
        let mut idf = AHashMap::with_capacity(self.terms.len());
        let mut idf_sum = 0.0;
        let mut floored = Vec::new();

        for (term, freq) in self.terms {
            let freq = freq as f64;
            let value = (n - freq + 0.5).ln() - (freq + 0.5).ln();
            idf_sum += value;
            if value <= 0.0 {
                floored.push(term.clone());
            }
            idf.insert(term, value);
        }
        if idf.is_empty() {
            return idf;
        }

        let average = idf_sum / idf.len() as f64;
        let floor = if epsilon * average > 0.0 {
            epsilon * average
        } else {
            epsilon
        };
        for term in floored {
            idf.insert(term, floor);
        }
        idf
    }
}

/// Ranks candidate documents against query tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    pub const SOURCE: &'static str = "bm25";

    pub const fn new(params: Bm25Params) -> Self {
        Self { params }
    }

    /// Scores every candidate, sorts by score descending (ties keep fetch
    /// order), truncates to `k` and records the score under
    /// [`BM25_SCORE_KEY`].
    pub fn score(
        &self,
        query_tokens: &[String],
        candidates: Vec<Document>,
        k: usize,
    ) -> Vec<ScoredDocument> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let corpus = candidates
            .iter()
            .map(|doc| tokenize(&doc.content))
            .collect::<Vec<_>>();
        let index = Bm25Index::new(&corpus, self.params);
        let scores = index.scores(query_tokens);

        let mut ranked = candidates.into_iter().zip(scores).collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(mut document, score)| {
                document
                    .metadata
                    .insert(BM25_SCORE_KEY.to_string(), score.into());
                ScoredDocument {
                    document,
                    score,
                    source: Self::SOURCE.to_string(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use common::{Bm25Params, Document};

    use super::{BM25_SCORE_KEY, Bm25Index, Bm25Scorer};
    use crate::tokenize::tokenize;

    fn docs(contents: &[&str]) -> Vec<Document> {
        contents.iter().map(|c| Document::new(*c)).collect()
    }

    fn query(text: &str) -> Vec<String> {
        tokenize(text)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn matches_okapi_scores_when_average_idf_is_positive() {
        let corpus = [
            "The quick brown fox jumps over the lazy dog",
            "Python is a great programming language for data science",
            "Python programming with advanced techniques in Python",
        ]
        .iter()
        .map(|c| tokenize(c))
        .collect::<Vec<_>>();
        let index = Bm25Index::new(&corpus, Bm25Params::default());

        // python appears in 2 of 3 documents, so its raw idf is negative and
        // it takes 0.25 * mean idf.
        assert_close(index.idf("python"), 0.102_165_124_753_198_12);
        let scores = index.scores(&query("programming python"));
        assert_close(scores[0], 0.0);
        assert_close(scores[1], 0.196_299_803_019_245_3);
        assert_close(scores[2], 0.222_537_895_502_015_72);
    }

    #[test]
    fn floor_stays_positive_for_tiny_candidate_sets() {
        let corpus = vec![tokenize("Información sobre diseño técnico")];
        let index = Bm25Index::new(&corpus, Bm25Params::default());
        assert_close(index.idf("diseño"), 0.25);
        let scores = index.scores(&query("información diseño"));
        assert_close(scores[0], 0.5);
    }

    #[test]
    fn zero_idf_terms_are_floored_unlike_okapi() {
        // beta and gamma sit in exactly half the candidates (raw idf 0),
        // alpha in all of them (raw idf < 0). The mean is negative, so every
        // such term takes epsilon instead of keeping 0 or a negative weight.
        let corpus = vec![tokenize("alpha beta"), tokenize("alpha gamma")];
        let index = Bm25Index::new(&corpus, Bm25Params::default());
        assert_close(index.idf("beta"), 0.25);
        assert_close(index.idf("alpha"), 0.25);
        let scores = index.scores(&query("beta"));
        assert!(scores[0] > 0.0);
        assert_close(scores[1], 0.0);
    }

    #[test]
    fn unknown_query_terms_contribute_nothing() {
        let corpus = vec![tokenize("alpha beta"), tokenize("gamma delta")];
        let index = Bm25Index::new(&corpus, Bm25Params::default());
        assert_eq!(index.scores(&query("omega")), vec![0.0, 0.0]);
    }

    #[test]
    fn scorer_orders_descending_and_records_score() {
        let scorer = Bm25Scorer::default();
        let ranked = scorer.score(
            &query("python programming"),
            docs(&[
                "The quick brown fox jumps over the lazy dog",
                "Python is a great programming language for data science",
                "Python programming with advanced techniques in Python",
            ]),
            10,
        );
        assert_eq!(ranked.len(), 3);
        assert_eq!(
            ranked[0].document.content,
            "Python programming with advanced techniques in Python"
        );
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for item in &ranked {
            assert_eq!(item.document.metadata[BM25_SCORE_KEY], item.score);
            assert_eq!(item.source, Bm25Scorer::SOURCE);
        }
    }

    #[test]
    fn ties_keep_fetch_order_and_truncate() {
        let candidates = (0..20)
            .map(|i| Document::new(format!("Document number {i}")))
            .collect::<Vec<_>>();
        let ranked = Bm25Scorer::default().score(&query("document number"), candidates, 3);
        let contents = ranked
            .iter()
            .map(|r| r.document.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            contents,
            vec!["Document number 0", "Document number 1", "Document number 2"]
        );
        assert_close(ranked[0].score, 0.834_356_659_395_913_3);
    }

    #[test]
    fn more_matching_terms_never_score_lower() {
        let ranked = Bm25Scorer::default().score(
            &query("rust borrow checker"),
            docs(&[
                "rust memory model overview",
                "rust borrow checker overview",
                "garbage collected runtime overview",
            ]),
            10,
        );
        assert_eq!(ranked[0].document.content, "rust borrow checker overview");
        assert_eq!(ranked[1].document.content, "rust memory model overview");
        assert!(ranked[1].score >= ranked[2].score);
    }

    #[test]
    fn scoring_is_reproducible() {
        let candidates = docs(&["red apple pie", "green apple", "banana bread"]);
        let scorer = Bm25Scorer::default();
        let first = scorer.score(&query("apple pie"), candidates.clone(), 10);
        let second = scorer.score(&query("apple pie"), candidates, 10);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_candidates_yield_empty_list() {
        assert!(
            Bm25Scorer::default()
                .score(&query("anything"), Vec::new(), 5)
                .is_empty()
        );
    }

    #[test]
    fn candidates_without_tokens_score_zero() {
        let ranked = Bm25Scorer::default().score(&query("word"), docs(&["!!", "?"]), 5);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.score == 0.0));
    }
}
