use ahash::AHashMap;
use common::Document;
use serde::Serialize;

/// Conventional RRF constant from the literature.
pub const DEFAULT_RRF_CONSTANT: f64 = 60.0;

/// One strategy's results, best first, with the weight it carries in fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    pub source: String,
    pub weight: f64,
    pub documents: Vec<Document>,
}

impl RankedList {
    pub fn new(source: impl Into<String>, weight: f64, documents: Vec<Document>) -> Self {
        Self {
            source: source.into(),
            weight,
            documents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedDocument {
    pub document: Document,
    pub score: f64,
    /// Lists that contributed to `score`, in the order they first did.
    pub sources: Vec<String>,
}

/// Reciprocal rank fusion keyed by document content.
///
/// A document at zero-based rank `r` in a list of weight `w` adds
/// `w / (rrf_constant + r + 1)`. The first occurrence of a content string
/// supplies the metadata. Equal fused scores keep first-encounter order.
pub fn rrf_fuse(lists: &[RankedList], k: usize, rrf_constant: f64) -> Vec<FusedDocument> {
    let mut positions: AHashMap<&str, usize> = AHashMap::new();
    let mut fused: Vec<FusedDocument> = Vec::new();

    for list in lists {
        for (rank, doc) in list.documents.iter().enumerate() {
            let rr = list.weight / (rrf_constant + (rank + 1) as f64);
            if let Some(&pos) = positions.get(doc.content.as_str()) {
                let entry = &mut fused[pos];
                entry.score += rr;
                if !entry.sources.contains(&list.source) {
                    entry.sources.push(list.source.clone());
                }
            } else {
                positions.insert(doc.content.as_str(), fused.len());
                fused.push(FusedDocument {
                    document: doc.clone(),
                    score: rr,
                    sources: vec![list.source.clone()],
                });
            }
        }
    }

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use common::Document;
    use proptest::prelude::*;

    use super::{DEFAULT_RRF_CONSTANT, RankedList, rrf_fuse};

    fn list(source: &str, weight: f64, contents: &[&str]) -> RankedList {
        RankedList::new(
            source,
            weight,
            contents.iter().map(|c| Document::new(*c)).collect(),
        )
    }

    fn contents(fused: &[super::FusedDocument]) -> Vec<&str> {
        fused.iter().map(|f| f.document.content.as_str()).collect()
    }

    #[test]
    fn rrf_boosts_items_present_in_both_lists() {
        let fused = rrf_fuse(
            &[list("a", 1.0, &["A", "B"]), list("b", 1.0, &["B", "C"])],
            10,
            DEFAULT_RRF_CONSTANT,
        );
        assert_eq!(contents(&fused), vec!["B", "A", "C"]);
        assert_eq!(fused[0].sources, vec!["a", "b"]);
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_list_reproduces_the_other_ranking() {
        let fused = rrf_fuse(
            &[
                list("semantic", 0.0, &["v1", "shared", "v2"]),
                list("lexical", 1.0, &["k1", "k2", "shared"]),
            ],
            10,
            DEFAULT_RRF_CONSTANT,
        );
        assert_eq!(contents(&fused), vec!["k1", "k2", "shared", "v1", "v2"]);
        assert!(fused[3].score.abs() < f64::EPSILON);
    }

    #[test]
    fn first_seen_metadata_wins() {
        let first = Document::new("same").with_metadata("origin", "vector");
        let second = Document::new("same").with_metadata("origin", "keyword");
        let fused = rrf_fuse(
            &[
                RankedList::new("v", 0.5, vec![first]),
                RankedList::new("k", 0.5, vec![second]),
            ],
            10,
            DEFAULT_RRF_CONSTANT,
        );
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].document.metadata["origin"], "vector");
    }

    #[test]
    fn ties_prefer_earlier_lists() {
        let fused = rrf_fuse(
            &[list("v", 0.5, &["vec_only"]), list("k", 0.5, &["kw_only"])],
            10,
            DEFAULT_RRF_CONSTANT,
        );
        assert_eq!(contents(&fused), vec!["vec_only", "kw_only"]);
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(rrf_fuse(&[], 10, DEFAULT_RRF_CONSTANT).is_empty());
        assert!(
            rrf_fuse(
                &[list("a", 1.0, &[]), list("b", 1.0, &[])],
                10,
                DEFAULT_RRF_CONSTANT
            )
            .is_empty()
        );
    }

    #[test]
    fn rrf_constant_changes_low_rank_influence() {
        let lists = [
            list("a", 1.0, &["X", "Y", "Z"]),
            list("b", 1.0, &["Z", "W", "V"]),
        ];
        // Without damping, Z's first place in b plus third place in a beats
        // X's single first place.
        let small = rrf_fuse(&lists, 10, 0.0);
        assert_eq!(small[0].document.content, "Z");
        assert!((small[0].score - (1.0 / 3.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn truncates_to_k() {
        let fused = rrf_fuse(
            &[list("a", 1.0, &["1", "2", "3"]), list("b", 1.0, &["4", "5"])],
            2,
            DEFAULT_RRF_CONSTANT,
        );
        assert_eq!(fused.len(), 2);
    }

    proptest! {
        #[test]
        fn output_is_distinct_and_bounded(
            a in proptest::collection::vec("[a-e]", 0..8),
            b in proptest::collection::vec("[a-e]", 0..8),
            wa in 0.0f64..1.0,
            k in 1usize..12,
        ) {
            let lists = [
                RankedList::new("a", wa, a.iter().map(Document::new).collect()),
                RankedList::new("b", 1.0 - wa, b.iter().map(Document::new).collect()),
            ];
            let mut distinct = a.clone();
            distinct.extend(b.iter().cloned());
            distinct.sort();
            distinct.dedup();

            let fused = rrf_fuse(&lists, k, DEFAULT_RRF_CONSTANT);
            prop_assert_eq!(fused.len(), k.min(distinct.len()));

            let mut seen = std::collections::HashSet::new();
            for item in &fused {
                prop_assert!(seen.insert(item.document.content.clone()));
            }
            for pair in fused.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
