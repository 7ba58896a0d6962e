//! Relatedness ranking — scores every passage against the query embedding.
//!
//! Linear scan over the whole corpus. Scoring is split across the rayon pool;
//! the collected scores keep corpus order so the stable sort breaks exact ties
//! by corpus position.

use rayon::prelude::*;

use ragbot_core::error::{FailureReason, RagBotError, Result};

use crate::corpus::Corpus;

/// Passages returned when the caller has no preference.
pub const DEFAULT_TOP_N: usize = 100;

/// One scored passage, borrowed from the corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedResult<'c> {
    /// Position of the passage in the corpus.
    pub index: usize,
    pub text: &'c str,
    pub score: f32,
}

/// `1 - cosine_distance(a, b)`.
///
/// Accumulates in f64. Returns 0.0 when either vector has zero norm. The
/// result can drift slightly outside [-1, 1] for near-identical vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Rank corpus passages by `similarity(query, passage)`, best first.
///
/// Returns at most `top_n` results. The query must have the corpus
/// dimensionality; anything else is an embedding error rather than a score.
pub fn rank<'c, F>(
    query_embedding: &[f32],
    corpus: &'c Corpus,
    similarity: F,
    top_n: usize,
) -> Result<Vec<RankedResult<'c>>>
where
    F: Fn(&[f32], &[f32]) -> f32 + Sync,
{
    if query_embedding.is_empty() {
        return Err(RagBotError::embedding(
            FailureReason::Malformed,
            "query embedding is empty",
        ));
    }
    if query_embedding.len() != corpus.dimensions() {
        return Err(RagBotError::embedding(
            FailureReason::Malformed,
            format!(
                "query embedding has {} dimensions, corpus has {}",
                query_embedding.len(),
                corpus.dimensions()
            ),
        ));
    }

    let mut ranked: Vec<RankedResult<'c>> = corpus
        .entries()
        .par_iter()
        .enumerate()
        .map(|(index, entry)| RankedResult {
            index,
            text: entry.text.as_str(),
            score: similarity(query_embedding, &entry.embedding),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_n);

    tracing::debug!(
        "🔎 Ranked {} passages, kept {} (best score {:?})",
        corpus.len(),
        ranked.len(),
        ranked.first().map(|r| r.score)
    );
    Ok(ranked)
}

/// [`rank`] with cosine similarity.
pub fn rank_by_cosine<'c>(
    query_embedding: &[f32],
    corpus: &'c Corpus,
    top_n: usize,
) -> Result<Vec<RankedResult<'c>>> {
    rank(query_embedding, corpus, cosine_similarity, top_n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusEntry;
    use proptest::prelude::*;

    fn awards_corpus() -> Corpus {
        Corpus::from_entries(vec![
            CorpusEntry::new("Winner: Film A", vec![1.0, 0.0]),
            CorpusEntry::new("Nominee: Film B", vec![0.0, 1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_example() {
        let corpus = awards_corpus();
        let ranked = rank_by_cosine(&[1.0, 0.0], &corpus, 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "Winner: Film A");
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
        assert_eq!(ranked[1].text, "Nominee: Film B");
        assert!(ranked[1].score.abs() < 1e-6);
    }

    #[test]
    fn test_rank_truncates_and_handles_small_corpus() {
        let corpus = awards_corpus();
        assert_eq!(rank_by_cosine(&[0.0, 1.0], &corpus, 1).unwrap().len(), 1);
        assert_eq!(rank_by_cosine(&[0.0, 1.0], &corpus, DEFAULT_TOP_N).unwrap().len(), 2);
        assert!(rank_by_cosine(&[0.0, 1.0], &corpus, 0).unwrap().is_empty());
    }

    #[test]
    fn test_rank_ties_keep_corpus_order() {
        let corpus = Corpus::from_entries(vec![
            CorpusEntry::new("first", vec![1.0, 1.0]),
            CorpusEntry::new("other", vec![-1.0, 0.0]),
            CorpusEntry::new("second", vec![2.0, 2.0]),
            CorpusEntry::new("third", vec![0.5, 0.5]),
        ])
        .unwrap();
        let ranked = rank(&[1.0, 1.0], &corpus, |_, b| b[0].signum(), 10).unwrap();
        let texts: Vec<_> = ranked.iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["first", "second", "third", "other"]);
    }

    #[test]
    fn test_rank_custom_similarity() {
        let corpus = awards_corpus();
        let ranked = rank(&[1.0, 0.0], &corpus, |a, b| -cosine_similarity(a, b), 2).unwrap();
        assert_eq!(ranked[0].text, "Nominee: Film B");
    }

    #[test]
    fn test_rank_dimension_mismatch_is_embedding_error() {
        let corpus = awards_corpus();
        let err = rank_by_cosine(&[1.0, 0.0, 0.0], &corpus, 2).unwrap_err();
        assert!(matches!(
            err,
            RagBotError::Embedding { reason: FailureReason::Malformed, .. }
        ));
        assert!(rank_by_cosine(&[], &corpus, 2).is_err());
    }

    fn corpus_strategy() -> impl Strategy<Value = (Corpus, Vec<f32>)> {
        (1usize..6).prop_flat_map(|dims| {
            (
                prop::collection::vec(prop::collection::vec(-10.0f32..10.0, dims), 1..40),
                prop::collection::vec(-10.0f32..10.0, dims),
            )
                .prop_map(|(vectors, query)| {
                    let entries = vectors
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| CorpusEntry::new(format!("passage {i}"), v))
                        .collect();
                    (Corpus::from_entries(entries).unwrap(), query)
                })
        })
    }

    proptest! {
        #[test]
        fn prop_rank_sorted_and_bounded((corpus, query) in corpus_strategy(), top_n in 0usize..50) {
            let ranked = rank_by_cosine(&query, &corpus, top_n).unwrap();
            prop_assert!(ranked.len() <= top_n);
            prop_assert!(ranked.len() <= corpus.len());
            prop_assert_eq!(ranked.len(), top_n.min(corpus.len()));
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }

        #[test]
        fn prop_rank_is_idempotent((corpus, query) in corpus_strategy()) {
            let first = rank_by_cosine(&query, &corpus, DEFAULT_TOP_N).unwrap();
            let second = rank_by_cosine(&query, &corpus, DEFAULT_TOP_N).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
