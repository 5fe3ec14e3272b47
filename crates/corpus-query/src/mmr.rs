//! Maximal Marginal Relevance reranking.

use corpus_core::{cosine_similarity, SearchResult};

/// Default relevance/diversity trade-off.
pub const DEFAULT_MMR_LAMBDA: f32 = 0.7;

/// Greedily pick up to `top_k` candidates balancing relevance and novelty.
///
/// Each round selects the candidate maximizing
/// `lambda * score - (1 - lambda) * redundancy`, where redundancy is the
/// highest cosine similarity to anything already selected. Redundancy may be
/// negative, which rewards candidates pointing away from the selection.
/// Candidates without an embedding, or with no embedded selection to compare
/// against, have zero redundancy. Ties go to the earlier candidate.
///
/// Selected results keep their original relevance score.
pub fn mmr_select(candidates: Vec<SearchResult>, top_k: usize, lambda: f32) -> Vec<SearchResult> {
    let mut remaining: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    let mut selected: Vec<SearchResult> = Vec::with_capacity(top_k.min(remaining.len()));

    while selected.len() < top_k {
        let mut best: Option<(usize, f32)> = None;

        for (i, slot) in remaining.iter().enumerate() {
            let Some(candidate) = slot else { continue };

            let redundancy = max_similarity(candidate, &selected);
            let mmr = lambda * candidate.score - (1.0 - lambda) * redundancy;

            if best.map_or(true, |(_, b)| mmr > b) {
                best = Some((i, mmr));
            }
        }

        match best.and_then(|(i, _)| remaining[i].take()) {
            Some(pick) => selected.push(pick),
            None => break,
        }
    }

    selected
}

fn max_similarity(candidate: &SearchResult, selected: &[SearchResult]) -> f32 {
    let Some(embedding) = candidate.chunk.embedding.as_deref() else {
        return 0.0;
    };

    let redundancy = selected
        .iter()
        .filter_map(|s| s.chunk.embedding.as_deref())
        .map(|other| cosine_similarity(embedding, other))
        .fold(f32::NEG_INFINITY, f32::max);

    // Nothing selected carries an embedding.
    if redundancy == f32::NEG_INFINITY {
        0.0
    } else {
        redundancy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::{Chunk, ChunkMetadata};
    use ulid::Ulid;

    fn result(content: &str, embedding: Option<Vec<f32>>, score: f32) -> SearchResult {
        let mut chunk = Chunk::new(Ulid::new(), content, 1, 1, ChunkMetadata::default());
        chunk.embedding = embedding;
        SearchResult::new(chunk, score)
    }

    fn contents(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.content.as_str()).collect()
    }

    #[test]
    fn test_penalizes_near_duplicates() {
        let candidates = vec![
            result("a", Some(vec![1.0, 0.0]), 0.9),
            result("a-copy", Some(vec![1.0, 0.0]), 0.85),
            result("b", Some(vec![0.0, 1.0]), 0.6),
        ];
        let picked = mmr_select(candidates, 2, 0.7);
        assert_eq!(contents(&picked), vec!["a", "b"]);
    }

    #[test]
    fn test_lambda_one_is_pure_relevance() {
        let candidates = vec![
            result("a", Some(vec![1.0, 0.0]), 0.9),
            result("a-copy", Some(vec![1.0, 0.0]), 0.85),
            result("b", Some(vec![0.0, 1.0]), 0.6),
        ];
        let picked = mmr_select(candidates, 2, 1.0);
        assert_eq!(contents(&picked), vec!["a", "a-copy"]);
    }

    #[test]
    fn test_opposite_direction_beats_orthogonal() {
        let candidates = vec![
            result("first", Some(vec![1.0, 0.0]), 0.9),
            result("orth", Some(vec![0.0, 1.0]), 0.55),
            result("opp", Some(vec![-1.0, 0.0]), 0.5),
        ];
        // orth: 0.7 * 0.55 - 0.3 * 0 = 0.385; opp: 0.7 * 0.5 + 0.3 * 1 = 0.65
        let picked = mmr_select(candidates, 2, 0.7);
        assert_eq!(contents(&picked), vec!["first", "opp"]);
    }

    #[test]
    fn test_unembedded_selection_gives_zero_redundancy() {
        let candidates = vec![
            result("plain", None, 0.9),
            result("low", Some(vec![-1.0, 0.0]), 0.5),
            result("high", Some(vec![1.0, 0.0]), 0.6),
        ];
        let picked = mmr_select(candidates, 2, 0.7);
        assert_eq!(contents(&picked), vec!["plain", "high"]);
    }

    #[test]
    fn test_missing_embeddings_have_no_redundancy() {
        let candidates = vec![
            result("x", None, 0.5),
            result("y", None, 0.4),
            result("z", Some(vec![1.0]), 0.3),
        ];
        let picked = mmr_select(candidates, 3, 0.7);
        assert_eq!(contents(&picked), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_scores_unchanged_and_bounded_by_pool() {
        let candidates = vec![result("a", None, 0.9), result("b", None, 0.1)];
        let picked = mmr_select(candidates, 5, 0.7);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].score, 0.9);
        assert_eq!(picked[1].score, 0.1);
    }

    #[test]
    fn test_ties_go_to_earlier_candidate() {
        let candidates = vec![result("first", None, 0.5), result("second", None, 0.5)];
        let picked = mmr_select(candidates, 1, 0.7);
        assert_eq!(contents(&picked), vec!["first"]);
    }

    #[test]
    fn test_zero_top_k() {
        assert!(mmr_select(vec![result("a", None, 1.0)], 0, 0.7).is_empty());
    }
}
