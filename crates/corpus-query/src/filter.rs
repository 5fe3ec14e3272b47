//! Absolute and relative score filtering.

use corpus_core::SearchResult;

/// Default fraction of the best score a result must reach.
pub const DEFAULT_RELATIVE_CUTOFF: f32 = 0.85;

/// Drop results below `threshold`, then those below 85% of the leading score.
pub fn filter_results(results: Vec<SearchResult>, threshold: f32) -> Vec<SearchResult> {
    filter_results_with_cutoff(results, threshold, DEFAULT_RELATIVE_CUTOFF)
}

/// Like [`filter_results`] with an explicit relative cutoff.
///
/// The leading score is the first surviving result's score, so callers pass
/// results in rank order.
pub fn filter_results_with_cutoff(
    results: Vec<SearchResult>,
    threshold: f32,
    relative_cutoff: f32,
) -> Vec<SearchResult> {
    let kept: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| r.score >= threshold)
        .collect();

    let Some(best) = kept.first().map(|r| r.score) else {
        return kept;
    };

    let floor = best * relative_cutoff;
    kept.into_iter().filter(|r| r.score >= floor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::{Chunk, ChunkMetadata};
    use ulid::Ulid;

    fn scored(scores: &[f32]) -> Vec<SearchResult> {
        scores
            .iter()
            .map(|&s| {
                SearchResult::new(
                    Chunk::new(Ulid::new(), "text", 1, 1, ChunkMetadata::default()),
                    s,
                )
            })
            .collect()
    }

    fn scores(results: &[SearchResult]) -> Vec<f32> {
        results.iter().map(|r| r.score).collect()
    }

    #[test]
    fn test_empty() {
        assert!(filter_results(Vec::new(), 0.1).is_empty());
    }

    #[test]
    fn test_absolute_threshold() {
        let out = filter_results(scored(&[0.05, 0.02]), 0.1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_relative_cutoff() {
        let out = filter_results(scored(&[1.0, 0.9, 0.84, 0.5]), 0.1);
        assert_eq!(scores(&out), vec![1.0, 0.9]);
    }

    #[test]
    fn test_relative_cutoff_uses_first_survivor() {
        let out = filter_results(scored(&[0.05, 0.5, 0.45, 0.3]), 0.1);
        assert_eq!(scores(&out), vec![0.5, 0.45]);
    }

    #[test]
    fn test_custom_cutoff() {
        let out = filter_results_with_cutoff(scored(&[1.0, 0.6, 0.4]), 0.0, 0.5);
        assert_eq!(scores(&out), vec![1.0, 0.6]);
    }

    #[test]
    fn test_raising_threshold_never_adds_results() {
        let input = scored(&[0.9, 0.8, 0.3, 0.2, 0.1]);
        let mut previous = usize::MAX;
        for t in [0.0, 0.15, 0.25, 0.5, 0.85, 0.95] {
            let n = filter_results(input.clone(), t).len();
            assert!(n <= previous);
            previous = n;
        }
    }
}
