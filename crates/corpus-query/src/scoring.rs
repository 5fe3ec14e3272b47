//! Hybrid (semantic + lexical) scoring.

use corpus_core::{cosine_similarity, CorpusError, Result, SearchResult, VectorIndex};

/// Blend weights for the semantic and lexical score components.
///
/// The two weights always sum to one, which keeps combined scores within
/// `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    semantic: f32,
    lexical: f32,
}

impl ScoreWeights {
    /// Favors exact keyword matches (0.3 semantic / 0.7 lexical).
    pub const LEXICAL_FAVORING: Self = Self {
        semantic: 0.3,
        lexical: 0.7,
    };

    /// Favors embedding similarity (0.7 semantic / 0.3 lexical).
    pub const SEMANTIC_FAVORING: Self = Self {
        semantic: 0.7,
        lexical: 0.3,
    };

    /// Create weights, rejecting negative values or a sum other than one.
    pub fn new(semantic: f32, lexical: f32) -> Result<Self> {
        if semantic < 0.0 || lexical < 0.0 {
            return Err(CorpusError::invalid_argument("score weights must be non-negative"));
        }
        if (semantic + lexical - 1.0).abs() > 1e-6 {
            return Err(CorpusError::invalid_argument(format!(
                "score weights must sum to 1 (got {} + {})",
                semantic, lexical
            )));
        }
        Ok(Self { semantic, lexical })
    }

    /// Weight of the semantic component.
    pub fn semantic(&self) -> f32 {
        self.semantic
    }

    /// Weight of the lexical component.
    pub fn lexical(&self) -> f32 {
        self.lexical
    }

    /// Blend the two components.
    pub fn combine(&self, semantic: f32, lexical: f32) -> f32 {
        semantic * self.semantic + lexical * self.lexical
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::LEXICAL_FAVORING
    }
}

/// Split a query into lower-cased keyword tokens.
///
/// Tokens containing a letter or digit lose every non-alphanumeric character
/// at either end (`*important*` becomes `important`) and are dropped if two
/// characters or fewer remain, unless a symbol survives inside them (`x+y`).
/// Symbol-only tokens are operators: kept whole when at least two characters
/// long (`==`, `&&`), dropped otherwise (`-`, `?`).
pub fn keyword_tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter_map(|raw| {
            let lower = raw.to_lowercase();
            if lower.chars().any(char::is_alphanumeric) {
                let word = lower.trim_matches(|c: char| !c.is_alphanumeric());
                let keep = word.chars().count() > 2 || word.chars().any(|c| !c.is_alphanumeric());
                keep.then(|| word.to_string())
            } else {
                (lower.chars().count() >= 2).then_some(lower)
            }
        })
        .collect()
}

/// Fraction of query keywords found in `content`.
///
/// Counts distinct tokens that occur as substrings of the lower-cased content
/// and divides by the total token count. Returns 0.0 when the query has no
/// usable tokens.
pub fn keyword_score(query: &str, content: &str) -> f32 {
    let tokens = keyword_tokens(query);
    score_tokens(&tokens, &content.to_lowercase())
}

fn score_tokens(tokens: &[String], lowered_content: &str) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }

    let mut distinct: Vec<&str> = tokens.iter().map(String::as_str).collect();
    distinct.sort_unstable();
    distinct.dedup();

    let matched = distinct
        .iter()
        .filter(|token| lowered_content.contains(*token))
        .count();

    matched as f32 / tokens.len() as f32
}

/// Score every chunk of `index` against the query.
///
/// `query_vector` is the embedded query; chunks without an embedding get a
/// semantic score of 0. Negative cosine similarity is floored at 0 so the
/// blend stays within `[0, 1]`. Results are sorted by descending score with
/// ties kept in index order.
pub fn score_chunks(
    query: &str,
    query_vector: &[f32],
    index: &VectorIndex,
    weights: ScoreWeights,
) -> Vec<SearchResult> {
    let tokens = keyword_tokens(query);

    let mut scored: Vec<SearchResult> = index
        .chunks
        .iter()
        .map(|chunk| {
            let semantic = chunk
                .embedding
                .as_deref()
                .map(|e| cosine_similarity(query_vector, e).clamp(0.0, 1.0))
                .unwrap_or(0.0);
            let lexical = score_tokens(&tokens, &chunk.content.to_lowercase());
            SearchResult::new(chunk.clone(), weights.combine(semantic, lexical))
        })
        .collect();

    sort_by_score(&mut scored);
    scored
}

/// Stable descending sort by score.
pub(crate) fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
