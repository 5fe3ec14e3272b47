//! Rendering search results as numbered, attributed context.

use corpus_core::SearchResult;

/// Inline marker for the `n`-th result (1-based).
pub fn citation_marker(n: usize) -> String {
    format!("[{}]", n)
}

/// Render results as a context block: each chunk headed by its marker,
/// source, line range and score.
pub fn format_context(results: &[SearchResult]) -> String {
    let mut output = String::new();

    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!(
            "---\n{} {} (score: {:.3})\n",
            citation_marker(i + 1),
            result.source(),
            result.score
        ));
        output.push_str(&format!(
            "Lines {}-{}:\n{}\n\n",
            result.chunk.line_start, result.chunk.line_end, result.chunk.content
        ));
    }

    output
}

/// Render one `source n: <name>` line per result.
pub fn format_citations(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("source {}: {}", i + 1, r.source()))
        .collect::<Vec<_>>()
        .join("\n")
}
