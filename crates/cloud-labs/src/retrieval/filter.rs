//! Confidence filtering of retrieved chunks

use crate::types::RetrievedChunk;

/// Keep the chunks scoring at least `threshold`, in their original order
pub fn filter_by_score(chunks: Vec<RetrievedChunk>, threshold: f32) -> Vec<RetrievedChunk> {
    let before = chunks.len();
    let kept: Vec<RetrievedChunk> = chunks
        .into_iter()
        .filter(|chunk| chunk.score >= threshold)
        .collect();

    tracing::info!(
        "Filtered to {} high-confidence results (from {}, threshold {:.2})",
        kept.len(),
        before,
        threshold
    );
    kept
}
