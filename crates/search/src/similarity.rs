//! Exact cosine scoring used by the brute-force path.

use store::TextDocument;

use crate::types::SearchHit;

/// Added to the norm product so a zero vector scores 0 instead of NaN.
pub const EPSILON: f64 = 1e-9;

/// `dot(a, b) / (|a| * |b| + EPSILON)`, accumulated in `f64`.
///
/// Vectors of different lengths score over their common prefix; callers
/// filter mismatched dimensions before scoring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt() + EPSILON)) as f32
}

/// Score every embedded document against `query` and keep the best `top_k`.
///
/// The sort is stable, so equal scores keep the order in which documents
/// were retrieved. Documents whose vector length differs from the query are
/// skipped.
pub fn rank(query: &[f32], documents: Vec<TextDocument>, top_k: usize) -> Vec<SearchHit> {
    let mut skipped = 0usize;
    let mut hits: Vec<SearchHit> = documents
        .into_iter()
        .filter_map(|mut doc| {
            let vector = doc.embeddings.take()?;
            if vector.len() != query.len() {
                skipped += 1;
                return None;
            }
            let score = cosine_similarity(query, &vector);
            Some(SearchHit::from_document(doc, score))
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(
            skipped,
            dimension = query.len(),
            "skipped documents with mismatched embedding dimension"
        );
    }

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}
