//! Request shaping for embeddings.
//!
//! Embedding endpoints cap the input length. Texts above
//! [`MAX_TEXT_LENGTH`] characters are cut into overlapping windows, every
//! window is embedded, and the window vectors are averaged back into one.
//! This runs above the provider boundary, so every provider sees the same
//! requests.

use super::LlmProvider;
use crate::error::{Error, Result};
use tracing::debug;

/// Longest text (in characters) embedded in one piece.
pub const MAX_TEXT_LENGTH: usize = 8000;
/// Window size (in characters) for oversized texts.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared by two consecutive windows.
pub const CHUNK_OVERLAP: usize = 200;

/// Split `text` into windows of at most `chunk_size` characters, each
/// starting `chunk_size - overlap` characters after the previous one.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }
    chunks
}

/// Element-wise mean of equally sized vectors.
pub fn average_embeddings(embeddings: &[Vec<f32>]) -> Result<Vec<f32>> {
    let Some(first) = embeddings.first() else {
        return Err(Error::Embedding("no embeddings provided".into()));
    };
    let dim = first.len();
    let mut avg = vec![0f32; dim];
    for emb in embeddings {
        if emb.len() != dim {
            return Err(Error::Embedding("embeddings have inconsistent dimensions".into()));
        }
        for (acc, v) in avg.iter_mut().zip(emb) {
            *acc += v;
        }
    }
    let count = embeddings.len() as f32;
    avg.iter_mut().for_each(|v| *v /= count);
    Ok(avg)
}

/// Element-wise weighted mean, normalized by the sum of `weights`.
///
/// Weights need not sum to one, but their total must not be zero.
pub fn weighted_average_embeddings(embeddings: &[Vec<f32>], weights: &[f32]) -> Result<Vec<f32>> {
    let Some(first) = embeddings.first() else {
        return Err(Error::Embedding("no embeddings provided".into()));
    };
    if embeddings.len() != weights.len() {
        return Err(Error::Embedding(
            "number of weights must match number of embeddings".into(),
        ));
    }
    let dim = first.len();
    let mut avg = vec![0f32; dim];
    let mut total_weight = 0f32;
    for (emb, weight) in embeddings.iter().zip(weights) {
        if emb.len() != dim {
            return Err(Error::Embedding("embeddings have inconsistent dimensions".into()));
        }
        total_weight += weight;
        for (acc, v) in avg.iter_mut().zip(emb) {
            *acc += v * weight;
        }
    }
    if total_weight == 0.0 {
        return Err(Error::Embedding("total weight is zero".into()));
    }
    avg.iter_mut().for_each(|v| *v /= total_weight);
    Ok(avg)
}

/// Embed every text, chunking and averaging the oversized ones.
///
/// Returns one vector per input text, in order.
pub async fn embed_texts<P: LlmProvider>(
    provider: &P,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let mut results = Vec::with_capacity(texts.len());
    for text in texts {
        let pieces = if text.chars().count() <= MAX_TEXT_LENGTH {
            vec![text.clone()]
        } else {
            chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP)
        };
        debug!(chars = text.len(), chunks = pieces.len(), "Embedding text");

        let vectors = provider.create_embeddings(model, &pieces).await?;
        if vectors.len() != pieces.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} embeddings for {} inputs",
                vectors.len(),
                pieces.len()
            )));
        }
        results.push(average_embeddings(&vectors)?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockProvider;
    use std::collections::HashMap;

    #[test]
    fn test_chunk_text_windows_overlap() {
        let text: String = ('a'..='j').collect();
        let chunks = chunk_text(&text, 4, 1);
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "j"]);
    }

    #[test]
    fn test_chunk_text_short_text_is_single_chunk() {
        assert_eq!(chunk_text("short", 1000, 200), vec!["short"]);
        assert!(chunk_text("", 1000, 200).is_empty());
    }

    #[test]
    fn test_chunk_text_counts_characters_not_bytes() {
        let text = "é".repeat(10);
        let chunks = chunk_text(&text, 4, 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks[0], "éééé");
    }

    #[test]
    fn test_chunk_text_default_sizes() {
        let text = "x".repeat(9000);
        let chunks = chunk_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);
        // starts at 0, 800, ..., 8800
        assert_eq!(chunks.len(), 12);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks.last().unwrap().len(), 200);
    }

    #[test]
    fn test_average_embeddings() {
        let avg = average_embeddings(&[vec![1.0, 2.0], vec![3.0, 6.0]]).unwrap();
        assert_eq!(avg, vec![2.0, 4.0]);
    }

    #[test]
    fn test_average_of_single_vector_is_identity() {
        let v = vec![0.25, -0.5, 0.125];
        assert_eq!(average_embeddings(std::slice::from_ref(&v)).unwrap(), v);
    }

    #[test]
    fn test_average_rejects_mismatched_dimensions() {
        let err = average_embeddings(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(average_embeddings(&[]).is_err());
    }

    #[test]
    fn test_weighted_average() {
        let avg =
            weighted_average_embeddings(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[3.0, 1.0]).unwrap();
        assert_eq!(avg, vec![0.75, 0.25]);
    }

    #[test]
    fn test_weighted_average_rejects_zero_weight() {
        let err = weighted_average_embeddings(&[vec![1.0], vec![2.0]], &[1.0, -1.0]).unwrap_err();
        assert!(err.to_string().contains("total weight is zero"));
    }

    #[test]
    fn test_weighted_average_rejects_weight_count_mismatch() {
        assert!(weighted_average_embeddings(&[vec![1.0]], &[1.0, 2.0]).is_err());
    }

    #[tokio::test]
    async fn test_single_chunk_average_matches_direct_embedding() {
        let text = "ransomware gang leaks data".to_string();
        let provider = MockProvider::with_embeddings(HashMap::from([(
            text.clone(),
            vec![0.1, 0.2, 0.3],
        )]));

        let direct = provider.create_embeddings("m", &[text.clone()]).await.unwrap();
        let chunks = chunk_text(&text, text.chars().count(), 0);
        assert_eq!(chunks, vec![text.clone()]);
        let chunked = provider.create_embeddings("m", &chunks).await.unwrap();
        let averaged = average_embeddings(&chunked).unwrap();

        assert_eq!(direct[0], averaged);
        let via_helper = embed_texts(&provider, "m", &[text]).await.unwrap();
        assert_eq!(via_helper[0], direct[0]);
    }

    #[tokio::test]
    async fn test_oversized_text_is_chunked_in_one_request() {
        let provider = MockProvider {
            default_embedding: Some(vec![1.0, 1.0]),
            ..Default::default()
        };
        let long = "y".repeat(MAX_TEXT_LENGTH + 1);
        let out = embed_texts(&provider, "m", &[long, "short".into()]).await.unwrap();

        assert_eq!(out, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        let calls = provider.embedding_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let expected = chunk_text(&"y".repeat(MAX_TEXT_LENGTH + 1), CHUNK_SIZE, CHUNK_OVERLAP);
        assert_eq!(calls[0].len(), expected.len());
        assert!(calls[0].iter().all(|c| c.chars().count() <= CHUNK_SIZE));
        assert_eq!(calls[1], vec!["short".to_string()]);
    }
}
