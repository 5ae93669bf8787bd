//! Candidate index over the violation catalog.
//!
//! Embeds every catalog entry's retrieval document once, then answers
//! nearest-neighbor queries for free-text labels with a brute-force cosine
//! scan. The corpus is tens of entries, so a scan beats any index structure.
//!
//! Construction happens lazily on first use and is guarded by the pipeline's
//! once-cell so it runs at most once per process; after that the index is
//! immutable and safe for concurrent reads.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::ai::TextEmbedder;
use crate::catalog::{catalog, CatalogEntry};
use crate::error::{ChallanError, Result};

struct IndexedDocument {
    entry: &'static CatalogEntry,
    embedding: Vec<f32>,
}

/// Immutable nearest-neighbor index over the catalog.
pub struct CandidateIndex {
    embedder: Arc<dyn TextEmbedder>,
    documents: Vec<IndexedDocument>,
}

impl CandidateIndex {
    /// Embed the whole catalog and build the index.
    ///
    /// An embedding backend failure here means there is no catalog to match
    /// against, so it surfaces as `CatalogUnavailable` rather than a plain
    /// embedding error.
    #[instrument(level = "info", skip_all)]
    pub async fn build(embedder: Arc<dyn TextEmbedder>) -> Result<Self> {
        let mut documents = Vec::with_capacity(catalog().len());

        for entry in catalog() {
            let embedding = embedder.embed(&entry.document_text()).await.map_err(|e| {
                ChallanError::CatalogUnavailable(format!(
                    "Failed to embed catalog entry '{}': {e}",
                    entry.name
                ))
            })?;
            documents.push(IndexedDocument { entry, embedding });
        }

        info!(entries = documents.len(), "Candidate index built");
        Ok(Self { embedder, documents })
    }

    /// Return the `k` catalog entries most similar to `label`, best first.
    #[instrument(level = "debug", skip(self))]
    pub async fn query(&self, label: &str, k: usize) -> Result<Vec<&'static CatalogEntry>> {
        let query_embedding = self.embedder.embed(label).await?;

        let mut scored: Vec<(f32, &'static CatalogEntry)> = self
            .documents
            .iter()
            .map(|doc| (cosine_similarity(&query_embedding, &doc.embedding), doc.entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        debug!(
            label,
            results = scored.len(),
            top = scored.first().map(|(_, e)| e.name.as_str()).unwrap_or(""),
            "Index query"
        );

        Ok(scored.into_iter().map(|(_, entry)| entry).collect())
    }
}

/// Cosine similarity between two vectors; 0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockEmbedder;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = [0.0, 0.0];
        let b = [1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        let a = [1.0, 2.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[tokio::test]
    async fn test_query_ranks_exact_name_first() {
        let index = CandidateIndex::build(Arc::new(MockEmbedder::default()))
            .await
            .unwrap();

        let results = index.query("Helmet Missing", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);

        let results = index.query("Triple Riding", 2).await.unwrap();
        assert_eq!(results[0].id, 2);
    }

    #[tokio::test]
    async fn test_query_k_clamps_to_corpus_size() {
        let index = CandidateIndex::build(Arc::new(MockEmbedder::default()))
            .await
            .unwrap();

        let results = index.query("parking", 100).await.unwrap();
        assert_eq!(results.len(), crate::catalog::catalog().len());
    }
}
