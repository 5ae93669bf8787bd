//! External model collaborators.
//!
//! The pipeline calls four remote models: a vision classifier, a binary
//! violation validator, a text embedder, and a narration generator. Each is
//! an opaque collaborator behind a trait so the pipeline can run against the
//! hosted Gemini backend or against deterministic mocks in tests.
//!
//! ## Supported backends
//!
//! - `Gemini` - Google Generative Language API (production)
//! - `Mock` - Deterministic doubles (testing and offline development)

mod gemini;
mod http;
mod mock;

pub use gemini::{GeminiClient, GeminiConfig};
pub use http::GenAiHttpConfig;
pub use mock::{MockEmbedder, MockGenerator, MockValidator, MockVision};

use std::sync::Arc;

use async_trait::async_trait;

use crate::analysis::AnalysisRecord;
use crate::catalog::CatalogEntry;
use crate::error::Result;

/// Vision model that turns an image reference into a structured analysis.
///
/// The reference is either a `data:` URI or a fetchable URL. Implementations
/// must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    /// Classify one image. Fails with `ChallanError::Classification` on
    /// transport or model failure; no retry policy is implied here.
    async fn classify(&self, image_reference: &str) -> Result<AnalysisRecord>;
}

/// Binary oracle deciding whether a catalog entry applies to an analysis.
#[async_trait]
pub trait ViolationValidator: Send + Sync {
    /// Returns whether `entry` is applicable given the analysis.
    /// Fails with `ChallanError::Validation`.
    async fn validate(&self, entry: &CatalogEntry, analysis: &AnalysisRecord) -> Result<bool>;
}

/// Embedding backend mapping text to a dense vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed one text. Fails with `ChallanError::Embedding`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Text generator producing the human-readable report summary.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// Generate free text from system instructions and a user payload.
    /// Fails with `ChallanError::Narration`.
    async fn generate(&self, system_instructions: &str, user_payload: &str) -> Result<String>;
}

/// Configuration for creating an AI backend.
#[derive(Debug, Clone)]
pub enum AiBackendConfig {
    /// Google Generative Language API.
    Gemini(GeminiConfig),
    /// Deterministic mocks (testing only).
    Mock,
}

/// The four model collaborators bundled for the pipeline.
#[derive(Clone)]
pub struct AiBackend {
    pub vision: Arc<dyn VisionClassifier>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub validator: Arc<dyn ViolationValidator>,
    pub generator: Arc<dyn SummaryGenerator>,
}

impl AiBackend {
    /// Create a backend from configuration.
    pub fn from_config(config: AiBackendConfig) -> Result<Self> {
        match config {
            AiBackendConfig::Gemini(gemini_config) => {
                let client = Arc::new(GeminiClient::new(gemini_config)?);
                tracing::info!("Using Gemini AI backend");
                Ok(Self {
                    vision: client.clone(),
                    embedder: client.clone(),
                    validator: client.clone(),
                    generator: client,
                })
            }
            AiBackendConfig::Mock => Ok(Self::mock()),
        }
    }

    /// Deterministic mock backend for tests and offline runs.
    pub fn mock() -> Self {
        tracing::warn!("Using mock AI backend (deterministic, not for production)");
        Self {
            vision: Arc::new(MockVision::default()),
            embedder: Arc::new(MockEmbedder::default()),
            validator: Arc::new(MockValidator::default()),
            generator: Arc::new(MockGenerator::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_construction() {
        let backend = AiBackend::from_config(AiBackendConfig::Mock).unwrap();
        // All four collaborators must be usable as trait objects.
        let _vision: &dyn VisionClassifier = backend.vision.as_ref();
        let _embedder: &dyn TextEmbedder = backend.embedder.as_ref();
        let _validator: &dyn ViolationValidator = backend.validator.as_ref();
        let _generator: &dyn SummaryGenerator = backend.generator.as_ref();
    }
}
