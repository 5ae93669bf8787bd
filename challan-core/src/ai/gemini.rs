//! Gemini-backed implementations of the model collaborator traits.
//!
//! One client serves all four roles against the Generative Language API:
//! vision classification and validation use `generateContent` with a JSON
//! response schema, narration uses plain `generateContent`, and the
//! candidate index uses `embedContent`.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::http::{GenAiHttpClient, GenAiHttpConfig};
use super::{SummaryGenerator, TextEmbedder, ViolationValidator, VisionClassifier};
use crate::analysis::AnalysisRecord;
use crate::catalog::CatalogEntry;
use crate::error::{ChallanError, Result};

/// Configuration for the Gemini client.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API base URL.
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model used for image analysis.
    pub vision_model: String,
    /// Model used for violation validation.
    pub validator_model: String,
    /// Model used for text embeddings.
    pub embedding_model: String,
    /// Model used for report narration.
    pub summary_model: String,
    /// HTTP timeout/retry settings.
    pub http: GenAiHttpConfig,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("vision_model", &self.vision_model)
            .field("validator_model", &self.validator_model)
            .field("embedding_model", &self.embedding_model)
            .field("summary_model", &self.summary_model)
            .finish()
    }
}

impl GeminiConfig {
    /// Create configuration from environment variables.
    ///
    /// Required: `GEMINI_API_KEY`
    /// Optional: `GEMINI_API_URL`, `GEMINI_VISION_MODEL`,
    /// `GEMINI_VALIDATOR_MODEL`, `GEMINI_EMBEDDING_MODEL`,
    /// `GEMINI_SUMMARY_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            ChallanError::Classification("GEMINI_API_KEY environment variable not set".into())
        })?;

        let api_url = std::env::var("GEMINI_API_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());

        Ok(Self {
            api_url,
            api_key,
            vision_model: std::env::var("GEMINI_VISION_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            validator_model: std::env::var("GEMINI_VALIDATOR_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-lite".to_string()),
            embedding_model: std::env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "gemini-embedding-001".to_string()),
            summary_model: std::env::var("GEMINI_SUMMARY_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-lite".to_string()),
            http: GenAiHttpConfig {
                timeout: Duration::from_secs(60),
                max_retries: 3,
                initial_interval: Duration::from_millis(200),
                max_interval: Duration::from_secs(5),
            },
        })
    }
}

// =============================================================================
// Wire types (Generative Language API)
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline(mime_type: String, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob { mime_type, data }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Blob {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ValidationVerdict {
    is_valid: bool,
}

// =============================================================================
// Client
// =============================================================================

/// Client for the Generative Language API.
pub struct GeminiClient {
    http: GenAiHttpClient,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new Gemini client.
    #[instrument(level = "debug", skip_all, fields(api_url = %config.api_url))]
    pub fn new(config: GeminiConfig) -> Result<Self> {
        debug!("Creating Gemini client");
        let http = GenAiHttpClient::new(config.http.clone())?;
        info!("Gemini client created");
        Ok(Self { http, config })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.config.api_url, model)
    }

    /// Build the image part of a vision request.
    ///
    /// `data:` URIs are decoded in place; any other reference is treated as
    /// a fetchable URL and inlined.
    async fn image_part(&self, image_reference: &str) -> Result<Part> {
        if let Some(rest) = image_reference.strip_prefix("data:") {
            let (meta, payload) = rest.split_once(",").ok_or_else(|| {
                ChallanError::Classification("Malformed data URI: missing comma".into())
            })?;
            let mime_type = meta
                .split(';')
                .next()
                .filter(|m| !m.is_empty())
                .unwrap_or("image/jpeg")
                .to_string();
            return Ok(Part::inline(mime_type, payload.to_string()));
        }

        let (bytes, content_type) = self.http.fetch_bytes(image_reference).await?;
        Ok(Part::inline(content_type, BASE64.encode(&bytes)))
    }

    async fn generate_with<F>(
        &self,
        model: &str,
        request: &GenerateRequest,
        op: &str,
        wrap_err: F,
    ) -> Result<String>
    where
        F: Fn(String) -> ChallanError + Send + Sync + Copy,
    {
        let url = self.generate_url(model);
        let response: GenerateResponse = self
            .http
            .post_json(&url, &self.config.api_key, request, op, wrap_err)
            .await?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| wrap_err(format!("{op} returned no text candidate")))
    }
}

/// System prompt for the vision classifier.
///
/// The allowed-names list keeps the model's labels close to the catalog so
/// retrieval has an easy job; the plate and location thresholds here mirror
/// what the disposition policy checks downstream.
fn vision_system_prompt() -> String {
    let names: Vec<String> = crate::catalog::catalog()
        .iter()
        .map(|e| format!("   \"{}\"", e.name))
        .collect();

    format!(
        r#"You are an expert AI traffic violation detection system specialized in analyzing images from Indian roads and traffic scenarios.

Your task is to:
1. Detect Vehicles: Identify if any vehicles are present in the image.
2. Identify Location (India or not):
    - Use plate formats, vehicle models, language on signs, and road features.
    - Be VERY confident (>99%) before marking as NOT India. When in doubt, do NOT mark as not India.
3. Detect License Plates:
    - Report license_plate only if HIGH confidence (>0.7). Otherwise set it to null and license_plate_confidence accordingly.
    - Output license plate in format XX00XX0000 (no spaces/hyphens).
4. Identify Traffic Violations:
    - Output violations as an array of ZERO OR MORE names chosen EXACTLY from this allowed list (use exact spelling and casing):
      [
{}
      ]
    - Only include a name if visible evidence supports it. If unsure, leave the array empty.
5. Provide Descriptions:
    - short_description: concise 1-2 sentences.
    - detailed_description: factual details; do NOT include low-confidence plate numbers.
6. Confidence:
    - Provide overall confidence conservatively. Reflect uncertainty.

Return data that conforms strictly to the response schema fields.
"#,
        names.join(",\n")
    )
}

/// Response schema forcing the classifier into `AnalysisRecord` shape.
fn analysis_response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "vehicle_detected": { "type": "BOOLEAN" },
            "is_violation": { "type": "BOOLEAN", "nullable": true },
            "license_plate": { "type": "STRING", "nullable": true },
            "license_plate_confidence": { "type": "NUMBER" },
            "is_india_location": { "type": "BOOLEAN" },
            "location_confidence": { "type": "NUMBER" },
            "title": { "type": "STRING", "nullable": true },
            "short_description": { "type": "STRING", "nullable": true },
            "detailed_description": { "type": "STRING", "nullable": true },
            "violations": {
                "type": "ARRAY",
                "nullable": true,
                "items": { "type": "STRING" }
            },
            "confidence_score": { "type": "NUMBER" }
        },
        "required": ["vehicle_detected", "confidence_score"]
    })
}

#[async_trait]
impl VisionClassifier for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.config.vision_model))]
    async fn classify(&self, image_reference: &str) -> Result<AnalysisRecord> {
        let image = self.image_part(image_reference).await?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::text(
                        "Analyze the following image for traffic violations according to Indian \
                         traffic rules and use the allowed violation names exactly as listed.",
                    ),
                    image,
                ],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(vision_system_prompt())],
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: analysis_response_schema(),
            }),
        };

        let text = self
            .generate_with(
                &self.config.vision_model,
                &request,
                "classification",
                ChallanError::Classification,
            )
            .await?;

        serde_json::from_str(&text).map_err(|e| {
            ChallanError::Classification(format!("Classifier returned malformed analysis: {e}"))
        })
    }
}

#[async_trait]
impl ViolationValidator for GeminiClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.config.validator_model, violation = %entry.name))]
    async fn validate(&self, entry: &CatalogEntry, analysis: &AnalysisRecord) -> Result<bool> {
        let analysis_json = serde_json::to_string(analysis)
            .map_err(|e| ChallanError::Validation(format!("Failed to serialize analysis: {e}")))?;
        let entry_json = serde_json::to_string(entry)
            .map_err(|e| ChallanError::Validation(format!("Failed to serialize entry: {e}")))?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(format!(
                    "Analysis Result: {analysis_json}\nIs the violation: {entry_json} applicable?"
                ))],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(format!(
                    "You are an expert traffic violation validator. Given the violation name \
                     '{}' and the analysis result, determine if the violation is valid.",
                    entry.name
                ))],
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: json!({
                    "type": "OBJECT",
                    "properties": { "is_valid": { "type": "BOOLEAN" } },
                    "required": ["is_valid"]
                }),
            }),
        };

        let text = self
            .generate_with(
                &self.config.validator_model,
                &request,
                "validation",
                ChallanError::Validation,
            )
            .await?;

        let verdict: ValidationVerdict = serde_json::from_str(&text).map_err(|e| {
            ChallanError::Validation(format!("Validator returned malformed verdict: {e}"))
        })?;

        Ok(verdict.is_valid)
    }
}

#[async_trait]
impl TextEmbedder for GeminiClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.config.embedding_model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/models/{}:embedContent",
            self.config.api_url, self.config.embedding_model
        );

        let request = EmbedRequest {
            content: EmbedContent {
                parts: vec![Part::text(text)],
            },
        };

        let response: EmbedResponse = self
            .http
            .post_json(&url, &self.config.api_key, &request, "embedding", ChallanError::Embedding)
            .await?;

        if response.embedding.values.is_empty() {
            return Err(ChallanError::Embedding("Empty embedding response".into()));
        }

        Ok(response.embedding.values)
    }
}

#[async_trait]
impl SummaryGenerator for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.config.summary_model))]
    async fn generate(&self, system_instructions: &str, user_payload: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(user_payload)],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(system_instructions)],
            }),
            generation_config: None,
        };

        self.generate_with(
            &self.config.summary_model,
            &request,
            "narration",
            ChallanError::Narration,
        )
        .await
    }
}
