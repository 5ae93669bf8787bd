//! Deterministic mock collaborators for testing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SummaryGenerator, TextEmbedder, ViolationValidator, VisionClassifier};
use crate::analysis::AnalysisRecord;
use crate::catalog::CatalogEntry;
use crate::error::{ChallanError, Result};

/// Mock vision classifier returning a scripted analysis.
/// WARNING: Do not use in production - never looks at the image!
pub struct MockVision {
    record: Mutex<AnalysisRecord>,
    fail: bool,
}

impl MockVision {
    /// Classifier that always returns `record`.
    pub fn returning(record: AnalysisRecord) -> Self {
        Self {
            record: Mutex::new(record),
            fail: false,
        }
    }

    /// Classifier that always fails with a classification error.
    pub fn failing() -> Self {
        Self {
            record: Mutex::new(AnalysisRecord::no_vehicle()),
            fail: true,
        }
    }

    /// The canned two-wheeler scene used for demos and smoke tests.
    pub fn demo_record() -> AnalysisRecord {
        AnalysisRecord {
            vehicle_detected: true,
            is_violation: Some(true),
            license_plate: Some("DL01AB1234".to_string()),
            license_plate_confidence: 0.9,
            is_india_location: true,
            location_confidence: 0.95,
            title: Some("Helmet and occupancy violations".to_string()),
            short_description: Some("Helmet missing and triple riding detected.".to_string()),
            detailed_description: Some(
                "The image shows a two-wheeler with three persons riding, none of whom are \
                 wearing helmets."
                    .to_string(),
            ),
            violations: Some(vec![
                "Helmet Missing".to_string(),
                "Triple Riding".to_string(),
            ]),
            confidence_score: 0.95,
        }
    }
}

impl Default for MockVision {
    fn default() -> Self {
        Self::returning(Self::demo_record())
    }
}

#[async_trait]
impl VisionClassifier for MockVision {
    async fn classify(&self, _image_reference: &str) -> Result<AnalysisRecord> {
        if self.fail {
            return Err(ChallanError::Classification("mock classifier failure".into()));
        }
        Ok(self.record.lock().unwrap().clone())
    }
}

/// Mock embedder hashing words into a fixed-size bag-of-words vector.
///
/// Deterministic across runs, so texts sharing words land near each other
/// under cosine similarity - enough for retrieval tests without a model.
#[derive(Default)]
pub struct MockEmbedder {
    calls: AtomicUsize,
}

const MOCK_EMBED_DIMS: usize = 256;

impl MockEmbedder {
    /// Number of embed calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextEmbedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0f32; MOCK_EMBED_DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % MOCK_EMBED_DIMS;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

/// Mock validator affirming entries whose name appears among the analysis
/// labels (case-insensitive).
pub struct MockValidator {
    affirm_all: bool,
    fail: bool,
    calls: AtomicUsize,
}

impl MockValidator {
    /// Validator affirming every candidate.
    pub fn affirming_all() -> Self {
        Self {
            affirm_all: true,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Validator that always fails with a validation error.
    pub fn failing() -> Self {
        Self {
            affirm_all: false,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of validate calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockValidator {
    fn default() -> Self {
        Self {
            affirm_all: false,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ViolationValidator for MockValidator {
    async fn validate(&self, entry: &CatalogEntry, analysis: &AnalysisRecord) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(ChallanError::Validation("mock validator failure".into()));
        }
        if self.affirm_all {
            return Ok(true);
        }

        let name = entry.name.to_lowercase();
        Ok(analysis
            .labels()
            .iter()
            .any(|label| label.to_lowercase() == name))
    }
}

/// Mock generator composing a plain-text summary from the narrator payload.
///
/// Parses the payload JSON the narrator hands to the real model and renders
/// the same facts as deterministic sentences; with a script set, returns the
/// scripted text verbatim instead.
#[derive(Default)]
pub struct MockGenerator {
    script: Option<String>,
    fail: bool,
}

impl MockGenerator {
    /// Generator returning `text` for every request.
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            script: Some(text.into()),
            fail: false,
        }
    }

    /// Generator that always fails with a narration error.
    pub fn failing() -> Self {
        Self {
            script: None,
            fail: true,
        }
    }
}

#[async_trait]
impl SummaryGenerator for MockGenerator {
    async fn generate(&self, _system_instructions: &str, user_payload: &str) -> Result<String> {
        if self.fail {
            return Err(ChallanError::Narration("mock generator failure".into()));
        }
        if let Some(script) = &self.script {
            return Ok(script.clone());
        }

        let payload: serde_json::Value = serde_json::from_str(user_payload)
            .map_err(|e| ChallanError::Narration(format!("mock payload not JSON: {e}")))?;

        let analysis = &payload["analysis"];
        let mut sentences = Vec::new();

        if analysis["vehicle_detected"].as_bool().unwrap_or(false) {
            if analysis["is_violation"].as_bool().unwrap_or(false) {
                sentences.push("A vehicle was detected and a traffic violation was identified.".to_string());
            } else {
                sentences.push("A vehicle was detected but no traffic violation was identified.".to_string());
            }
        } else {
            sentences.push("No vehicle was detected in the image.".to_string());
        }

        if let Some(plate) = analysis["license_plate"].as_str() {
            sentences.push(format!("The license plate was read as {plate}."));
        } else if payload["plate_uncertain"].as_bool().unwrap_or(false) {
            sentences.push("The license plate could not be read with confidence.".to_string());
        }

        if let Some(matched) = payload["matched_violations"].as_array() {
            for violation in matched {
                sentences.push(format!(
                    "{} under Section {} attracts a fine of ₹{}.",
                    violation["name"].as_str().unwrap_or("Unknown violation"),
                    violation["section"].as_str().unwrap_or("?"),
                    violation["fine_amount"].as_i64().unwrap_or(0)
                ));
            }
        }

        if payload["needs_manual_verification"].as_bool().unwrap_or(false) {
            sentences.push("This report requires manual verification by an officer.".to_string());
        }

        if let Some(storage) = payload["storage"].as_str() {
            sentences.push(format!("Recording status: {storage}."));
        }

        Ok(sentences.join(" "))
    }
}
