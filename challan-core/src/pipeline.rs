//! The end-to-end report pipeline.
//!
//! One `process` call per inbound image: classify, match against the
//! catalog, decide on manual verification, persist, narrate. Concurrent
//! requests share only the catalog and the candidate index; everything else
//! is owned by the single run.
//!
//! Classification, embedding, and validation failures abort the run and
//! surface to the caller. Storage failures degrade - the in-memory report
//! survives and is still narrated. Delivery failures never corrupt pipeline
//! state; they are logged and swallowed after one generic-message fallback.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::ai::{AiBackend, VisionClassifier};
use crate::delivery::{clip_body, TextDelivery};
use crate::disposition::needs_manual_verification;
use crate::error::Result;
use crate::matching::MatchingEngine;
use crate::narrator::Narrator;
use crate::report::{Report, StorageOutcome};
use crate::store::{ReportSink, ReportStore};

/// Fallback text sent when the pipeline fails outright.
const PROCESSING_ERROR_MESSAGE: &str = "Error processing image";

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// The assembled report, including matched violations and the
    /// manual-verification decision.
    pub report: Report,
    /// Terminal persistence state.
    pub storage: StorageOutcome,
    /// Disclosure-compliant summary text.
    pub narration: String,
}

/// Process-lifetime pipeline instance.
pub struct ReportPipeline {
    vision: Arc<dyn VisionClassifier>,
    matching: MatchingEngine,
    store: ReportStore,
    narrator: Narrator,
}

impl ReportPipeline {
    pub fn new(backend: AiBackend, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            vision: backend.vision.clone(),
            matching: MatchingEngine::new(backend.embedder.clone(), backend.validator.clone()),
            store: ReportStore::new(sink),
            narrator: Narrator::new(backend.generator),
        }
    }

    /// Run the full pipeline for one image.
    #[instrument(level = "info", skip_all, fields(reporter = reporter_identity.unwrap_or("-")))]
    pub async fn process(
        &self,
        image_reference: &str,
        reporter_identity: Option<&str>,
    ) -> Result<ProcessOutcome> {
        let analysis = self.vision.classify(image_reference).await?;
        info!(
            vehicle = analysis.vehicle_detected,
            violation = ?analysis.is_violation,
            labels = analysis.labels().len(),
            "Image classified"
        );

        let matched = self.matching.match_violations(&analysis).await?;
        let needs_verification = needs_manual_verification(&analysis, &matched);

        let report = Report::new(
            analysis,
            matched,
            reporter_identity.map(str::to_string),
            image_reference.to_string(),
            needs_verification,
        );

        let storage = self.store.persist(&report).await;
        let narration = self.narrator.narrate(&report, &storage).await?;

        info!(
            matched = report.matched_violations.len(),
            needs_verification,
            stored = storage.is_stored(),
            "Pipeline run complete"
        );

        Ok(ProcessOutcome {
            report,
            storage,
            narration,
        })
    }

    /// Run the pipeline and deliver the narration to the reporter.
    ///
    /// On a hard pipeline failure the reporter gets a generic error message
    /// instead; delivery failures themselves are logged and swallowed.
    pub async fn process_and_notify(
        &self,
        image_reference: &str,
        reporter_identity: &str,
        delivery: &dyn TextDelivery,
    ) {
        let body = match self.process(image_reference, Some(reporter_identity)).await {
            Ok(outcome) => clip_body(&outcome.narration),
            Err(e) => {
                error!(error = %e, "Pipeline failed, notifying reporter with generic message");
                PROCESSING_ERROR_MESSAGE.to_string()
            }
        };

        if let Err(e) = delivery.send_text(reporter_identity, &body).await {
            warn!(error = %e, "Failed to deliver narration");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ai::{MockEmbedder, MockGenerator, MockValidator, MockVision};
    use crate::analysis::AnalysisRecord;
    use crate::error::ChallanError;
    use crate::store::{MemorySink, StoreError};

    fn mock_pipeline_with(vision: MockVision, sink: Arc<dyn ReportSink>) -> ReportPipeline {
        let backend = AiBackend {
            vision: Arc::new(vision),
            embedder: Arc::new(MockEmbedder::default()),
            validator: Arc::new(MockValidator::default()),
            generator: Arc::new(MockGenerator::default()),
        };
        ReportPipeline::new(backend, sink)
    }

    struct RecordingDelivery {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingDelivery {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextDelivery for RecordingDelivery {
        async fn send_text(&self, recipient: &str, body: &str) -> Result<()> {
            if self.fail {
                return Err(ChallanError::Delivery("mock delivery failure".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_end_to_end_confident_scene() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = mock_pipeline_with(MockVision::default(), sink.clone());

        let outcome = pipeline
            .process("data:image/jpeg;base64,QUJD", Some("919876543210"))
            .await
            .unwrap();

        let ids: Vec<i64> = outcome.report.matched_violations.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2], "label order, not catalog order");
        assert!(!outcome.report.needs_manual_verification);
        assert_eq!(outcome.storage, StorageOutcome::Stored { id: 1 });
        assert!(outcome.narration.contains("₹1000"));
        assert!(outcome.narration.contains("₹2000"));
        assert_eq!(sink.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_no_vehicle_still_persists_and_narrates() {
        let sink = Arc::new(MemorySink::new());
        let vision = MockVision::returning(AnalysisRecord::no_vehicle());
        let pipeline = mock_pipeline_with(vision, sink.clone());

        let outcome = pipeline.process("data:,img", None).await.unwrap();

        assert!(outcome.report.matched_violations.is_empty());
        assert!(!outcome.report.needs_manual_verification);
        assert!(outcome.storage.is_stored());
        assert!(outcome.narration.contains("No vehicle"));
    }

    #[tokio::test]
    async fn test_unmatched_violation_needs_verification() {
        let sink = Arc::new(MemorySink::new());
        let mut record = MockVision::demo_record();
        // Labels that resolve to nothing the validator will affirm.
        record.violations = Some(vec!["Flying too low".to_string()]);
        let pipeline = mock_pipeline_with(MockVision::returning(record), sink);

        let outcome = pipeline.process("data:,img", None).await.unwrap();
        assert!(outcome.report.matched_violations.is_empty());
        assert!(outcome.report.needs_manual_verification);
    }

    #[tokio::test]
    async fn test_storage_failure_still_narrates() {
        struct AlwaysFailSink;

        #[async_trait]
        impl ReportSink for AlwaysFailSink {
            async fn insert(
                &self,
                _table: &str,
                _record: &serde_json::Map<String, serde_json::Value>,
            ) -> std::result::Result<i64, StoreError> {
                Err(StoreError::Schema("no such table".into()))
            }
        }

        let pipeline = mock_pipeline_with(MockVision::default(), Arc::new(AlwaysFailSink));
        let outcome = pipeline.process("data:,img", None).await.unwrap();

        assert!(!outcome.storage.is_stored());
        assert!(outcome.narration.contains("failed: Schema rejection: no such table"));
        // The report is intact despite the storage failure.
        assert_eq!(outcome.report.matched_violations.len(), 2);
    }

    #[tokio::test]
    async fn test_classification_failure_is_hard() {
        let pipeline = mock_pipeline_with(MockVision::failing(), Arc::new(MemorySink::new()));
        let err = pipeline.process("data:,img", None).await.unwrap_err();
        assert!(matches!(err, ChallanError::Classification(_)));
    }

    #[tokio::test]
    async fn test_notify_delivers_narration() {
        let pipeline = mock_pipeline_with(MockVision::default(), Arc::new(MemorySink::new()));
        let delivery = RecordingDelivery::new();

        pipeline
            .process_and_notify("data:,img", "919876543210", &delivery)
            .await;

        let sent = delivery.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "919876543210");
        assert!(sent[0].1.contains("₹1000"));
    }

    #[tokio::test]
    async fn test_notify_sends_generic_message_on_pipeline_failure() {
        let pipeline = mock_pipeline_with(MockVision::failing(), Arc::new(MemorySink::new()));
        let delivery = RecordingDelivery::new();

        pipeline
            .process_and_notify("data:,img", "919876543210", &delivery)
            .await;

        let sent = delivery.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Error processing image");
    }

    #[tokio::test]
    async fn test_notify_swallows_delivery_failure() {
        let pipeline = mock_pipeline_with(MockVision::default(), Arc::new(MemorySink::new()));
        let delivery = RecordingDelivery::failing();

        // Must not panic or propagate.
        pipeline
            .process_and_notify("data:,img", "919876543210", &delivery)
            .await;
    }
}
