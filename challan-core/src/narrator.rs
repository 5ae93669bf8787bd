//! Report narration under the disclosure policy.
//!
//! The generator is a stochastic external model, so the hard constraints are
//! enforced here rather than trusted to the prompt: the location-mismatch
//! warning is composed deterministically ahead of the generated body, an
//! uncertain plate is withheld from the generator payload and scrubbed from
//! its output, and a required manual-verification notice is appended when
//! the generated text lacks one. The prompt still encodes every rule so a
//! well-behaved generator produces compliant text on its own.

use std::sync::Arc;

use serde_json::json;
use tracing::instrument;

use crate::ai::SummaryGenerator;
use crate::error::Result;
use crate::report::{Report, StorageOutcome};

/// Plate reads below this confidence are never disclosed in narration.
const PLATE_DISCLOSURE_FLOOR: f64 = 0.7;
/// Not-India calls above this confidence get the leading warning.
const LOCATION_WARNING_FLOOR: f64 = 0.99;

/// System instructions for the narration generator.
fn narration_instructions() -> &'static str {
    "You are an AI assistant summarizing traffic violation reports for an Indian traffic \
     enforcement system.\n\
     \n\
     You receive a JSON payload with the vision analysis, the legally matched violations, \
     the storage outcome, and the manual-verification flag.\n\
     \n\
     Compose a short, factual, reader-friendly message following ALL of these rules:\n\
     - Always start with a summary of what was detected: vehicle presence and violation \
     status. If no vehicle is detected, clearly state that.\n\
     - If the payload marks the plate reading as uncertain, state only that the plate \
     could not be read with confidence. NEVER invent or repeat a plate value.\n\
     - For each matched violation, include its name, the section of the Motor Vehicles \
     Act, and the fine amount in INR.\n\
     - If manual verification is required, state this prominently, not as an aside.\n\
     - Report the storage status (stored with its identifier, or failed with the reason) \
     at the end of the message.\n\
     - Be concise, neutral, and professional. Avoid technical terms like 'confidence \
     score' unless needed for clarity.\n\
     - Never output JSON, markup, or lists - write natural text only.\n\
     - Do not add emojis, speculation, or commentary beyond the given data.\n\
     \n\
     Keep the response under 100 words when possible."
}

/// Converts a completed report into a disclosure-compliant summary.
pub struct Narrator {
    generator: Arc<dyn SummaryGenerator>,
}

impl Narrator {
    pub fn new(generator: Arc<dyn SummaryGenerator>) -> Self {
        Self { generator }
    }

    /// Narrate the report and its storage outcome.
    #[instrument(level = "info", skip_all)]
    pub async fn narrate(&self, report: &Report, storage: &StorageOutcome) -> Result<String> {
        let analysis = &report.analysis;
        let plate_suppressed = analysis.license_plate.is_some()
            && analysis.license_plate_confidence < PLATE_DISCLOSURE_FLOOR;

        // The disclosure surface never sees an uncertain plate; the stored
        // row keeps it regardless.
        let mut disclosed_analysis = analysis.clone();
        if plate_suppressed {
            disclosed_analysis.license_plate = None;
        }

        let payload = json!({
            "analysis": disclosed_analysis,
            "plate_uncertain": plate_suppressed,
            "matched_violations": report.matched_violations,
            "needs_manual_verification": report.needs_manual_verification,
            "storage": storage.to_string(),
        });

        let mut body = self
            .generator
            .generate(narration_instructions(), &payload.to_string())
            .await?;

        if plate_suppressed {
            if let Some(plate) = &analysis.license_plate {
                body = body.replace(plate.as_str(), "a plate that could not be read reliably");
            }
        }

        if report.needs_manual_verification && !body.to_lowercase().contains("manual") {
            body.push_str(" This report requires manual verification before any action is taken.");
        }

        let confidently_foreign = !analysis.is_india_location
            && analysis.location_confidence > LOCATION_WARNING_FLOOR;
        if confidently_foreign && !body.trim_start().starts_with('⚠') {
            body = format!(
                "⚠️ This image does not appear to be from an Indian road; confirm the \
                 location before acting on this report. {body}"
            );
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockGenerator, MockVision};
    use crate::catalog::entry_by_id;
    use crate::matching::MatchedViolation;

    fn report_with(analysis: crate::analysis::AnalysisRecord) -> Report {
        let matched: Vec<MatchedViolation> =
            vec![entry_by_id(1).unwrap().into(), entry_by_id(2).unwrap().into()];
        Report::new(analysis, matched, Some("919876543210".into()), "img".into(), false)
    }

    fn stored() -> StorageOutcome {
        StorageOutcome::Stored { id: 42 }
    }

    #[tokio::test]
    async fn test_uncertain_plate_never_appears() {
        let mut analysis = MockVision::demo_record();
        analysis.license_plate = Some("DL01AB1234".to_string());
        analysis.license_plate_confidence = 0.4;

        // Even a generator that leaks the plate is scrubbed.
        let narrator = Narrator::new(Arc::new(MockGenerator::returning(
            "Vehicle with plate DL01AB1234 ran a red light. DL01AB1234 was recorded.",
        )));
        let text = narrator.narrate(&report_with(analysis), &stored()).await.unwrap();

        assert!(!text.contains("DL01AB1234"));
    }

    #[tokio::test]
    async fn test_confident_plate_is_disclosed() {
        let analysis = MockVision::demo_record(); // plate confidence 0.9
        let narrator = Narrator::new(Arc::new(MockGenerator::default()));
        let text = narrator.narrate(&report_with(analysis), &stored()).await.unwrap();

        assert!(text.contains("DL01AB1234"));
    }

    #[tokio::test]
    async fn test_location_warning_comes_first() {
        let mut analysis = MockVision::demo_record();
        analysis.is_india_location = false;
        analysis.location_confidence = 0.995;

        let narrator = Narrator::new(Arc::new(MockGenerator::default()));
        let text = narrator.narrate(&report_with(analysis), &stored()).await.unwrap();

        assert!(text.starts_with('⚠'), "warning must lead: {text}");
        let warning_pos = text.find('⚠').unwrap();
        let detection_pos = text.find("vehicle was detected").unwrap();
        assert!(warning_pos < detection_pos);
    }

    #[tokio::test]
    async fn test_no_warning_for_uncertain_location() {
        let mut analysis = MockVision::demo_record();
        analysis.is_india_location = false;
        analysis.location_confidence = 0.8; // below the warning floor

        let narrator = Narrator::new(Arc::new(MockGenerator::default()));
        let text = narrator.narrate(&report_with(analysis), &stored()).await.unwrap();

        assert!(!text.contains('⚠'));
    }

    #[tokio::test]
    async fn test_warning_not_duplicated() {
        let mut analysis = MockVision::demo_record();
        analysis.is_india_location = false;
        analysis.location_confidence = 1.0;

        let narrator = Narrator::new(Arc::new(MockGenerator::returning(
            "⚠️ Location mismatch. A vehicle was detected.",
        )));
        let text = narrator.narrate(&report_with(analysis), &stored()).await.unwrap();

        assert_eq!(text.matches('⚠').count(), 1);
    }

    #[tokio::test]
    async fn test_manual_verification_notice_enforced() {
        let mut report = report_with(MockVision::demo_record());
        report.needs_manual_verification = true;

        let narrator = Narrator::new(Arc::new(MockGenerator::returning(
            "A vehicle was detected and a traffic violation was identified.",
        )));
        let text = narrator.narrate(&report, &stored()).await.unwrap();

        assert!(text.to_lowercase().contains("manual verification"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_narrated() {
        let narrator = Narrator::new(Arc::new(MockGenerator::default()));
        let outcome = StorageOutcome::Failed { reason: "schema rejection".into() };
        let text = narrator
            .narrate(&report_with(MockVision::demo_record()), &outcome)
            .await
            .unwrap();

        assert!(text.contains("failed: schema rejection"));
    }

    #[tokio::test]
    async fn test_fines_and_sections_in_narration() {
        let narrator = Narrator::new(Arc::new(MockGenerator::default()));
        let text = narrator
            .narrate(&report_with(MockVision::demo_record()), &stored())
            .await
            .unwrap();

        assert!(text.contains("₹1000"));
        assert!(text.contains("₹2000"));
        assert!(text.contains("194D(1)"));
    }
}
