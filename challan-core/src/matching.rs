//! Matching engine: free-text labels to verified catalog entries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::ai::{TextEmbedder, ViolationValidator};
use crate::analysis::AnalysisRecord;
use crate::catalog::CatalogEntry;
use crate::error::Result;
use crate::index::CandidateIndex;

/// Candidates retrieved per label before validation.
pub const CANDIDATES_PER_LABEL: usize = 2;

/// A catalog entry that survived retrieval and validation for one analysis.
///
/// Identity for dedup purposes is the catalog `id`; a matched set never
/// contains the same id twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedViolation {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub fine_amount: i64,
    pub section: String,
}

impl From<&CatalogEntry> for MatchedViolation {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            category: entry.category.clone(),
            description: entry.description.clone(),
            fine_amount: entry.fine_amount,
            section: entry.section.clone(),
        }
    }
}

/// Turns analysis labels into verified catalog matches.
///
/// Owns the lazily-built candidate index; the engine is a process-lifetime
/// singleton, so construction runs at most once and reads are lock-free
/// afterwards.
pub struct MatchingEngine {
    embedder: Arc<dyn TextEmbedder>,
    validator: Arc<dyn ViolationValidator>,
    index: OnceCell<CandidateIndex>,
}

impl MatchingEngine {
    pub fn new(embedder: Arc<dyn TextEmbedder>, validator: Arc<dyn ViolationValidator>) -> Self {
        Self {
            embedder,
            validator,
            index: OnceCell::new(),
        }
    }

    /// The candidate index, built on first use.
    async fn index(&self) -> Result<&CandidateIndex> {
        self.index
            .get_or_try_init(|| CandidateIndex::build(self.embedder.clone()))
            .await
    }

    /// Match the analysis against the catalog.
    ///
    /// Returns immediately with no index or validator calls when no vehicle
    /// was detected, no violation was claimed, or no labels were produced -
    /// that is the documented no-violation path and avoids model spend.
    ///
    /// For each label in order, the top `CANDIDATES_PER_LABEL` candidates are
    /// retrieved; candidates whose id is already in the accumulated result
    /// are skipped, the rest go to the validator. The final order is
    /// first-affirmed order, not catalog order. A validator failure aborts
    /// the whole match - partial results are never returned.
    #[instrument(level = "info", skip_all, fields(labels = analysis.labels().len()))]
    pub async fn match_violations(
        &self,
        analysis: &AnalysisRecord,
    ) -> Result<Vec<MatchedViolation>> {
        if !analysis.vehicle_detected
            || analysis.is_violation != Some(true)
            || analysis.labels().is_empty()
        {
            debug!("No matchable violation claim, skipping retrieval");
            return Ok(Vec::new());
        }

        let index = self.index().await?;
        let mut matched: Vec<MatchedViolation> = Vec::new();

        for label in analysis.labels() {
            for entry in index.query(label, CANDIDATES_PER_LABEL).await? {
                if matched.iter().any(|m| m.id == entry.id) {
                    continue;
                }
                if self.validator.validate(entry, analysis).await? {
                    debug!(violation = %entry.name, label = %label, "Violation affirmed");
                    matched.push(entry.into());
                }
            }
        }

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockEmbedder, MockValidator, MockVision};

    fn engine_with(validator: MockValidator) -> (MatchingEngine, Arc<MockEmbedder>, Arc<MockValidator>) {
        let embedder = Arc::new(MockEmbedder::default());
        let validator = Arc::new(validator);
        let engine = MatchingEngine::new(embedder.clone(), validator.clone());
        (engine, embedder, validator)
    }

    #[tokio::test]
    async fn test_short_circuit_no_vehicle() {
        let (engine, embedder, validator) = engine_with(MockValidator::default());
        let analysis = AnalysisRecord::no_vehicle();

        let matched = engine.match_violations(&analysis).await.unwrap();
        assert!(matched.is_empty());
        assert_eq!(embedder.calls(), 0, "no embedding calls expected");
        assert_eq!(validator.calls(), 0, "no validator calls expected");
    }

    #[tokio::test]
    async fn test_short_circuit_violation_not_confirmed() {
        let (engine, embedder, validator) = engine_with(MockValidator::default());
        let mut analysis = MockVision::demo_record();
        analysis.is_violation = Some(false);
        assert!(engine.match_violations(&analysis).await.unwrap().is_empty());

        analysis.is_violation = None;
        assert!(engine.match_violations(&analysis).await.unwrap().is_empty());

        assert_eq!(embedder.calls(), 0);
        assert_eq!(validator.calls(), 0);
    }

    #[tokio::test]
    async fn test_short_circuit_empty_labels() {
        let (engine, embedder, validator) = engine_with(MockValidator::default());
        let mut analysis = MockVision::demo_record();
        analysis.violations = Some(Vec::new());
        assert!(engine.match_violations(&analysis).await.unwrap().is_empty());

        analysis.violations = None;
        assert!(engine.match_violations(&analysis).await.unwrap().is_empty());

        assert_eq!(embedder.calls(), 0);
        assert_eq!(validator.calls(), 0);
    }

    #[tokio::test]
    async fn test_match_follows_label_order() {
        let (engine, _, _) = engine_with(MockValidator::default());
        let mut analysis = MockVision::demo_record();
        analysis.violations = Some(vec![
            "Triple Riding".to_string(),
            "Helmet Missing".to_string(),
        ]);

        let matched = engine.match_violations(&analysis).await.unwrap();
        let ids: Vec<i64> = matched.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1], "order follows first-affirmed, not catalog");
    }

    #[tokio::test]
    async fn test_duplicate_labels_dedup_by_id() {
        let (engine, _, _) = engine_with(MockValidator::default());
        let mut analysis = MockVision::demo_record();
        analysis.violations = Some(vec![
            "Helmet Missing".to_string(),
            "Helmet Missing".to_string(),
            "Helmet Missing".to_string(),
        ]);

        let matched = engine.match_violations(&analysis).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);
    }

    #[tokio::test]
    async fn test_matched_set_never_repeats_ids() {
        // Affirm-all validator accepts every retrieved candidate; the
        // accumulated set must still be id-unique.
        let (engine, _, _) = engine_with(MockValidator::affirming_all());
        let analysis = MockVision::demo_record();

        let matched = engine.match_violations(&analysis).await.unwrap();
        let mut ids: Vec<i64> = matched.iter().map(|m| m.id).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before, "matched ids must be unique");
    }

    #[tokio::test]
    async fn test_validator_failure_is_fatal() {
        let (engine, _, _) = engine_with(MockValidator::failing());
        let analysis = MockVision::demo_record();

        let err = engine.match_violations(&analysis).await.unwrap_err();
        assert!(matches!(err, crate::error::ChallanError::Validation(_)));
    }

    #[tokio::test]
    async fn test_demo_scene_matches_both_violations() {
        let (engine, _, _) = engine_with(MockValidator::default());
        let analysis = MockVision::demo_record();

        let matched = engine.match_violations(&analysis).await.unwrap();
        let ids: Vec<i64> = matched.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(matched[0].fine_amount, 1000);
        assert_eq!(matched[1].fine_amount, 2000);
    }
}
