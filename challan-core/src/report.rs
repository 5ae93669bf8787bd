//! The unit of persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisRecord;
use crate::matching::MatchedViolation;

/// A fully assembled violation report, ready for persistence and narration.
///
/// Owns its analysis and matched violations for the duration of one pipeline
/// run; nothing aliases them across concurrent requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub analysis: AnalysisRecord,
    pub matched_violations: Vec<MatchedViolation>,
    /// Phone number or other channel identifier of the reporter.
    pub reporter_identity: Option<String>,
    /// URI or content-addressed reference of the reported image.
    pub image_reference: String,
    pub needs_manual_verification: bool,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(
        analysis: AnalysisRecord,
        matched_violations: Vec<MatchedViolation>,
        reporter_identity: Option<String>,
        image_reference: String,
        needs_manual_verification: bool,
    ) -> Self {
        Self {
            analysis,
            matched_violations,
            reporter_identity,
            image_reference,
            needs_manual_verification,
            created_at: Utc::now(),
        }
    }

    /// Title for storage, with the classifier's title when it produced one.
    pub fn title(&self) -> String {
        self.analysis
            .title
            .clone()
            .unwrap_or_else(|| "Traffic Violation Report".to_string())
    }
}

/// Terminal persistence state of a report.
///
/// Both states keep the in-memory `Report` usable - a storage failure never
/// blocks narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageOutcome {
    /// A row exists under this identifier.
    Stored { id: i64 },
    /// No row was written; `reason` is the first rejection's text.
    Failed { reason: String },
}

impl StorageOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

impl std::fmt::Display for StorageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stored { id } => write!(f, "stored with id {id}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
