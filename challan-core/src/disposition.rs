//! Manual-verification policy.

use crate::analysis::AnalysisRecord;
use crate::matching::MatchedViolation;

/// Plate and location confidence below this require human review.
const CONFIDENCE_FLOOR: f64 = 0.7;
/// Overall analysis confidence below this requires human review.
const OVERALL_CONFIDENCE_FLOOR: f64 = 0.6;

/// Decide whether a report needs manual verification before action.
///
/// Applies only to claimed violations; anything else is auto-trusted as a
/// non-event. The triggers are independent - any one of them is sufficient:
///
/// 1. a plate was reported but read with low confidence,
/// 2. the location determination is low confidence,
/// 3. the overall analysis is low confidence,
/// 4. a violation was claimed but nothing matched the catalog.
///
/// Pure function, no I/O. The inputs are retained on the stored report so
/// the decision can be re-derived and back-tested when thresholds change.
pub fn needs_manual_verification(
    analysis: &AnalysisRecord,
    matched: &[MatchedViolation],
) -> bool {
    if analysis.is_violation != Some(true) {
        return false;
    }

    (analysis.license_plate.is_some() && analysis.license_plate_confidence < CONFIDENCE_FLOOR)
        || analysis.location_confidence < CONFIDENCE_FLOOR
        || analysis.confidence_score < OVERALL_CONFIDENCE_FLOOR
        || matched.is_empty()
}
