//! Structured output of the vision classifier.

use serde::{Deserialize, Serialize};

/// One image's worth of vision-model output.
///
/// Created once per request and immutable afterwards. Field names match the
/// JSON schema the classifier is asked to fill, so this deserializes straight
/// from the model response.
///
/// A non-null `license_plate` only means the classifier claims the plate was
/// readable; the disposition policy decides whether that claim is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Whether any vehicle is present in the image.
    pub vehicle_detected: bool,
    /// Whether a traffic violation is present, if a vehicle was found.
    pub is_violation: Option<bool>,
    /// License plate in XX00XX0000 form, only reported at high confidence.
    pub license_plate: Option<String>,
    /// Confidence for plate detection and reading, 0 when no plate was seen.
    #[serde(default)]
    pub license_plate_confidence: f64,
    /// Whether the scene appears to be from India.
    #[serde(default = "default_india")]
    pub is_india_location: bool,
    /// Confidence for the location determination.
    #[serde(default = "default_confidence")]
    pub location_confidence: f64,
    /// Short title for the analysis.
    pub title: Option<String>,
    /// One or two sentence description of the finding.
    pub short_description: Option<String>,
    /// Detailed factual description of the finding.
    pub detailed_description: Option<String>,
    /// Free-text violation labels, in the order the classifier listed them.
    /// Not guaranteed to match catalog names.
    pub violations: Option<Vec<String>>,
    /// Overall confidence for the entire analysis.
    pub confidence_score: f64,
}

fn default_india() -> bool {
    true
}

fn default_confidence() -> f64 {
    1.0
}

impl AnalysisRecord {
    /// A record describing an image with no vehicle in it.
    pub fn no_vehicle() -> Self {
        Self {
            vehicle_detected: false,
            is_violation: None,
            license_plate: None,
            license_plate_confidence: 0.0,
            is_india_location: true,
            location_confidence: 1.0,
            title: None,
            short_description: Some("No vehicle detected in the image.".to_string()),
            detailed_description: None,
            violations: None,
            confidence_score: 1.0,
        }
    }

    /// The violation labels, empty when absent.
    pub fn labels(&self) -> &[String] {
        self.violations.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_classifier_output() {
        let json = r#"{
            "vehicle_detected": true,
            "is_violation": true,
            "license_plate": "DL01AB1234",
            "license_plate_confidence": 0.9,
            "is_india_location": true,
            "location_confidence": 0.95,
            "title": "Helmet and occupancy violations",
            "short_description": "Helmet missing and triple riding detected.",
            "detailed_description": "Three persons on a two-wheeler, none wearing helmets.",
            "violations": ["Helmet Missing", "Triple Riding"],
            "confidence_score": 0.95
        }"#;

        let record: AnalysisRecord = serde_json::from_str(json).unwrap();
        assert!(record.vehicle_detected);
        assert_eq!(record.is_violation, Some(true));
        assert_eq!(record.labels().len(), 2);
        assert_eq!(record.labels()[0], "Helmet Missing");
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{
            "vehicle_detected": false,
            "is_violation": null,
            "license_plate": null,
            "title": null,
            "short_description": null,
            "detailed_description": null,
            "violations": null,
            "confidence_score": 0.8
        }"#;

        let record: AnalysisRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.license_plate_confidence, 0.0);
        assert!(record.is_india_location);
        assert!(record.labels().is_empty());
    }

    #[test]
    fn test_no_vehicle_record() {
        let record = AnalysisRecord::no_vehicle();
        assert!(!record.vehicle_detected);
        assert!(record.labels().is_empty());
    }
}
