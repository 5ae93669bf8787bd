//! The fixed catalog of detectable traffic violations.
//!
//! Reference data under the Motor Vehicles Act: each entry carries the legal
//! citation and fine used in reports. Loaded once at first use and shared
//! read-only for the lifetime of the process.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// One recognized violation type with its legal metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable unique identifier.
    pub id: i64,
    /// Unique display name; the vision classifier is prompted to use these
    /// names verbatim as labels.
    pub name: String,
    /// Violation category (safety gear, parking, signal, ...).
    pub category: String,
    /// What the violation looks like.
    pub description: String,
    /// Visual cues a reviewer would look for.
    pub visible_indicators: Vec<String>,
    /// Fine amount in INR.
    pub fine_amount: i64,
    /// Section citation under the Motor Vehicles Act.
    pub section: String,
}

impl CatalogEntry {
    /// Render the retrieval document this entry is indexed under.
    ///
    /// The text mixes the name, description, category, and visible cues so
    /// that free-text labels land near the right entry in embedding space.
    pub fn document_text(&self) -> String {
        format!(
            "{} — {} Category: {}. Typically visible cues: {}. Applies fine ₹{} under Section {}.",
            self.name,
            self.description,
            self.category,
            self.visible_indicators.join(", "),
            self.fine_amount,
            self.section
        )
    }
}

fn entry(
    id: i64,
    name: &str,
    category: &str,
    description: &str,
    visible_indicators: &[&str],
    fine_amount: i64,
    section: &str,
) -> CatalogEntry {
    CatalogEntry {
        id,
        name: name.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        visible_indicators: visible_indicators.iter().map(|s| s.to_string()).collect(),
        fine_amount,
        section: section.to_string(),
    }
}

/// The process-lifetime violation catalog.
pub fn catalog() -> &'static [CatalogEntry] {
    static CATALOG: OnceLock<Vec<CatalogEntry>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            entry(
                1,
                "Helmet Missing",
                "Safety Gear",
                "Rider or pillion on a two-wheeler is not wearing a helmet.",
                &["two-wheeler", "human head", "no helmet object"],
                1000,
                "194D(1)",
            ),
            entry(
                2,
                "Triple Riding",
                "Occupancy",
                "More than two people riding on a two-wheeler.",
                &["two-wheeler", "three persons detected"],
                2000,
                "128(1)/177",
            ),
            entry(
                3,
                "Seatbelt Not Worn",
                "Safety Gear",
                "Driver or front passenger not wearing a seatbelt in a four-wheeler.",
                &["car front seat", "person detected", "no seatbelt strap visible"],
                1000,
                "194B(1)",
            ),
            entry(
                4,
                "Red Light Violation",
                "Signal Violation",
                "Vehicle is stopped or moving beyond the stop line while traffic signal is red.",
                &["traffic signal showing red", "vehicle beyond stop line"],
                5000,
                "184",
            ),
            entry(
                5,
                "Wrong Side Driving (Lane Violation)",
                "Road Rule",
                "Vehicle seen facing or driving in the wrong direction on a one-way road.",
                &["vehicle direction opposite lane marking or signage"],
                5000,
                "184",
            ),
            entry(
                6,
                "No Number Plate",
                "Identity Violation",
                "Vehicle has missing, obscured, or tampered number plate.",
                &["vehicle detected", "license plate region empty or unclear"],
                3000,
                "50/51/177",
            ),
            entry(
                7,
                "Illegal Parking",
                "Parking",
                "Vehicle parked in a no-parking zone, on footpath, or obstructing road/pedestrian path.",
                &["stationary vehicle", "road markings", "no parking signage or footpath"],
                500,
                "122/177",
            ),
            entry(
                8,
                "Vehicle Overloading",
                "Load Violation",
                "Vehicle visibly carrying excessive goods or passengers beyond permitted capacity.",
                &["goods stacked high", "too many passengers visible"],
                20000,
                "194(1)",
            ),
            entry(
                9,
                "Obstructive Parking",
                "Parking",
                "Vehicle parked in a way that blocks other vehicles, driveways, or crosswalks.",
                &["vehicle blocking another vehicle or gate"],
                500,
                "122/177",
            ),
            entry(
                10,
                "Tampered Number Plate",
                "Identity Violation",
                "Number plate covered, painted, or altered to hide registration details.",
                &["plate present but illegible or blurred intentionally"],
                3000,
                "50/51/177",
            ),
            entry(
                11,
                "Improper Lane Discipline",
                "Road Rule",
                "Vehicle straddling lane markings or encroaching into other lanes improperly.",
                &["vehicle crossing lane boundary without indication"],
                2000,
                "184",
            ),
            entry(
                12,
                "Driving Without Rearview Mirrors",
                "Safety Gear",
                "Two-wheeler missing one or both rearview mirrors.",
                &["handlebar detected", "mirrors missing on both sides"],
                1000,
                "177",
            ),
            entry(
                13,
                "Unauthorized Modifications",
                "Vehicle Condition",
                "Vehicle modified in violation of standard design, e.g., tinted windows, loud exhaust, or altered lights.",
                &["dark window tint", "unusual exhaust or lights"],
                5000,
                "190(2)",
            ),
        ]
    })
}

/// Look up a catalog entry by id.
pub fn entry_by_id(id: i64) -> Option<&'static CatalogEntry> {
    catalog().iter().find(|e| e.id == id)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_has_thirteen_entries() {
        assert_eq!(catalog().len(), 13);
    }

    #[test]
    fn test_catalog_ids_and_names_unique() {
        let ids: HashSet<_> = catalog().iter().map(|e| e.id).collect();
        let names: HashSet<_> = catalog().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(ids.len(), catalog().len());
        assert_eq!(names.len(), catalog().len());
    }

    #[test]
    fn test_document_text_mentions_fine_and_section() {
        let helmet = entry_by_id(1).unwrap();
        let doc = helmet.document_text();
        assert!(doc.contains("Helmet Missing"));
        assert!(doc.contains("₹1000"));
        assert!(doc.contains("Section 194D(1)"));
    }

    #[test]
    fn test_entry_by_id_missing() {
        assert!(entry_by_id(999).is_none());
    }
}
