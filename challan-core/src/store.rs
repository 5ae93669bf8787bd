//! Report persistence with schema degradation.
//!
//! The live table may be behind the code: columns added for newer fields
//! (confidence scores, location flags, the manual-verification flag) might
//! not exist yet. Writes therefore walk an ordered list of schema variants,
//! newest first, degrading to the next older variant only when the store
//! rejects the payload as schema-incompatible. One degrade step exists
//! today; a second rejection is terminal.
//!
//! A terminal failure is an outcome, not an error - the caller keeps the
//! in-memory report and narration still runs.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::report::{Report, StorageOutcome};

/// Table that violation reports land in.
pub const REPORTS_TABLE: &str = "violation_reports";

/// Errors from the persistence collaborator.
///
/// The schema class is what drives degradation; everything else is terminal
/// on first occurrence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the payload shape (unknown column and friends).
    #[error("Schema rejection: {0}")]
    Schema(String),

    /// The store could not be reached.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Any other insert failure.
    #[error("Insert failed: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_schema_rejection(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

/// Row-insertion collaborator.
///
/// `record` is a flat column-name to value map; the implementation returns
/// the assigned row identifier. Either a row with an identifier exists after
/// the call or none does - partial writes are not acceptable.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn insert(
        &self,
        table: &str,
        record: &Map<String, Value>,
    ) -> std::result::Result<i64, StoreError>;
}

/// Known report schemas, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// Full field set including confidence/location fields and the
    /// manual-verification flag.
    Current,
    /// The original table layout, before those columns existed.
    Legacy,
}

impl SchemaVariant {
    /// Variants in the order they are attempted.
    pub const ORDERED: &'static [SchemaVariant] = &[SchemaVariant::Current, SchemaVariant::Legacy];

    /// Columns present in `Current` but not in `Legacy`.
    const CURRENT_ONLY: &'static [&'static str] = &[
        "license_plate_confidence",
        "is_india_location",
        "location_confidence",
        "needs_manual_verification",
    ];

    /// Render the report as this variant's column map.
    ///
    /// `Legacy` is the `Current` payload minus the newer columns, so the
    /// degraded payload is a strict field subset by construction. Note the
    /// raw plate value is stored at every confidence level - the stored row
    /// is an audit record, unlike the narration surface.
    pub fn payload(&self, report: &Report) -> Map<String, Value> {
        let analysis = &report.analysis;

        let mut record = Map::new();
        record.insert("reporter_phone".into(), json!(report.reporter_identity));
        record.insert(
            "reported_timestamp".into(),
            json!(report.created_at.to_rfc3339()),
        );
        record.insert("reported_image".into(), json!(report.image_reference));
        record.insert("license_plate".into(), json!(analysis.license_plate));
        record.insert(
            "license_plate_confidence".into(),
            json!(analysis.license_plate_confidence),
        );
        record.insert("is_india_location".into(), json!(analysis.is_india_location));
        record.insert("location_confidence".into(), json!(analysis.location_confidence));
        record.insert("violations".into(), json!(report.matched_violations));
        record.insert("confidence_score".into(), json!(analysis.confidence_score));
        record.insert("short_description".into(), json!(analysis.short_description));
        record.insert("is_violation".into(), json!(analysis.is_violation));
        record.insert(
            "detailed_description".into(),
            json!(analysis.detailed_description),
        );
        record.insert("title".into(), json!(report.title()));
        record.insert(
            "needs_manual_verification".into(),
            json!(report.needs_manual_verification),
        );

        if *self == SchemaVariant::Legacy {
            for column in Self::CURRENT_ONLY {
                record.remove(*column);
            }
        }

        record
    }
}

/// Persists reports through a sink, degrading the schema when needed.
pub struct ReportStore {
    sink: std::sync::Arc<dyn ReportSink>,
    table: String,
}

impl ReportStore {
    pub fn new(sink: std::sync::Arc<dyn ReportSink>) -> Self {
        Self {
            sink,
            table: REPORTS_TABLE.to_string(),
        }
    }

    /// Attempt to persist the report.
    ///
    /// Walks `SchemaVariant::ORDERED`: a schema-class rejection advances to
    /// the next variant, anything else is terminal. The returned `Failed`
    /// reason is always the first attempt's error text.
    #[instrument(level = "info", skip_all)]
    pub async fn persist(&self, report: &Report) -> StorageOutcome {
        let mut first_error: Option<String> = None;

        for variant in SchemaVariant::ORDERED {
            let payload = variant.payload(report);

            match self.sink.insert(&self.table, &payload).await {
                Ok(id) => {
                    info!(report_id = id, schema = ?variant, "Report stored");
                    return StorageOutcome::Stored { id };
                }
                Err(e) if e.is_schema_rejection() => {
                    warn!(schema = ?variant, error = %e, "Schema rejected, degrading");
                    first_error.get_or_insert_with(|| e.to_string());
                }
                Err(e) => {
                    warn!(schema = ?variant, error = %e, "Insert failed");
                    first_error.get_or_insert_with(|| e.to_string());
                    break;
                }
            }
        }

        let reason = first_error.unwrap_or_else(|| "no schema variant accepted".to_string());
        warn!(reason = %reason, "Report not stored");
        StorageOutcome::Failed { reason }
    }
}

/// In-memory sink for tests and offline runs.
pub struct MemorySink {
    rows: Mutex<Vec<Map<String, Value>>>,
    next_id: AtomicI64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Rows inserted so far.
    pub fn rows(&self) -> Vec<Map<String, Value>> {
        self.rows.lock().unwrap().clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn insert(
        &self,
        _table: &str,
        record: &Map<String, Value>,
    ) -> std::result::Result<i64, StoreError> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
