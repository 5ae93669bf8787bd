//! Challan Core - traffic-violation report pipeline
//!
//! This crate turns a road-scene photograph into a verified, persisted, and
//! narrated violation report:
//!
//! 1. a vision model classifies the image into an [`AnalysisRecord`],
//! 2. the [`MatchingEngine`] resolves its free-text labels against the fixed
//!    violation [`catalog`] via embedding retrieval plus a validator model,
//! 3. the disposition policy decides whether a human must review the result,
//! 4. the [`ReportStore`] persists the report, degrading to an older table
//!    schema when the live one rejects newer columns,
//! 5. the [`Narrator`] produces a disclosure-compliant plain-text summary.
//!
//! External models, the database, and the delivery channel all sit behind
//! traits with deterministic mocks, so the whole pipeline runs offline in
//! tests.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use challan_core::{AiBackend, MemorySink, ReportPipeline};
//!
//! # async fn example() -> challan_core::Result<()> {
//! // Mock backend for offline runs; use AiBackendConfig::Gemini in production.
//! let pipeline = ReportPipeline::new(AiBackend::mock(), Arc::new(MemorySink::new()));
//!
//! let outcome = pipeline
//!     .process("data:image/jpeg;base64,...", Some("919876543210"))
//!     .await?;
//! println!("{}", outcome.narration);
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod analysis;
pub mod catalog;
pub mod delivery;
pub mod disposition;
pub mod error;
pub mod index;
pub mod matching;
pub mod narrator;
pub mod pipeline;
pub mod report;
pub mod store;

// Re-export main types for convenience
pub use ai::{
    AiBackend, AiBackendConfig, GeminiClient, GeminiConfig, MockEmbedder, MockGenerator,
    MockValidator, MockVision, SummaryGenerator, TextEmbedder, ViolationValidator,
    VisionClassifier,
};
pub use analysis::AnalysisRecord;
pub use catalog::{catalog, entry_by_id, CatalogEntry};
pub use delivery::{clip_body, TextDelivery, MAX_TEXT_LENGTH};
pub use disposition::needs_manual_verification;
pub use error::{ChallanError, Result};
pub use index::CandidateIndex;
pub use matching::{MatchedViolation, MatchingEngine, CANDIDATES_PER_LABEL};
pub use narrator::Narrator;
pub use pipeline::{ProcessOutcome, ReportPipeline};
pub use report::{Report, StorageOutcome};
pub use store::{MemorySink, ReportSink, ReportStore, SchemaVariant, StoreError, REPORTS_TABLE};
