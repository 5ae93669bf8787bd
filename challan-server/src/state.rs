//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use challan_core::ReportPipeline;

use crate::whatsapp::WhatsAppClient;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// The detection pipeline (catalog index and model clients live here)
    pub pipeline: Arc<ReportPipeline>,
    /// WhatsApp client for media download and outbound texts, when configured
    pub whatsapp: Option<Arc<WhatsAppClient>>,
    /// Token expected in the webhook subscription handshake
    pub waba_verify_token: Option<String>,
}
