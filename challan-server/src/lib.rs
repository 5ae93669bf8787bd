//! Challan Server Library - HTTP components for the violation-report service
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod whatsapp;

pub use config::Config;
pub use db::PostgresReportSink;
pub use error::ApiError;
pub use routes::{create_router, create_router_with_config};
pub use state::AppState;
pub use whatsapp::{WhatsAppClient, WhatsAppConfig};
