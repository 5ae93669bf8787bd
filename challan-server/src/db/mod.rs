//! Database module for Challan Server
//!
//! Postgres-backed implementation of the core `ReportSink` seam.

pub mod reports;

pub use reports::PostgresReportSink;
