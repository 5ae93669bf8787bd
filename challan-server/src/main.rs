//! Challan Server - HTTP service for the traffic-violation report pipeline
//!
//! Exposes the challan-core pipeline over HTTP:
//! - GET/POST /webhook/whatsapp - WhatsApp Business webhook intake
//! - POST /api/v1/analyze - direct image analysis
//! - GET /health, /ready - probes

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use challan_core::{AiBackend, AiBackendConfig, GeminiConfig, MemorySink, ReportPipeline, ReportSink};
use challan_server::{
    create_router_with_config, AppState, Config, PostgresReportSink, WhatsAppClient, WhatsAppConfig,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let backend = match build_ai_backend(&config) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "Failed to configure AI backend");
            std::process::exit(1);
        }
    };

    let sink: Arc<dyn ReportSink> = match &config.database_url {
        Some(url) => {
            match PostgresReportSink::new(
                url,
                config.database_max_connections,
                config.database_min_connections,
            )
            .await
            {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to connect to database");
                    std::process::exit(1);
                }
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set; reports are kept in memory only");
            Arc::new(MemorySink::new())
        }
    };

    let whatsapp = match (&config.waba_token, &config.waba_phone_number_id) {
        (Some(token), Some(phone_number_id)) => {
            match WhatsAppClient::new(WhatsAppConfig::new(token.clone(), phone_number_id.clone())) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create WhatsApp client");
                    std::process::exit(1);
                }
            }
        }
        _ => {
            tracing::warn!("WABA credentials not set; webhook image messages will be ignored");
            None
        }
    };

    let state = AppState {
        pipeline: Arc::new(ReportPipeline::new(backend, sink)),
        whatsapp,
        waba_verify_token: config.waba_verify_token.clone(),
    };

    let app = create_router_with_config(&config, state);
    let addr = config.socket_addr();

    tracing::info!(%addr, "Challan server listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Pick the AI backend: Gemini when a key is configured, the deterministic
/// mock only when explicitly allowed.
fn build_ai_backend(config: &Config) -> challan_core::Result<AiBackend> {
    match GeminiConfig::from_env() {
        Ok(gemini) => AiBackend::from_config(AiBackendConfig::Gemini(gemini)),
        Err(e) if config.allow_mock_ai => {
            tracing::warn!(error = %e, "Gemini not configured; falling back to mock AI backend");
            AiBackend::from_config(AiBackendConfig::Mock)
        }
        Err(e) => Err(e),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}
