//! WhatsApp webhook handlers.
//!
//! `GET /webhook/whatsapp` answers the Graph API subscription handshake;
//! `POST /webhook/whatsapp` ingests message notifications. Image messages
//! each get a detached pipeline task so the webhook can acknowledge
//! immediately - Meta retries deliveries that do not answer quickly.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Query parameters of the subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /webhook/whatsapp - subscription verification.
///
/// Echoes `hub.challenge` when the verify token matches; anything else is
/// rejected with 403.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let token_matches = match (&state.waba_verify_token, &params.verify_token) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };

    if params.mode.as_deref() == Some("subscribe") && token_matches {
        info!("Webhook subscription verified");
        return (StatusCode::OK, params.challenge.unwrap_or_default()).into_response();
    }

    warn!(mode = ?params.mode, "Webhook verification rejected");
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

/// POST /webhook/whatsapp - message intake.
///
/// Walks the Graph webhook envelope (`entry[].changes[].value.messages[]`),
/// picking out image messages. Each image spawns an independent pipeline
/// run; the webhook itself always acknowledges with `{"status":"ok"}`.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    for entry in body["entry"].as_array().into_iter().flatten() {
        for change in entry["changes"].as_array().into_iter().flatten() {
            for message in change["value"]["messages"].as_array().into_iter().flatten() {
                if message["type"].as_str() != Some("image") {
                    continue;
                }

                let (Some(wa_id), Some(media_id)) = (
                    message["from"].as_str().map(str::to_string),
                    message["image"]["id"].as_str().map(str::to_string),
                ) else {
                    continue;
                };

                spawn_image_task(&state, wa_id, media_id);
            }
        }
    }

    Json(json!({"status": "ok"}))
}

/// Run one image through the pipeline on a detached task.
fn spawn_image_task(state: &AppState, wa_id: String, media_id: String) {
    let Some(whatsapp) = state.whatsapp.clone() else {
        warn!(media_id, "Image message received but WhatsApp client is not configured");
        return;
    };
    let pipeline = state.pipeline.clone();
    let request_id = Uuid::new_v4();

    info!(%request_id, reporter = %wa_id, media_id, "Dispatching image for processing");

    tokio::spawn(async move {
        let image_reference = match whatsapp.download_media_data_uri(&media_id).await {
            Ok(uri) => uri,
            Err(e) => {
                warn!(%request_id, error = %e, "Media download failed");
                if let Err(send_err) = challan_core::TextDelivery::send_text(
                    whatsapp.as_ref(),
                    &wa_id,
                    "Error processing image",
                )
                .await
                {
                    warn!(%request_id, error = %send_err, "Failed to deliver error message");
                }
                return;
            }
        };

        pipeline
            .process_and_notify(&image_reference, &wa_id, whatsapp.as_ref())
            .await;
        info!(%request_id, "Image task finished");
    });
}
