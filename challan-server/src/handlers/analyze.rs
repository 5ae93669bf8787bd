//! Direct analysis endpoint.
//!
//! `POST /api/v1/analyze` runs the same pipeline as the WhatsApp intake but
//! synchronously, returning the structured result for a dashboard client.

use axum::extract::{Multipart, State};
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use tracing::info;

use challan_core::StorageOutcome;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/v1/analyze - Analyze an uploaded image for traffic violations
///
/// Accepts multipart/form-data with:
/// - file: The image to analyze
pub async fn analyze_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut content_type: Option<String> = None;

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        content_type = field.content_type().map(str::to_string);
        file_data = Some(
            field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?
                .to_vec(),
        );
    }

    let content = file_data
        .ok_or_else(|| ApiError::bad_request("No file provided. Use 'file' field in multipart form."))?;

    let content_type = content_type.unwrap_or_default();
    if !content_type.starts_with("image/") {
        return Err(ApiError::bad_request("File must be an image"));
    }

    let image_reference = format!("data:{};base64,{}", content_type, BASE64.encode(&content));
    info!(bytes = content.len(), content_type = %content_type, "Analyzing uploaded image");

    let outcome = state.pipeline.process(&image_reference, None).await?;

    let (report_id, report_success) = match &outcome.storage {
        StorageOutcome::Stored { id } => (Some(*id), true),
        StorageOutcome::Failed { .. } => (None, false),
    };

    // Flatten the analysis fields into the result, matching the dashboard contract.
    let mut result = serde_json::to_value(&outcome.report.analysis)
        .map_err(|e| ApiError::internal(format!("Failed to serialize analysis: {e}")))?;
    let result_map = result
        .as_object_mut()
        .ok_or_else(|| ApiError::internal("Analysis did not serialize to an object"))?;
    result_map.insert(
        "violations".into(),
        json!(outcome.report.matched_violations),
    );
    result_map.insert(
        "needs_manual_verification".into(),
        json!(outcome.report.needs_manual_verification),
    );
    result_map.insert("report_id".into(), json!(report_id));
    result_map.insert("report_success".into(), json!(report_success));
    result_map.insert("narration".into(), json!(outcome.narration));

    Ok(Json(json!({
        "success": true,
        "result": result,
    })))
}
