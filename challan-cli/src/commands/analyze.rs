//! Analyze command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use colored::Colorize;
use tracing::info;

use challan_core::{
    AiBackend, AiBackendConfig, GeminiConfig, MemorySink, ProcessOutcome, ReportPipeline,
};

/// Execute the analyze command.
pub async fn execute(image: String, reporter: Option<String>, mock: bool, json: bool) -> Result<()> {
    let image_reference = resolve_image_reference(&image)?;

    let backend = if mock {
        AiBackend::mock()
    } else {
        let config = GeminiConfig::from_env()
            .context("Gemini is not configured; set GEMINI_API_KEY or pass --mock")?;
        AiBackend::from_config(AiBackendConfig::Gemini(config))?
    };

    // CLI runs keep the report in memory; the server owns durable storage.
    let pipeline = ReportPipeline::new(backend, Arc::new(MemorySink::new()));

    let outcome = pipeline
        .process(&image_reference, reporter.as_deref())
        .await
        .context("Pipeline failed")?;

    info!(
        matched = outcome.report.matched_violations.len(),
        "Analysis complete"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        return Ok(());
    }

    print_outcome(&outcome);
    Ok(())
}

/// Normalize the image argument into a reference the classifier accepts.
///
/// URLs and data URIs pass through; local files are inlined as data URIs,
/// the same normalization the webhook path applies to downloaded media.
fn resolve_image_reference(image: &str) -> Result<String> {
    if image.starts_with("data:") || image.starts_with("http://") || image.starts_with("https://")
    {
        return Ok(image.to_string());
    }

    let path = Path::new(image);
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image file: {image}"))?;

    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    };

    Ok(format!("data:{};base64,{}", mime, BASE64.encode(&bytes)))
}

fn print_outcome(outcome: &ProcessOutcome) {
    println!("{}", "Narration".bold());
    println!("  {}", outcome.narration);
    println!();

    if outcome.report.matched_violations.is_empty() {
        println!("{}", "No violations matched.".yellow());
    } else {
        println!("{}", "Matched violations".bold());
        for violation in &outcome.report.matched_violations {
            println!(
                "  {} {} (Section {}, fine ₹{})",
                "✓".green(),
                violation.name.green(),
                violation.section,
                violation.fine_amount
            );
        }
    }
    println!();

    if outcome.report.needs_manual_verification {
        println!("{}", "Manual verification required.".yellow().bold());
    }

    println!("Storage: {}", outcome.storage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_pass_through() {
        let url = "https://example.com/scene.jpg";
        assert_eq!(resolve_image_reference(url).unwrap(), url);

        let data_uri = "data:image/jpeg;base64,QUJD";
        assert_eq!(resolve_image_reference(data_uri).unwrap(), data_uri);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(resolve_image_reference("/no/such/file.jpg").is_err());
    }
}
