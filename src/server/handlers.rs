use axum::Json;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, info};

use crate::error::AnalysisError;
use crate::models::{AnalysisRequest, SourceFormat};
use crate::stages::run_analysis;

use super::AppState;

/// Shared handler behind every `/analyze*` route
pub async fn analyze(
    State(state): State<AppState>,
    format: SourceFormat,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    info!("Received {} request", format.route());

    let outcome = match read_request(format, multipart).await {
        Ok(request) => {
            run_analysis(
                state.backend.clone(),
                &state.staging,
                &state.settings,
                request,
            )
            .await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            error!("Error in {}: {}", format.route(), e);
            e.into_response()
        }
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Collect the `time`, `prompt` and file parts of an upload
async fn read_request(
    format: SourceFormat,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<AnalysisRequest, AnalysisError> {
    let mut multipart = multipart.map_err(|e| AnalysisError::Input(e.to_string()))?;

    let mut time = None;
    let mut prompt = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnalysisError::Input(e.to_string()))?
    {
        if let Some(file_name) = field.file_name().map(str::to_string) {
            if file.is_none() {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AnalysisError::Input(e.to_string()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            continue;
        }

        let name = field.name().unwrap_or_default().to_string();
        let text = field
            .text()
            .await
            .map_err(|e| AnalysisError::Input(e.to_string()))?;
        match name.as_str() {
            "time" => time = Some(text),
            "prompt" => prompt = Some(text),
            _ => {}
        }
    }

    let (Some(time), Some(prompt), Some((file_name, raw_transcript))) = (time, prompt, file)
    else {
        error!("Missing required fields");
        return Err(AnalysisError::Input("missing required fields".to_string()));
    };

    let reference_timestamp = time
        .trim()
        .parse::<i64>()
        .map_err(|_| AnalysisError::Input(format!("time is not an integer: {:?}", time)))?;

    if prompt.trim().is_empty() {
        return Err(AnalysisError::Input("prompt is empty".to_string()));
    }

    Ok(AnalysisRequest {
        source_format: format,
        file_name,
        raw_transcript,
        instruction: prompt,
        reference_timestamp,
    })
}
