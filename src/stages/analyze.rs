use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::AnalysisError;
use crate::io::StagingDir;
use crate::llm::{AnalysisBackend, FileHandle, build_instruction, normalize};
use crate::models::{AnalysisRequest, AnalysisResult};

use super::cleanup::{ScopedArtifacts, with_scoped_artifacts};
use super::ingest::ingest;

const WRAPPED_TRANSCRIPT_NAME: &str = "wrapped_chat.txt";

/// Pipeline settings shared by every request
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    /// Extra attempts at the generate call after a remote failure
    pub max_remote_retries: u32,
}

/// Analyze one uploaded export end to end.
///
/// 1. Stage the upload (and the enveloped transcript for JSON formats)
/// 2. Build the instruction for the format
/// 3. Upload the transcript and run the model
/// 4. Normalize the model's text into an `AnalysisResult`
///
/// Every staged file and remote handle is released afterwards, whatever the
/// outcome. A failure at any step fails the whole request.
pub async fn run_analysis(
    backend: Arc<dyn AnalysisBackend>,
    staging: &StagingDir,
    settings: &PipelineSettings,
    request: AnalysisRequest,
) -> Result<AnalysisResult, AnalysisError> {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "analysis",
        %request_id,
        format = %request.source_format,
    );

    async move {
        info!(
            "Analyzing {} ({} bytes)",
            request.file_name,
            request.raw_transcript.len()
        );
        debug!(
            "Timestamp: {}, Prompt: {}",
            request.reference_timestamp, request.instruction
        );

        let scope_backend = Arc::clone(&backend);
        with_scoped_artifacts(scope_backend, |artifacts| {
            analyze_scoped(backend.as_ref(), staging, settings, &request, artifacts)
        })
        .await
    }
    .instrument(span)
    .await
}

async fn analyze_scoped(
    backend: &dyn AnalysisBackend,
    staging: &StagingDir,
    settings: &PipelineSettings,
    request: &AnalysisRequest,
    artifacts: Arc<ScopedArtifacts>,
) -> Result<AnalysisResult, AnalysisError> {
    let format = request.source_format;

    let original = staging
        .stage(&request.file_name, &request.raw_transcript)
        .await?;
    artifacts.track_local(&original);
    info!("File saved to {:?}", original);

    let upload_path = if format.wraps_transcript() {
        let transcript = ingest(&request.raw_transcript, format);
        debug!("Wrapped content length: {}", transcript.len());
        let wrapped = staging
            .stage(WRAPPED_TRANSCRIPT_NAME, transcript.as_bytes())
            .await?;
        artifacts.track_local(&wrapped);
        info!("Wrapped content saved to {:?}", wrapped);
        wrapped
    } else {
        original
    };

    let instruction = build_instruction(format, &request.instruction);

    let file = backend
        .upload_file(&upload_path, format.mime_type(), format.display_name())
        .await
        .map_err(AnalysisError::RemoteCall)?;
    artifacts.track_remote(&file.name);

    let raw = generate_with_retries(backend, settings, &instruction, &file, &request.instruction)
        .await?;
    info!("AI content generation completed");
    debug!("Raw AI response: {}", raw);

    match normalize(&raw) {
        Ok(result) => {
            info!("AI response parsed: {} instances", result.len());
            Ok(result)
        }
        Err(e) => {
            warn!("Could not normalize AI response: {}", e);
            Err(e.into())
        }
    }
}

async fn generate_with_retries(
    backend: &dyn AnalysisBackend,
    settings: &PipelineSettings,
    instruction: &str,
    file: &FileHandle,
    user_prompt: &str,
) -> Result<String, AnalysisError> {
    let mut attempt = 0;
    loop {
        match backend.generate(instruction, file, user_prompt).await {
            Ok(text) => return Ok(text),
            Err(e) if attempt < settings.max_remote_retries => {
                attempt += 1;
                warn!(
                    "Generate failed ({:#}); retry {} of {}",
                    e, attempt, settings.max_remote_retries
                );
            }
            Err(e) => return Err(AnalysisError::RemoteCall(e)),
        }
    }
}
