use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
// Sent as a header so the key never appears in request URLs or their errors
const API_KEY_HEADER: &str = "x-goog-api-key";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// A file that lives on the remote service until deleted
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHandle {
    pub uri: String,
    pub mime_type: String,
    /// Resource name used to delete the file, e.g. `files/abc123`
    pub name: String,
}

/// The remote model the pipeline talks to.
///
/// Every call is fallible and none are retried here; retry policy belongs to
/// the caller.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<FileHandle>;

    /// Run the model over an uploaded file and return its raw text output
    async fn generate(
        &self,
        system_instruction: &str,
        file: &FileHandle,
        user_prompt: &str,
    ) -> Result<String>;

    async fn delete_file(&self, name: &str) -> Result<()>;
}

/// Configuration for the Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key (from API_KEY or GEMINI_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "gemini-1.5-pro")
    pub model: String,
    /// Maximum tokens in response
    pub max_output_tokens: u32,
    /// Per-request timeout; uploads and generation share it
    pub timeout: Duration,
    pub base_url: String,
}

impl GeminiConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .context("API_KEY environment variable not set")?;

        let mut config = Self::new(api_key, DEFAULT_MODEL.to_string());

        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(tokens) = std::env::var("GEMINI_MAX_OUTPUT_TOKENS") {
            config.max_output_tokens = tokens
                .parse()
                .with_context(|| format!("GEMINI_MAX_OUTPUT_TOKENS is not a number: {}", tokens))?;
        }
        if let Ok(secs) = std::env::var("GEMINI_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("GEMINI_TIMEOUT_SECS is not a number: {}", secs))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            max_output_tokens: 8192,
            timeout: Duration::from_secs(300),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Gemini API client (Files API + generateContent)
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_generate_request(
        &self,
        system_instruction: &str,
        file: &FileHandle,
        user_prompt: &str,
    ) -> GenerateRequest {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: system_instruction.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::FileData {
                        file_data: FileData {
                            mime_type: file.mime_type.clone(),
                            file_uri: file.uri.clone(),
                        },
                    },
                    Part::Text {
                        text: user_prompt.to_string(),
                    },
                ],
            }],
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                })
                .collect(),
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl AnalysisBackend for GeminiClient {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<FileHandle> {
        info!("Uploading file to Gemini: {:?}", path);
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", path))?;

        // Resumable upload: open a session, then send the bytes and finalize
        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.config.base_url))
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadMetadata {
                file: UploadFileMetadata {
                    display_name: display_name.to_string(),
                },
            })
            .send()
            .await
            .context("Failed to start Gemini file upload")?;

        if !start.status().is_success() {
            let status = start.status();
            let body = start.text().await.unwrap_or_default();
            anyhow::bail!("Gemini upload error: {} - {}", status, body);
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .context("Gemini upload response missing upload URL")?
            .to_string();

        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .context("Failed to upload file bytes to Gemini")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini upload error: {} - {}", status, body);
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .context("Failed to parse Gemini upload response")?;

        info!("File uploaded: {}", uploaded.file.uri);
        Ok(uploaded.file)
    }

    async fn generate(
        &self,
        system_instruction: &str,
        file: &FileHandle,
        user_prompt: &str,
    ) -> Result<String> {
        let request = self.build_generate_request(system_instruction, file, user_prompt);

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.config.base_url, self.config.model
            ))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error: {} - {}", status, body);
        }

        let response: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;

        let text = response
            .first_text()
            .context("No text content in Gemini response")?;
        debug!("Gemini returned {} chars", text.len());
        Ok(text)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        info!("Deleting file from Gemini: {}", name);
        let response = self
            .client
            .delete(format!("{}/v1beta/{}", self.config.base_url, name))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .context("Failed to send delete request to Gemini")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini delete error: {} - {}", status, body);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct UploadMetadata {
    file: UploadFileMetadata,
}

#[derive(Debug, Serialize)]
struct UploadFileMetadata {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileHandle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    FileData {
        file_data: FileData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate
    fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::FileData { .. } => None,
            })
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }
}
