use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ApiFailure;
use crate::transcribe::Transcriber;

const DEFAULT_API_BASE: &str = "https://api.openai.com";
const TRANSCRIPTION_PATH: &str = "/v1/audio/transcriptions";
const MODEL: &str = "whisper-1";

/// Deadline for a single API call, upload included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;

/// OpenAI Whisper API client with a fixed language hint.
pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl WhisperClient {
    pub fn new(api_key: String, language: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_key,
            language,
        }
    }

    /// Point the client at a different endpoint. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn mime_for(path: &Path) -> &'static str {
        match path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("mp4") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "application/octet-stream",
        }
    }

    fn is_m4a(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("m4a"))
            .unwrap_or(false)
    }

    /// The form owns the file bytes, so it is rebuilt for every attempt.
    async fn build_form(&self, audio: &Path) -> Result<Form, ApiFailure> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| ApiFailure::Other(format!("failed to read audio file: {e}")))?;

        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(Self::mime_for(audio))
            .map_err(|e| ApiFailure::Other(format!("invalid mime type: {e}")))?;

        Ok(Form::new()
            .part("file", part)
            .text("model", MODEL)
            .text("language", self.language.clone())
            .text("response_format", "json"))
    }

    async fn call_api(&self, form: Form, m4a_source: bool) -> Result<String, ApiFailure> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, TRANSCRIPTION_PATH))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ApiFailure::Connection(e.to_string())
                } else {
                    ApiFailure::Other(e.to_string())
                }
            })?;

        let status = response.status();
        debug!("speech API response status: {status}");

        if status.is_success() {
            let body: TranscriptionResponse = response
                .json()
                .await
                .map_err(|e| ApiFailure::Other(format!("unparseable API response: {e}")))?;
            return Ok(body.text);
        }

        let error_body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| error_body.trim().to_string());

        Err(classify(status.as_u16(), message, m4a_source))
    }
}

/// Map API status codes to failure classes.
fn classify(status: u16, message: String, m4a_source: bool) -> ApiFailure {
    match status {
        401 | 403 => ApiFailure::InvalidApiKey,
        429 => ApiFailure::QuotaExceeded,
        404 => ApiFailure::ModelUnavailable,
        413 => ApiFailure::PayloadTooLarge,
        400 | 415 | 422 => ApiFailure::Rejected {
            message,
            m4a_source,
        },
        s if s >= 500 => ApiFailure::Server { status: s },
        s => ApiFailure::Other(format!("unexpected status {s}: {message}")),
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &Path, source_name: &str) -> Result<String, ApiFailure> {
        // the pipeline re-encodes m4a uploads to mp3, so the on-disk
        // extension says nothing about what the client sent
        let m4a_source = Self::is_m4a(Path::new(source_name)) || Self::is_m4a(audio);
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                debug!("retry attempt {attempt} after {delay}ms");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let form = self.build_form(audio).await?;

            match self.call_api(form, m4a_source).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => {
                    warn!("attempt {} failed: {e}", attempt + 1);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ApiFailure::Other("transcription failed".to_string())))
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
