//! Analysis service client
//!
//! Uploads a finished recording as multipart form data and reads back the
//! analysis id, or fetches a stored analysis result.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::Artifact;
use crate::settings::RecorderSettings;

/// Multipart field that carries the recording.
pub const UPLOAD_FIELD: &str = "audio";

/// Errors that can occur while talking to the analysis service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The request never got a response (connect, timeout, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-success status
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The service answered, but not in the expected shape
    #[error("Failed to parse server response: {0}")]
    Parse(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    Client(String),
}

impl UploadError {
    /// Human-readable reason, as shown to the user.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Body of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub message: String,
    pub analysis_id: u64,
}

/// A stored analysis, as returned by the results endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: u64,
    pub severity: String,
    pub score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub stutter_count: u32,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub details: serde_json::Value,
    /// Server-local time, no offset.
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Service error body: `{"error": "..."}`
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

/// Transport used by the submission pipeline.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn upload(&self, artifact: &Artifact) -> Result<UploadReceipt, UploadError>;
}

/// reqwest-backed client for the analysis HTTP API.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpAnalysisClient {
    pub fn new(settings: &RecorderSettings) -> Result<Self, UploadError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| UploadError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Fetch a finished analysis by id.
    pub async fn fetch_results(&self, analysis_id: u64) -> Result<AnalysisResult, UploadError> {
        let response = self
            .authorize(
                self.http
                    .get(self.url(&format!("/analysis/results/{}", analysis_id))),
            )
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(server_error(status, response, "Failed to fetch results").await);
        }

        response
            .json::<AnalysisResult>()
            .await
            .map_err(|e| UploadError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn upload(&self, artifact: &Artifact) -> Result<UploadReceipt, UploadError> {
        log::info!(
            "Uploading recording {} ({} bytes)",
            artifact.session_id(),
            artifact.len()
        );

        let part = Part::bytes(artifact.bytes().to_vec())
            .file_name(artifact.file_name())
            .mime_str(artifact.mime_type())
            .map_err(|e| UploadError::Client(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .authorize(self.http.post(self.url("/analysis/upload")))
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(server_error(status, response, "Upload failed").await);
        }

        let receipt: UploadReceipt = response
            .json()
            .await
            .map_err(|e| UploadError::Parse(e.to_string()))?;

        log::info!(
            "Upload accepted: analysis {} ({})",
            receipt.analysis_id,
            receipt.message
        );
        Ok(receipt)
    }
}

/// Build the error for a non-success response.
///
/// Uses the service's `error` field when present, else `"<prefix>: <status text>"`.
async fn server_error(
    status: reqwest::StatusCode,
    response: reqwest::Response,
    prefix: &str,
) -> UploadError {
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(parsed) if !parsed.error.is_empty() => parsed.error,
        _ => format!(
            "{}: {}",
            prefix,
            status.canonical_reason().unwrap_or("Unknown status")
        ),
    };

    log::error!("Analysis service error ({}): {}", status.as_u16(), message);
    UploadError::Server {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_parses_service_body() {
        let receipt: UploadReceipt = serde_json::from_str(
            r#"{"message": "File uploaded and analyzed successfully", "analysis_id": 42}"#,
        )
        .unwrap();
        assert_eq!(receipt.analysis_id, 42);
    }

    #[test]
    fn result_parses_with_missing_optionals() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{"id": 7, "severity": "mild", "score": 0.4, "confidence": 0.9, "created_at": null}"#,
        )
        .unwrap();
        assert_eq!(result.id, 7);
        assert_eq!(result.stutter_count, 0);
        assert!(result.details.is_null());
    }

    #[test]
    fn result_parses_naive_timestamp() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{"id": 8, "severity": "none", "score": 0.1, "confidence": 0.8,
                "stutter_count": 2, "word_count": 40, "details": {"blocks": 1},
                "created_at": "2026-03-01T09:30:15.250000"}"#,
        )
        .unwrap();
        assert_eq!(result.word_count, 40);
        assert_eq!(result.details["blocks"], 1);
        assert!(result.created_at.is_some());
    }

    #[test]
    fn server_error_displays_message_only() {
        let err = UploadError::Server {
            status: 400,
            message: "Invalid file type".to_string(),
        };
        assert_eq!(err.reason(), "Invalid file type");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let settings = RecorderSettings {
            api_base_url: "http://example.test/api/".to_string(),
            ..Default::default()
        };
        let client = HttpAnalysisClient::new(&settings).unwrap();
        assert_eq!(client.base_url(), "http://example.test/api");
        assert_eq!(client.url("/analysis/upload"), "http://example.test/api/analysis/upload");
    }
}
