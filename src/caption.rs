//! Client for the remote image-captioning service.
//!
//! The service takes the raw image bytes as the request body and answers
//! with either `{"generated_text": ...}` or `[{"generated_text": ...}, ...]`.
//! Every failure is folded into one of the fallback captions below so that
//! callers always get exactly one string per image.

use std::path::Path;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::CaptionConfig;

pub const NO_CAPTION: &str = "No caption generated.";
pub const PARSE_ERROR: &str = "Error parsing API response.";
pub const SERVICE_ERROR: &str = "Error generating caption.";

const CAPTION_FIELD: &str = "generated_text";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO {0}")]
    Io(#[from] std::io::Error),
    #[error("request {0}")]
    Request(#[from] reqwest::Error),
    #[error("status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("parse {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty response array")]
    EmptyBatch,
    #[error("generated_text is not a string: {0}")]
    InvalidField(Value),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Caption shown in place of a generated one.
    pub fn fallback(&self) -> &'static str {
        match self {
            Error::Parse(_) | Error::EmptyBatch | Error::InvalidField(_) => PARSE_ERROR,
            Error::Io(_) | Error::Request(_) | Error::Status { .. } => SERVICE_ERROR,
        }
    }
}

/// One generation object as returned by the service.
#[derive(Deserialize, Debug)]
struct Generation(Map<String, Value>);

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum CaptionResponse {
    Single(Generation),
    /// Only the first element is decoded; the rest are ignored.
    Batch(Vec<Value>),
}

impl CaptionResponse {
    fn into_first(self) -> Result<Generation> {
        match self {
            CaptionResponse::Single(generation) => Ok(generation),
            CaptionResponse::Batch(batch) => {
                let first = batch.into_iter().next().ok_or(Error::EmptyBatch)?;
                Ok(serde_json::from_value(first)?)
            }
        }
    }
}

impl Generation {
    fn into_text(mut self) -> Result<Option<String>> {
        match self.0.remove(CAPTION_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(other) => Err(Error::InvalidField(other)),
        }
    }
}

/// Extracts the caption from a successful response body.
///
/// `Ok(None)` means the body was well formed but carried no caption.
pub fn parse_response(body: &str) -> Result<Option<String>> {
    let response: CaptionResponse = serde_json::from_str(body)?;
    response.into_first()?.into_text()
}

#[derive(Clone, Debug)]
pub struct CaptionClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl CaptionClient {
    pub fn new(config: &CaptionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
        }
    }

    /// Sends the image at `path` to the service, once.
    pub async fn generate(&self, path: &Path) -> Result<Option<String>> {
        let bytes = tokio::fs::read(path).await?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .body(bytes)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(Error::Status { status, body });
        }
        debug!(path = %path.display(), body = %body, "caption response");
        parse_response(&body)
    }

    pub async fn caption(&self, path: &Path) -> String {
        match self.generate(path).await {
            Ok(Some(text)) => text,
            Ok(None) => NO_CAPTION.to_string(),
            Err(err) => {
                warn!(path = %path.display(), "caption failed: {err}");
                err.fallback().to_string()
            }
        }
    }
}
