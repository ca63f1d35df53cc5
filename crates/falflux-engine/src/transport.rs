use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use thiserror::Error;

use falflux_contracts::GenerationError;

const MAX_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub body: Option<String>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl From<TransportError> for GenerationError {
    fn from(err: TransportError) -> Self {
        GenerationError::Transport {
            message: err.message,
            body: err.body,
        }
    }
}

pub trait InferenceTransport: Send + Sync {
    fn submit(&self, url: &str, api_key: &str, payload: &Value) -> Result<Value, TransportError>;
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self { http }
    }
}

impl InferenceTransport for HttpTransport {
    fn submit(&self, url: &str, api_key: &str, payload: &Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Key {api_key}"))
            .json(payload)
            .send()
            .map_err(|err| TransportError::new(format!("fal.ai request failed ({url}): {err}")))?;
        response_json_or_error(response)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| TransportError::new(format!("failed downloading image ({url}): {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::new(format!(
                "image download failed ({})",
                status.as_u16()
            ))
            .with_body(truncate_text(&body, MAX_BODY_CHARS)));
        }
        let bytes = response
            .bytes()
            .map_err(|err| TransportError::new(format!("failed reading image bytes: {err}")))?;
        Ok(bytes.to_vec())
    }
}

fn response_json_or_error(response: HttpResponse) -> Result<Value, TransportError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| TransportError::new(format!("fal.ai response body read failed: {err}")))?;
    if !status.is_success() {
        return Err(TransportError::new(format!("fal.ai request failed ({code})"))
            .with_body(truncate_text(&body, MAX_BODY_CHARS)));
    }
    serde_json::from_str(&body).map_err(|err| {
        TransportError::new(format!("fal.ai returned invalid JSON payload: {err}"))
            .with_body(truncate_text(&body, MAX_BODY_CHARS))
    })
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
