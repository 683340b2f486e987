use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use triage_core::{ClassLabel, Confidence, Prediction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceFailure {
    Misconfigured,
    Timeout,
    Network,
    HttpStatus(u16),
    MalformedResponse,
    UnknownClass(String),
    ConfidenceOutOfRange,
    ResponseTooLarge { max_bytes: u64 },
}

impl fmt::Display for InferenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceFailure::Misconfigured => write!(f, "misconfigured classifier"),
            InferenceFailure::Timeout => write!(f, "timeout"),
            InferenceFailure::Network => write!(f, "network error"),
            InferenceFailure::HttpStatus(code) => write!(f, "http status {code}"),
            InferenceFailure::MalformedResponse => write!(f, "malformed response"),
            InferenceFailure::UnknownClass(class) => write!(f, "unknown class {class:?}"),
            InferenceFailure::ConfidenceOutOfRange => write!(f, "confidence out of range"),
            InferenceFailure::ResponseTooLarge { max_bytes } => {
                write!(f, "response larger than {max_bytes} bytes")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceError {
    pub kind: InferenceFailure,
    pub message: String,
}

impl InferenceError {
    pub fn new(kind: InferenceFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether another attempt at the same payload may succeed.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            InferenceFailure::Timeout | InferenceFailure::Network => true,
            InferenceFailure::HttpStatus(code) => code >= 500 || code == 429,
            _ => false,
        }
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() || self.message == self.kind.to_string() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for InferenceError {}

/// Anything that can turn one image payload into a prediction.
#[async_trait::async_trait]
pub trait ClassificationPort: Send + Sync {
    async fn classify(&self, payload: Bytes) -> Result<Prediction, InferenceError>;
}

/// Maps a class name reported by the inference service to a [`ClassLabel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClass {
    pub name: String,
    pub label: ClassLabel,
}

pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound on the response body; larger bodies are rejected unread.
    pub max_response_bytes: u64,
    pub classes: Vec<ServiceClass>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/classify".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            classes: vec![
                ServiceClass {
                    name: "COVID".to_string(),
                    label: ClassLabel::Positive,
                },
                ServiceClass {
                    name: "Normal".to_string(),
                    label: ClassLabel::Negative,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
    confidence: f64,
}

/// Posts the raw image bytes to an inference service and expects
/// `{"label": "<class>", "confidence": <0..1>}` back.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    endpoint: reqwest::Url,
    client: reqwest::Client,
    max_response_bytes: u64,
    classes: Vec<ServiceClass>,
}

impl HttpClassifier {
    pub fn new(settings: ClassifierSettings) -> Result<Self, InferenceError> {
        let endpoint = reqwest::Url::parse(&settings.endpoint)
            .map_err(|err| InferenceError::new(InferenceFailure::Misconfigured, err.to_string()))?;
        if settings.classes.is_empty() {
            return Err(InferenceError::new(
                InferenceFailure::Misconfigured,
                "no service classes configured",
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InferenceError::new(InferenceFailure::Network, err.to_string()))?;
        Ok(Self {
            endpoint,
            client,
            max_response_bytes: settings.max_response_bytes,
            classes: settings.classes,
        })
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, InferenceError> {
        let too_large = || {
            InferenceError::new(
                InferenceFailure::ResponseTooLarge {
                    max_bytes: self.max_response_bytes,
                },
                "",
            )
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_response_bytes)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if body.len() as u64 + chunk.len() as u64 > self.max_response_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn label_for(&self, class: &str) -> Result<ClassLabel, InferenceError> {
        self.classes
            .iter()
            .find(|known| known.name == class)
            .map(|known| known.label)
            .ok_or_else(|| {
                InferenceError::new(
                    InferenceFailure::UnknownClass(class.to_string()),
                    "class is not in the configured mapping",
                )
            })
    }
}

#[async_trait::async_trait]
impl ClassificationPort for HttpClassifier {
    async fn classify(&self, payload: Bytes) -> Result<Prediction, InferenceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::new(
                InferenceFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = self.read_body(response).await?;
        let parsed: ClassifyResponse = serde_json::from_slice(&body).map_err(|err| {
            InferenceError::new(InferenceFailure::MalformedResponse, err.to_string())
        })?;

        let label = self.label_for(&parsed.label)?;
        let confidence = Confidence::new(parsed.confidence).map_err(|err| {
            InferenceError::new(InferenceFailure::ConfidenceOutOfRange, err.to_string())
        })?;
        Ok(Prediction::new(label, confidence))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> InferenceError {
    if err.is_timeout() {
        return InferenceError::new(InferenceFailure::Timeout, err.to_string());
    }
    if err.is_decode() {
        return InferenceError::new(InferenceFailure::MalformedResponse, err.to_string());
    }
    InferenceError::new(InferenceFailure::Network, err.to_string())
}
