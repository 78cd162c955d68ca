//! HTTP client for the generative model backend.
//!
//! This module defines the [`GenerationClient`] seam used by the orchestrator
//! and an Ollama-compatible implementation built on a pooled reqwest client.
//! The client performs exactly one request per call; retries belong to the
//! circuit breaker gate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::context::GenerationContext;
use crate::model::{LogRecord, Scenario, Severity};
use crate::prompt::{OutputSchemas, PromptRenderer};

/// Path of the generation endpoint relative to the backend base URL.
const GENERATE_PATH: &str = "/api/generate";

/// Errors that can occur while talking to the generative backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Backend could not be reached
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Any other transport-level failure
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Backend returned an error status code
    #[error("Server error ({code}): {message}")]
    Status { code: StatusCode, message: String },

    /// Response body was not a valid structured log
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client configuration error
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether a fresh attempt might succeed.
    ///
    /// Only timeouts and connectivity failures qualify; a malformed response
    /// or an error status will not fix itself on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Timeout | BackendError::Connect(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_connect() {
            BackendError::Connect(err.to_string())
        } else if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Request(err.to_string())
        }
    }
}

/// Produces one structured log record per call.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        scenario: Scenario,
        severity: Severity,
        context: &GenerationContext,
    ) -> Result<LogRecord, BackendError>;
}

/// Fixed decoding options sent with every request.
#[derive(Debug, Clone, Copy, Serialize)]
struct DecodingOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
    repeat_penalty: f32,
}

const DECODING_OPTIONS: DecodingOptions = DecodingOptions {
    temperature: 0.7,
    num_predict: 1000,
    top_p: 0.9,
    repeat_penalty: 1.1,
};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
    options: DecodingOptions,
}

/// Ollama-compatible generation client.
///
/// The underlying reqwest client is reused across calls for connection
/// pooling and carries the configured request timeout.
pub struct OllamaClient {
    client: Client,
    generate_url: String,
    model: String,
    format_type: String,
    timeout: Duration,
    prompts: PromptRenderer,
    schemas: OutputSchemas,
    request_counter: AtomicU64,
}

impl OllamaClient {
    /// Create a client from service configuration.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the HTTP client cannot be built.
    pub fn new(
        config: &Config,
        prompts: PromptRenderer,
        schemas: OutputSchemas,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.workers)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            generate_url: format!("{}{}", config.backend_url, GENERATE_PATH),
            model: config.model.clone(),
            format_type: config.format_type.clone(),
            timeout: config.request_timeout,
            prompts,
            schemas,
            request_counter: AtomicU64::new(0),
        })
    }

    /// Get the full generation endpoint URL.
    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the request timeout duration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of requests issued so far.
    pub fn requests_issued(&self) -> u64 {
        self.request_counter.load(Ordering::Relaxed)
    }

    fn build_request(
        &self,
        scenario: Scenario,
        severity: Severity,
        context: &GenerationContext,
    ) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.model,
            prompt: self.prompts.render(scenario, severity, context),
            stream: false,
            format: self.schemas.output_schema(&self.format_type),
            options: DECODING_OPTIONS,
        }
    }

    /// Send a single HTTP request and return the raw body.
    async fn send_request(&self, request: &GenerateRequest<'_>) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.generate_url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            Ok(response.text().await?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(BackendError::Status {
                code: status,
                message,
            })
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(
        &self,
        scenario: Scenario,
        severity: Severity,
        context: &GenerationContext,
    ) -> Result<LogRecord, BackendError> {
        let request_id = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let request = self.build_request(scenario, severity, context);

        info!(
            request_id,
            url = %self.generate_url,
            model = %self.model,
            "Sending generation request"
        );

        let body = self.send_request(&request).await?;
        let record = parse_generate_response(&body).map_err(|e| {
            error!(request_id, error = %e, "Failed to parse backend response");
            e
        })?;

        info!(request_id, message = %record.message, "Generation request completed");
        Ok(record)
    }
}

/// Decode a backend response body into a [`LogRecord`].
///
/// The body is a JSON object whose `response` field is itself a JSON-encoded
/// string. A `metadata` field that is null, blank, or an empty object is
/// dropped before decoding.
pub fn parse_generate_response(body: &str) -> Result<LogRecord, BackendError> {
    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| BackendError::Parse(format!("invalid response envelope: {}", e)))?;

    let inner = envelope
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Parse("missing 'response' field".to_string()))?;

    let mut payload: Value = serde_json::from_str(inner)
        .map_err(|e| BackendError::Parse(format!("invalid generated JSON: {}", e)))?;

    if let Some(object) = payload.as_object_mut() {
        let strip = match object.get("metadata") {
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            _ => false,
        };
        if strip {
            debug!("Dropping empty metadata from generated record");
            object.remove("metadata");
        }
    }

    serde_json::from_value(payload)
        .map_err(|e| BackendError::Parse(format!("generated record rejected: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(inner: &Value) -> String {
        serde_json::json!({ "model": "test", "response": inner.to_string(), "done": true })
            .to_string()
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Timeout;
        assert_eq!(format!("{}", err), "Request timed out");

        let err = BackendError::Status {
            code: StatusCode::BAD_GATEWAY,
            message: "upstream down".to_string(),
        };
        assert!(format!("{}", err).contains("502"));
        assert!(format!("{}", err).contains("upstream down"));
    }

    #[test]
    fn test_transient_error_detection() {
        assert!(BackendError::Timeout.is_transient());
        assert!(BackendError::Connect("refused".to_string()).is_transient());

        assert!(!BackendError::Parse("bad json".to_string()).is_transient());
        assert!(!BackendError::Request("builder".to_string()).is_transient());
        assert!(!BackendError::Config("tls".to_string()).is_transient());
        assert!(!BackendError::Status {
            code: StatusCode::SERVICE_UNAVAILABLE,
            message: "busy".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_parse_full_response() {
        let inner = serde_json::json!({
            "message": "Payment authorised",
            "level": "INFO",
            "user_id": "u-42",
            "transaction_id": "tx-9",
            "request_path": "/api/payments",
            "service_version": "2.1.3",
            "duration_ms": 87,
            "session_id": "s-1",
            "response_code": 200,
            "thread_id": "thread-4",
            "environment": "production",
            "instance_id": "i-0badf00d",
            "region": "eu-west-1",
            "metadata": { "gateway": "stripe" }
        });

        let record = parse_generate_response(&envelope(&inner)).unwrap();
        assert_eq!(record.message, "Payment authorised");
        assert_eq!(record.level, Severity::Info);
        assert_eq!(record.response_code, Some(200));
        assert_eq!(record.region.as_deref(), Some("eu-west-1"));
        assert_eq!(record.metadata.unwrap()["gateway"], "stripe");
        assert!(record.stack_trace.is_none());
    }

    #[test]
    fn test_parse_strips_empty_metadata() {
        for metadata in [Value::Null, Value::String("  ".to_string()), serde_json::json!({})] {
            let inner = serde_json::json!({
                "message": "ok",
                "level": "DEBUG",
                "metadata": metadata
            });
            let record = parse_generate_response(&envelope(&inner)).unwrap();
            assert!(record.metadata.is_none());
        }
    }

    #[test]
    fn test_parse_failures_are_parse_errors() {
        let cases = [
            "not json".to_string(),
            r#"{"done": true}"#.to_string(),
            r#"{"response": "{broken"}"#.to_string(),
            envelope(&serde_json::json!({ "level": "INFO" })),
            envelope(&serde_json::json!({ "message": "no level" })),
            envelope(&serde_json::json!({ "message": "bad level", "level": "LOUD" })),
        ];

        for body in cases {
            let err = parse_generate_response(&body).unwrap_err();
            assert!(matches!(err, BackendError::Parse(_)), "{} -> {:?}", body, err);
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn test_request_payload_shape() {
        let config = Config::default();
        let client =
            OllamaClient::new(&config, PromptRenderer::default(), OutputSchemas::default()).unwrap();

        let mut ctx = GenerationContext::new();
        ctx.insert("cache_name", "user-cache-2");

        let request = client.build_request(Scenario::CacheOperation, Severity::Warn, &ctx);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], config.model.as_str());
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"]["type"], "object");
        assert_eq!(json["options"]["num_predict"], 1000);
        let temperature = json["options"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
        assert!(json["prompt"].as_str().unwrap().contains("CACHE_OPERATION"));
    }

    #[test]
    fn test_client_creation() {
        let config = Config::default();
        let client =
            OllamaClient::new(&config, PromptRenderer::default(), OutputSchemas::default()).unwrap();

        assert_eq!(client.generate_url(), "http://localhost:11434/api/generate");
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert_eq!(client.requests_issued(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transient() {
        let config = Config {
            backend_url: "http://127.0.0.1:1".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let client =
            OllamaClient::new(&config, PromptRenderer::default(), OutputSchemas::default()).unwrap();

        let err = client
            .generate(Scenario::ApiRequest, Severity::Info, &GenerationContext::new())
            .await
            .unwrap_err();

        assert!(err.is_transient(), "unexpected error: {:?}", err);
        assert_eq!(client.requests_issued(), 1);
    }
}
