//! Prompt rendering and output schemas for the generative backend.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::context::GenerationContext;
use crate::model::{Scenario, Severity};

/// Placeholder replaced with the scenario wire name.
const SCENARIO_PLACEHOLDER: &str = "{SCENARIO}";

/// Level line in the template; pinned to the selected severity at render time.
const LEVEL_PLACEHOLDER: &str = "\"level\": \"INFO|WARN|ERROR|DEBUG|TRACE\"";

/// Number of context entries summarised in the prompt.
const CONTEXT_SUMMARY_ENTRIES: usize = 3;

/// Name of the built-in output format.
pub const APP_LOG_FORMAT: &str = "app-log";

const BASE_PROMPT: &str = r#"You are a log generator for a production Java microservice platform.
Generate ONE realistic application log entry for the scenario: {SCENARIO}.

Respond with a single JSON object and nothing else, shaped like:
{
  "message": "<concise, realistic log message>",
  "level": "INFO|WARN|ERROR|DEBUG|TRACE",
  "user_id": "<user identifier>",
  "transaction_id": "<transaction identifier>",
  "request_path": "<HTTP path or operation name>",
  "service_version": "<semantic version>",
  "duration_ms": <integer>,
  "session_id": "<session identifier>",
  "response_code": <integer>,
  "thread_id": "<thread name>",
  "environment": "<environment name>",
  "instance_id": "<instance identifier>",
  "region": "<cloud region>",
  "metadata": { "<key>": "<value>" },
  "stack_trace": "<Java stack trace, only for ERROR entries>"
}

Vary identifiers, paths and wording between entries. Do not reuse example values."#;

/// Errors raised while loading a prompt template.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read prompt template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
}

/// Renders generation prompts from a base template.
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    template: String,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self {
            template: BASE_PROMPT.to_string(),
        }
    }
}

impl PromptRenderer {
    /// Use a custom template. It must contain the `{SCENARIO}` placeholder.
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        if !template.contains(SCENARIO_PLACEHOLDER) {
            return Err(PromptError::MissingPlaceholder(SCENARIO_PLACEHOLDER));
        }
        Ok(Self { template })
    }

    /// Load a template from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let renderer = Self::new(template)?;
        info!(path = %path.display(), "Prompt template loaded");
        Ok(renderer)
    }

    /// Render the prompt for one generation request.
    pub fn render(
        &self,
        scenario: Scenario,
        severity: Severity,
        context: &GenerationContext,
    ) -> String {
        let mut prompt = self
            .template
            .replace(SCENARIO_PLACEHOLDER, scenario.wire_name())
            .replace(
                LEVEL_PLACEHOLDER,
                &format!("\"level\": \"{}\"", severity.wire_name()),
            );

        if !context.is_empty() {
            prompt.push_str("\n\nContext: ");
            for (key, value) in context.iter().take(CONTEXT_SUMMARY_ENTRIES) {
                prompt.push_str(&format!("{}={} ", key, value));
            }
        }

        debug!(scenario = %scenario, level = %severity, "Generated prompt");
        prompt
    }
}

/// JSON schemas keyed by output format type.
#[derive(Debug, Clone)]
pub struct OutputSchemas {
    formats: HashMap<String, String>,
}

impl Default for OutputSchemas {
    fn default() -> Self {
        let mut formats = HashMap::new();
        formats.insert(APP_LOG_FORMAT.to_string(), app_log_schema().to_string());
        Self { formats }
    }
}

impl OutputSchemas {
    /// Register (or replace) the raw JSON schema for a format type.
    pub fn insert(&mut self, format_type: impl Into<String>, schema: impl Into<String>) {
        self.formats.insert(format_type.into(), schema.into());
    }

    /// Parsed schema for `format_type`; `None` if unknown or not valid JSON.
    pub fn output_schema(&self, format_type: &str) -> Option<Value> {
        let Some(raw) = self.formats.get(format_type) else {
            error!(format_type, "No output schema registered");
            return None;
        };
        match serde_json::from_str(raw) {
            Ok(schema) => Some(schema),
            Err(e) => {
                error!(format_type, error = %e, "Failed to parse output schema");
                None
            }
        }
    }
}

/// Schema matching [`crate::model::LogRecord`].
pub fn app_log_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "level": { "type": "string", "enum": ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"] },
            "user_id": { "type": "string" },
            "transaction_id": { "type": "string" },
            "request_path": { "type": "string" },
            "service_version": { "type": "string" },
            "duration_ms": { "type": "integer" },
            "session_id": { "type": "string" },
            "response_code": { "type": "integer" },
            "thread_id": { "type": "string" },
            "environment": { "type": "string" },
            "instance_id": { "type": "string" },
            "region": { "type": "string" },
            "metadata": { "type": "object" },
            "stack_trace": { "type": "string" }
        },
        "required": [
            "message", "level", "user_id", "transaction_id", "request_path",
            "service_version", "duration_ms", "session_id", "response_code",
            "thread_id", "environment", "instance_id", "region"
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn context() -> GenerationContext {
        let mut ctx = GenerationContext::new();
        ctx.insert("response_time", "120ms");
        ctx.insert("status_code", 503i64);
        ctx.insert("content_length", 2048i64);
        ctx.insert("request_id", "abcd1234");
        ctx
    }

    #[test]
    fn test_render_substitutes_scenario_and_level() {
        let prompt = PromptRenderer::default().render(Scenario::ApiRequest, Severity::Warn, &context());

        assert!(prompt.contains("scenario: API_REQUEST"));
        assert!(prompt.contains("\"level\": \"WARN\""));
        assert!(!prompt.contains("INFO|WARN"));
    }

    #[test]
    fn test_render_summarises_first_three_context_entries() {
        let prompt = PromptRenderer::default().render(Scenario::ApiRequest, Severity::Info, &context());

        assert!(prompt.ends_with("Context: response_time=120ms status_code=503 content_length=2048 "));
        assert!(!prompt.contains("request_id=abcd1234"));
    }

    #[test]
    fn test_render_without_context() {
        let prompt = PromptRenderer::default().render(
            Scenario::UserLogin,
            Severity::Debug,
            &GenerationContext::new(),
        );
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn test_custom_template_requires_scenario_placeholder() {
        assert!(matches!(
            PromptRenderer::new("no placeholder here"),
            Err(PromptError::MissingPlaceholder(_))
        ));
        let renderer = PromptRenderer::new("Log for {SCENARIO}").unwrap();
        let prompt = renderer.render(Scenario::CacheOperation, Severity::Info, &GenerationContext::new());
        assert_eq!(prompt, "Log for CACHE_OPERATION");
    }

    #[test]
    fn test_template_from_file() {
        let path = std::env::temp_dir().join(format!("prompt-{}.txt", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "Scenario {{SCENARIO}} please").unwrap();
        drop(file);

        let renderer = PromptRenderer::from_file(&path).unwrap();
        let prompt = renderer.render(Scenario::FileOperation, Severity::Info, &GenerationContext::new());
        assert_eq!(prompt, "Scenario FILE_OPERATION please");

        std::fs::remove_file(&path).ok();
        assert!(matches!(
            PromptRenderer::from_file(&path),
            Err(PromptError::Io { .. })
        ));
    }

    #[test]
    fn test_output_schemas() {
        let mut schemas = OutputSchemas::default();
        let schema = schemas.output_schema(APP_LOG_FORMAT).unwrap();
        assert_eq!(schema["type"], "object");
        assert!(schema["required"].as_array().unwrap().contains(&json!("message")));

        assert!(schemas.output_schema("unknown").is_none());

        schemas.insert("broken", "{not json");
        assert!(schemas.output_schema("broken").is_none());

        schemas.insert("minimal", r#"{"type":"object"}"#);
        assert_eq!(schemas.output_schema("minimal").unwrap(), json!({"type": "object"}));
    }
}
