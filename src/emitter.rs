//! Emission of generated records as structured log events.
//!
//! Each record is written through `tracing` under a fixed per-scenario target
//! (`synthetic::<Subsystem>`) at the level matching its severity, with two
//! JSON field groups: `synthetic` and `metadata`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::context::random_id;
use crate::model::{LogRecord, Scenario, Severity};

/// Length of the random part of a correlation id.
const CORRELATION_ID_LEN: usize = 31;

/// Length of the per-emission request id.
const REQUEST_ID_LEN: usize = 8;

/// Errors raised while rendering a record for emission.
#[derive(Debug, thiserror::Error)]
pub enum EmissionError {
    #[error("generated record has an empty message")]
    EmptyMessage,

    #[error("failed to encode field group: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for generated records.
pub trait LogSink: Send + Sync {
    /// Write one record. Failures are handled by the sink.
    fn emit(&self, record: &LogRecord, scenario: Scenario);
}

/// A record rendered into its final event shape.
#[derive(Debug, Clone)]
pub struct RenderedLog {
    pub logger: &'static str,
    pub level: Severity,
    pub message: String,
    /// JSON-encoded domain fields
    pub synthetic: String,
    /// JSON-encoded metadata
    pub metadata: String,
}

/// Render `record` for emission under `scenario`'s logger.
pub fn render(record: &LogRecord, scenario: Scenario) -> Result<RenderedLog, EmissionError> {
    if record.message.trim().is_empty() {
        return Err(EmissionError::EmptyMessage);
    }

    let message = match (record.level, record.stack_trace.as_deref()) {
        (Severity::Error, Some(trace)) if !trace.trim().is_empty() => {
            format!("{} Stack trace: {}", record.message, trace)
        }
        _ => record.message.clone(),
    };

    let metadata = match &record.metadata {
        Some(map) if !map.is_empty() => Value::Object(map.clone()),
        _ => json!({ "context": "generated" }),
    };

    Ok(RenderedLog {
        logger: scenario.logger_name(),
        level: record.level,
        message,
        synthetic: serde_json::to_string(&synthetic_fields(record))?,
        metadata: serde_json::to_string(&metadata)?,
    })
}

fn synthetic_fields(record: &LogRecord) -> Map<String, Value> {
    let mut rng = rand::thread_rng();
    let mut fields = Map::new();

    let mut put = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            fields.insert(key.to_string(), value);
        }
    };

    put("user_id", record.user_id.clone().map(Value::from));
    put("transaction_id", record.transaction_id.clone().map(Value::from));
    put("request_path", record.request_path.clone().map(Value::from));
    put("service_version", record.service_version.clone().map(Value::from));
    put("duration_ms", record.duration_ms.map(Value::from));
    put("session_id", record.session_id.clone().map(Value::from));
    put("response_code", record.response_code.map(Value::from));
    put("thread_id", record.thread_id.clone().map(Value::from));
    put("environment", record.environment.clone().map(Value::from));
    put("instance_id", record.instance_id.clone().map(Value::from));
    put("region", record.region.clone().map(Value::from));
    put(
        "request_id",
        Some(Value::from(random_id(&mut rng, REQUEST_ID_LEN))),
    );
    put(
        "correlation_id",
        Some(Value::from(format!(
            "corr-{}",
            random_id(&mut rng, CORRELATION_ID_LEN)
        ))),
    );

    fields
}

// `tracing` targets and levels must be constants, so every
// (logger, level) pair gets its own callsite.
macro_rules! emit_event {
    ($target:literal, $log:ident) => {
        match $log.level {
            Severity::Trace => tracing::event!(
                target: $target,
                tracing::Level::TRACE,
                synthetic = %$log.synthetic,
                metadata = %$log.metadata,
                "{}",
                $log.message
            ),
            Severity::Debug => tracing::event!(
                target: $target,
                tracing::Level::DEBUG,
                synthetic = %$log.synthetic,
                metadata = %$log.metadata,
                "{}",
                $log.message
            ),
            Severity::Info => tracing::event!(
                target: $target,
                tracing::Level::INFO,
                synthetic = %$log.synthetic,
                metadata = %$log.metadata,
                "{}",
                $log.message
            ),
            Severity::Warn => tracing::event!(
                target: $target,
                tracing::Level::WARN,
                synthetic = %$log.synthetic,
                metadata = %$log.metadata,
                "{}",
                $log.message
            ),
            Severity::Error => tracing::event!(
                target: $target,
                tracing::Level::ERROR,
                synthetic = %$log.synthetic,
                metadata = %$log.metadata,
                "{}",
                $log.message
            ),
        }
    };
}

fn dispatch(scenario: Scenario, log: &RenderedLog) {
    match scenario {
        Scenario::UserLogin => emit_event!("synthetic::UserAuthenticationService", log),
        Scenario::DatabaseOperation => emit_event!("synthetic::DatabaseService", log),
        Scenario::ApiRequest => emit_event!("synthetic::ApiController", log),
        Scenario::ErrorHandling => emit_event!("synthetic::ErrorHandlerService", log),
        Scenario::SecurityEvent => emit_event!("synthetic::SecurityService", log),
        Scenario::PerformanceMetric => emit_event!("synthetic::PerformanceMonitorService", log),
        Scenario::SystemStartup => emit_event!("synthetic::ApplicationStartupService", log),
        Scenario::CacheOperation => emit_event!("synthetic::CacheService", log),
        Scenario::FileOperation => emit_event!("synthetic::FileProcessorService", log),
        Scenario::BusinessLogic => emit_event!("synthetic::BusinessLogicService", log),
    }
}

/// Production sink: writes records through the installed `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingEmitter {
    emitted: AtomicU64,
    failed: AtomicU64,
}

impl TracingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Records that could not be rendered.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl LogSink for TracingEmitter {
    fn emit(&self, record: &LogRecord, scenario: Scenario) {
        match render(record, scenario) {
            Ok(log) => {
                dispatch(scenario, &log);
                self.emitted.fetch_add(1, Ordering::Relaxed);
                debug!(logger = log.logger, level = %log.level, "Synthetic log emitted");
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(scenario = %scenario, error = %e, "Failed to output synthetic log entry");
            }
        }
    }
}
