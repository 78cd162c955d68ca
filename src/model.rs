//! Core data model for synthetic log generation.
//!
//! Scenarios and severities are fixed enumerations whose per-variant data
//! (descriptions, logger names, selection weights) lives in static lookup
//! tables. `LogRecord` is the structured entry decoded from the backend.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Category of synthetic event being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    UserLogin,
    DatabaseOperation,
    ApiRequest,
    ErrorHandling,
    SecurityEvent,
    PerformanceMetric,
    SystemStartup,
    CacheOperation,
    FileOperation,
    BusinessLogic,
}

impl Scenario {
    /// Get all scenarios.
    pub fn all() -> &'static [Scenario] {
        &[
            Scenario::UserLogin,
            Scenario::DatabaseOperation,
            Scenario::ApiRequest,
            Scenario::ErrorHandling,
            Scenario::SecurityEvent,
            Scenario::PerformanceMetric,
            Scenario::SystemStartup,
            Scenario::CacheOperation,
            Scenario::FileOperation,
            Scenario::BusinessLogic,
        ]
    }

    /// Name used in prompts sent to the backend.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Scenario::UserLogin => "USER_LOGIN",
            Scenario::DatabaseOperation => "DATABASE_OPERATION",
            Scenario::ApiRequest => "API_REQUEST",
            Scenario::ErrorHandling => "ERROR_HANDLING",
            Scenario::SecurityEvent => "SECURITY_EVENT",
            Scenario::PerformanceMetric => "PERFORMANCE_METRIC",
            Scenario::SystemStartup => "SYSTEM_STARTUP",
            Scenario::CacheOperation => "CACHE_OPERATION",
            Scenario::FileOperation => "FILE_OPERATION",
            Scenario::BusinessLogic => "BUSINESS_LOGIC",
        }
    }

    /// Human-readable description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::UserLogin => "User authentication and login events",
            Scenario::DatabaseOperation => "Database queries, connections, and transactions",
            Scenario::ApiRequest => "HTTP API requests and responses",
            Scenario::ErrorHandling => "Application errors and exceptions",
            Scenario::SecurityEvent => "Security-related events and alerts",
            Scenario::PerformanceMetric => "Performance monitoring and metrics",
            Scenario::SystemStartup => "Application startup and initialization",
            Scenario::CacheOperation => "Cache hits, misses, and operations",
            Scenario::FileOperation => "File system operations and I/O",
            Scenario::BusinessLogic => "Business process execution and workflows",
        }
    }

    /// Synthetic subsystem that "owns" log lines for this scenario.
    pub fn subsystem(&self) -> &'static str {
        match self {
            Scenario::UserLogin => "UserAuthenticationService",
            Scenario::DatabaseOperation => "DatabaseService",
            Scenario::ApiRequest => "ApiController",
            Scenario::ErrorHandling => "ErrorHandlerService",
            Scenario::SecurityEvent => "SecurityService",
            Scenario::PerformanceMetric => "PerformanceMonitorService",
            Scenario::SystemStartup => "ApplicationStartupService",
            Scenario::CacheOperation => "CacheService",
            Scenario::FileOperation => "FileProcessorService",
            Scenario::BusinessLogic => "BusinessLogicService",
        }
    }

    /// Fully qualified logger name (`synthetic::<Subsystem>`).
    pub fn logger_name(&self) -> &'static str {
        match self {
            Scenario::UserLogin => "synthetic::UserAuthenticationService",
            Scenario::DatabaseOperation => "synthetic::DatabaseService",
            Scenario::ApiRequest => "synthetic::ApiController",
            Scenario::ErrorHandling => "synthetic::ErrorHandlerService",
            Scenario::SecurityEvent => "synthetic::SecurityService",
            Scenario::PerformanceMetric => "synthetic::PerformanceMonitorService",
            Scenario::SystemStartup => "synthetic::ApplicationStartupService",
            Scenario::CacheOperation => "synthetic::CacheService",
            Scenario::FileOperation => "synthetic::FileProcessorService",
            Scenario::BusinessLogic => "synthetic::BusinessLogicService",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Log severity levels with their selection probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// All severities in cumulative-selection order.
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Trace,
            Severity::Debug,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
        ]
    }

    /// Probability of this severity being selected. Weights sum to 1.0.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Trace => 0.05,
            Severity::Debug => 0.15,
            Severity::Info => 0.30,
            Severity::Warn => 0.15,
            Severity::Error => 0.35,
        }
    }

    /// Uppercase name used in prompts and the output schema.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Equivalent `tracing` level.
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            Severity::Trace => tracing::Level::TRACE,
            Severity::Debug => tracing::Level::DEBUG,
            Severity::Info => tracing::Level::INFO,
            Severity::Warn => tracing::Level::WARN,
            Severity::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Trace => write!(f, "trace"),
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Error returned when a severity name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}'")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A structured log entry produced by the generative backend.
///
/// Only `message` and `level` are required; every domain field is whatever
/// the model chose to fill in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub message: String,

    pub level: Severity,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub transaction_id: Option<String>,

    #[serde(default)]
    pub request_path: Option<String>,

    #[serde(default)]
    pub service_version: Option<String>,

    #[serde(default)]
    pub duration_ms: Option<i64>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub response_code: Option<i64>,

    #[serde(default)]
    pub thread_id: Option<String>,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub instance_id: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Free-form metadata attached by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl LogRecord {
    /// Create a record with only the required fields set.
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            user_id: None,
            transaction_id: None,
            request_path: None,
            service_version: None,
            duration_ms: None,
            session_id: None,
            response_code: None,
            thread_id: None,
            environment: None,
            instance_id: None,
            region: None,
            metadata: None,
            stack_trace: None,
        }
    }

    /// Attach a stack trace.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_weights_sum_to_one() {
        let total: f64 = Severity::all().iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_severity_deserialization_is_case_insensitive() {
        let level: Severity = serde_json::from_str(r#""WARN""#).unwrap();
        assert_eq!(level, Severity::Warn);
        let level: Severity = serde_json::from_str(r#""error""#).unwrap();
        assert_eq!(level, Severity::Error);
        let level: Severity = serde_json::from_str(r#""Warning""#).unwrap();
        assert_eq!(level, Severity::Warn);
        assert!(serde_json::from_str::<Severity>(r#""fatal""#).is_err());
    }

    #[test]
    fn test_severity_serialization() {
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), r#""INFO""#);
        assert_eq!(format!("{}", Severity::Error), "error");
    }

    #[test]
    fn test_scenario_table_is_complete() {
        assert_eq!(Scenario::all().len(), 10);
        for scenario in Scenario::all() {
            assert!(!scenario.description().is_empty());
            assert_eq!(
                scenario.logger_name(),
                format!("synthetic::{}", scenario.subsystem())
            );
        }
        assert_eq!(Scenario::UserLogin.subsystem(), "UserAuthenticationService");
        assert_eq!(Scenario::CacheOperation.subsystem(), "CacheService");
    }

    #[test]
    fn test_log_record_requires_message_and_level() {
        assert!(serde_json::from_str::<LogRecord>(r#"{"level":"INFO"}"#).is_err());
        assert!(serde_json::from_str::<LogRecord>(r#"{"message":"hi"}"#).is_err());

        let record: LogRecord =
            serde_json::from_str(r#"{"message":"hi","level":"INFO","duration_ms":42}"#).unwrap();
        assert_eq!(record.message, "hi");
        assert_eq!(record.duration_ms, Some(42));
        assert!(record.metadata.is_none());
    }
}
