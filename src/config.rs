//! Configuration module for the synthetic log generator.
//!
//! This module provides environment-based configuration for the scheduler,
//! the worker pool, the generative backend and its circuit breaker.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::breaker::BreakerConfig;
use crate::prompt::APP_LOG_FORMAT;

/// Prefix shared by every configuration variable
const ENV_PREFIX: &str = "SYNTHETIC_LOGS_";

/// Default base URL of the generative backend
const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";

/// Default model requested from the backend
const DEFAULT_MODEL: &str = "llama3.2";

/// Default scheduler period in milliseconds
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default number of generation attempts per tick
const DEFAULT_MAX_PARALLEL: usize = 8;

/// Default worker pool width
const DEFAULT_WORKERS: usize = 10;

/// Default worker pool queue capacity
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default backend request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Bounds on the scheduler period
const MIN_TICK_INTERVAL_MS: u64 = 10;
const MAX_TICK_INTERVAL_MS: u64 = 3_600_000;

/// Upper bound for fan-out, worker count and request timeout
const MAX_PARALLEL: usize = 1000;
const MAX_WORKERS: usize = 1000;
const MAX_QUEUE_CAPACITY: usize = 100_000;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Output format of the service's own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("'{}' is not one of: text, json", other)),
        }
    }
}

/// Configuration for the synthetic log generator.
///
/// All settings can be configured via environment variables prefixed with
/// `SYNTHETIC_LOGS_`, for example:
/// - `SYNTHETIC_LOGS_BACKEND_URL`: generative backend URL (default: http://localhost:11434)
/// - `SYNTHETIC_LOGS_TICK_INTERVAL_MS`: scheduler period (default: 1000)
/// - `SYNTHETIC_LOGS_MAX_PARALLEL`: generation attempts per tick (default: 8)
#[derive(Debug, Clone)]
pub struct Config {
    /// Period between scheduler ticks
    pub tick_interval: Duration,

    /// Generation attempts started on each tick
    pub max_parallel: usize,

    /// Concurrently running generation tasks
    pub workers: usize,

    /// Tasks allowed to wait for a worker before submissions are rejected
    pub queue_capacity: usize,

    /// Base URL of the generative backend, without trailing slash
    pub backend_url: String,

    /// Model name sent with each request
    pub model: String,

    /// HTTP request timeout duration
    pub request_timeout: Duration,

    /// Circuit breaker tuning
    pub breaker: BreakerConfig,

    /// Optional prompt template replacing the built-in one
    pub prompt_file: Option<PathBuf>,

    /// Output format type requested from the backend
    pub format_type: String,

    /// Optional raw JSON schema registered for `format_type`
    pub format_schema: Option<String>,

    /// Diagnostics output format
    pub log_format: LogFormat,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    fn for_var(var: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            env_var: Some(var.to_string()),
        }
    }
}

fn var_name(suffix: &str) -> String {
    format!("{}{}", ENV_PREFIX, suffix)
}

/// Read an optional, non-blank variable.
fn read_var(suffix: &str) -> Option<String> {
    env::var(var_name(suffix))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable and check it lies within `[min, max]`.
fn parse_ranged<T>(suffix: &str, default: T, min: T, max: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display + Copy,
{
    let var = var_name(suffix);
    let Some(raw) = read_var(suffix) else {
        return Ok(default);
    };

    let value: T = raw
        .parse()
        .map_err(|_| ConfigError::for_var(&var, format!("'{}' is not a valid number", raw)))?;

    if value < min {
        return Err(ConfigError::for_var(
            &var,
            format!("value {} is below minimum ({})", value, min),
        ));
    }

    if value > max {
        return Err(ConfigError::for_var(
            &var,
            format!("value {} exceeds maximum ({})", value, max),
        ));
    }

    Ok(value)
}

/// Parse a percentage in `(0, 100]`.
fn parse_percentage(suffix: &str, default: f64) -> Result<f64, ConfigError> {
    let var = var_name(suffix);
    let value = parse_ranged(suffix, default, 0.0, 100.0)?;
    if value <= 0.0 {
        return Err(ConfigError::for_var(&var, "rate threshold must be greater than 0"));
    }
    Ok(value)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Returns a new `Config` instance with values from environment variables,
    /// falling back to defaults where a variable is unset or blank.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable does not parse or falls
    /// outside its allowed range, or if the log format is unknown.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use synthetic_log_generator::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Backend: {}", config.backend_url);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let breaker_defaults = BreakerConfig::default();

        // Normalize the backend URL so endpoint paths can be appended
        let backend_url = read_var("BACKEND_URL")
            .unwrap_or(defaults.backend_url)
            .trim_end_matches('/')
            .to_string();

        let model = read_var("MODEL").unwrap_or(defaults.model);

        let tick_interval = Duration::from_millis(parse_ranged(
            "TICK_INTERVAL_MS",
            DEFAULT_TICK_INTERVAL_MS,
            MIN_TICK_INTERVAL_MS,
            MAX_TICK_INTERVAL_MS,
        )?);
        let max_parallel = parse_ranged("MAX_PARALLEL", DEFAULT_MAX_PARALLEL, 1, MAX_PARALLEL)?;
        let workers = parse_ranged("WORKERS", DEFAULT_WORKERS, 1, MAX_WORKERS)?;
        let queue_capacity =
            parse_ranged("QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY, 0, MAX_QUEUE_CAPACITY)?;
        let request_timeout = Duration::from_secs(parse_ranged(
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
            1,
            MAX_REQUEST_TIMEOUT_SECS,
        )?);

        let breaker = BreakerConfig {
            failure_rate_threshold: parse_percentage(
                "FAILURE_RATE_THRESHOLD",
                breaker_defaults.failure_rate_threshold,
            )?,
            slow_call_rate_threshold: parse_percentage(
                "SLOW_CALL_RATE_THRESHOLD",
                breaker_defaults.slow_call_rate_threshold,
            )?,
            slow_call_duration_threshold: Duration::from_millis(parse_ranged(
                "SLOW_CALL_DURATION_MS",
                breaker_defaults.slow_call_duration_threshold.as_millis() as u64,
                1,
                u64::MAX,
            )?),
            wait_duration_in_open_state: Duration::from_secs(parse_ranged(
                "WAIT_IN_OPEN_SECS",
                breaker_defaults.wait_duration_in_open_state.as_secs(),
                1,
                u64::MAX,
            )?),
            ..breaker_defaults
        };

        let log_format = match read_var("LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e: String| ConfigError::for_var(&var_name("LOG_FORMAT"), e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            tick_interval,
            max_parallel,
            workers,
            queue_capacity,
            backend_url,
            model,
            request_timeout,
            breaker,
            prompt_file: read_var("PROMPT_FILE").map(PathBuf::from),
            format_type: read_var("FORMAT").unwrap_or(defaults.format_type),
            format_schema: read_var("FORMAT_SCHEMA"),
            log_format,
        })
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            max_parallel: DEFAULT_MAX_PARALLEL,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            breaker: BreakerConfig::default(),
            prompt_file: None,
            format_type: APP_LOG_FORMAT.to_string(),
            format_schema: None,
            log_format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{const_mutex, Mutex, MutexGuard};

    // Environment variables are process-wide; serialize the tests touching them
    static ENV_LOCK: Mutex<()> = const_mutex(());

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock()
    }

    // Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(suffix: &str, value: &str) -> Self {
            let key = var_name(suffix);
            let original = env::var(&key).ok();
            env::set_var(&key, value);
            Self { key, original }
        }

        fn remove(suffix: &str) -> Self {
            let key = var_name(suffix);
            let original = env::var(&key).ok();
            env::remove_var(&key);
            Self { key, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(val) => env::set_var(&self.key, val),
                None => env::remove_var(&self.key),
            }
        }
    }

    const ALL_VARS: [&str; 15] = [
        "TICK_INTERVAL_MS",
        "MAX_PARALLEL",
        "WORKERS",
        "QUEUE_CAPACITY",
        "BACKEND_URL",
        "MODEL",
        "REQUEST_TIMEOUT_SECS",
        "FAILURE_RATE_THRESHOLD",
        "SLOW_CALL_RATE_THRESHOLD",
        "SLOW_CALL_DURATION_MS",
        "WAIT_IN_OPEN_SECS",
        "PROMPT_FILE",
        "FORMAT",
        "FORMAT_SCHEMA",
        "LOG_FORMAT",
    ];

    fn clear_all() -> Vec<EnvGuard> {
        ALL_VARS.iter().map(|v| EnvGuard::remove(v)).collect()
    }

    fn load_err(suffix: &str, value: &str) -> ConfigError {
        let _guard = EnvGuard::set(suffix, value);
        Config::from_env().unwrap_err()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.tick_interval, Duration::from_millis(1000));
        assert_eq!(config.max_parallel, 8);
        assert_eq!(config.workers, 10);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.format_type, "app-log");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _env = lock_env();
        let _guards = clear_all();

        let config = Config::from_env().expect("Should load with defaults");
        assert_eq!(config.backend_url, "http://localhost:11434");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.breaker.failure_rate_threshold, 50.0);
        assert_eq!(config.breaker.slow_call_rate_threshold, 100.0);
        assert_eq!(config.breaker.slow_call_duration_threshold, Duration::from_secs(10));
        assert_eq!(config.breaker.wait_duration_in_open_state, Duration::from_secs(30));
        assert!(config.prompt_file.is_none());
        assert!(config.format_schema.is_none());
    }

    #[test]
    fn test_config_from_env_custom_values() {
        let _env = lock_env();
        let _guards = clear_all();
        let _g1 = EnvGuard::set("BACKEND_URL", "http://gpu-box:11434/");
        let _g2 = EnvGuard::set("TICK_INTERVAL_MS", "250");
        let _g3 = EnvGuard::set("MAX_PARALLEL", "3");
        let _g4 = EnvGuard::set("FAILURE_RATE_THRESHOLD", "25.5");
        let _g5 = EnvGuard::set("WAIT_IN_OPEN_SECS", "5");
        let _g6 = EnvGuard::set("PROMPT_FILE", "/etc/prompts/base.txt");
        let _g7 = EnvGuard::set("LOG_FORMAT", "JSON");
        let _g8 = EnvGuard::set("MODEL", "mistral");

        let config = Config::from_env().expect("Should load custom values");
        assert_eq!(config.backend_url, "http://gpu-box:11434"); // Trailing slash removed
        assert_eq!(config.model, "mistral");
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.max_parallel, 3);
        assert_eq!(config.breaker.failure_rate_threshold, 25.5);
        assert_eq!(config.breaker.wait_duration_in_open_state, Duration::from_secs(5));
        assert_eq!(config.prompt_file, Some(PathBuf::from("/etc/prompts/base.txt")));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let _env = lock_env();
        let _guards = clear_all();
        let _g1 = EnvGuard::set("MODEL", "   ");
        let _g2 = EnvGuard::set("MAX_PARALLEL", "");

        let config = Config::from_env().unwrap();
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.max_parallel, 8);
    }

    #[test]
    fn test_invalid_number() {
        let _env = lock_env();
        let _guards = clear_all();

        let err = load_err("MAX_PARALLEL", "lots");
        assert!(err.message.contains("not a valid number"));
        assert_eq!(err.env_var.as_deref(), Some("SYNTHETIC_LOGS_MAX_PARALLEL"));
    }

    #[test]
    fn test_tick_interval_bounds() {
        let _env = lock_env();
        let _guards = clear_all();

        assert!(load_err("TICK_INTERVAL_MS", "5").message.contains("below minimum"));
        assert!(load_err("TICK_INTERVAL_MS", "3600001")
            .message
            .contains("exceeds maximum"));
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let _env = lock_env();
        let _guards = clear_all();

        assert!(load_err("MAX_PARALLEL", "0").message.contains("below minimum"));
        assert!(load_err("WORKERS", "0").message.contains("below minimum"));
    }

    #[test]
    fn test_rate_thresholds_must_be_percentages() {
        let _env = lock_env();
        let _guards = clear_all();

        assert!(load_err("FAILURE_RATE_THRESHOLD", "0")
            .message
            .contains("greater than 0"));
        assert!(load_err("SLOW_CALL_RATE_THRESHOLD", "150")
            .message
            .contains("exceeds maximum"));
    }

    #[test]
    fn test_unknown_log_format() {
        let _env = lock_env();
        let _guards = clear_all();

        let err = load_err("LOG_FORMAT", "xml");
        assert!(err.message.contains("text, json"));
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError {
            message: "test error".to_string(),
            env_var: Some("TEST_VAR".to_string()),
        };
        assert_eq!(
            format!("{}", error),
            "Configuration error for TEST_VAR: test error"
        );

        let error_no_var = ConfigError {
            message: "general error".to_string(),
            env_var: None,
        };
        assert_eq!(
            format!("{}", error_no_var),
            "Configuration error: general error"
        );
    }
}
