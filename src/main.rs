//! Synthetic Log Generator - realistic application logs from a generative model
//!
//! This service periodically asks a generative model backend for structured
//! log entries across a fixed set of scenarios and writes them as structured
//! log events.
//!
//! ## Features
//!
//! - Weighted scenario and severity selection with synthetic request context
//! - Fixed-interval fan-out on a bounded worker pool
//! - Circuit breaker and bounded retry around every backend call
//! - Graceful shutdown on SIGINT
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `SYNTHETIC_LOGS_BACKEND_URL`: Backend URL (default: http://localhost:11434)
//! - `SYNTHETIC_LOGS_MODEL`: Model name (default: llama3.2)
//! - `SYNTHETIC_LOGS_TICK_INTERVAL_MS`: Scheduler period (default: 1000)
//! - `SYNTHETIC_LOGS_MAX_PARALLEL`: Generation attempts per tick (default: 8)
//! - `SYNTHETIC_LOGS_LOG_FORMAT`: `text` or `json` (default: text)
//! - `RUST_LOG`: Logging level filter (default: info, synthetic=trace)

use std::process;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use synthetic_log_generator::breaker::CircuitBreaker;
use synthetic_log_generator::client::OllamaClient;
use synthetic_log_generator::config::{Config, LogFormat};
use synthetic_log_generator::context::ContextSynthesizer;
use synthetic_log_generator::emitter::TracingEmitter;
use synthetic_log_generator::gate::{CircuitBreakerGate, RetryPolicy};
use synthetic_log_generator::orchestrator::GenerationOrchestrator;
use synthetic_log_generator::pool::WorkerPool;
use synthetic_log_generator::prompt::{OutputSchemas, PromptRenderer};
use synthetic_log_generator::scheduler::Scheduler;

/// Name of the breaker guarding the backend
const BREAKER_NAME: &str = "generative-backend";

/// Filter used when `RUST_LOG` is unset; generated entries pass at every level
const DEFAULT_LOG_FILTER: &str = "info,synthetic=trace";

/// How long to wait for in-flight generation tasks on shutdown
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll period while draining the worker pool
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() {
    // Load configuration first: it selects the diagnostics format
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Text);
            error!(error = %e, "Failed to load configuration");
            process::exit(1);
        }
    };

    init_tracing(config.log_format);

    info!("Starting Synthetic Log Generator...");
    info!(
        backend_url = %config.backend_url,
        model = %config.model,
        tick_interval_ms = config.tick_interval.as_millis() as u64,
        max_parallel = config.max_parallel,
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        "Configuration loaded"
    );

    let prompts = match &config.prompt_file {
        Some(path) => match PromptRenderer::from_file(path) {
            Ok(prompts) => prompts,
            Err(e) => {
                error!(error = %e, "Failed to load prompt template");
                process::exit(1);
            }
        },
        None => PromptRenderer::default(),
    };

    let mut schemas = OutputSchemas::default();
    if let Some(schema) = &config.format_schema {
        schemas.insert(config.format_type.clone(), schema.clone());
    }

    // Create HTTP client with connection pooling
    let client = match OllamaClient::new(&config, prompts, schemas) {
        Ok(client) => {
            info!(
                generate_url = %client.generate_url(),
                timeout_secs = client.timeout().as_secs(),
                "HTTP client initialized"
            );
            Arc::new(client)
        }
        Err(e) => {
            error!(error = %e, "Failed to create HTTP client");
            process::exit(1);
        }
    };

    let breaker = Arc::new(CircuitBreaker::new(BREAKER_NAME, config.breaker.clone()));
    let gate = Arc::new(CircuitBreakerGate::new(breaker, RetryPolicy::default()));
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        client,
        gate,
        Arc::new(ContextSynthesizer::new()),
    ));

    let emitter = Arc::new(TracingEmitter::new());
    let pool = WorkerPool::new(config.workers, config.queue_capacity);
    let scheduler = Scheduler::new(
        orchestrator,
        emitter.clone(),
        pool.clone(),
        config.max_parallel,
        config.tick_interval,
    );

    info!("Synthetic Log Generator running. Press Ctrl+C to stop.");
    scheduler.run_until(shutdown_signal()).await;

    // Graceful shutdown
    info!("Initiating graceful shutdown...");
    match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, drain(&pool)).await {
        Ok(()) => info!("In-flight generation tasks completed"),
        Err(_) => warn!(
            pending = pool.pending(),
            "Shutdown drain timed out after {:?}", SHUTDOWN_DRAIN_TIMEOUT
        ),
    }

    info!(
        emitted = emitter.emitted(),
        failed = emitter.failed(),
        "Synthetic Log Generator stopped"
    );
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Resolve once SIGINT is received.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping..."),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

/// Wait until the worker pool has no running or queued tasks.
async fn drain(pool: &WorkerPool) {
    while pool.pending() > 0 {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
