//! Synthetic Log Generator Library
//!
//! This library provides components for producing realistic application logs
//! with a generative model backend:
//!
//! - **config**: Environment-based configuration
//! - **model**: Scenarios, severities and the structured log record
//! - **selector**: Weighted random choice of scenario and severity
//! - **context**: Synthetic realism context for each request
//! - **prompt**: Prompt templates and output schemas
//! - **client**: HTTP client for the generative backend
//! - **breaker** / **gate**: Circuit breaker and retrying call gate
//! - **orchestrator**: One end-to-end generation attempt
//! - **pool**: Bounded worker pool
//! - **scheduler**: Periodic fan-out of generation attempts
//! - **emitter**: Structured emission of generated records
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use synthetic_log_generator::breaker::CircuitBreaker;
//! use synthetic_log_generator::client::OllamaClient;
//! use synthetic_log_generator::config::Config;
//! use synthetic_log_generator::context::ContextSynthesizer;
//! use synthetic_log_generator::emitter::TracingEmitter;
//! use synthetic_log_generator::gate::{CircuitBreakerGate, RetryPolicy};
//! use synthetic_log_generator::orchestrator::GenerationOrchestrator;
//! use synthetic_log_generator::pool::WorkerPool;
//! use synthetic_log_generator::prompt::{OutputSchemas, PromptRenderer};
//! use synthetic_log_generator::scheduler::Scheduler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!
//!     let client = OllamaClient::new(&config, PromptRenderer::default(), OutputSchemas::default())
//!         .expect("Failed to create client");
//!     let breaker = CircuitBreaker::new("backend", config.breaker.clone());
//!     let gate = CircuitBreakerGate::new(Arc::new(breaker), RetryPolicy::default());
//!     let orchestrator = GenerationOrchestrator::new(
//!         Arc::new(client),
//!         Arc::new(gate),
//!         Arc::new(ContextSynthesizer::new()),
//!     );
//!
//!     let scheduler = Scheduler::new(
//!         Arc::new(orchestrator),
//!         Arc::new(TracingEmitter::new()),
//!         WorkerPool::new(config.workers, config.queue_capacity),
//!         config.max_parallel,
//!         config.tick_interval,
//!     );
//!     scheduler.run_tick().await;
//! }
//! ```

// Module declarations
pub mod breaker;
pub mod client;
pub mod config;
pub mod context;
pub mod emitter;
pub mod gate;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod prompt;
pub mod scheduler;
pub mod selector;

// Re-export commonly used types at crate root for convenience
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState, Clock, Permit, SystemClock};
pub use client::{BackendError, GenerationClient, OllamaClient};
pub use config::{Config, ConfigError, LogFormat};
pub use context::{ContextSynthesizer, ContextValue, GenerationContext};
pub use emitter::{render, EmissionError, LogSink, RenderedLog, TracingEmitter};
pub use gate::{CircuitBreakerGate, GateError, RetryPolicy};
pub use model::{LogRecord, Scenario, Severity};
pub use orchestrator::{GeneratedEntry, GenerationOrchestrator};
pub use pool::{PoolError, WorkerPool};
pub use prompt::{OutputSchemas, PromptError, PromptRenderer};
pub use scheduler::{Scheduler, TickReport};
pub use selector::RandomSelector;
