//! One generation attempt, end to end.
//!
//! The orchestrator picks a scenario and a severity, synthesizes the request
//! context and calls the backend through the circuit breaker gate. Every
//! failure is absorbed here and reported as `None`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::GenerationClient;
use crate::context::{ContextSynthesizer, GenerationContext};
use crate::gate::CircuitBreakerGate;
use crate::model::{LogRecord, Scenario, Severity};
use crate::selector::RandomSelector;

/// A successfully generated record together with what it was generated for.
#[derive(Debug, Clone)]
pub struct GeneratedEntry {
    pub scenario: Scenario,
    pub severity: Severity,
    pub entry_id: Option<u64>,
    pub record: LogRecord,
}

pub struct GenerationOrchestrator {
    client: Arc<dyn GenerationClient>,
    gate: Arc<CircuitBreakerGate>,
    synthesizer: Arc<ContextSynthesizer>,
    selector: RandomSelector,
}

impl GenerationOrchestrator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        gate: Arc<CircuitBreakerGate>,
        synthesizer: Arc<ContextSynthesizer>,
    ) -> Self {
        Self {
            client,
            gate,
            synthesizer,
            selector: RandomSelector::new(),
        }
    }

    pub fn gate(&self) -> &Arc<CircuitBreakerGate> {
        &self.gate
    }

    pub fn synthesizer(&self) -> &Arc<ContextSynthesizer> {
        &self.synthesizer
    }

    /// Produce a single log entry, or `None` if this attempt failed.
    pub async fn produce_one(&self) -> Option<GeneratedEntry> {
        let scenario = self.selector.pick_scenario();
        let severity = self.selector.pick_severity();
        self.produce(scenario, severity).await
    }

    /// Produce an entry for a fixed scenario and severity.
    pub async fn produce(&self, scenario: Scenario, severity: Severity) -> Option<GeneratedEntry> {
        let context = self.synthesize(scenario).await?;
        let entry_id = context.entry_id();

        info!(
            entry_id,
            scenario = %scenario,
            level = %severity,
            "Generating log entry"
        );

        let client = &self.client;
        let ctx = &context;
        match self
            .gate
            .call(move || client.generate(scenario, severity, ctx))
            .await
        {
            Ok(record) => {
                info!(
                    entry_id,
                    scenario = %scenario,
                    message_len = record.message.len(),
                    "Log entry generated"
                );
                Some(GeneratedEntry {
                    scenario,
                    severity,
                    entry_id,
                    record,
                })
            }
            Err(e) => {
                warn!(
                    entry_id,
                    scenario = %scenario,
                    error = %e,
                    "Failed to generate log entry"
                );
                None
            }
        }
    }

    /// Build the context on the blocking pool, away from the async workers.
    async fn synthesize(&self, scenario: Scenario) -> Option<GenerationContext> {
        let synthesizer = self.synthesizer.clone();
        match tokio::task::spawn_blocking(move || synthesizer.synthesize(scenario)).await {
            Ok(context) => Some(context),
            Err(e) => {
                warn!(scenario = %scenario, error = %e, "Context synthesis failed");
                None
            }
        }
    }
}

/// Scripted backend for tests: fails every attempt for selected entry ids.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::client::{BackendError, GenerationClient};
    use crate::context::GenerationContext;
    use crate::model::{LogRecord, Scenario, Severity};

    pub(crate) struct ScriptedClient {
        timing_out: HashSet<u64>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        pub(crate) fn succeeding() -> Self {
            Self::timing_out_for(&[])
        }

        pub(crate) fn timing_out_for(entry_ids: &[u64]) -> Self {
            Self {
                timing_out: entry_ids.iter().copied().collect(),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate(
            &self,
            scenario: Scenario,
            severity: Severity,
            context: &GenerationContext,
        ) -> Result<LogRecord, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entry_id = context.entry_id().unwrap_or_default();
            if self.timing_out.contains(&entry_id) {
                return Err(BackendError::Timeout);
            }
            Ok(LogRecord::new(
                severity,
                format!("{} entry {}", scenario, entry_id),
            ))
        }
    }
}
