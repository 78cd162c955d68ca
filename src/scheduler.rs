//! Periodic fan-out of generation attempts.
//!
//! On every tick the scheduler submits `fan_out` independent generation tasks
//! to the worker pool. Each task produces at most one entry and hands it to
//! the sink. Ticks run as their own tasks, so a slow backend never delays the
//! timer; the pool bounds how much work can pile up.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::emitter::LogSink;
use crate::orchestrator::GenerationOrchestrator;
use crate::pool::WorkerPool;

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tasks the tick tried to submit
    pub requested: usize,
    /// Entries handed to the sink
    pub emitted: usize,
    /// Tasks that ran but produced nothing
    pub failed: usize,
    /// Tasks refused by a saturated pool
    pub rejected: usize,
    /// Tasks that panicked
    pub panicked: usize,
}

impl TickReport {
    pub fn is_complete(&self) -> bool {
        self.emitted == self.requested
    }
}

#[derive(Clone)]
pub struct Scheduler {
    orchestrator: Arc<GenerationOrchestrator>,
    sink: Arc<dyn LogSink>,
    pool: WorkerPool,
    fan_out: usize,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<GenerationOrchestrator>,
        sink: Arc<dyn LogSink>,
        pool: WorkerPool,
        fan_out: usize,
        interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            sink,
            pool,
            fan_out: fan_out.max(1),
            interval,
        }
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run one tick: submit `fan_out` tasks and wait for all of them.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport {
            requested: self.fan_out,
            ..TickReport::default()
        };
        let mut handles = Vec::with_capacity(self.fan_out);

        for _ in 0..self.fan_out {
            let orchestrator = self.orchestrator.clone();
            let sink = self.sink.clone();

            let submitted = self.pool.try_spawn(async move {
                match orchestrator.produce_one().await {
                    Some(entry) => {
                        sink.emit(&entry.record, entry.scenario);
                        true
                    }
                    None => false,
                }
            });

            match submitted {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    report.rejected += 1;
                    warn!(error = %e, "Generation task rejected");
                }
            }
        }

        for handle in handles {
            match handle.await {
                Ok(true) => report.emitted += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    report.panicked += 1;
                    error!(error = %e, "Generation task panicked");
                }
            }
        }

        if report.failed + report.panicked > 0 {
            let breaker = self.orchestrator.gate().breaker();
            let metrics = breaker.metrics();
            info!(
                failed = report.failed + report.panicked,
                breaker = breaker.name(),
                circuit_state = %metrics.state,
                buffered_calls = metrics.buffered_calls,
                failed_calls = metrics.failed_calls,
                "Tick produced fewer entries than requested"
            );
        }

        report
    }

    /// Tick every `interval` until `shutdown` resolves.
    ///
    /// Ticks in flight at shutdown are left to finish on their own.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            fan_out = self.fan_out,
            interval_ms = self.interval.as_millis() as u64,
            "Scheduler started"
        );

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    ticks += 1;
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        scheduler.run_tick().await;
                    });
                }
            }
        }

        info!(ticks, pending = self.pool.pending(), "Scheduler stopped");
    }
}
