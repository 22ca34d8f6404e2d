use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use super::{DecisionHandler, DecisionJournal, JournalEntry};
use crate::anomaly::{AnomalyBuffer, AnomalyRecord};
use crate::error::{GuardError, Result};
use crate::logging::{truncate_field, LogConfig};

/// Settings for the [`DecisionLoop`].
#[derive(Debug, Clone)]
pub struct DecisionLoopConfig {
    poll_interval: Duration,
    trigger: usize,
    startup_delay: Duration,
    journal_path: Option<PathBuf>,
}

impl Default for DecisionLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            trigger: 1,
            startup_delay: Duration::ZERO,
            journal_path: None,
        }
    }
}

impl DecisionLoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often the buffer size is checked.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Minimum buffered anomalies that start a decision cycle.
    pub fn with_trigger(mut self, trigger: usize) -> Self {
        self.trigger = trigger;
        self
    }

    /// Wait before the first poll.
    pub fn with_startup_delay(mut self, startup_delay: Duration) -> Self {
        self.startup_delay = startup_delay;
        self
    }

    pub fn with_journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn trigger(&self) -> usize {
        self.trigger
    }

    pub fn startup_delay(&self) -> Duration {
        self.startup_delay
    }

    pub fn journal_path(&self) -> Option<&PathBuf> {
        self.journal_path.as_ref()
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(GuardError::Configuration(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.trigger == 0 {
            return Err(GuardError::Configuration(
                "trigger must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Statistics from the decision loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionStats {
    pub cycles: u64,
    pub anomalies_consumed: u64,
    pub handler_failures: u64,
    pub journal_failures: u64,
}

/// Consumer task that hands buffered anomalies to a [`DecisionHandler`].
///
/// Every poll interval the buffer is drained atomically if it holds at least
/// `trigger` records. On shutdown whatever is left is drained once more, so
/// no record appended before the signal is lost.
pub struct DecisionLoop<H> {
    handler: H,
    buffer: AnomalyBuffer,
    shutdown: watch::Receiver<bool>,
    config: DecisionLoopConfig,
    journal: Option<DecisionJournal>,
    log_config: LogConfig,
    stats: DecisionStats,
}

impl<H: DecisionHandler> DecisionLoop<H> {
    /// # Errors
    ///
    /// Returns [`GuardError::Configuration`] if `config` is invalid.
    pub fn new(
        config: DecisionLoopConfig,
        handler: H,
        buffer: AnomalyBuffer,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        config.validate()?;
        let journal = config.journal_path.clone().map(DecisionJournal::new);
        Ok(Self {
            handler,
            buffer,
            shutdown,
            config,
            journal,
            log_config: LogConfig::default(),
            stats: DecisionStats::default(),
        })
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Runs until shutdown is signalled (or the signal sender is dropped).
    #[instrument(skip(self), fields(trigger = self.config.trigger))]
    pub async fn run(mut self) -> DecisionStats {
        info!("Decision loop started");

        if !self.config.startup_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.config.startup_delay) => {}
                _ = self.shutdown_requested() => {
                    info!("Shutdown during startup delay, flushing remaining anomalies");
                    self.flush_all().await;
                    return self.finish();
                }
            }
        }

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                _ = self.shutdown_requested() => {
                    info!("Shutdown signal received, flushing remaining anomalies");
                    self.flush_all().await;
                    break;
                }
            }
        }

        self.finish()
    }

    /// Resolves once shutdown is requested or can no longer be signalled.
    async fn shutdown_requested(&mut self) {
        loop {
            if *self.shutdown.borrow_and_update() {
                return;
            }
            if self.shutdown.changed().await.is_err() {
                return;
            }
        }
    }

    fn finish(self) -> DecisionStats {
        info!(
            cycles = self.stats.cycles,
            anomalies = self.stats.anomalies_consumed,
            handler_failures = self.stats.handler_failures,
            "Decision loop stopped"
        );
        self.stats
    }

    async fn poll(&mut self) {
        if let Some(batch) = self.buffer.drain_if_at_least(self.config.trigger).await {
            self.run_cycle(batch).await;
        }
    }

    async fn flush_all(&mut self) {
        let batch = self.buffer.drain_all().await;
        if batch.is_empty() {
            debug!("Nothing left to flush");
            return;
        }
        self.run_cycle(batch).await;
    }

    async fn run_cycle(&mut self, batch: Vec<AnomalyRecord>) {
        self.stats.cycles += 1;
        self.stats.anomalies_consumed += batch.len() as u64;
        let cycle = self.stats.cycles;
        info!(cycle, anomalies = batch.len(), "Decision cycle triggered");

        let decision = match self.handler.decide(&batch).await {
            Ok(decision) => {
                if self.log_config.log_decisions {
                    let text = truncate_field(&decision, self.log_config.max_field_length);
                    info!(cycle, decision = %text, "Decision made");
                } else {
                    debug!(cycle, "Decision made");
                }
                decision
            }
            Err(e) => {
                self.stats.handler_failures += 1;
                error!(cycle, error = %e, "Decision handler failed");
                format!("URGENCY: ERROR\nREASONING: {e}")
            }
        };

        if let Some(journal) = &self.journal {
            let entry = JournalEntry {
                cycle,
                decided_at: Utc::now(),
                anomalies: batch,
                decision,
            };
            if let Err(e) = journal.append(&entry).await {
                self.stats.journal_failures += 1;
                warn!(cycle, error = %e, "Failed to write decision journal");
            }
        }
    }
}
