//! End-to-end wiring: ingest → merge → classify → detect → decide.
//!
//! One [`Pipeline`] value is one run. It owns every piece of state the run
//! needs (resolver, registries, engine histories, the anomaly buffer), so
//! several pipelines can run side by side in one process without sharing
//! anything.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::anomaly::{AnomalyBuffer, DetectionConfig, DetectionEngine, DetectionStats};
use crate::classifier::{Classifier, ClassifierStats};
use crate::decision::{
    DecisionHandler, DecisionLoop, DecisionLoopConfig, DecisionStats, RuleBasedDecisionHandler,
};
use crate::error::{ErrorContext, GuardError, Result};
use crate::logging::LogConfig;
use crate::sensors::{
    SensorIdentityResolver, SensorRegistry, DEFAULT_ARCHIVE_MARKER, DEFAULT_SUFFIX_MARKER,
};
use crate::sources::IngestOptions;
use crate::stream::{ChronologicalMerge, DEFAULT_EMIT_DELAY};
use crate::thresholds::ThresholdRegistry;
use crate::{log_event, log_file_op};

/// Settings for one pipeline run.
///
/// Loadable from JSON; durations are given in milliseconds and every field
/// is optional:
///
/// ```json
/// {
///   "data_dir": "data",
///   "emit_delay_ms": 0.1,
///   "detection": { "z_threshold": 3.0 },
///   "decision": { "trigger": 5, "journal_path": "last_decision.jsonl" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    /// Pause before each emitted event, in milliseconds
    pub emit_delay_ms: f64,
    pub archive_marker: String,
    pub suffix_marker: String,
    pub ingest: IngestOptions,
    pub detection: DetectionConfig,
    pub decision: DecisionSettings,
}

/// Serializable form of [`DecisionLoopConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionSettings {
    pub poll_interval_ms: u64,
    pub trigger: usize,
    pub startup_delay_ms: u64,
    pub journal_path: Option<PathBuf>,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            trigger: 1,
            startup_delay_ms: 0,
            journal_path: None,
        }
    }
}

impl DecisionSettings {
    pub fn to_loop_config(&self) -> DecisionLoopConfig {
        let config = DecisionLoopConfig::new()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_trigger(self.trigger)
            .with_startup_delay(Duration::from_millis(self.startup_delay_ms));
        match &self.journal_path {
            Some(path) => config.with_journal_path(path),
            None => config,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            emit_delay_ms: DEFAULT_EMIT_DELAY.as_secs_f64() * 1000.0,
            archive_marker: DEFAULT_ARCHIVE_MARKER.to_string(),
            suffix_marker: DEFAULT_SUFFIX_MARKER.to_string(),
            ingest: IngestOptions::default(),
            detection: DetectionConfig::default(),
            decision: DecisionSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_emit_delay(mut self, delay: Duration) -> Self {
        self.emit_delay_ms = delay.as_secs_f64() * 1000.0;
        self
    }

    pub fn with_ingest(mut self, ingest: IngestOptions) -> Self {
        self.ingest = ingest;
        self
    }

    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_decision(mut self, decision: DecisionSettings) -> Self {
        self.decision = decision;
        self
    }

    /// The configured pause between emitted events.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Configuration`] when `emit_delay_ms` is negative,
    /// not a number, or too large to represent as a [`Duration`].
    pub fn emit_delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.emit_delay_ms / 1000.0).map_err(|e| {
            GuardError::Configuration(format!(
                "emit_delay_ms must be a non-negative number of milliseconds, got {}: {e}",
                self.emit_delay_ms
            ))
        })
    }

    pub fn resolver(&self) -> SensorIdentityResolver {
        SensorIdentityResolver::new(&self.archive_marker, &self.suffix_marker)
    }

    pub fn validate(&self) -> Result<()> {
        self.emit_delay()?;
        self.ingest.validate()?;
        self.detection.validate()?;
        self.decision.to_loop_config().validate()
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub files: usize,
    pub events_ingested: usize,
    pub classifier: ClassifierStats,
    pub detection: DetectionStats,
    pub decisions: DecisionStats,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// A single producer/consumer run over a data directory.
pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<SensorRegistry>,
    thresholds: Arc<ThresholdRegistry>,
    buffer: AnomalyBuffer,
    log_config: LogConfig,
}

impl Pipeline {
    /// # Errors
    ///
    /// Returns [`GuardError::Configuration`] if `config` is invalid.
    pub fn new(config: PipelineConfig, registry: SensorRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: Arc::new(registry),
            thresholds: Arc::new(ThresholdRegistry::default()),
            buffer: AnomalyBuffer::new(),
            log_config: LogConfig::default(),
        })
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdRegistry) -> Self {
        self.thresholds = Arc::new(thresholds);
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The buffer shared by the producer and the decision loop.
    pub fn buffer(&self) -> &AnomalyBuffer {
        &self.buffer
    }

    /// Runs with the built-in [`RuleBasedDecisionHandler`].
    pub async fn run(self) -> Result<PipelineStats> {
        self.run_with_handler(RuleBasedDecisionHandler::default())
            .await
    }

    /// Runs until every event has been streamed and the decision loop has
    /// consumed every anomaly.
    ///
    /// # Errors
    ///
    /// Fails only if the data directory does not exist or a task panics.
    #[instrument(skip_all, fields(data_dir = %self.config.data_dir.display()))]
    pub async fn run_with_handler<H>(self, handler: H) -> Result<PipelineStats>
    where
        H: DecisionHandler + 'static,
    {
        let started = Instant::now();
        let data_dir = self.config.data_dir.clone();
        if !data_dir.is_dir() {
            return Err(GuardError::Configuration(format!(
                "Data directory '{}' does not exist",
                data_dir.display()
            )));
        }
        let emit_delay = self.config.emit_delay()?;

        let engine = DetectionEngine::new(
            self.config.detection.clone(),
            Arc::clone(&self.thresholds),
            self.buffer.clone(),
        )?;
        let classifier = Classifier::new(Arc::clone(&self.registry));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let decision_loop = DecisionLoop::new(
            self.config.decision.to_loop_config(),
            handler,
            self.buffer.clone(),
            shutdown_rx,
        )?
        .with_log_config(self.log_config.clone());
        let consumer = tokio::spawn(decision_loop.run());

        let resolver = self.config.resolver();
        let ingest = self.config.ingest.clone();
        let merged = tokio::task::spawn_blocking(move || {
            ChronologicalMerge::collect(&data_dir, &resolver, &ingest)
        })
        .await
        .map_err(|e| GuardError::Internal(format!("Ingestion task failed: {e}")));

        let merged = match merged.and_then(|m| m) {
            Ok(merged) => merged,
            Err(e) => {
                let _ = shutdown_tx.send(true);
                if let Err(join) = consumer.await {
                    warn!(error = %join, "Decision loop did not stop cleanly");
                }
                return Err(e);
            }
        };

        let files = merged.file_count();
        let events_ingested = merged.len();
        log_file_op!(
            self.log_config,
            files,
            events = events_ingested,
            "Streaming events"
        );

        let producer = tokio::spawn(produce(
            merged,
            classifier,
            engine,
            emit_delay,
            self.log_config.clone(),
        ));
        let produced = producer.await;

        // Stop the consumer even if the producer failed, so nothing is left
        // in the buffer.
        let _ = shutdown_tx.send(true);
        let decisions = consumer
            .await
            .map_err(|e| GuardError::Internal(format!("Decision loop failed: {e}")))?;
        let (classifier, detection) =
            produced.map_err(|e| GuardError::Internal(format!("Producer failed: {e}")))?;

        let stats = PipelineStats {
            files,
            events_ingested,
            classifier,
            detection,
            decisions,
            elapsed: started.elapsed(),
        };
        info!(
            files = stats.files,
            events = stats.events_ingested,
            forwarded = stats.classifier.forwarded,
            dropped = stats.classifier.dropped,
            anomalies = stats.detection.anomalies,
            cycles = stats.decisions.cycles,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Pipeline finished"
        );
        Ok(stats)
    }
}

async fn produce(
    merged: ChronologicalMerge,
    mut classifier: Classifier,
    mut engine: DetectionEngine,
    delay: Duration,
    log_config: LogConfig,
) -> (ClassifierStats, DetectionStats) {
    let mut events = std::pin::pin!(merged.into_paced_stream(delay));
    while let Some(event) = events.next().await {
        let Some(event) = classifier.classify(event) else {
            continue;
        };
        let appended = engine.process(&event).await;
        log_event!(
            log_config,
            sensor = %event.sensor_id,
            value = event.value,
            anomalies = appended,
            "Processed event"
        );
    }
    (classifier.stats(), engine.stats())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!((config.emit_delay().unwrap().as_secs_f64() - 0.0001).abs() < 1e-9);
        assert_eq!(config.decision.trigger, 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "data_dir": "/srv/pod",
            "emit_delay_ms": 0,
            "detection": {"z_threshold": 3.0},
            "decision": {"trigger": 5, "journal_path": "journal.jsonl"},
            "ingest": {"ignored_columns": ["Mission_Milestone", "Notes"]}
        }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/pod"));
        assert_eq!(config.emit_delay().unwrap(), Duration::ZERO);
        assert_eq!(config.detection.z_threshold, 3.0);
        assert_eq!(config.detection.min_samples, 20);
        assert_eq!(config.decision.trigger, 5);
        assert_eq!(config.decision.poll_interval_ms, 100);
        assert!(config.ingest.is_ignored("notes"));
        assert_eq!(config.ingest.batch_size, 10_000);

        let loop_config = config.decision.to_loop_config();
        assert_eq!(loop_config.trigger(), 5);
        assert_eq!(
            loop_config.journal_path(),
            Some(&PathBuf::from("journal.jsonl"))
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig::default().with_detection(
            DetectionConfig::default().with_history_capacity(5),
        );
        assert!(Pipeline::new(config, SensorRegistry::new()).is_err());

        let mut config = PipelineConfig::default();
        config.emit_delay_ms = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrepresentable_emit_delay_is_a_configuration_error() {
        for delay_ms in [1e30, f64::INFINITY, f64::NAN, -0.5] {
            let config = PipelineConfig {
                emit_delay_ms: delay_ms,
                ..PipelineConfig::default()
            };
            assert!(matches!(
                config.emit_delay(),
                Err(GuardError::Configuration(_))
            ));
            assert!(matches!(
                config.validate(),
                Err(GuardError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_config_file_error_names_path() {
        let err = PipelineConfig::from_json_file("/no/such/config.json").unwrap_err();
        assert!(err.to_string().contains("/no/such/config.json"));
    }

    #[tokio::test]
    async fn test_missing_data_dir_is_fatal() {
        let pipeline = Pipeline::new(
            PipelineConfig::new("/definitely/missing/dir"),
            SensorRegistry::new(),
        )
        .unwrap();
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, GuardError::Configuration(_)));
    }
}
