use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::rules::{BandRule, DetectionRule, SensorHistory, TrendRule, ZScoreRule};
use super::{AnomalyBuffer, AnomalyKind, AnomalyRecord};
use crate::error::{GuardError, Result};
use crate::events::SensorEvent;
use crate::thresholds::{Parameter, ThresholdRegistry};

/// Tuning for the statistical and trend rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Values a sensor must have before the z-score rule applies
    pub min_samples: usize,
    /// |z| strictly above this is anomalous
    pub z_threshold: f64,
    /// |Δ| between consecutive readings strictly above this is anomalous.
    /// Applies to every parameter regardless of unit.
    pub trend_threshold: f64,
    /// Values kept per sensor
    pub history_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_samples: 20,
            z_threshold: 3.5,
            trend_threshold: 0.5,
            history_capacity: 500,
        }
    }
}

impl DetectionConfig {
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_z_threshold(mut self, z_threshold: f64) -> Self {
        self.z_threshold = z_threshold;
        self
    }

    pub fn with_trend_threshold(mut self, trend_threshold: f64) -> Self {
        self.trend_threshold = trend_threshold;
        self
    }

    pub fn with_history_capacity(mut self, history_capacity: usize) -> Self {
        self.history_capacity = history_capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_samples < 2 {
            return Err(GuardError::Configuration(
                "min_samples must be at least 2".to_string(),
            ));
        }
        if self.history_capacity < self.min_samples {
            return Err(GuardError::Configuration(format!(
                "history_capacity ({}) must be at least min_samples ({})",
                self.history_capacity, self.min_samples
            )));
        }
        if !(self.z_threshold.is_finite() && self.z_threshold > 0.0) {
            return Err(GuardError::Configuration(
                "z_threshold must be a positive number".to_string(),
            ));
        }
        if !(self.trend_threshold.is_finite() && self.trend_threshold >= 0.0) {
            return Err(GuardError::Configuration(
                "trend_threshold must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Counters kept by the [`DetectionEngine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStats {
    pub events: u64,
    pub anomalies: u64,
    pub extreme: u64,
    pub optimal: u64,
    pub z_score: u64,
    pub trend: u64,
    pub sensors: usize,
}

impl DetectionStats {
    fn record(&mut self, kind: AnomalyKind) {
        self.anomalies += 1;
        match kind {
            AnomalyKind::Extreme => self.extreme += 1,
            AnomalyKind::Optimal => self.optimal += 1,
            AnomalyKind::ZScore => self.z_score += 1,
            AnomalyKind::Trend => self.trend += 1,
        }
    }
}

/// Runs every rule against each classified event and publishes the results.
///
/// The engine exclusively owns per-sensor histories; they are created on a
/// sensor's first event and never shared.
pub struct DetectionEngine {
    config: DetectionConfig,
    rules: Vec<Box<dyn DetectionRule>>,
    histories: HashMap<String, SensorHistory>,
    buffer: AnomalyBuffer,
    missing_thresholds: HashSet<Parameter>,
    stats: DetectionStats,
}

impl DetectionEngine {
    /// Creates an engine with the band, z-score and trend rules.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Configuration`] if `config` is invalid.
    pub fn new(
        config: DetectionConfig,
        thresholds: Arc<ThresholdRegistry>,
        buffer: AnomalyBuffer,
    ) -> Result<Self> {
        config.validate()?;
        let rules: Vec<Box<dyn DetectionRule>> = vec![
            Box::new(BandRule::new(thresholds)),
            Box::new(ZScoreRule::new(config.min_samples, config.z_threshold)),
            Box::new(TrendRule::new(config.trend_threshold)),
        ];
        Ok(Self {
            config,
            rules,
            histories: HashMap::new(),
            buffer,
            missing_thresholds: HashSet::new(),
            stats: DetectionStats::default(),
        })
    }

    /// Adds a rule evaluated after the built-in ones.
    pub fn with_rule(mut self, rule: Box<dyn DetectionRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn buffer(&self) -> &AnomalyBuffer {
        &self.buffer
    }

    pub fn history(&self, sensor_id: &str) -> Option<&SensorHistory> {
        self.histories.get(sensor_id)
    }

    pub fn stats(&self) -> DetectionStats {
        DetectionStats {
            sensors: self.histories.len(),
            ..self.stats.clone()
        }
    }

    /// Records `event` in its sensor's history and applies every rule.
    ///
    /// Rule failures are logged and skip only the failing rule.
    pub fn evaluate(&mut self, event: &SensorEvent) -> Vec<AnomalyRecord> {
        let capacity = self.config.history_capacity;
        let history = self
            .histories
            .entry(event.sensor_id.clone())
            .or_insert_with(|| SensorHistory::new(capacity));
        history.push(event.value);

        let mut records = Vec::new();
        for rule in &self.rules {
            match rule.evaluate(event, history) {
                Ok(Some(record)) => {
                    debug!(rule = rule.name(), anomaly = %record.summary(), "Anomaly detected");
                    records.push(record);
                }
                Ok(None) => {}
                Err(GuardError::MissingThreshold { parameter }) => {
                    if let Some(p) = event.parameter {
                        if self.missing_thresholds.insert(p) {
                            error!(
                                %parameter,
                                sensor = %event.sensor_id,
                                "No threshold for parameter"
                            );
                        }
                    }
                }
                Err(e) => warn!(rule = rule.name(), error = %e, "Detection rule failed"),
            }
        }

        self.stats.events += 1;
        for record in &records {
            self.stats.record(record.kind);
        }
        records
    }

    /// Evaluates `event` and appends its anomalies to the buffer in one step.
    /// Returns how many were appended.
    pub async fn process(&mut self, event: &SensorEvent) -> usize {
        let records = self.evaluate(event);
        let count = records.len();
        self.buffer.extend(records).await;
        count
    }
}
