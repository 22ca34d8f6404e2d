//! The detection rules and the per-sensor history they read.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::{AnomalyDetail, AnomalyKind, AnomalyRecord};
use crate::error::{GuardError, Result};
use crate::events::SensorEvent;
use crate::thresholds::ThresholdRegistry;

/// Bounded window of the most recent values of one sensor, oldest first.
#[derive(Debug, Clone)]
pub struct SensorHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SensorHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Appends `value`, evicting the oldest value when full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Change between the two most recent values; 0 with fewer than two.
    pub fn last_delta(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        self.values[n - 1] - self.values[n - 2]
    }

    /// Sample mean and standard deviation (n − 1), if at least two values.
    pub fn mean_and_std_dev(&self) -> Option<(f64, f64)> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        let mean = self.values.iter().sum::<f64>() / n as f64;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        Some((mean, variance.sqrt()))
    }
}

/// A criterion applied to every classified event.
///
/// `history` already contains the event's value as its latest entry.
pub trait DetectionRule: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        event: &SensorEvent,
        history: &SensorHistory,
    ) -> Result<Option<AnomalyRecord>>;
}

/// Fixed optimal/extreme bands from the threshold registry.
///
/// A value outside the extreme band is reported as [`AnomalyKind::Extreme`]
/// only; otherwise a value outside the optimal band is [`AnomalyKind::Optimal`].
#[derive(Debug, Clone)]
pub struct BandRule {
    thresholds: Arc<ThresholdRegistry>,
}

impl BandRule {
    pub fn new(thresholds: Arc<ThresholdRegistry>) -> Self {
        Self { thresholds }
    }
}

impl DetectionRule for BandRule {
    fn name(&self) -> &'static str {
        "band"
    }

    fn evaluate(
        &self,
        event: &SensorEvent,
        _history: &SensorHistory,
    ) -> Result<Option<AnomalyRecord>> {
        let Some(parameter) = event.parameter else {
            debug!(sensor = %event.sensor_id, "No parameter known, skipping band check");
            return Ok(None);
        };

        let spec = self
            .thresholds
            .get(parameter)
            .ok_or_else(|| GuardError::MissingThreshold {
                parameter: parameter.to_string(),
            })?;

        let band = if !spec.extreme.contains(event.value) {
            Some((AnomalyKind::Extreme, spec.extreme))
        } else if !spec.optimal.contains(event.value) {
            Some((AnomalyKind::Optimal, spec.optimal))
        } else {
            None
        };

        Ok(band.map(|(kind, band)| {
            AnomalyRecord::from_event(
                event,
                kind,
                AnomalyDetail::Band {
                    min: band.min,
                    max: band.max,
                },
            )
        }))
    }
}

/// Flags values whose z-score against the sensor's window exceeds a threshold.
#[derive(Debug, Clone)]
pub struct ZScoreRule {
    pub min_samples: usize,
    pub z_threshold: f64,
}

impl ZScoreRule {
    pub fn new(min_samples: usize, z_threshold: f64) -> Self {
        Self {
            min_samples,
            z_threshold,
        }
    }
}

impl DetectionRule for ZScoreRule {
    fn name(&self) -> &'static str {
        "z_score"
    }

    fn evaluate(
        &self,
        event: &SensorEvent,
        history: &SensorHistory,
    ) -> Result<Option<AnomalyRecord>> {
        if history.len() < self.min_samples {
            return Ok(None);
        }
        let Some((mean, std_dev)) = history.mean_and_std_dev() else {
            return Ok(None);
        };
        // A flat window has no spread to measure against.
        if std_dev == 0.0 {
            return Ok(None);
        }

        let z_score = (event.value - mean) / std_dev;
        if z_score.abs() <= self.z_threshold {
            return Ok(None);
        }

        Ok(Some(AnomalyRecord::from_event(
            event,
            AnomalyKind::ZScore,
            AnomalyDetail::ZScore {
                z_score: (z_score * 100.0).round() / 100.0,
                mean,
                std_dev,
            },
        )))
    }
}

/// Flags jumps between consecutive readings of the same sensor.
///
/// The threshold is absolute and shared by every parameter.
// TODO: scale the threshold per parameter (ppm and pH rates differ by orders of magnitude).
#[derive(Debug, Clone)]
pub struct TrendRule {
    pub threshold: f64,
}

impl TrendRule {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl DetectionRule for TrendRule {
    fn name(&self) -> &'static str {
        "trend"
    }

    fn evaluate(
        &self,
        event: &SensorEvent,
        history: &SensorHistory,
    ) -> Result<Option<AnomalyRecord>> {
        let rate = history.last_delta();
        if rate.abs() <= self.threshold {
            return Ok(None);
        }
        Ok(Some(AnomalyRecord::from_event(
            event,
            AnomalyKind::Trend,
            AnomalyDetail::Trend { rate },
        )))
    }
}
