//! Sensor readings as they flow through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::thresholds::Parameter;

/// A single timestamped reading from one sensor.
///
/// Events are produced by ingestion without metadata; the classifier returns
/// a copy with `parameter` and `unit` attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub timestamp: DateTime<Utc>,
    pub sensor_id: String,
    pub parameter: Option<Parameter>,
    pub unit: Option<String>,
    pub value: f64,
    pub source: String,
}

impl SensorEvent {
    /// Creates an event with no parameter metadata.
    pub fn new(
        timestamp: DateTime<Utc>,
        sensor_id: impl Into<String>,
        value: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            sensor_id: sensor_id.into(),
            parameter: None,
            unit: None,
            value,
            source: source.into(),
        }
    }

    /// Returns this event with parameter and unit attached.
    pub fn with_metadata(mut self, parameter: Option<Parameter>, unit: Option<String>) -> Self {
        self.parameter = parameter;
        self.unit = unit;
        self
    }
}

/// A numeric cell value after coercion from text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
}

impl CellValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }
}
