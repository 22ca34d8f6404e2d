use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::SensorEvent;
use crate::thresholds::Parameter;

/// Which rule flagged a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// Outside the extreme band.
    Extreme,
    /// Inside the extreme band but outside the optimal band.
    Optimal,
    /// Statistically far from the sensor's recent values.
    ZScore,
    /// Changed too fast since the previous reading.
    Trend,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extreme => "Extreme",
            Self::Optimal => "Optimal",
            Self::ZScore => "ZScore",
            Self::Trend => "Trend",
        };
        f.write_str(name)
    }
}

/// Rule-specific evidence attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnomalyDetail {
    /// The band the value fell outside of.
    Band { min: f64, max: f64 },
    ZScore { z_score: f64, mean: f64, std_dev: f64 },
    Trend { rate: f64 },
}

/// One detected anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub sensor_id: String,
    pub parameter: Option<Parameter>,
    pub unit: Option<String>,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub kind: AnomalyKind,
    pub detail: AnomalyDetail,
}

impl AnomalyRecord {
    pub fn from_event(event: &SensorEvent, kind: AnomalyKind, detail: AnomalyDetail) -> Self {
        Self {
            sensor_id: event.sensor_id.clone(),
            parameter: event.parameter,
            unit: event.unit.clone(),
            value: event.value,
            timestamp: event.timestamp,
            kind,
            detail,
        }
    }

    /// One-line human readable description.
    pub fn summary(&self) -> String {
        let unit = self.unit.as_deref().unwrap_or("");
        let evidence = match self.detail {
            AnomalyDetail::Band { min, max } => format!("outside [{min}, {max}]"),
            AnomalyDetail::ZScore {
                z_score,
                mean,
                std_dev,
            } => format!("z={z_score} (mean {mean:.2}, std {std_dev:.2})"),
            AnomalyDetail::Trend { rate } => format!("rate {rate:+}"),
        };
        format!(
            "{} {} = {}{} at {} ({evidence})",
            self.kind,
            self.sensor_id,
            self.value,
            unit,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(detail: AnomalyDetail, kind: AnomalyKind) -> AnomalyRecord {
        let event = SensorEvent::new(
            Utc.with_ymd_and_hms(2020, 5, 1, 8, 0, 0).unwrap(),
            "veg_01-temp",
            36.0,
            "veg_01",
        )
        .with_metadata(Some(Parameter::Temperature), Some("°C".to_string()));
        AnomalyRecord::from_event(&event, kind, detail)
    }

    #[test]
    fn test_summary() {
        let r = record(AnomalyDetail::Band { min: 0.0, max: 35.0 }, AnomalyKind::Extreme);
        assert_eq!(
            r.summary(),
            "Extreme veg_01-temp = 36°C at 2020-05-01 08:00:00 (outside [0, 35])"
        );
    }

    #[test]
    fn test_serialized_shape() {
        let r = record(AnomalyDetail::Trend { rate: 5.0 }, AnomalyKind::Trend);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kind"], "Trend");
        assert_eq!(json["detail"]["type"], "trend");
        assert_eq!(json["detail"]["rate"], 5.0);
        assert_eq!(json["parameter"], "Temperature");

        let back: AnomalyRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
