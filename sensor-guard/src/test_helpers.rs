//! Fixture builders for tests that need sensor data on disk.
//!
//! Available to this crate's unit tests and, behind the `test-utils`
//! feature, to downstream integration tests.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::events::SensorEvent;
use crate::sensors::{SensorMetadata, SensorRegistry};
use crate::thresholds::Parameter;

/// 2020-01-01T00:00:00Z, the first timestamp of every generated series.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Writes `contents` to `root/relative`, creating parent directories.
pub fn write_csv(root: &Path, relative: &str, contents: &str) -> std::io::Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, contents)?;
    Ok(path)
}

/// Renders a two-column `time,<column>` CSV with one row per minute.
pub fn series_csv(column: &str, values: &[f64]) -> String {
    let mut csv = format!("time,{column}\n");
    for (minute, value) in values.iter().enumerate() {
        let timestamp = epoch() + Duration::minutes(minute as i64);
        let _ = writeln!(csv, "{},{value}", timestamp.format("%Y-%m-%d %H:%M:%S"));
    }
    csv
}

/// `len` readings scattered uniformly within `center ± jitter`.
///
/// Seeded, so the same arguments always produce the same series.
pub fn noisy_series(seed: u64, len: usize, center: f64, jitter: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            if jitter > 0.0 {
                center + rng.random_range(-jitter..=jitter)
            } else {
                center
            }
        })
        .collect()
}

/// An unclassified event `minutes` after [`epoch`].
pub fn event_at(minutes: i64, sensor_id: &str, value: f64) -> SensorEvent {
    SensorEvent::new(
        epoch() + Duration::minutes(minutes),
        sensor_id,
        value,
        "fixture",
    )
}

/// A classified event for a sensor measuring `parameter`.
pub fn classified_event(
    minutes: i64,
    sensor_id: &str,
    parameter: Parameter,
    value: f64,
) -> SensorEvent {
    event_at(minutes, sensor_id, value)
        .with_metadata(Some(parameter), Some(parameter.default_unit().to_string()))
}

/// Registry with each `(sensor id, parameter)` pair registered in its default unit.
pub fn registry_of(sensors: &[(&str, Parameter)]) -> SensorRegistry {
    let mut registry = SensorRegistry::new();
    for (sensor_id, parameter) in sensors {
        registry.insert(sensor_id, SensorMetadata::for_parameter(*parameter));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_series_csv_layout() {
        let csv = series_csv("temp", &[20.0, 21.5]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "time,temp");
        assert_eq!(lines[1], "2020-01-01 00:00:00,20");
        assert_eq!(lines[2], "2020-01-01 00:01:00,21.5");
    }

    #[test]
    fn test_noisy_series_is_seeded_and_bounded() {
        let a = noisy_series(7, 50, 20.0, 0.5);
        let b = noisy_series(7, 50, 20.0, 0.5);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (19.5..=20.5).contains(v)));
        assert_eq!(noisy_series(1, 3, 5.0, 0.0), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_write_csv_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "a/b/veg.csv", "time,temp\n").unwrap();
        assert!(path.is_file());
    }
}
