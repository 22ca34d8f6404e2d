//! Sensor id → parameter/unit metadata.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorContext, GuardError, Result};
use crate::sensors::identity::SensorIdentityResolver;
use crate::sources::{discover_files, IngestOptions, TabularSource};
use crate::thresholds::Parameter;

/// What is known about one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorMetadata {
    pub parameter: Option<Parameter>,
    pub unit: Option<String>,
}

impl SensorMetadata {
    /// Metadata for a sensor measuring `parameter` in its default unit.
    pub fn for_parameter(parameter: Parameter) -> Self {
        Self {
            parameter: Some(parameter),
            unit: Some(parameter.default_unit().to_string()),
        }
    }

    /// A known sensor whose physical parameter could not be determined.
    pub fn unmapped() -> Self {
        Self {
            parameter: None,
            unit: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    #[serde(default)]
    parameter: Option<String>,
    #[serde(default)]
    unit: Option<String>,
}

/// Registry of known sensors, resolved once and read-only while streaming.
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    sensors: HashMap<String, SensorMetadata>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a sensor. Ids are stored lowercased.
    pub fn insert(&mut self, sensor_id: impl AsRef<str>, metadata: SensorMetadata) {
        self.sensors
            .insert(sensor_id.as_ref().to_lowercase(), metadata);
    }

    /// Looks up a sensor by canonical id.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::UnknownSensor`] when the id is not registered.
    pub fn lookup(&self, sensor_id: &str) -> Result<&SensorMetadata> {
        self.sensors
            .get(sensor_id)
            .ok_or_else(|| GuardError::UnknownSensor {
                sensor_id: sensor_id.to_string(),
            })
    }

    pub fn contains(&self, sensor_id: &str) -> bool {
        self.sensors.contains_key(sensor_id)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Sorted ids, for reporting.
    pub fn sensor_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sensors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Merges `other` into this registry; entries in `other` win.
    pub fn extend(&mut self, other: SensorRegistry) {
        self.sensors.extend(other.sensors);
    }

    /// Parses a JSON mapping of the form
    /// `{"<sensor id>": {"parameter": "Temperature", "unit": "°C"}}`.
    ///
    /// A missing unit falls back to the parameter's default unit.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, MappingEntry> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (sensor_id, entry) in raw {
            let parameter = entry
                .parameter
                .as_deref()
                .map(str::parse::<Parameter>)
                .transpose()
                .with_context(|| format!("Invalid parameter for sensor '{sensor_id}'"))?;
            let unit = entry
                .unit
                .or_else(|| parameter.map(|p| p.default_unit().to_string()));
            registry.insert(&sensor_id, SensorMetadata { parameter, unit });
        }
        Ok(registry)
    }

    /// Loads a JSON mapping file (see [`from_json_str`](Self::from_json_str)).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sensor mapping '{}'", path.display()))?;
        let registry = Self::from_json_str(&json)?;
        info!(
            mapping.path = %path.display(),
            sensors = registry.len(),
            "Loaded sensor mapping"
        );
        Ok(registry)
    }

    /// Builds a registry by scanning the headers of every tabular file under `root`.
    ///
    /// Each non-timestamp column becomes a known sensor; its parameter is
    /// inferred from the column name when possible. Unreadable files are
    /// skipped with a warning.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn discover(
        root: impl AsRef<Path>,
        resolver: &SensorIdentityResolver,
        options: &IngestOptions,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for path in discover_files(root.as_ref(), options.extension())? {
            let source = TabularSource::new(&path, options.clone());
            let layout = match source.layout() {
                Ok(layout) => layout,
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        error = %e,
                        "Skipping file during sensor discovery"
                    );
                    continue;
                }
            };

            let tag = resolver.source_for(&path);
            for column in layout.value_columns(options) {
                let sensor_id = resolver.resolve_with(&tag, column);
                let metadata = Parameter::infer_from_column(column.trim())
                    .map(SensorMetadata::for_parameter)
                    .unwrap_or_else(SensorMetadata::unmapped);
                debug!(sensor = %sensor_id, parameter = ?metadata.parameter, "Discovered sensor");
                registry.insert(sensor_id, metadata);
            }
        }

        info!(sensors = registry.len(), "Sensor discovery complete");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_lookup_unknown_sensor() {
        let registry = SensorRegistry::new();
        let err = registry.lookup("nope").unwrap_err();
        assert!(matches!(err, GuardError::UnknownSensor { .. }));
    }

    #[test]
    fn test_insert_lowercases_ids() {
        let mut registry = SensorRegistry::new();
        registry.insert("VEG_01-Temp", SensorMetadata::for_parameter(Parameter::Temperature));
        assert!(registry.contains("veg_01-temp"));
        assert_eq!(
            registry.lookup("veg_01-temp").unwrap().unit.as_deref(),
            Some("°C")
        );
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "edeniss2020-ams-feg-co2-1": {"parameter": "Carbon Dioxide"},
            "veg_01-rh": {"parameter": "Relative Humidity", "unit": "%RH"},
            "veg_01-mission_day": {}
        }"#;
        let registry = SensorRegistry::from_json_str(json).unwrap();
        assert_eq!(registry.len(), 3);

        let co2 = registry.lookup("edeniss2020-ams-feg-co2-1").unwrap();
        assert_eq!(co2.parameter, Some(Parameter::CarbonDioxide));
        assert_eq!(co2.unit.as_deref(), Some("ppm"));

        let rh = registry.lookup("veg_01-rh").unwrap();
        assert_eq!(rh.unit.as_deref(), Some("%RH"));

        assert_eq!(registry.lookup("veg_01-mission_day").unwrap(), &SensorMetadata::unmapped());
    }

    #[test]
    fn test_from_json_str_rejects_unknown_parameter() {
        let json = r#"{"a-b": {"parameter": "Wind Speed"}}"#;
        let err = SensorRegistry::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("a-b"));
    }

    #[test]
    fn test_extend_overrides() {
        let mut base = SensorRegistry::new();
        base.insert("s-1", SensorMetadata::unmapped());
        let mut overrides = SensorRegistry::new();
        overrides.insert("s-1", SensorMetadata::for_parameter(Parameter::Level));
        base.extend(overrides);
        assert_eq!(base.lookup("s-1").unwrap().parameter, Some(Parameter::Level));
    }

    #[test]
    fn test_discover_infers_from_raw_headers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("veg_01.csv"),
            "time,Lux,Vapor Pressure Deficit,Carbon Dioxide\n2020-01-01 00:00:00,900,1.1,410\n",
        )
        .unwrap();

        let registry = SensorRegistry::discover(
            dir.path(),
            &SensorIdentityResolver::default(),
            &IngestOptions::default(),
        )
        .unwrap();
        assert_eq!(registry.len(), 3);
        // Ids still go through column cleaning, which trims the trailing "x".
        assert_eq!(
            registry.lookup("veg_01-lu").unwrap().parameter,
            Some(Parameter::LightIntensity)
        );
        assert_eq!(
            registry.lookup("veg_01-vapor_pressure_deficit").unwrap().parameter,
            Some(Parameter::Vpd)
        );
        assert_eq!(
            registry.lookup("veg_01-carbon_dioxide").unwrap().parameter,
            Some(Parameter::CarbonDioxide)
        );
    }
}
