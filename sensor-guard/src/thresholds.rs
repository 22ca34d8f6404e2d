//! Physical parameters and their optimal/extreme operating bands.
//!
//! The [`ThresholdRegistry`] is built once at startup and is read-only for the
//! rest of the run. Lookups for unregistered parameters return `None`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// Kind of physical quantity a sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parameter {
    CarbonDioxide,
    Temperature,
    RelativeHumidity,
    #[serde(rename = "PAR")]
    Par,
    #[serde(rename = "VPD")]
    Vpd,
    ElectricalConductivity,
    PhValue,
    Level,
    Pressure,
    Volume,
    Valve,
    DewPoint,
    LightIntensity,
}

impl Parameter {
    /// All parameter kinds, in table order.
    pub const ALL: [Parameter; 13] = [
        Parameter::CarbonDioxide,
        Parameter::Par,
        Parameter::RelativeHumidity,
        Parameter::Temperature,
        Parameter::Vpd,
        Parameter::ElectricalConductivity,
        Parameter::Level,
        Parameter::PhValue,
        Parameter::Pressure,
        Parameter::Volume,
        Parameter::Valve,
        Parameter::DewPoint,
        Parameter::LightIntensity,
    ];

    /// Human-readable name used in threshold tables and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CarbonDioxide => "Carbon Dioxide",
            Self::Temperature => "Temperature",
            Self::RelativeHumidity => "Relative Humidity",
            Self::Par => "Photosynthetically Active Radiation",
            Self::Vpd => "Vapor Pressure Deficit",
            Self::ElectricalConductivity => "Electrical Conductivity",
            Self::PhValue => "Ph Value",
            Self::Level => "Level",
            Self::Pressure => "Pressure",
            Self::Volume => "Volume",
            Self::Valve => "Valve",
            Self::DewPoint => "Dew Point",
            Self::LightIntensity => "Light Intensity",
        }
    }

    /// Unit the built-in thresholds are expressed in.
    pub fn default_unit(&self) -> &'static str {
        match self {
            Self::CarbonDioxide => "ppm",
            Self::Temperature | Self::DewPoint => "°C",
            Self::RelativeHumidity | Self::Valve => "%",
            Self::Par => "µmol/m²/s",
            Self::Vpd | Self::Pressure => "kPa",
            Self::ElectricalConductivity => "mS/cm",
            Self::PhValue => "pH",
            Self::Level => "cm",
            Self::Volume => "L",
            Self::LightIntensity => "lux",
        }
    }

    /// Guesses the parameter from a raw column header.
    ///
    /// Used once per sensor while building the metadata registry, never on the
    /// per-event path. A header that is a parameter name ("Carbon Dioxide",
    /// "VPD") maps directly; otherwise the header is split into tokens on `_`,
    /// `-`, `.` and spaces and matched by keyword.
    pub fn infer_from_column(column: &str) -> Option<Self> {
        if let Ok(parameter) = column.trim().parse::<Self>() {
            return Some(parameter);
        }

        let lower = column.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| c == '_' || c == '-' || c == ' ' || c == '.')
            .filter(|t| !t.is_empty())
            .collect();
        let has = |prefixes: &[&str]| {
            tokens
                .iter()
                .any(|t| prefixes.iter().any(|p| t.starts_with(p)))
        };
        // Short abbreviations only count as whole tokens ("ph" must not match "photoperiod").
        let has_token = |names: &[&str]| tokens.iter().any(|t| names.contains(t));

        // Order matters: "dew point temperature" is a dew point, not a
        // temperature, and "vapor pressure deficit" is not a pressure.
        if has(&["dew"]) {
            Some(Self::DewPoint)
        } else if has(&["co2", "carbon", "dioxide"]) {
            Some(Self::CarbonDioxide)
        } else if has_token(&["vpd"]) || has(&["vapor", "vapour", "deficit"]) {
            Some(Self::Vpd)
        } else if has_token(&["par", "ppfd"]) || has(&["photosynthetic"]) {
            Some(Self::Par)
        } else if has_token(&["rh"]) || has(&["humid"]) {
            Some(Self::RelativeHumidity)
        } else if has(&["temp", "degc"]) {
            Some(Self::Temperature)
        } else if has_token(&["ec"]) || has(&["conductivity"]) {
            Some(Self::ElectricalConductivity)
        } else if has_token(&["ph"]) {
            Some(Self::PhValue)
        } else if has(&["level"]) {
            Some(Self::Level)
        } else if has(&["press"]) {
            Some(Self::Pressure)
        } else if has(&["volume"]) {
            Some(Self::Volume)
        } else if has(&["valve"]) {
            Some(Self::Valve)
        } else if has(&["lux", "light", "illuminance"]) {
            Some(Self::LightIntensity)
        } else {
            None
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Parameter {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        let parameter = match normalized.as_str() {
            "carbondioxide" | "co2" => Self::CarbonDioxide,
            "temperature" | "temp" => Self::Temperature,
            "relativehumidity" | "rh" | "humidity" => Self::RelativeHumidity,
            // The legacy threshold table truncated this name to 32 characters.
            "photosyntheticallyactiveradiation" | "photosyntheticallyactiveradioa" | "par" => {
                Self::Par
            }
            "vaporpressuredeficit" | "vpd" => Self::Vpd,
            "electricalconductivity" | "ec" => Self::ElectricalConductivity,
            "phvalue" | "ph" => Self::PhValue,
            "level" => Self::Level,
            "pressure" => Self::Pressure,
            "volume" => Self::Volume,
            "valve" => Self::Valve,
            "dewpoint" => Self::DewPoint,
            "lightintensity" | "light" => Self::LightIntensity,
            _ => {
                return Err(GuardError::Configuration(format!(
                    "Unknown parameter name '{s}'"
                )))
            }
        };
        Ok(parameter)
    }
}

/// An inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns true when `value` lies inside the band, bounds included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Optimal and extreme bands for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    pub parameter: Parameter,
    pub optimal: Band,
    pub extreme: Band,
}

impl ThresholdSpec {
    pub fn new(
        parameter: Parameter,
        (optimal_min, optimal_max): (f64, f64),
        (extreme_min, extreme_max): (f64, f64),
    ) -> Self {
        Self {
            parameter,
            optimal: Band::new(optimal_min, optimal_max),
            extreme: Band::new(extreme_min, extreme_max),
        }
    }

    /// Checks that the optimal band nests inside the extreme band.
    pub fn validate(&self) -> Result<()> {
        let ordered = self.extreme.min <= self.optimal.min
            && self.optimal.min <= self.optimal.max
            && self.optimal.max <= self.extreme.max;
        if ordered {
            Ok(())
        } else {
            Err(GuardError::Configuration(format!(
                "Threshold bands for '{}' are not nested: optimal {:?}, extreme {:?}",
                self.parameter, self.optimal, self.extreme
            )))
        }
    }
}

/// Static parameter → threshold lookup.
#[derive(Debug, Clone)]
pub struct ThresholdRegistry {
    specs: HashMap<Parameter, ThresholdSpec>,
}

impl ThresholdRegistry {
    /// Builds a registry from an explicit list of specs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a spec is not nested or a parameter is
    /// listed twice.
    pub fn from_specs(specs: impl IntoIterator<Item = ThresholdSpec>) -> Result<Self> {
        let mut map = HashMap::new();
        for spec in specs {
            spec.validate()?;
            if map.insert(spec.parameter, spec).is_some() {
                return Err(GuardError::Configuration(format!(
                    "Duplicate threshold for '{}'",
                    spec.parameter
                )));
            }
        }
        Ok(Self { specs: map })
    }

    /// Returns the thresholds for `parameter`, if registered.
    pub fn get(&self, parameter: Parameter) -> Option<&ThresholdSpec> {
        self.specs.get(&parameter)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for ThresholdRegistry {
    /// Bands for C3 crops grown in a closed habitat.
    fn default() -> Self {
        use Parameter::*;
        let specs = [
            ThresholdSpec::new(CarbonDioxide, (350.0, 1000.0), (150.0, 5000.0)),
            ThresholdSpec::new(Par, (200.0, 700.0), (0.0, 2000.0)),
            ThresholdSpec::new(RelativeHumidity, (40.0, 70.0), (35.0, 80.0)),
            ThresholdSpec::new(Temperature, (18.0, 27.0), (0.0, 35.0)),
            ThresholdSpec::new(Vpd, (0.65, 1.25), (0.5, 2.0)),
            ThresholdSpec::new(ElectricalConductivity, (1.0, 3.0), (0.5, 4.0)),
            ThresholdSpec::new(Level, (50.0, 85.0), (30.0, 100.0)),
            ThresholdSpec::new(PhValue, (5.5, 6.5), (4.0, 8.0)),
            ThresholdSpec::new(Pressure, (101.0, 101.0), (90.0, 150.0)),
            ThresholdSpec::new(Volume, (50.0, 85.0), (30.0, 100.0)),
            ThresholdSpec::new(Valve, (19.0, 28.0), (14.0, 30.0)),
            ThresholdSpec::new(DewPoint, (10.0, 15.0), (5.0, 20.0)),
            ThresholdSpec::new(LightIntensity, (150.0, 400.0), (0.0, 5000.0)),
        ];
        Self {
            specs: specs.into_iter().map(|s| (s.parameter, s)).collect(),
        }
    }
}
