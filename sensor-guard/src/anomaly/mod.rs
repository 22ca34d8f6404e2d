//! Multi-criteria anomaly detection.
//!
//! Each classified event passes through three independent rules:
//!
//! - **Band**: the value is compared with the parameter's inclusive optimal
//!   and extreme ranges. Leaving the extreme band produces an `Extreme`
//!   record and suppresses the `Optimal` one.
//! - **Z-score**: once a sensor has enough history, its value is compared
//!   with the sample mean and standard deviation of its window.
//! - **Trend**: the change since the sensor's previous reading is compared
//!   with a fixed rate threshold.
//!
//! Records produced for one event are appended to the shared
//! [`AnomalyBuffer`] in a single step, where the decision loop drains them.

mod buffer;
mod engine;
mod record;
mod rules;

pub use buffer::AnomalyBuffer;
pub use engine::{DetectionConfig, DetectionEngine, DetectionStats};
pub use record::{AnomalyDetail, AnomalyKind, AnomalyRecord};
pub use rules::{BandRule, DetectionRule, SensorHistory, TrendRule, ZScoreRule};
