//! Prelude for commonly used types and traits in sensor-guard.

pub use crate::anomaly::{
    AnomalyBuffer, AnomalyDetail, AnomalyKind, AnomalyRecord, DetectionConfig, DetectionEngine,
};
pub use crate::classifier::Classifier;
pub use crate::decision::{
    Actuator, DecisionHandler, DecisionLoop, DecisionLoopConfig, RuleBasedDecisionHandler,
    SimulatedActuator,
};
pub use crate::error::{ErrorContext, GuardError, Result};
pub use crate::events::SensorEvent;
pub use crate::logging::LogConfig;
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineStats};
pub use crate::sensors::{SensorIdentityResolver, SensorMetadata, SensorRegistry};
pub use crate::sources::{IngestOptions, TabularSource};
pub use crate::stream::ChronologicalMerge;
pub use crate::thresholds::{Parameter, ThresholdRegistry, ThresholdSpec};
