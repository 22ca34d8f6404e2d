use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Actuator, SimulatedActuator};
use crate::anomaly::{AnomalyKind, AnomalyRecord};
use crate::error::Result;

/// Consumer of drained anomaly batches.
///
/// The returned text is opaque to the pipeline; it is logged and journaled
/// but never interpreted.
#[async_trait]
pub trait DecisionHandler: Send + Sync {
    async fn decide(&self, anomalies: &[AnomalyRecord]) -> Result<String>;
}

#[async_trait]
impl<T: DecisionHandler + ?Sized> DecisionHandler for Arc<T> {
    async fn decide(&self, anomalies: &[AnomalyRecord]) -> Result<String> {
        (**self).decide(anomalies).await
    }
}

/// Severity assigned to a batch by [`RuleBasedDecisionHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    None,
    Medium,
    High,
    Critical,
}

impl Urgency {
    fn for_kind(kind: AnomalyKind) -> Self {
        match kind {
            AnomalyKind::Extreme => Self::Critical,
            AnomalyKind::ZScore => Self::High,
            AnomalyKind::Optimal | AnomalyKind::Trend => Self::Medium,
        }
    }

    /// Highest urgency among `anomalies`.
    pub fn of(anomalies: &[AnomalyRecord]) -> Self {
        anomalies
            .iter()
            .map(|a| Self::for_kind(a.kind))
            .max()
            .unwrap_or(Self::None)
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        })
    }
}

/// Deterministic stand-in for the natural-language decision agent.
///
/// Raises the alarm when any reading left its extreme band and otherwise
/// just logs status.
pub struct RuleBasedDecisionHandler {
    actuator: Arc<dyn Actuator>,
    max_listed: usize,
}

impl Default for RuleBasedDecisionHandler {
    fn default() -> Self {
        Self::new(Arc::new(SimulatedActuator::new()))
    }
}

impl RuleBasedDecisionHandler {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self {
            actuator,
            max_listed: 5,
        }
    }

    /// How many anomalies are listed in the log per cycle.
    pub fn with_max_listed(mut self, max_listed: usize) -> Self {
        self.max_listed = max_listed;
        self
    }
}

#[async_trait]
impl DecisionHandler for RuleBasedDecisionHandler {
    async fn decide(&self, anomalies: &[AnomalyRecord]) -> Result<String> {
        if anomalies.is_empty() {
            return Ok(
                "URGENCY: NONE\nIMMEDIATE_ACTIONS: None\nREASONING: No anomalies to process."
                    .to_string(),
            );
        }

        for anomaly in anomalies.iter().take(self.max_listed) {
            info!("  {}", anomaly.summary());
        }
        if anomalies.len() > self.max_listed {
            info!("  ... and {} more", anomalies.len() - self.max_listed);
        }

        let urgency = Urgency::of(anomalies);
        let action = if urgency == Urgency::Critical {
            "trigger_alarm"
        } else {
            "log_status"
        };
        let outcome = self.actuator.execute(action);

        let sensors: BTreeSet<&str> = anomalies.iter().map(|a| a.sensor_id.as_str()).collect();
        let extreme = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::Extreme)
            .count();

        Ok(format!(
            "URGENCY: {urgency}\nIMMEDIATE_ACTIONS: {action}\nREASONING: {} anomalies across {} sensors, {extreme} outside extreme bands.\nACTUATOR: {outcome}",
            anomalies.len(),
            sensors.len(),
        ))
    }
}
