//! Attaches sensor metadata to raw events and drops unknown sensors.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::events::SensorEvent;
use crate::sensors::SensorRegistry;

/// Counters kept by the [`Classifier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassifierStats {
    pub forwarded: u64,
    pub dropped: u64,
    pub distinct_unknown: usize,
}

/// Looks up every event's sensor id in the registry.
///
/// Known sensors are forwarded with parameter and unit attached. Unknown
/// sensors are dropped; the first drop of each id is logged as a warning and
/// later ones only at debug level.
#[derive(Debug)]
pub struct Classifier {
    registry: Arc<SensorRegistry>,
    unknown: HashSet<String>,
    forwarded: u64,
    dropped: u64,
}

impl Classifier {
    pub fn new(registry: Arc<SensorRegistry>) -> Self {
        Self {
            registry,
            unknown: HashSet::new(),
            forwarded: 0,
            dropped: 0,
        }
    }

    /// Returns the enriched event, or `None` if the sensor is not registered.
    pub fn classify(&mut self, event: SensorEvent) -> Option<SensorEvent> {
        match self.registry.lookup(&event.sensor_id) {
            Ok(metadata) => {
                self.forwarded += 1;
                trace!(sensor = %event.sensor_id, value = event.value, "Classified event");
                let (parameter, unit) = (metadata.parameter, metadata.unit.clone());
                Some(event.with_metadata(parameter, unit))
            }
            Err(e) => {
                self.dropped += 1;
                if self.unknown.insert(event.sensor_id.clone()) {
                    warn!(
                        error = %e,
                        source = %event.source,
                        "Dropping events from unknown sensor"
                    );
                } else {
                    debug!(sensor = %event.sensor_id, "Dropped event from unknown sensor");
                }
                None
            }
        }
    }

    pub fn stats(&self) -> ClassifierStats {
        ClassifierStats {
            forwarded: self.forwarded,
            dropped: self.dropped,
            distinct_unknown: self.unknown.len(),
        }
    }
}
