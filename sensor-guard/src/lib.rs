//! # sensor-guard - Streaming anomaly detection for sensor logs
//!
//! sensor-guard ingests time-series readings from many heterogeneous tabular
//! sensor exports, merges them into one chronologically ordered event stream,
//! classifies each reading against parameter-specific thresholds, and detects
//! anomalies with three independent criteria. Detected anomalies accumulate in
//! a shared buffer that a concurrently running decision loop drains.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensor_guard::prelude::*;
//!
//! # async fn example() -> sensor_guard::error::Result<()> {
//! let config = PipelineConfig::new("data/");
//!
//! // Every column found under the data directory becomes a known sensor.
//! let registry = SensorRegistry::discover(
//!     &config.data_dir,
//!     &config.resolver(),
//!     &config.ingest,
//! )?;
//!
//! let stats = Pipeline::new(config, registry)?.run().await?;
//! println!(
//!     "{} events, {} anomalies, {} decision cycles",
//!     stats.events_ingested, stats.detection.anomalies, stats.decisions.cycles
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Detection rules
//!
//! - **Band**: inclusive optimal and extreme ranges per [`Parameter`](thresholds::Parameter);
//!   an extreme violation suppresses the optimal one.
//! - **Z-score**: the reading against the sample mean and standard deviation
//!   of the sensor's bounded history window.
//! - **Trend**: the change since the sensor's previous reading.
//!
//! ## Architecture
//!
//! - **`sources`**: file discovery, header/timestamp detection, batched CSV reads
//! - **`sensors`**: canonical sensor ids and the sensor metadata registry
//! - **`stream`**: chronological merge and paced emission
//! - **`classifier`**: registry lookup, unknown-sensor filtering
//! - **`anomaly`**: detection rules, per-sensor history, the anomaly buffer
//! - **`decision`**: the consumer loop, decision handlers, actuators, journal
//! - **`pipeline`**: producer/consumer wiring and configuration
//!
//! ## Custom decision handlers
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use sensor_guard::prelude::*;
//!
//! struct Pager;
//!
//! #[async_trait]
//! impl DecisionHandler for Pager {
//!     async fn decide(&self, anomalies: &[AnomalyRecord]) -> sensor_guard::error::Result<String> {
//!         Ok(format!("paged on-call about {} anomalies", anomalies.len()))
//!     }
//! }
//!
//! # async fn example(pipeline: Pipeline) -> sensor_guard::error::Result<()> {
//! let stats = pipeline.run_with_handler(Pager).await?;
//! # Ok(())
//! # }
//! ```

pub mod anomaly;
pub mod classifier;
pub mod decision;
pub mod error;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod sensors;
pub mod sources;
pub mod stream;
pub mod thresholds;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;
