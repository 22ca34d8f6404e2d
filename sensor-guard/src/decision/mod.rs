//! The consumer side of the pipeline.
//!
//! A [`DecisionLoop`] polls the shared [`AnomalyBuffer`](crate::anomaly::AnomalyBuffer),
//! drains it atomically once enough anomalies have accumulated, and hands each
//! batch to a [`DecisionHandler`]. What the handler does with a batch (call a
//! language model, page an operator, drive actuators) is outside the pipeline;
//! [`RuleBasedDecisionHandler`] is the built-in deterministic fallback.

mod actuator;
mod handler;
mod journal;
mod worker;

pub use actuator::{Actuator, SimulatedActuator, AVAILABLE_ACTIONS};
pub use handler::{DecisionHandler, RuleBasedDecisionHandler, Urgency};
pub use journal::{DecisionJournal, JournalEntry};
pub use worker::{DecisionLoop, DecisionLoopConfig, DecisionStats};
