//! Reasoning run (ReAct) domain module.
//!
//! A run moves `Idle -> Running -> {Finished, MaxStepsReached, Errored}`.
//! While running it is a sequence of steps, each
//! `Opened -> (Content* Thought? Action? (ToolStarted -> ToolSucceeded|ToolFailed)* Observation?) -> Closed`.
//!
//! # Module Structure
//!
//! - `model`: `ReasoningRun`, `Step`, `RunOutcome`
//! - `tracker`: `ReactTracker`, acceptance rules for step events

mod model;
mod tracker;

pub use model::{ReasoningRun, RunOutcome, Step};
pub use tracker::ReactTracker;
