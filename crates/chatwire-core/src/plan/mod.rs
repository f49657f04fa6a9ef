//! Task plan domain module.
//!
//! A plan is announced by `planning_start`, replaced atomically by the task
//! list in `todo_list`, and advanced task by task through `todo_update`.
//!
//! # Module Structure
//!
//! - `model`: task records, statuses and progress counters
//! - `tracker`: `PlanTracker`, the per-session state machine

mod model;
mod tracker;

pub use model::{
    PlanPhase, PlanProgress, Task, TaskPriority, TaskSpec, TaskStatus, truncate_preview,
};
pub use tracker::{PlanTracker, TaskPlan, TaskUpdate};
