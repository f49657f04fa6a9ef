use serde_json::Value;
use tracing::{debug, warn};

use super::model::{PlanPhase, PlanProgress, Task, TaskSpec, TaskStatus, truncate_preview};
use crate::protocol::payload_text;

/// One dependency-annotated plan opened by a `planning_start`.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub run_id: String,
    pub phase: PlanPhase,
    pub tasks: Vec<Task>,
    completed: usize,
    failed: usize,
}

impl TaskPlan {
    fn planning(run_id: String) -> Self {
        Self {
            run_id,
            phase: PlanPhase::Planning { status: None },
            tasks: Vec::new(),
            completed: 0,
            failed: 0,
        }
    }

    pub fn progress(&self) -> PlanProgress {
        PlanProgress {
            completed: self.completed,
            failed: self.failed,
            total: self.tasks.len(),
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// Result of a successful `update_task`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub run_id: String,
    pub task: Task,
    pub progress: PlanProgress,
}

/// Tracks task plans for one session.
///
/// Task ids are looked up in the most recent plan first, since `todo_update`
/// carries no plan id.
#[derive(Debug, Default)]
pub struct PlanTracker {
    plans: Vec<TaskPlan>,
}

impl PlanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or reopens) the planning indicator for `run_id`.
    pub fn start_planning(&mut self, run_id: &str) {
        self.plans.retain(|p| p.run_id != run_id);
        self.plans.push(TaskPlan::planning(run_id.to_string()));
    }

    /// Records the latest planning status line. Returns false when the plan is
    /// unknown or already has its task list.
    pub fn set_status(&mut self, run_id: &str, status: &str) -> bool {
        match self.plan_mut(run_id) {
            Some(plan) => match &mut plan.phase {
                PlanPhase::Planning { status: current } => {
                    *current = Some(status.to_string());
                    true
                }
                PlanPhase::Ready => false,
            },
            None => false,
        }
    }

    /// Atomically replaces the planning indicator with the full task list and
    /// resets the counters.
    ///
    /// A `todo_list` without a preceding `planning_start` still creates the
    /// plan.
    pub fn set_plan(&mut self, run_id: &str, specs: Vec<TaskSpec>, preview_chars: usize) -> &TaskPlan {
        if self.plan_mut(run_id).is_none() {
            self.plans.push(TaskPlan::planning(run_id.to_string()));
        }
        let index = self
            .plans
            .iter()
            .position(|p| p.run_id == run_id)
            .unwrap_or(self.plans.len() - 1);
        let plan = &mut self.plans[index];

        plan.tasks = specs
            .into_iter()
            .map(|spec| Task {
                result_preview: spec
                    .result
                    .as_ref()
                    .map(|v| truncate_preview(&payload_text(v), preview_chars)),
                id: spec.id,
                title: spec.title,
                description: spec.description,
                priority: spec.priority,
                dependencies: spec.dependencies.unwrap_or_default(),
                assigned_agent: spec.assigned_agent,
                status: spec.status,
                error: spec.error,
            })
            .collect();
        plan.completed = plan
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        plan.failed = plan
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count();
        plan.phase = PlanPhase::Ready;
        plan
    }

    /// Applies one forward status transition to one task.
    ///
    /// Unknown task ids, repeated statuses and transitions out of a terminal
    /// state are no-ops and return `None`.
    pub fn update_task(
        &mut self,
        task_id: &str,
        status: TaskStatus,
        result: Option<&Value>,
        error: Option<&str>,
        preview_chars: usize,
    ) -> Option<TaskUpdate> {
        let Some(plan) = self
            .plans
            .iter_mut()
            .rev()
            .find(|p| p.tasks.iter().any(|t| t.id == task_id))
        else {
            debug!(task_id, "todo_update for unknown task ignored");
            return None;
        };

        let task = plan.tasks.iter_mut().find(|t| t.id == task_id)?;
        if !task.status.can_advance_to(status) {
            warn!(
                task_id,
                from = ?task.status,
                to = ?status,
                "ignoring non-forward task transition"
            );
            return None;
        }

        task.status = status;
        match status {
            TaskStatus::Completed => {
                plan.completed += 1;
                if let Some(result) = result {
                    task.result_preview =
                        Some(truncate_preview(&payload_text(result), preview_chars));
                }
            }
            TaskStatus::Failed => {
                plan.failed += 1;
                task.error = error.map(str::to_string);
            }
            _ => {}
        }

        let task = task.clone();
        Some(TaskUpdate {
            run_id: plan.run_id.clone(),
            task,
            progress: plan.progress(),
        })
    }

    pub fn plan(&self, run_id: &str) -> Option<&TaskPlan> {
        self.plans.iter().find(|p| p.run_id == run_id)
    }

    pub fn latest(&self) -> Option<&TaskPlan> {
        self.plans.last()
    }

    pub fn clear(&mut self) {
        self.plans.clear();
    }

    fn plan_mut(&mut self, run_id: &str) -> Option<&mut TaskPlan> {
        self.plans.iter_mut().find(|p| p.run_id == run_id)
    }
}
