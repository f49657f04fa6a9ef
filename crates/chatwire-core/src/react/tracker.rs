use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::model::{ReasoningRun, RunOutcome};
use crate::tool_call::ToolCallId;

/// Step tracker for all reasoning runs of one session.
///
/// Every mutator returns whether the event was accepted. Late or out-of-order
/// events (unknown run, terminal run, step never opened, step closed) are
/// dropped and reported as not accepted.
#[derive(Debug, Default)]
pub struct ReactTracker {
    runs: HashMap<String, ReasoningRun>,
}

impl ReactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Idle -> Running`.
    pub fn start_run(&mut self, run_id: &str, max_steps: u32) {
        if let Some(previous) = self.runs.get(run_id)
            && previous.is_running()
        {
            warn!(run_id, "react_start for a run that is still running; replacing it");
        }
        self.runs
            .insert(run_id.to_string(), ReasoningRun::new(run_id, max_steps));
    }

    pub fn open_step(&mut self, run_id: &str, step: u32) -> bool {
        let Some(run) = self.running_mut(run_id) else {
            return false;
        };
        if run.open_step(step) {
            true
        } else {
            warn!(run_id, step, current = run.current_step(), "stale react_step_start dropped");
            false
        }
    }

    /// Whether content for `step` may still be appended.
    pub fn accepts_content(&mut self, run_id: &str, step: u32) -> bool {
        self.open_step_mut(run_id, step).is_some()
    }

    pub fn record_thought(&mut self, run_id: &str, step: u32, thought: &str) -> bool {
        match self.open_step_mut(run_id, step) {
            Some(s) if s.thought.is_none() => {
                s.thought = Some(thought.to_string());
                true
            }
            Some(_) => {
                debug!(run_id, step, "second thought for step dropped");
                false
            }
            None => false,
        }
    }

    pub fn record_action(&mut self, run_id: &str, step: u32, action: Value) -> bool {
        match self.open_step_mut(run_id, step) {
            Some(s) if s.action.is_none() => {
                s.action = Some(action);
                true
            }
            Some(_) => {
                debug!(run_id, step, "second action for step dropped");
                false
            }
            None => false,
        }
    }

    /// Number of the run's latest step if it is still open.
    pub fn current_open_step(&mut self, run_id: &str) -> Option<u32> {
        self.running_mut(run_id)?
            .current_open_step_mut()
            .map(|s| s.number)
    }

    /// Attaches a started tool call to the current open step.
    pub fn attach_tool_call(&mut self, run_id: &str, call: ToolCallId) -> Option<u32> {
        let step = self.running_mut(run_id)?.current_open_step_mut()?;
        step.tool_calls.push(call);
        Some(step.number)
    }

    /// Records the observation of the current open step.
    pub fn record_observation(&mut self, run_id: &str, observation: Value) -> Option<u32> {
        let step = self.running_mut(run_id)?.current_open_step_mut()?;
        if step.observation.is_some() {
            debug!(run_id, step = step.number, "second observation for step dropped");
            return None;
        }
        step.observation = Some(observation);
        Some(step.number)
    }

    /// `Opened -> Closed`. Purely presentational: later events for the step
    /// are dropped.
    pub fn close_step(&mut self, run_id: &str, step: u32) -> bool {
        match self.open_step_mut(run_id, step) {
            Some(s) => {
                s.closed = true;
                true
            }
            None => false,
        }
    }

    /// `Running -> Finished`. Returns the steps that were still open.
    pub fn finish(&mut self, run_id: &str, answer: &str, total_steps: u32) -> Option<Vec<u32>> {
        self.terminate(
            run_id,
            RunOutcome::Finished {
                answer: answer.to_string(),
                total_steps,
            },
        )
    }

    /// `Running -> MaxStepsReached`. Returns the steps that were still open.
    pub fn max_steps_reached(&mut self, run_id: &str, answer: &str) -> Option<Vec<u32>> {
        self.terminate(
            run_id,
            RunOutcome::MaxStepsReached {
                answer: answer.to_string(),
            },
        )
    }

    /// `Running -> Errored`, regardless of step state.
    pub fn fail(&mut self, run_id: &str, message: &str) -> Option<Vec<u32>> {
        self.terminate(
            run_id,
            RunOutcome::Errored {
                message: message.to_string(),
            },
        )
    }

    /// `Running -> Cancelled`. Returns the steps that were still open.
    pub fn cancel(&mut self, run_id: &str) -> Option<Vec<u32>> {
        self.terminate(run_id, RunOutcome::Cancelled)
    }

    pub fn run(&self, run_id: &str) -> Option<&ReasoningRun> {
        self.runs.get(run_id)
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }

    fn terminate(&mut self, run_id: &str, outcome: RunOutcome) -> Option<Vec<u32>> {
        let run = self.running_mut(run_id)?;
        run.outcome = outcome;
        Some(run.close_all())
    }

    fn running_mut(&mut self, run_id: &str) -> Option<&mut ReasoningRun> {
        match self.runs.get_mut(run_id) {
            Some(run) if run.is_running() => Some(run),
            Some(_) => {
                debug!(run_id, "event for terminated run dropped");
                None
            }
            None => {
                debug!(run_id, "event for unknown run dropped");
                None
            }
        }
    }

    fn open_step_mut(&mut self, run_id: &str, step: u32) -> Option<&mut super::model::Step> {
        let run = self.running_mut(run_id)?;
        let found = run.open_step_mut(step);
        if found.is_none() {
            debug!(run_id, step, "event for unopened or closed step dropped");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_counter_is_monotonic() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        assert!(tracker.open_step("r1", 1));
        assert!(tracker.open_step("r1", 2));
        assert!(!tracker.open_step("r1", 1));
        assert!(!tracker.open_step("r1", 2));
        assert_eq!(tracker.run("r1").unwrap().current_step(), 2);
    }

    #[test]
    fn test_step_not_observable_before_counter() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        tracker.open_step("r1", 1);
        let run = tracker.run("r1").unwrap();
        assert!(run.step(1).is_some());
        assert!(run.step(2).is_none());
    }

    #[test]
    fn test_content_for_unopened_step_is_ignored() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        assert!(!tracker.accepts_content("r1", 1));
        assert!(!tracker.record_thought("r1", 3, "skip ahead"));
        tracker.open_step("r1", 1);
        assert!(tracker.accepts_content("r1", 1));
    }

    #[test]
    fn test_closed_step_rejects_late_events() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        tracker.open_step("r1", 1);
        assert!(tracker.record_thought("r1", 1, "look up the weather"));
        assert!(tracker.close_step("r1", 1));
        assert!(!tracker.accepts_content("r1", 1));
        assert!(!tracker.record_action("r1", 1, json!("weather")));
        assert!(tracker.record_observation("r1", json!("sunny")).is_none());
        assert!(!tracker.close_step("r1", 1));
    }

    #[test]
    fn test_step_holds_one_of_each_annotation() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        tracker.open_step("r1", 1);
        assert!(tracker.record_thought("r1", 1, "first"));
        assert!(!tracker.record_thought("r1", 1, "second"));
        assert!(tracker.record_action("r1", 1, json!({"tool": "calc"})));
        assert_eq!(tracker.attach_tool_call("r1", ToolCallId(0)), Some(1));
        assert_eq!(tracker.attach_tool_call("r1", ToolCallId(1)), Some(1));
        assert_eq!(tracker.record_observation("r1", json!(4)), Some(1));
        assert_eq!(tracker.record_observation("r1", json!(5)), None);

        let step = tracker.run("r1").unwrap().step(1).unwrap();
        assert_eq!(step.thought.as_deref(), Some("first"));
        assert_eq!(step.tool_calls.len(), 2);
        assert_eq!(step.observation, Some(json!(4)));
    }

    #[test]
    fn test_finish_closes_open_steps_and_stops_acceptance() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        tracker.open_step("r1", 1);
        tracker.close_step("r1", 1);
        tracker.open_step("r1", 2);

        assert_eq!(tracker.finish("r1", "42", 2), Some(vec![2]));
        let run = tracker.run("r1").unwrap();
        assert_eq!(
            run.outcome,
            RunOutcome::Finished {
                answer: "42".to_string(),
                total_steps: 2
            }
        );
        assert!(!tracker.open_step("r1", 3));
        assert!(tracker.finish("r1", "again", 3).is_none());
    }

    #[test]
    fn test_error_aborts_mid_step() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        tracker.open_step("r1", 1);
        assert_eq!(tracker.fail("r1", "parse failure"), Some(vec![1]));
        assert!(!tracker.run("r1").unwrap().is_running());
        assert!(tracker.max_steps_reached("r1", "late").is_none());
    }

    #[test]
    fn test_cancel_closes_open_steps() {
        let mut tracker = ReactTracker::new();
        tracker.start_run("r1", 5);
        tracker.open_step("r1", 1);
        assert_eq!(tracker.cancel("r1"), Some(vec![1]));
        assert_eq!(tracker.run("r1").unwrap().outcome, RunOutcome::Cancelled);
        assert!(tracker.cancel("r1").is_none());
        assert!(tracker.finish("r1", "late", 1).is_none());
    }

    #[test]
    fn test_unknown_run_is_ignored() {
        let mut tracker = ReactTracker::new();
        assert!(!tracker.open_step("ghost", 1));
        assert!(tracker.fail("ghost", "x").is_none());
    }
}
