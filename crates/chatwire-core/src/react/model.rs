//! Reasoning run domain model.

use serde_json::Value;

use crate::tool_call::ToolCallId;

/// Terminal or running outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Running,
    /// Explicit finish decision.
    Finished { answer: String, total_steps: u32 },
    /// Budget exhausted without a finish decision; best-effort answer.
    MaxStepsReached { answer: String },
    /// Aborted by the backend.
    Errored { message: String },
    /// Stopped by the user; the backend acknowledged with a plain
    /// `assistant_end`.
    Cancelled,
}

impl RunOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One reasoning/action/observation cycle.
///
/// The step's streamed content lives in the session's `StreamBuffer` under
/// `StreamKey::Step`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub number: u32,
    pub thought: Option<String>,
    pub action: Option<Value>,
    pub tool_calls: Vec<ToolCallId>,
    pub observation: Option<Value>,
    pub closed: bool,
}

impl Step {
    pub(crate) fn open(number: u32) -> Self {
        Self {
            number,
            thought: None,
            action: None,
            tool_calls: Vec::new(),
            observation: None,
            closed: false,
        }
    }
}

/// One multi-step agent execution, keyed by the message id that opened it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRun {
    pub id: String,
    pub max_steps: u32,
    pub outcome: RunOutcome,
    current_step: u32,
    steps: Vec<Step>,
}

impl ReasoningRun {
    pub fn new(id: impl Into<String>, max_steps: u32) -> Self {
        Self {
            id: id.into(),
            max_steps,
            outcome: RunOutcome::Running,
            current_step: 0,
            steps: Vec::new(),
        }
    }

    /// Highest step number opened so far (0 before the first step).
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns a step only once the counter has reached it.
    pub fn step(&self, number: u32) -> Option<&Step> {
        if number > self.current_step {
            return None;
        }
        self.steps.iter().find(|s| s.number == number)
    }

    pub fn is_running(&self) -> bool {
        !self.outcome.is_terminal()
    }

    /// Opens step `number`. Step numbers at or below the current counter are
    /// rejected.
    pub(crate) fn open_step(&mut self, number: u32) -> bool {
        if !self.is_running() || number <= self.current_step {
            return false;
        }
        self.current_step = number;
        self.steps.push(Step::open(number));
        true
    }

    /// A step that exists, is not closed, and belongs to a running run.
    pub(crate) fn open_step_mut(&mut self, number: u32) -> Option<&mut Step> {
        if !self.is_running() || number > self.current_step {
            return None;
        }
        self.steps
            .iter_mut()
            .find(|s| s.number == number && !s.closed)
    }

    /// The latest step, if it is still open.
    pub(crate) fn current_open_step_mut(&mut self) -> Option<&mut Step> {
        let current = self.current_step;
        self.open_step_mut(current)
    }

    /// Closes any open steps and returns their numbers.
    pub(crate) fn close_all(&mut self) -> Vec<u32> {
        let mut closed = Vec::new();
        for step in self.steps.iter_mut().filter(|s| !s.closed) {
            step.closed = true;
            closed.push(step.number);
        }
        closed
    }
}
