//! Presentation seam.
//!
//! Trackers never touch a UI. The router and runtime translate state changes
//! into [`ViewUpdate`]s and hand them to a [`Presenter`].

use serde_json::Value;

use crate::connection::ConnectionState;
use crate::plan::{PlanProgress, Task};
use crate::protocol::ChatMode;
use crate::render::Rendered;
use crate::stream::StreamKey;
use crate::tool_call::{ToolCallId, ToolCallStatus, ToolScope};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    // ---- connection / input ----
    /// The session id in use (startup or after a clear).
    SessionChanged {
        session_id: String,
    },
    ConnectionChanged(ConnectionState),
    /// Outbound input enabled or disabled.
    InputEnabled(bool),
    /// A message or run started or stopped streaming (send vs. stop button).
    StreamingChanged(bool),
    UserMessageAcknowledged {
        content: Option<String>,
    },

    // ---- streamed text ----
    /// First content of a stream arrived.
    MessageMaterialized {
        key: StreamKey,
    },
    MessageRendered {
        key: StreamKey,
        rendered: Rendered,
        finalized: bool,
    },

    // ---- tool calls ----
    ToolCallsAnnounced {
        names: Vec<String>,
    },
    ToolCallStarted {
        id: ToolCallId,
        name: String,
        input: Value,
        scope: ToolScope,
    },
    ToolCallProgress {
        id: ToolCallId,
        name: String,
        status: String,
        data: Value,
    },
    ToolCallResolved {
        id: ToolCallId,
        name: String,
        status: ToolCallStatus,
        /// Result on success, error message on failure.
        payload: Value,
        synthetic: bool,
    },

    // ---- task plans ----
    PlanningStarted {
        run_id: String,
    },
    PlanningStatus {
        run_id: String,
        status: String,
    },
    PlanReady {
        run_id: String,
        tasks: Vec<Task>,
        progress: PlanProgress,
    },
    TaskUpdated {
        run_id: String,
        task: Task,
        progress: PlanProgress,
    },

    // ---- reasoning runs ----
    RunStarted {
        run_id: String,
        max_steps: u32,
    },
    StepOpened {
        run_id: String,
        step: u32,
    },
    StepThought {
        run_id: String,
        step: u32,
        thought: String,
    },
    StepAction {
        run_id: String,
        step: u32,
        action: Value,
    },
    StepObservation {
        run_id: String,
        step: u32,
        observation: Value,
    },
    StepClosed {
        run_id: String,
        step: u32,
    },
    RunFinished {
        run_id: String,
        answer: Rendered,
        total_steps: u32,
    },
    RunMaxStepsReached {
        run_id: String,
        answer: Rendered,
        max_steps: u32,
    },
    RunErrored {
        run_id: String,
        message: String,
    },
    /// Stop acknowledged before the run reached a decision.
    RunCancelled {
        run_id: String,
    },

    /// User-visible error (domain error or exhausted reconnection budget).
    Error {
        message: String,
    },
    /// Snapshot requested by the user.
    Status(SessionStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub session_id: String,
    pub connection: ConnectionState,
    pub mode: ChatMode,
    pub agent_name: Option<String>,
    pub streaming: bool,
    pub plan_progress: Option<PlanProgress>,
}

pub trait Presenter {
    fn present(&mut self, update: ViewUpdate);
}

/// Collects updates in order.
impl Presenter for Vec<ViewUpdate> {
    fn present(&mut self, update: ViewUpdate) {
        self.push(update);
    }
}
