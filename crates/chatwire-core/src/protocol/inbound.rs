//! Envelopes received from the backend.
//!
//! Every envelope is a JSON object with a required `type` discriminator. Field
//! names follow the backend's casing: camelCase everywhere except the task
//! payloads, which use snake_case.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::plan::{TaskSpec, TaskStatus};

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundEvent {
    /// Echo of the user turn as accepted by the backend.
    UserMessageReceived {
        content: Option<String>,
        mode: Option<String>,
    },

    // ---- plain replies ----
    AssistantStart {
        message_id: String,
    },
    AssistantChunk {
        message_id: Option<String>,
        content: String,
    },
    AssistantEnd {
        message_id: Option<String>,
    },

    // ---- tool calls outside a reasoning run ----
    ToolCallsStart {
        tools: Vec<String>,
    },
    ToolCall {
        tool_name: String,
        #[serde(default)]
        tool_result: Value,
    },
    ToolProgress {
        tool_name: String,
        status: String,
        #[serde(default)]
        data: Value,
    },

    // ---- task planning ----
    PlanningStart {
        message_id: String,
    },
    PlanningStatusUpdate {
        message_id: Option<String>,
        status: String,
    },
    TodoList {
        message_id: Option<String>,
        tasks: Vec<TaskSpec>,
    },
    TodoUpdate {
        #[serde(rename = "task_id")]
        task_id: String,
        status: TaskStatus,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },

    // ---- reasoning runs ----
    ReactStart {
        message_id: String,
        max_steps: u32,
    },
    ReactStepStart {
        step: u32,
        message_id: Option<String>,
    },
    ReactChunk {
        step: u32,
        content: String,
        message_id: Option<String>,
    },
    ReactThought {
        step: u32,
        thought: String,
        message_id: Option<String>,
    },
    ReactAction {
        step: u32,
        #[serde(default)]
        action: Value,
        message_id: Option<String>,
    },
    ToolCallStart {
        tool_name: String,
        #[serde(default)]
        tool_input: Value,
        message_id: Option<String>,
    },
    ToolCallEnd {
        tool_name: String,
        #[serde(default)]
        tool_result: Value,
        message_id: Option<String>,
    },
    ToolCallError {
        tool_name: String,
        error: String,
        message_id: Option<String>,
    },
    ReactObservation {
        #[serde(default)]
        observation: Value,
        message_id: Option<String>,
    },
    ReactStepEnd {
        step: u32,
        message_id: Option<String>,
    },
    ReactFinish {
        answer: String,
        total_steps: u32,
        message_id: Option<String>,
    },
    ReactMaxSteps {
        answer: String,
        message_id: Option<String>,
    },
    ReactError {
        message: String,
        message_id: Option<String>,
    },

    /// Generic backend failure outside a reasoning run.
    Error {
        message: String,
    },

    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    /// Decodes one text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserMessageReceived { .. } => "user_message_received",
            Self::AssistantStart { .. } => "assistant_start",
            Self::AssistantChunk { .. } => "assistant_chunk",
            Self::AssistantEnd { .. } => "assistant_end",
            Self::ToolCallsStart { .. } => "tool_calls_start",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolProgress { .. } => "tool_progress",
            Self::PlanningStart { .. } => "planning_start",
            Self::PlanningStatusUpdate { .. } => "planning_status_update",
            Self::TodoList { .. } => "todo_list",
            Self::TodoUpdate { .. } => "todo_update",
            Self::ReactStart { .. } => "react_start",
            Self::ReactStepStart { .. } => "react_step_start",
            Self::ReactChunk { .. } => "react_chunk",
            Self::ReactThought { .. } => "react_thought",
            Self::ReactAction { .. } => "react_action",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallEnd { .. } => "tool_call_end",
            Self::ToolCallError { .. } => "tool_call_error",
            Self::ReactObservation { .. } => "react_observation",
            Self::ReactStepEnd { .. } => "react_step_end",
            Self::ReactFinish { .. } => "react_finish",
            Self::ReactMaxSteps { .. } => "react_max_steps",
            Self::ReactError { .. } => "react_error",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Renders a JSON payload for display: strings verbatim, everything else as
/// compact JSON.
pub fn payload_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
