//! Envelopes sent from the client to the backend.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Result;

/// Backend processing strategy requested for a user turn.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatMode {
    /// Routed through the backend agent manager (direct reply or planning).
    #[default]
    Agent,
    /// Stepwise reasoning loop.
    React,
    /// Native function calling, possibly over several rounds.
    FunctionCall,
    /// Single-shot reply with at most one tool call.
    Simple,
}

/// One outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEnvelope {
    /// A user turn.
    Message {
        content: String,
        mode: ChatMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
    },
    /// Cancellation request for the active message or run.
    Stop {
        #[serde(rename = "messageId")]
        message_id: Option<String>,
    },
}

impl OutboundEnvelope {
    pub fn message(content: impl Into<String>, mode: ChatMode, agent_name: Option<String>) -> Self {
        Self::Message {
            content: content.into(),
            mode,
            agent_name,
        }
    }

    pub fn stop(message_id: Option<String>) -> Self {
        Self::Stop { message_id }
    }

    /// Serializes the envelope into a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_envelope_shape() {
        let env = OutboundEnvelope::message("hi", ChatMode::Agent, None);
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "message", "content": "hi", "mode": "agent"}));
    }

    #[test]
    fn test_message_envelope_with_agent() {
        let env = OutboundEnvelope::message(
            "explain main.rs",
            ChatMode::FunctionCall,
            Some("code_understanding".to_string()),
        );
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(value["mode"], "function_call");
        assert_eq!(value["agent_name"], "code_understanding");
    }

    #[test]
    fn test_stop_envelope_uses_camel_case_id() {
        let env = OutboundEnvelope::stop(Some("msg_1".to_string()));
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "stop", "messageId": "msg_1"}));
    }

    #[test]
    fn test_chat_mode_parses_from_str() {
        assert_eq!("react".parse::<ChatMode>().unwrap(), ChatMode::React);
        assert_eq!("function_call".parse::<ChatMode>().unwrap(), ChatMode::FunctionCall);
        assert!("reactive".parse::<ChatMode>().is_err());
        assert_eq!(ChatMode::Simple.to_string(), "simple");
    }
}
