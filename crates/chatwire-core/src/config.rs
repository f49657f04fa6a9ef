//! Client configuration model.
//!
//! Loaded from `config.toml` by `chatwire-infrastructure`; every section and
//! key is optional and falls back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ReconnectPolicy;
use crate::error::{ChatwireError, Result};
use crate::protocol::ChatMode;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub connection: ConnectionConfig,
    pub render: RenderConfig,
    pub chat: ChatConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// `ws` or `wss`.
    pub scheme: String,
    /// Host and optional port, e.g. `localhost:8000`.
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            host: "localhost:8000".to_string(),
        }
    }
}

impl ServerConfig {
    /// `<scheme>://<host>/ws/<session_id>`
    pub fn session_url(&self, session_id: &str) -> String {
        format!(
            "{}://{}/ws/{}",
            self.scheme,
            self.host.trim_end_matches('/'),
            session_id
        )
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 5,
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.reconnect_delay(), self.max_reconnect_attempts)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Display-frame interval for throttled rendering.
    pub frame_interval_ms: u64,
    /// Character budget for task result previews.
    pub result_preview_chars: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            result_preview_chars: 200,
        }
    }
}

impl RenderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub mode: ChatMode,
    pub agent_name: Option<String>,
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.server.scheme.as_str(), "ws" | "wss") {
            return Err(ChatwireError::config(format!(
                "server.scheme must be 'ws' or 'wss', got '{}'",
                self.server.scheme
            )));
        }
        if self.server.host.trim().is_empty() {
            return Err(ChatwireError::config("server.host must not be empty"));
        }
        if self.render.frame_interval_ms == 0 {
            return Err(ChatwireError::config("render.frame_interval_ms must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server.session_url("abc"), "ws://localhost:8000/ws/abc");
        assert_eq!(config.connection.max_reconnect_attempts, 5);
        assert_eq!(config.render.frame_interval(), Duration::from_millis(16));
        assert_eq!(config.chat.mode, ChatMode::Agent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
[server]
scheme = "wss"
host = "chat.example.com/"

[chat]
mode = "react"
"#,
        )
        .unwrap();
        assert_eq!(
            config.server.session_url("s1"),
            "wss://chat.example.com/ws/s1"
        );
        assert_eq!(config.chat.mode, ChatMode::React);
        assert_eq!(config.connection.reconnect_delay_ms, 3000);
        assert_eq!(config.render.result_preview_chars, 200);
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        let err = ClientConfig::from_toml_str("[server]\nscheme = \"http\"\n").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = ClientConfig::default().to_toml_string().unwrap();
        assert_eq!(ClientConfig::from_toml_str(&text).unwrap(), ClientConfig::default());
    }
}
