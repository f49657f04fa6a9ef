//! Maps REPL input lines to user intents.

use chatwire_core::protocol::ChatMode;
use chatwire_infrastructure::UserIntent;

/// Slash commands offered for completion.
pub const COMMANDS: &[&str] = &[
    "/stop",
    "/mode",
    "/agent",
    "/clear",
    "/reconnect",
    "/status",
    "/help",
    "/quit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(UserIntent),
    Help,
    Empty,
    /// Not understood; holds the message to show.
    Invalid(String),
}

pub fn parse(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    if matches!(trimmed, "quit" | "exit") {
        return Command::Intent(UserIntent::Quit);
    }
    let Some(slash) = trimmed.strip_prefix('/') else {
        return Command::Intent(UserIntent::Send {
            content: trimmed.to_string(),
        });
    };

    let (name, arg) = match slash.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (slash, ""),
    };
    match name {
        "stop" => Command::Intent(UserIntent::Stop),
        "clear" => Command::Intent(UserIntent::Clear),
        "reconnect" => Command::Intent(UserIntent::Reconnect),
        "status" => Command::Intent(UserIntent::Status),
        "quit" | "exit" => Command::Intent(UserIntent::Quit),
        "help" => Command::Help,
        "mode" => parse_mode(arg),
        "agent" => {
            let agent = match arg {
                "" | "none" | "default" => None,
                name => Some(name.to_string()),
            };
            Command::Intent(UserIntent::SetAgent(agent))
        }
        other => Command::Invalid(format!("Unknown command '/{}'. Try /help.", other)),
    }
}

fn parse_mode(arg: &str) -> Command {
    const MODES: &str = "agent, react, function_call, simple";
    if arg.is_empty() {
        return Command::Invalid(format!("Usage: /mode <{}>", MODES));
    }
    match arg.parse::<ChatMode>() {
        Ok(mode) => Command::Intent(UserIntent::SetMode(mode)),
        Err(_) => Command::Invalid(format!("Unknown mode '{}'. Expected one of: {}", arg, MODES)),
    }
}

pub fn help_text() -> &'static str {
    "/stop               cancel the reply that is streaming\n\
     /mode <mode>        agent, react, function_call or simple\n\
     /agent [name|none]  address a named agent (none for the default)\n\
     /clear              start a new session\n\
     /reconnect          reconnect after the connection gave up\n\
     /status             show session and connection status\n\
     quit | exit         leave"
}
