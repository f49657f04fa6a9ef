//! Terminal output for view updates.

use std::collections::HashMap;
use std::io::{self, Write};

use chatwire_core::connection::ConnectionState;
use chatwire_core::plan::{Task, TaskPriority, TaskStatus, truncate_preview};
use chatwire_core::protocol::payload_text;
use chatwire_core::render::Rendered;
use chatwire_core::stream::StreamKey;
use chatwire_core::tool_call::ToolCallStatus;
use chatwire_core::{Presenter, SessionStatus, ViewUpdate};
use colored::{ColoredString, Colorize};
use serde_json::Value;
use tracing::debug;

const PAYLOAD_PREVIEW_CHARS: usize = 120;

/// Prints updates line by line.
///
/// Streamed text is emitted one completed line at a time; the trailing,
/// still-growing line waits for the next newline or the final render.
pub struct TerminalPresenter<W: Write> {
    out: W,
    printed: HashMap<StreamKey, usize>,
}

impl TerminalPresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: HashMap::new(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            debug!(error = %e, "terminal write failed");
        }
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn stream(&mut self, key: StreamKey, rendered: &Rendered, finalized: bool) {
        let indent = match key {
            StreamKey::Message(_) => "",
            StreamKey::Step { .. } => "    ",
        };
        let lines: Vec<&str> = rendered.markup.split('\n').collect();
        let complete = if finalized { lines.len() } else { lines.len() - 1 };
        let from = self.printed.get(&key).copied().unwrap_or(0);

        for text in lines.iter().take(complete).skip(from) {
            self.line(format!("{}{}", indent, text));
        }
        if finalized {
            self.printed.remove(&key);
        } else if complete > from {
            self.printed.insert(key, complete);
        }
    }

    fn status(&mut self, status: &SessionStatus) {
        let agent = status.agent_name.as_deref().unwrap_or("(default)");
        let plan = status
            .plan_progress
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string());
        self.line(format!("  session:    {}", status.session_id));
        self.line(format!("  connection: {}", connection_label(status.connection)));
        self.line(format!("  mode:       {}", status.mode));
        self.line(format!("  agent:      {}", agent));
        self.line(format!(
            "  streaming:  {}",
            if status.streaming { "yes" } else { "no" }
        ));
        self.line(format!("  plan:       {}", plan));
    }

    fn task(&mut self, task: &Task) {
        let mut text = format!(
            "  {} {} {}",
            task_marker(task.status),
            task.title,
            priority_label(task.priority).bright_black()
        );
        if let Some(agent) = &task.assigned_agent {
            text.push_str(&format!(" @{}", agent).bright_black().to_string());
        }
        self.line(text);
        if let Some(preview) = &task.result_preview {
            self.line(format!("      {}", preview.bright_black()));
        }
        if let Some(error) = &task.error {
            self.line(format!("      {}", error.red()));
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::SessionChanged { session_id } => {
                self.line(format!("Session {}", session_id).bright_black());
            }
            ViewUpdate::ConnectionChanged(state) => {
                self.line(format!("[{}]", connection_label(state)));
            }
            ViewUpdate::InputEnabled(_)
            | ViewUpdate::StreamingChanged(_)
            | ViewUpdate::UserMessageAcknowledged { .. }
            | ViewUpdate::StepClosed { .. } => {}

            ViewUpdate::MessageMaterialized { key } => {
                if let StreamKey::Message(_) = key {
                    let now = chrono::Local::now().format("%H:%M:%S");
                    self.line(format!(
                        "{} {}",
                        now.to_string().bright_black(),
                        "assistant".bright_blue().bold()
                    ));
                }
            }
            ViewUpdate::MessageRendered {
                key,
                rendered,
                finalized,
            } => self.stream(key, &rendered, finalized),

            ViewUpdate::ToolCallsAnnounced { names } => {
                self.line(format!("Calling tools: {}", names.join(", ")).magenta());
            }
            ViewUpdate::ToolCallStarted { name, input, .. } => {
                let args = preview(&input);
                self.line(format!("  {} {}({})", "⚙".magenta(), name.bold(), args));
            }
            ViewUpdate::ToolCallProgress { name, status, .. } => {
                self.line(format!("    {} {}", name.bright_black(), status.bright_black()));
            }
            ViewUpdate::ToolCallResolved {
                name,
                status,
                payload,
                synthetic,
                ..
            } => {
                let marker = match status {
                    ToolCallStatus::Failed => "✗".red(),
                    _ => "✓".green(),
                };
                let suffix = if synthetic { " (unannounced)" } else { "" };
                self.line(format!(
                    "  {} {}{}: {}",
                    marker,
                    name,
                    suffix.bright_black(),
                    preview(&payload)
                ));
            }

            ViewUpdate::PlanningStarted { .. } => {
                self.line("Planning...".yellow());
            }
            ViewUpdate::PlanningStatus { status, .. } => {
                self.line(format!("  {}", status).yellow());
            }
            ViewUpdate::PlanReady {
                tasks, progress, ..
            } => {
                self.line(format!("Plan ({})", progress).bright_yellow().bold());
                for task in &tasks {
                    self.task(task);
                }
            }
            ViewUpdate::TaskUpdated { task, progress, .. } => {
                self.task(&task);
                self.line(format!("  {}", progress).bright_black());
            }

            ViewUpdate::RunStarted { max_steps, .. } => {
                self.line(format!("Reasoning (up to {} steps)", max_steps).bright_magenta());
            }
            ViewUpdate::StepOpened { step, .. } => {
                self.line(format!("  Step {}", step).bright_magenta().bold());
            }
            ViewUpdate::StepThought { thought, .. } => {
                self.line(format!("    {} {}", "Thought:".cyan(), thought));
            }
            ViewUpdate::StepAction { action, .. } => {
                self.line(format!("    {} {}", "Action:".cyan(), preview(&action)));
            }
            ViewUpdate::StepObservation { observation, .. } => {
                self.line(format!("    {} {}", "Observation:".cyan(), preview(&observation)));
            }
            ViewUpdate::RunFinished {
                answer,
                total_steps,
                ..
            } => {
                self.line(format!("Answer after {} steps:", total_steps).bright_green().bold());
                self.line(answer.markup);
            }
            ViewUpdate::RunMaxStepsReached {
                answer, max_steps, ..
            } => {
                self.line(format!("Stopped at the {}-step limit:", max_steps).yellow().bold());
                self.line(answer.markup);
            }
            ViewUpdate::RunErrored { message, .. } => {
                self.line(format!("Reasoning failed: {}", message).red());
            }
            ViewUpdate::RunCancelled { .. } => {
                self.line("Reasoning stopped.".yellow());
            }

            ViewUpdate::Error { message } => {
                self.line(format!("Error: {}", message).red());
            }
            ViewUpdate::Status(status) => self.status(&status),
        }
        self.flush();
    }
}

fn preview(value: &Value) -> String {
    truncate_preview(&payload_text(value), PAYLOAD_PREVIEW_CHARS)
}

fn connection_label(state: ConnectionState) -> ColoredString {
    let label = state.to_string();
    match state {
        ConnectionState::Open => label.green(),
        ConnectionState::Connecting => label.yellow(),
        ConnectionState::Closed => label.red(),
        ConnectionState::Failed => label.red().bold(),
    }
}

fn task_marker(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Pending => "[ ]".normal(),
        TaskStatus::Blocked => "[~]".bright_black(),
        TaskStatus::InProgress => "[>]".yellow(),
        TaskStatus::Completed => "[x]".green(),
        TaskStatus::Failed => "[!]".red(),
    }
}

fn priority_label(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "(low)",
        TaskPriority::Medium => "(medium)",
        TaskPriority::High => "(high)",
        TaskPriority::Critical => "(critical)",
    }
}
