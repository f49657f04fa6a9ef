//! Line editor loop.

use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use chatwire_infrastructure::UserIntent;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::mpsc;
use tracing::debug;

use crate::command::{self, COMMANDS, Command};

/// Completion, hints and highlighting for slash commands.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(hint.bright_black().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Reads lines until quit, Ctrl-D, or the runtime goes away.
///
/// Blocks the calling thread; the session runtime runs on other workers.
pub fn run(intents: mpsc::UnboundedSender<UserIntent>) -> Result<()> {
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let intent = match command::parse(&line) {
                    Command::Empty => continue,
                    Command::Help => {
                        println!("{}", command::help_text().bright_black());
                        continue;
                    }
                    Command::Invalid(message) => {
                        println!("{}", message.yellow());
                        continue;
                    }
                    Command::Intent(intent) => intent,
                };
                let _ = rl.add_history_entry(line.trim());

                let quitting = intent == UserIntent::Quit;
                if intents.send(intent).is_err() {
                    debug!("session runtime has stopped");
                    break;
                }
                if quitting {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Use /stop to cancel a reply, or 'quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                let _ = intents.send(UserIntent::Quit);
                break;
            }
            Err(err) => {
                let _ = intents.send(UserIntent::Quit);
                return Err(err.into());
            }
        }
    }
    Ok(())
}
