mod command;
mod presenter;
mod renderer;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chatwire_core::protocol::ChatMode;
use chatwire_core::{ClientConfig, EventRouter, SessionStore};
use chatwire_infrastructure::{ChatwirePaths, ConfigService, FileSessionStore, SessionRuntime};
use clap::Parser;
use colored::Colorize;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::presenter::TerminalPresenter;
use crate::renderer::AnsiRenderer;

/// Terminal client for a streaming agent backend.
#[derive(Parser, Debug)]
#[command(name = "chatwire", version, about)]
struct Args {
    /// Backend host and port, e.g. `localhost:8000`.
    #[arg(long)]
    host: Option<String>,

    /// `ws` or `wss`.
    #[arg(long)]
    scheme: Option<String>,

    /// Initial chat mode.
    #[arg(long)]
    mode: Option<ChatMode>,

    /// Named agent to address.
    #[arg(long)]
    agent: Option<String>,

    /// Directory holding config.toml, the session file and logs.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Write the default config file and exit.
    #[arg(long)]
    init_config: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(scheme) = &self.scheme {
            config.server.scheme = scheme.clone();
        }
        if let Some(mode) = self.mode {
            config.chat.mode = mode;
        }
        if let Some(agent) = &self.agent {
            config.chat.agent_name = Some(agent.clone());
        }
    }
}

/// Logs go to a daily file so they never interleave with the REPL.
fn init_tracing(paths: &ChatwirePaths, verbose: bool) -> Result<WorkerGuard> {
    let logs_dir = paths.logs_dir();
    std::fs::create_dir_all(&logs_dir)?;
    let appender = tracing_appender::rolling::daily(&logs_dir, "chatwire.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if verbose { "chatwire=debug" } else { "chatwire=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let paths = match &args.config_dir {
        Some(dir) => ChatwirePaths::with_root(dir.clone()),
        None => ChatwirePaths::resolve()?,
    };
    let config_service = ConfigService::new(paths.config_file());

    if args.init_config {
        let path = config_service.ensure_config_file()?;
        println!("Config file: {}", path.display());
        return Ok(());
    }

    let _guard = init_tracing(&paths, args.verbose)?;

    let mut config = config_service.load()?;
    args.apply(&mut config);
    config.validate()?;
    info!(
        host = %config.server.host,
        scheme = %config.server.scheme,
        mode = %config.chat.mode,
        "starting chatwire"
    );

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(paths.session_file()));
    let router = EventRouter::new(Arc::new(AnsiRenderer), config.render.result_preview_chars);

    println!("{}", "=== chatwire ===".bright_magenta().bold());
    println!(
        "{}",
        format!(
            "{}://{} | mode {} | /help for commands, 'quit' to exit",
            config.server.scheme, config.server.host, config.chat.mode
        )
        .bright_black()
    );
    println!();

    let runtime = SessionRuntime::start(config, router, store, TerminalPresenter::stdout())?;
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let runtime_task = tokio::spawn(runtime.run(intent_rx));

    let repl_result = repl::run(intent_tx);
    runtime_task.await??;
    repl_result
}
