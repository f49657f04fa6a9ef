//! Session runtime loop.
//!
//! A single task owns the [`SessionState`] and serialises everything that
//! touches it: connection events, user intents and display-frame ticks.

use std::sync::Arc;

use chatwire_core::connection::ConnectionState;
use chatwire_core::error::Result;
use chatwire_core::protocol::{ChatMode, OutboundEnvelope};
use chatwire_core::{
    ClientConfig, EventRouter, Presenter, SessionIdentity, SessionState, SessionStatus,
    SessionStore, ViewUpdate,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionEvent, ConnectionHandle, ConnectionManager};

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    Send { content: String },
    Stop,
    SetMode(ChatMode),
    SetAgent(Option<String>),
    /// Destroys the session and reconnects with a fresh id.
    Clear,
    Reconnect,
    Status,
    Quit,
}

/// Admits only events from the live connection instance.
///
/// Every `reconnect_to` is fenced: from [`GenerationGate::fence`] until the
/// supervisor's matching `Retargeted` acknowledgment, nothing is admitted,
/// and afterwards only generations at or above the acknowledged one are.
/// Events queued from the previous target, including retries the supervisor
/// started before it saw the command, are therefore never applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerationGate {
    live: u64,
    floor: u64,
    unacknowledged: u32,
}

impl GenerationGate {
    /// Notes a state change from `generation`; newer generations supersede.
    pub fn observe(&mut self, generation: u64) -> bool {
        if self.unacknowledged > 0 || generation < self.floor || generation < self.live {
            return false;
        }
        self.live = generation;
        true
    }

    /// Closes the gate ahead of a `reconnect_to`.
    pub fn fence(&mut self) {
        self.unacknowledged += 1;
    }

    /// The supervisor took up one `reconnect_to`.
    pub fn retargeted(&mut self, first_generation: u64) {
        self.unacknowledged = self.unacknowledged.saturating_sub(1);
        self.floor = self.floor.max(first_generation);
    }

    pub fn admits(&self, generation: u64) -> bool {
        self.unacknowledged == 0 && generation == self.live && generation >= self.floor
    }
}

pub struct SessionRuntime<P> {
    config: ClientConfig,
    router: EventRouter,
    state: SessionState,
    identity: SessionIdentity,
    store: Arc<dyn SessionStore>,
    connection: ConnectionHandle,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    connection_state: ConnectionState,
    gate: GenerationGate,
    presenter: P,
}

impl<P: Presenter> SessionRuntime<P> {
    /// Loads (or creates) the session id and starts connecting.
    pub fn start(
        config: ClientConfig,
        router: EventRouter,
        store: Arc<dyn SessionStore>,
        mut presenter: P,
    ) -> Result<Self> {
        let identity = SessionIdentity::load_or_create(store.as_ref())?;
        let (connection, events) = ConnectionManager::spawn(&config, identity.id())?;
        info!(session_id = %identity.id(), "session runtime started");
        presenter.present(ViewUpdate::SessionChanged {
            session_id: identity.id().to_string(),
        });

        Ok(Self {
            config,
            router,
            state: SessionState::new(),
            identity,
            store,
            connection,
            events,
            connection_state: ConnectionState::Connecting,
            gate: GenerationGate::default(),
            presenter,
        })
    }

    pub fn session_id(&self) -> &str {
        self.identity.id()
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Runs until `Quit`, the intent channel closes, or the supervisor stops.
    pub async fn run(mut self, mut intents: mpsc::UnboundedReceiver<UserIntent>) -> Result<()> {
        let mut frames = tokio::time::interval(self.config.render.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.on_connection_event(event),
                    None => {
                        debug!("connection supervisor stopped");
                        break;
                    }
                },
                intent = intents.recv() => match intent {
                    Some(UserIntent::Quit) | None => {
                        self.connection.disconnect();
                        break;
                    }
                    Some(intent) => {
                        if let Err(e) = self.on_intent(intent) {
                            warn!(error = %e, "user intent failed");
                            self.presenter.present(ViewUpdate::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                },
                _ = frames.tick(), if self.state.stream.has_due() => {
                    self.router.on_frame(&mut self.state, &mut self.presenter);
                }
            }
        }

        // flush whatever is still pending before leaving
        self.router.on_frame(&mut self.state, &mut self.presenter);
        info!(session_id = %self.identity.id(), "session runtime stopped");
        Ok(())
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged { generation, state } => {
                if !self.gate.observe(generation) {
                    debug!(generation, ?state, "state change from superseded connection");
                    return;
                }
                let was_accepting = self.connection_state.accepts_input();
                self.connection_state = state;
                self.presenter.present(ViewUpdate::ConnectionChanged(state));
                if state.accepts_input() != was_accepting {
                    self.presenter
                        .present(ViewUpdate::InputEnabled(state.accepts_input()));
                }
            }
            ConnectionEvent::Envelope { generation, text } => {
                if !self.gate.admits(generation) {
                    debug!(generation, "envelope from superseded connection discarded");
                    return;
                }
                self.router.dispatch(&mut self.state, &text, &mut self.presenter);
            }
            ConnectionEvent::Retargeted { first_generation } => {
                debug!(first_generation, "connection retargeted");
                self.gate.retargeted(first_generation);
            }
            ConnectionEvent::Failed { generation, attempts } => {
                if !self.gate.admits(generation) {
                    debug!(generation, "failure of superseded connection ignored");
                    return;
                }
                self.presenter.present(ViewUpdate::Error {
                    message: format!(
                        "Connection lost after {} reconnection attempts. Use /reconnect to try again.",
                        attempts
                    ),
                });
            }
        }
    }

    /// Re-addresses the supervisor at the current session id behind a
    /// generation fence.
    fn reconnect(&mut self) -> Result<()> {
        self.gate.fence();
        if let Err(e) = self.connection.reconnect_to(self.identity.id()) {
            // nothing will acknowledge this fence
            self.gate.retargeted(0);
            return Err(e);
        }
        Ok(())
    }

    /// Errors are shown to the user; the session keeps running.
    fn on_intent(&mut self, intent: UserIntent) -> Result<()> {
        match intent {
            UserIntent::Send { content } => {
                if self.state.context.is_streaming() {
                    self.presenter.present(ViewUpdate::Error {
                        message: "A reply is still streaming; /stop it first.".to_string(),
                    });
                    return Ok(());
                }
                let envelope = OutboundEnvelope::message(
                    content,
                    self.config.chat.mode,
                    self.config.chat.agent_name.clone(),
                );
                if !self.connection.send(&envelope) {
                    self.presenter.present(ViewUpdate::Error {
                        message: format!("Not connected ({}); message not sent.", self.connection_state),
                    });
                }
            }
            UserIntent::Stop => {
                match self.router.stop(&mut self.state, &mut self.presenter) {
                    Some(envelope) => {
                        if !self.connection.send(&envelope) {
                            warn!("stop could not be sent; cancelled locally only");
                        }
                    }
                    None => debug!("stop with nothing streaming"),
                }
            }
            UserIntent::SetMode(mode) => {
                info!(%mode, "chat mode changed");
                self.config.chat.mode = mode;
            }
            UserIntent::SetAgent(agent) => {
                info!(agent = ?agent, "agent changed");
                self.config.chat.agent_name = agent;
            }
            UserIntent::Clear => {
                self.identity.rotate(self.store.as_ref())?;
                self.state.reset();
                self.presenter.present(ViewUpdate::StreamingChanged(false));
                self.presenter.present(ViewUpdate::SessionChanged {
                    session_id: self.identity.id().to_string(),
                });
                self.reconnect()?;
            }
            UserIntent::Reconnect => self.reconnect()?,
            UserIntent::Status => {
                let status = SessionStatus {
                    session_id: self.identity.id().to_string(),
                    connection: self.connection_state,
                    mode: self.config.chat.mode,
                    agent_name: self.config.chat.agent_name.clone(),
                    streaming: self.state.context.is_streaming(),
                    plan_progress: self.state.plans.latest().map(|p| p.progress()),
                };
                self.presenter.present(ViewUpdate::Status(status));
            }
            UserIntent::Quit => {}
        }
        Ok(())
    }
}
