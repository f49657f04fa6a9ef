//! WebSocket connection manager.
//!
//! One supervisor task owns the socket for a session. It reports every state
//! transition and every inbound text frame over an event channel, tagging each
//! with the generation of the connection instance that produced it, and it
//! drives reconnection with [`ReconnectPolicy`].

use chatwire_core::config::{ClientConfig, ServerConfig};
use chatwire_core::connection::{ConnectionState, ReconnectDecision, ReconnectPolicy};
use chatwire_core::error::{ChatwireError, Result};
use chatwire_core::protocol::OutboundEnvelope;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything the supervisor reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged {
        generation: u64,
        state: ConnectionState,
    },
    /// One inbound text frame.
    Envelope { generation: u64, text: String },
    /// Retry budget exhausted; nothing further is scheduled.
    Failed { generation: u64, attempts: u32 },
    /// A `reconnect_to` was taken up. Every later event belongs to the new
    /// target and carries `first_generation` or above.
    Retargeted { first_generation: u64 },
}

#[derive(Debug)]
enum Command {
    Send(String),
    Disconnect,
    ReconnectTo(String),
}

/// Maps a transport error into the crate error type.
pub fn ws_error(e: tokio_tungstenite::tungstenite::Error) -> ChatwireError {
    ChatwireError::connection(e.to_string())
}

/// Builds and validates the session address.
pub fn session_url(server: &ServerConfig, session_id: &str) -> Result<Url> {
    let raw = server.session_url(session_id);
    Url::parse(&raw).map_err(|e| ChatwireError::config(format!("invalid server url '{}': {}", raw, e)))
}

/// Cheap, cloneable control surface of a running supervisor.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    server: ServerConfig,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Queues an envelope for sending.
    ///
    /// Returns false, without error, when the connection is not open.
    pub fn send(&self, envelope: &OutboundEnvelope) -> bool {
        if !self.state().accepts_input() {
            debug!("send while not open ignored");
            return false;
        }
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to encode outbound envelope");
                return false;
            }
        };
        self.commands.send(Command::Send(text)).is_ok()
    }

    /// Closes normally. No reconnection follows.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Supersedes the live connection with one addressed at `session_id`.
    pub fn reconnect_to(&self, session_id: &str) -> Result<()> {
        let url = session_url(&self.server, session_id)?;
        self.commands
            .send(Command::ReconnectTo(url.to_string()))
            .map_err(|_| ChatwireError::connection("connection supervisor has stopped"))
    }
}

pub struct ConnectionManager;

impl ConnectionManager {
    /// Starts the supervisor for `session_id` on the current tokio runtime.
    pub fn spawn(
        config: &ClientConfig,
        session_id: &str,
    ) -> Result<(ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>)> {
        let url = session_url(&config.server, session_id)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let supervisor = Supervisor {
            url: url.to_string(),
            policy: config.connection.reconnect_policy(),
            generation: 0,
            commands: command_rx,
            events: event_tx,
            state: state_tx,
        };
        tokio::spawn(supervisor.run());

        let handle = ConnectionHandle {
            commands: command_tx,
            state: state_rx,
            server: config.server.clone(),
        };
        Ok((handle, event_rx))
    }
}

/// Why a socket session ended.
enum SessionEnd {
    /// Peer or transport closed unexpectedly; retry.
    Dropped,
    /// Peer sent a normal close frame; stay closed.
    ClosedNormally,
    Disconnected,
    Retarget(String),
    /// Every handle was dropped.
    Abandoned,
}

/// What to do after a wait between attempts.
enum Wake {
    Connect,
    Stop,
}

struct Supervisor {
    url: String,
    policy: ReconnectPolicy,
    generation: u64,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            self.generation += 1;
            self.set_state(ConnectionState::Connecting);
            info!(url = %self.url, generation = self.generation, "connecting");

            let url = self.url.clone();
            let connect = connect_async(url.as_str());
            tokio::pin!(connect);
            let attempt = loop {
                tokio::select! {
                    result = &mut connect => break Some(result),
                    command = self.commands.recv() => match command {
                        Some(Command::Send(_)) => debug!("send while connecting dropped"),
                        Some(Command::ReconnectTo(url)) => {
                            self.retarget(url);
                            break None;
                        }
                        Some(Command::Disconnect) | None => {
                            self.set_state(ConnectionState::Closed);
                            return;
                        }
                    },
                }
            };
            let Some(connected) = attempt else {
                continue;
            };

            match connected {
                Ok((socket, _)) => {
                    self.policy.on_open();
                    self.set_state(ConnectionState::Open);
                    info!(url = %self.url, generation = self.generation, "connected");

                    match self.pump(socket).await {
                        SessionEnd::Dropped => {
                            warn!(generation = self.generation, "connection dropped");
                            self.set_state(ConnectionState::Closed);
                        }
                        SessionEnd::ClosedNormally => {
                            info!(generation = self.generation, "server closed the connection");
                            self.set_state(ConnectionState::Closed);
                            if let Wake::Stop = self.idle().await {
                                return;
                            }
                            continue;
                        }
                        SessionEnd::Disconnected | SessionEnd::Abandoned => {
                            self.set_state(ConnectionState::Closed);
                            return;
                        }
                        SessionEnd::Retarget(url) => {
                            self.set_state(ConnectionState::Closed);
                            self.retarget(url);
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, error = %ws_error(e), "connection attempt failed");
                    self.set_state(ConnectionState::Closed);
                }
            }

            match self.policy.on_close() {
                ReconnectDecision::Retry { attempt, delay } => {
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnection"
                    );
                    if let Wake::Stop = self.wait(delay).await {
                        return;
                    }
                }
                ReconnectDecision::GiveUp { attempts } => {
                    error!(attempts, url = %self.url, "reconnection budget exhausted");
                    self.set_state(ConnectionState::Failed);
                    let _ = self.events.send(ConnectionEvent::Failed {
                        generation: self.generation,
                        attempts,
                    });
                    if let Wake::Stop = self.idle().await {
                        return;
                    }
                }
            }
        }
    }

    /// Shuttles frames until the socket ends or a command ends it.
    async fn pump(&mut self, socket: Socket) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = self.events.send(ConnectionEvent::Envelope {
                            generation: self.generation,
                            text: text.as_str().to_owned(),
                        });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let normal = frame.as_ref().is_some_and(|f| f.code == CloseCode::Normal);
                        return if normal {
                            SessionEnd::ClosedNormally
                        } else {
                            SessionEnd::Dropped
                        };
                    }
                    // tungstenite queues the pong for a ping itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %ws_error(e), "transport error");
                        return SessionEnd::Dropped;
                    }
                    None => return SessionEnd::Dropped,
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            warn!(error = %ws_error(e), "send failed");
                            return SessionEnd::Dropped;
                        }
                    }
                    Some(Command::Disconnect) => {
                        let _ = sink.send(Message::Close(None)).await;
                        let _ = sink.close().await;
                        info!(generation = self.generation, "disconnected");
                        return SessionEnd::Disconnected;
                    }
                    Some(Command::ReconnectTo(url)) => {
                        let _ = sink.send(Message::Close(None)).await;
                        let _ = sink.close().await;
                        return SessionEnd::Retarget(url);
                    }
                    None => {
                        let _ = sink.close().await;
                        return SessionEnd::Abandoned;
                    }
                },
            }
        }
    }

    /// Sleeps out the reconnection delay while still honouring commands.
    async fn wait(&mut self, delay: std::time::Duration) -> Wake {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Wake::Connect,
                command = self.commands.recv() => match command {
                    Some(Command::Send(_)) => debug!("send while reconnecting dropped"),
                    Some(Command::ReconnectTo(url)) => {
                        self.retarget(url);
                        return Wake::Connect;
                    }
                    Some(Command::Disconnect) | None => return Wake::Stop,
                },
            }
        }
    }

    /// Waits for an explicit reconnect after the connection has stopped.
    async fn idle(&mut self) -> Wake {
        loop {
            match self.commands.recv().await {
                Some(Command::Send(_)) => debug!("send while closed dropped"),
                Some(Command::ReconnectTo(url)) => {
                    self.retarget(url);
                    return Wake::Connect;
                }
                Some(Command::Disconnect) | None => return Wake::Stop,
            }
        }
    }

    fn retarget(&mut self, url: String) {
        info!(from = %self.url, to = %url, "switching connection target");
        self.url = url;
        self.policy.reset();
        let _ = self.events.send(ConnectionEvent::Retargeted {
            first_generation: self.generation + 1,
        });
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state.send_replace(state);
        let _ = self.events.send(ConnectionEvent::StateChanged {
            generation: self.generation,
            state,
        });
    }
}
