// src/session.rs
use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::scope::{FrameStore, ScopeError};
use crate::types::{FrameBatch, MessageFromFrontend, MessageToFrontend};

// 连接状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// Error text when the connection failed rather than closed cleanly.
    Closed(Option<String>),
}

/// One bidirectional text connection.
pub trait Transport {
    fn send(&mut self, text: String) -> Result<(), ScopeError>;
    /// Never blocks; returns whatever arrived since the previous call.
    fn poll_events(&mut self) -> Vec<TransportEvent>;
    fn close(&mut self);
}

/// Opens transports to an endpoint.
pub trait Connector {
    type Transport: Transport;
    fn connect(&mut self, endpoint: &str) -> Result<Self::Transport, ScopeError>;
}

/// Receives the variable set announced by `Initialize`.
pub trait VariableControlSink {
    fn seed_variables(&mut self, variables: &BTreeMap<String, f64>);
}

/// Receives follower liveness updates.
pub trait FollowerDisplaySink {
    fn update_follower(&mut self, name: &str, latest_move_time: f64);
}

pub struct Session<C: Connector> {
    connector: C,
    endpoint: String,
    transport: Option<C::Transport>,
    state: ConnectionState,
    enabled: bool,
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C, endpoint: impl Into<String>) -> Self {
        Self {
            connector,
            endpoint: endpoint.into(),
            transport: None,
            state: ConnectionState::Disconnected,
            enabled: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn needs_reconnect(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Closed
        )
    }

    /// Drops any existing connection without draining it, then starts a new one.
    pub fn connect(&mut self) {
        self.disconnect();
        match self.connector.connect(&self.endpoint) {
            Ok(transport) => {
                debug!("connecting to {}", self.endpoint);
                self.transport = Some(transport);
                self.state = ConnectionState::Connecting;
            }
            Err(e) => warn!("cannot connect to {}: {e}", self.endpoint),
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Applies every transport event that arrived since the last call.
    /// Returns the number of inbound messages dispatched successfully.
    pub fn pump<D>(&mut self, store: &mut FrameStore, display: &mut D) -> usize
    where
        D: VariableControlSink + FollowerDisplaySink,
    {
        let Some(transport) = self.transport.as_mut() else {
            return 0;
        };
        let mut dispatched = 0;
        for event in transport.poll_events() {
            match event {
                TransportEvent::Opened => {
                    if self.state == ConnectionState::Connecting {
                        info!("Connected to {}", self.endpoint);
                        self.state = ConnectionState::Open;
                    }
                }
                TransportEvent::Message(text) => match self.dispatch(&text, store, display) {
                    Ok(()) => dispatched += 1,
                    Err(e) => warn!("ignoring inbound message: {e}"),
                },
                TransportEvent::Closed(reason) => {
                    match reason {
                        Some(reason) => warn!("Disconnected from {}: {reason}", self.endpoint),
                        None => info!("Disconnected from {}", self.endpoint),
                    }
                    self.state = ConnectionState::Closed;
                    // Closed passes straight through to Disconnected
                    self.disconnect();
                    break;
                }
            }
        }
        dispatched
    }

    /// Decodes one tagged message and routes it.
    pub fn dispatch<D>(
        &mut self,
        text: &str,
        store: &mut FrameStore,
        display: &mut D,
    ) -> Result<(), ScopeError>
    where
        D: VariableControlSink + FollowerDisplaySink,
    {
        let message: MessageToFrontend = serde_json::from_str(text)?;
        match message {
            MessageToFrontend::Initialize { enabled, variables } => {
                info!(
                    "session initialized (enabled: {enabled}, {} variables)",
                    variables.len()
                );
                store.reset();
                self.enabled = enabled;
                display.seed_variables(&variables);
            }
            MessageToFrontend::NewHistoryFrames {
                server_index,
                frames,
            } => store.append(server_index, FrameBatch::Activity(frames)),
            MessageToFrontend::NewFrequenciesFrames {
                server_index,
                frames,
            } => store.append(server_index, FrameBatch::Frequency(frames)),
            MessageToFrontend::UpdateFollower {
                name,
                latest_move_time,
            } => display.update_follower(&name, latest_move_time),
        }
        Ok(())
    }

    /// Transmits `command` if the connection is open; otherwise drops it.
    pub fn send(&mut self, command: MessageFromFrontend) -> bool {
        let transport = match (self.state, self.transport.as_mut()) {
            (ConnectionState::Open, Some(transport)) => transport,
            (state, _) => {
                debug!("dropping {} while {state:?}", command.tag());
                return false;
            }
        };
        let text = match serde_json::to_string(&command) {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot encode {}: {e}", command.tag());
                return false;
            }
        };
        match transport.send(text) {
            Ok(()) => true,
            Err(e) => {
                warn!("sending {} failed: {e}", command.tag());
                false
            }
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        self.enabled = enabled;
        self.send(MessageFromFrontend::SetEnabled(enabled))
    }

    pub fn set_variable(&mut self, name: &str, value: f64) -> bool {
        self.send(MessageFromFrontend::SetVariable(name.to_owned(), value))
    }
}
