use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::drivers::{ConnectionManager, ConnectionState, LinkEvent, LinkOutcome, Transport};
use crate::jog::{InputAction, InputSignal, PressKey, RepeatEngine};
use crate::packets::{ClientMessage, ServerMessage};
use crate::state::{GridHighlight, ScannerView, StateReconciler};
use crate::{Direction, IdentityToken, ScannerClientConfig, ScannerError};

/// Everything that can happen to the client. Input, transport callbacks and
/// control actions all arrive as one of these and are handled one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Press(PressKey),
    Release(PressKey),
    Input(InputSignal),
    ReleaseAll,
    Link(LinkEvent),
    Connect,
    Disconnect,
    /// Zeroes the command counter; part of the operator's reset action.
    ResetCounter,
}

/// Things worth telling the operator about.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientNotice {
    Disabled { reason: String },
    Connected,
    ConnectionLost { code: u16, retry_in_ms: u64 },
    Disconnected { code: u16 },
    ServerError { message: String },
    ServerLog { timestamp: Option<String>, message: String },
    ResetSucceeded { message: String },
    ResetFailed { reason: String },
}

/// Read-only projection handed to displays.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct Telemetry {
    pub identity: Option<String>,
    /// Why the client is disabled, if it is.
    pub disabled_reason: Option<String>,
    pub connection: ConnectionState,
    pub view: ScannerView,
    pub highlight: GridHighlight,
    pub has_snapshot: bool,
    pub command_count: u64,
    pub pressed: BTreeSet<Direction>,
    pub last_server_error: Option<String>,
}

/// The client core: connection manager, repeat engine and reconciler wired
/// together behind a single event entry point.
///
/// Single-threaded and clock-free. Whoever drives it feeds events through
/// [`ScannerClient::handle`] and calls [`ScannerClient::advance`] when
/// [`ScannerClient::next_deadline`] passes.
pub struct ScannerClient<T: Transport> {
    identity: Option<IdentityToken>,
    disabled_reason: Option<String>,
    connection: ConnectionManager<T>,
    jog: RepeatEngine,
    reconciler: StateReconciler,
    command_count: u64,
    last_server_error: Option<String>,
    notices: Vec<ClientNotice>,
}

impl<T: Transport> ScannerClient<T> {
    /// Validates `raw_identity` once. On failure the client is built disabled:
    /// it never dials and never sends.
    pub fn new(config: &ScannerClientConfig, raw_identity: &str, transport: T) -> Self {
        let mut notices = Vec::new();

        let endpoint = IdentityToken::parse(raw_identity)
            .and_then(|id| config.websocket_url(&id).map(|url| (id, url)));
        let (identity, endpoint, disabled_reason) = match endpoint {
            Ok((id, url)) => (Some(id), Some(url), None),
            Err(e) => {
                error!(error = %e, "scanner client disabled");
                notices.push(ClientNotice::Disabled { reason: e.to_string() });
                (None, None, Some(e.to_string()))
            }
        };

        Self {
            identity,
            disabled_reason,
            connection: ConnectionManager::new(
                transport,
                endpoint,
                config.reconnect_delay(),
                config.keepalive_interval(),
            ),
            jog: RepeatEngine::new(config.repeat_policy, config.arm_delay(), config.repeat_interval()),
            reconciler: StateReconciler::new(),
            command_count: 0,
            last_server_error: None,
            notices,
        }
    }

    /// Opens the connection.
    pub fn start(&mut self) {
        self.connection.open();
    }

    pub fn handle(&mut self, event: ClientEvent, now: Instant) {
        match event {
            ClientEvent::Press(key) => self.press(key, now),
            ClientEvent::Release(key) => self.release(key),
            ClientEvent::Input(signal) => match signal.resolve() {
                Some(InputAction::Press(key)) => self.press(key, now),
                Some(InputAction::Release(key)) => self.release(key),
                None => trace!(?signal, "unbound input"),
            },
            ClientEvent::ReleaseAll => {
                let released = self.jog.release_all();
                debug!(count = released.len(), "released all keys");
            }
            ClientEvent::Link(event) => self.on_link_event(event, now),
            ClientEvent::Connect => self.connection.open(),
            ClientEvent::Disconnect => self.connection.close(now),
            ClientEvent::ResetCounter => {
                info!(previous = self.command_count, "command counter reset");
                self.command_count = 0;
            }
        }
    }

    /// Fires every timer due at or before `now`, earliest first. A periodic
    /// timer that fell more than one interval behind fires once and resumes
    /// from `now`; missed ticks are not replayed.
    pub fn advance(&mut self, now: Instant) {
        loop {
            let connection_due = self.connection.next_deadline().filter(|d| *d <= now);
            let jog_due = self.jog.next_deadline().filter(|d| *d <= now);
            match (connection_due, jog_due) {
                (None, None) => break,
                (Some(c), Some(j)) if j < c => self.fire_jog(now),
                (Some(_), _) => {
                    let outcome = self.connection.fire_due(now);
                    self.on_outcome(outcome);
                }
                (None, Some(_)) => self.fire_jog(now),
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.connection.next_deadline(), self.jog.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn fire_jog(&mut self, now: Instant) {
        if let Some(direction) = self.jog.fire_due(now) {
            self.emit(direction);
        }
    }

    fn press(&mut self, key: PressKey, now: Instant) {
        if self.is_disabled() {
            return;
        }
        if let Some(direction) = self.jog.press(key, now) {
            self.emit(direction);
        }
    }

    fn release(&mut self, key: PressKey) {
        if !self.jog.release(key) {
            trace!(?key, "release of a key that was not held");
        }
    }

    fn emit(&mut self, direction: Direction) {
        if self.connection.send(&ClientMessage::Move { direction }) {
            self.command_count += 1;
            debug!(%direction, count = self.command_count, "move sent");
        }
    }

    fn on_link_event(&mut self, event: LinkEvent, now: Instant) {
        let outcome = self.connection.on_link_event(event, now);
        self.on_outcome(outcome);
    }

    fn on_outcome(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Ignored => {}
            LinkOutcome::Opened => self.notices.push(ClientNotice::Connected),
            LinkOutcome::Inbound(text) => self.dispatch(&text),
            LinkOutcome::Closed { code, retry_in: Some(delay) } => {
                self.notices.push(ClientNotice::ConnectionLost {
                    code,
                    retry_in_ms: duration_ms(delay),
                });
            }
            LinkOutcome::Closed { code, retry_in: None } => {
                self.notices.push(ClientNotice::Disconnected { code });
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        match ServerMessage::from_json(text) {
            Ok(ServerMessage::StateUpdate(snapshot)) => self.reconciler.apply(snapshot),
            Ok(ServerMessage::Error { message }) => {
                warn!(message = %message, "remote reported an error");
                self.last_server_error = Some(message.clone());
                self.notices.push(ClientNotice::ServerError { message });
            }
            Ok(ServerMessage::Pong { timestamp }) => trace!(?timestamp, "pong"),
            Ok(ServerMessage::Log { timestamp, message }) => {
                info!(message = %message, "remote log");
                self.notices.push(ClientNotice::ServerLog { timestamp, message });
            }
            Ok(ServerMessage::Unknown(kind)) => debug!(kind = %kind, "ignoring unrecognized message type"),
            Err(e @ ScannerError::MalformedSnapshot(_)) => self.reconciler.reject(&e),
            Err(e) => warn!(error = %e, "dropping malformed message"),
        }
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            identity: self.identity.as_ref().map(|id| id.to_string()),
            disabled_reason: self.disabled_reason.clone(),
            connection: self.connection.state(),
            view: self.reconciler.view().clone(),
            highlight: self.reconciler.highlight().clone(),
            has_snapshot: self.reconciler.has_snapshot(),
            command_count: self.command_count,
            pressed: self.jog.pressed_directions(),
            last_server_error: self.last_server_error.clone(),
        }
    }

    pub fn drain_notices(&mut self) -> Vec<ClientNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn is_disabled(&self) -> bool {
        self.connection.is_disabled()
    }

    pub fn identity(&self) -> Option<&IdentityToken> {
        self.identity.as_ref()
    }

    pub fn command_count(&self) -> u64 {
        self.command_count
    }

    pub fn view(&self) -> &ScannerView {
        self.reconciler.view()
    }

    pub fn reconciler(&self) -> &StateReconciler {
        &self.reconciler
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.connection
    }

    pub fn jog(&self) -> &RepeatEngine {
        &self.jog
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
