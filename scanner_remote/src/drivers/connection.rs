use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::transport::{LinkEvent, LinkId, Transport, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use crate::packets::ClientMessage;
use crate::timers::{next_tick, TimerQueue};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Identity or endpoint was invalid at startup. Terminal.
    Disabled,
    #[default]
    Closed,
    Connecting,
    Open,
    /// A deliberate close is waiting for the transport to confirm.
    Closing,
    /// Closed abnormally; a reconnect timer is armed.
    Retrying,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ConnectionTimer {
    Reconnect,
    Keepalive,
    /// Gives up on the remote echoing a deliberate close.
    CloseHandshake,
}

/// How long a deliberate close may wait for the remote's close frame.
pub const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub dials: u64,
    pub reconnects_scheduled: u64,
    pub sent: u64,
    pub dropped: u64,
    pub last_close_code: Option<u16>,
}

/// What a link event or timer meant for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    /// Stale link or nothing to report.
    Ignored,
    Opened,
    Inbound(String),
    Closed { code: u16, retry_in: Option<Duration> },
}

/// Owns the single logical connection to the remote controller.
///
/// Sans-IO: all network effects go through `T`, and time only enters through
/// the `now` arguments, so the lifecycle below can be exercised without
/// sockets or real timers.
///
/// ```text
/// Closed --open--> Connecting --opened--> Open --close()--> Closing --closed--> Closed
///                      |                   |
///                      +---closed(!=1000)--+--> Retrying --reconnect delay--> Connecting
/// ```
pub struct ConnectionManager<T: Transport> {
    transport: T,
    endpoint: Option<Url>,
    state: ConnectionState,
    link: Option<LinkId>,
    next_link: u64,
    timers: TimerQueue<ConnectionTimer>,
    reconnect_delay: Duration,
    keepalive_interval: Duration,
    stats: ConnectionStats,
}

impl<T: Transport> ConnectionManager<T> {
    /// `endpoint == None` builds a manager that is disabled for good.
    pub fn new(transport: T, endpoint: Option<Url>, reconnect_delay: Duration, keepalive_interval: Duration) -> Self {
        let state = if endpoint.is_some() {
            ConnectionState::Closed
        } else {
            ConnectionState::Disabled
        };
        Self {
            transport,
            endpoint,
            state,
            link: None,
            next_link: 0,
            timers: TimerQueue::new(),
            reconnect_delay,
            keepalive_interval,
            stats: ConnectionStats::default(),
        }
    }

    /// Starts connecting if nothing is connected or pending. No-op otherwise,
    /// and always a no-op when disabled.
    pub fn open(&mut self) {
        match self.state {
            ConnectionState::Closed => self.dial(),
            ConnectionState::Retrying => {
                self.timers.cancel(&ConnectionTimer::Reconnect);
                self.dial();
            }
            ConnectionState::Disabled => debug!("open ignored: connection disabled"),
            _ => debug!(state = ?self.state, "open ignored: link already active"),
        }
    }

    fn dial(&mut self) {
        let Some(endpoint) = self.endpoint.as_ref() else {
            return;
        };
        self.next_link += 1;
        let link = LinkId(self.next_link);
        self.link = Some(link);
        self.state = ConnectionState::Connecting;
        self.stats.dials += 1;
        info!(link = link.0, url = %endpoint, "connecting");
        self.transport.dial(link, endpoint);
    }

    /// Deliberate close with the normal code; never followed by a reconnect.
    /// If the remote does not finish the handshake within
    /// [`CLOSE_HANDSHAKE_TIMEOUT`] the link is abandoned and the state
    /// becomes `Closed` anyway.
    pub fn close(&mut self, now: Instant) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                if let Some(link) = self.link {
                    info!(link = link.0, "closing connection");
                    self.transport.close(link, NORMAL_CLOSURE, "client closing");
                }
                self.timers.clear();
                self.timers
                    .schedule(ConnectionTimer::CloseHandshake, now + CLOSE_HANDSHAKE_TIMEOUT);
                self.state = ConnectionState::Closing;
            }
            ConnectionState::Retrying => {
                self.timers.clear();
                self.state = ConnectionState::Closed;
            }
            _ => {}
        }
    }

    /// Hands `message` to the transport if the connection is open. Anything
    /// sent while not open is dropped, not queued. Returns whether the message
    /// went out.
    pub fn send(&mut self, message: &ClientMessage) -> bool {
        let link = match (self.state, self.link) {
            (ConnectionState::Open, Some(link)) => link,
            _ => {
                self.stats.dropped += 1;
                debug!(message = message.name(), state = ?self.state, "not connected, dropping message");
                return false;
            }
        };
        match self.transport.send_text(link, message.to_json()) {
            Ok(()) => {
                self.stats.sent += 1;
                true
            }
            Err(e) => {
                self.stats.dropped += 1;
                debug!(message = message.name(), error = %e, "send failed, dropping message");
                false
            }
        }
    }

    pub fn on_link_event(&mut self, event: LinkEvent, now: Instant) -> LinkOutcome {
        if self.link != Some(event.link()) {
            debug!(link = event.link().0, "ignoring event from stale link");
            return LinkOutcome::Ignored;
        }
        match event {
            LinkEvent::Opened(link) => {
                if self.state != ConnectionState::Connecting {
                    return LinkOutcome::Ignored;
                }
                self.state = ConnectionState::Open;
                info!(link = link.0, "connection open");
                self.send(&ClientMessage::GetState);
                self.timers.schedule(ConnectionTimer::Keepalive, now + self.keepalive_interval);
                LinkOutcome::Opened
            }
            LinkEvent::Text(_, text) => match self.state {
                ConnectionState::Open | ConnectionState::Closing => LinkOutcome::Inbound(text),
                _ => LinkOutcome::Ignored,
            },
            LinkEvent::Closed { link, code, reason } => {
                self.link = None;
                self.timers.cancel(&ConnectionTimer::Keepalive);
                self.timers.cancel(&ConnectionTimer::CloseHandshake);
                self.stats.last_close_code = Some(code);

                let deliberate = self.state == ConnectionState::Closing;
                if deliberate || code == NORMAL_CLOSURE {
                    info!(link = link.0, code, "connection closed");
                    self.state = ConnectionState::Closed;
                    return LinkOutcome::Closed { code, retry_in: None };
                }

                self.state = ConnectionState::Retrying;
                self.timers.schedule(ConnectionTimer::Reconnect, now + self.reconnect_delay);
                self.stats.reconnects_scheduled += 1;
                warn!(
                    link = link.0,
                    code,
                    reason = %reason,
                    retry_in_ms = self.reconnect_delay.as_millis() as u64,
                    "connection lost, reconnect scheduled"
                );
                LinkOutcome::Closed { code, retry_in: Some(self.reconnect_delay) }
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fires the earliest connection timer due at `now`.
    pub fn fire_due(&mut self, now: Instant) -> LinkOutcome {
        let Some((at, timer)) = self.timers.pop_due(now) else {
            return LinkOutcome::Ignored;
        };
        match timer {
            ConnectionTimer::Reconnect => {
                if self.state == ConnectionState::Retrying {
                    self.dial();
                }
            }
            ConnectionTimer::CloseHandshake => {
                if self.state == ConnectionState::Closing {
                    warn!(link = ?self.link.map(|l| l.0), "remote never finished the close handshake, dropping link");
                    // anything the old link reports later is stale
                    self.link = None;
                    self.state = ConnectionState::Closed;
                    self.stats.last_close_code = Some(ABNORMAL_CLOSURE);
                    return LinkOutcome::Closed { code: ABNORMAL_CLOSURE, retry_in: None };
                }
            }
            ConnectionTimer::Keepalive => {
                if self.state == ConnectionState::Open {
                    self.send(&ClientMessage::Ping);
                    self.timers
                        .schedule(ConnectionTimer::Keepalive, next_tick(at, self.keepalive_interval, now));
                }
            }
        }
        LinkOutcome::Ignored
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    pub fn is_disabled(&self) -> bool {
        self.state == ConnectionState::Disabled
    }

    pub fn reconnect_pending(&self) -> bool {
        self.timers.is_scheduled(&ConnectionTimer::Reconnect)
    }

    pub fn keepalive_pending(&self) -> bool {
        self.timers.is_scheduled(&ConnectionTimer::Keepalive)
    }

    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
