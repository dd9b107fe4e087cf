#![allow(dead_code)]

use std::time::{Duration, Instant};

use scanner_remote::drivers::{LinkEvent, LinkId, Transport};
use scanner_remote::{ClientEvent, ScannerClient, ScannerClientConfig, ScannerError};
use url::Url;

/// What the client asked the network to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Dial(LinkId, String),
    Send(LinkId, String),
    Close(LinkId, u16),
}

/// Transport that records calls and never touches a socket. Tests play the
/// network side by feeding [`LinkEvent`]s back into the client.
#[derive(Debug, Default)]
pub struct FakeTransport {
    pub calls: Vec<Call>,
    pub fail_sends: bool,
}

impl Transport for FakeTransport {
    fn dial(&mut self, link: LinkId, url: &Url) {
        self.calls.push(Call::Dial(link, url.to_string()));
    }

    fn send_text(&mut self, link: LinkId, text: String) -> Result<(), ScannerError> {
        if self.fail_sends {
            return Err(ScannerError::Transport("fake send failure".to_string()));
        }
        self.calls.push(Call::Send(link, text));
        Ok(())
    }

    fn close(&mut self, link: LinkId, code: u16, _reason: &str) {
        self.calls.push(Call::Close(link, code));
    }
}

impl FakeTransport {
    pub fn dials(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Dial(..))).count()
    }

    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Send(_, text) => serde_json::from_str(text).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn sent_of_type(&self, kind: &str) -> Vec<serde_json::Value> {
        self.sent().into_iter().filter(|v| v["type"] == kind).collect()
    }

    pub fn moves(&self) -> Vec<String> {
        self.sent_of_type("move")
            .into_iter()
            .filter_map(|v| v["direction"].as_str().map(str::to_string))
            .collect()
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn config() -> ScannerClientConfig {
    ScannerClientConfig::default()
}

pub fn client(identity: &str) -> ScannerClient<FakeTransport> {
    ScannerClient::new(&config(), identity, FakeTransport::default())
}

/// Starts `client` and completes the handshake on the first link.
pub fn connected(identity: &str, now: Instant) -> ScannerClient<FakeTransport> {
    let mut client = client(identity);
    client.start();
    open_current(&mut client, now);
    client
}

/// Advances through every deadline up to `until`, one at a time, the way a
/// driver that never stalls would.
pub fn run_to(client: &mut ScannerClient<FakeTransport>, until: Instant) {
    while let Some(deadline) = client.next_deadline().filter(|d| *d <= until) {
        client.advance(deadline);
    }
    client.advance(until);
}

pub fn current_link(client: &ScannerClient<FakeTransport>) -> LinkId {
    client.connection().link().expect("a link should be active")
}

pub fn open_current(client: &mut ScannerClient<FakeTransport>, now: Instant) {
    let link = current_link(client);
    client.handle(ClientEvent::Link(LinkEvent::Opened(link)), now);
}

pub fn close_current(client: &mut ScannerClient<FakeTransport>, code: u16, now: Instant) {
    let link = current_link(client);
    client.handle(
        ClientEvent::Link(LinkEvent::Closed { link, code, reason: String::new() }),
        now,
    );
}

pub fn deliver(client: &mut ScannerClient<FakeTransport>, json: &str, now: Instant) {
    let link = current_link(client);
    client.handle(ClientEvent::Link(LinkEvent::Text(link, json.to_string())), now);
}

pub fn state_update(x: i64, y: i64, captured: &[[i64; 2]]) -> String {
    serde_json::json!({
        "type": "state_update",
        "data": {
            "current_position": {"x": x, "y": y},
            "operation_status": "ready",
            "horizontal_movement_pending": 0,
            "vertical_movement_pending": 0,
            "captured_positions": captured,
        }
    })
    .to_string()
}
