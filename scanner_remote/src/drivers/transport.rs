use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::ScannerError;

/// Close code of a deliberate, clean shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the link died without a close handshake,
/// including failed dials.
pub const ABNORMAL_CLOSURE: u16 = 1006;
const NO_STATUS_RECEIVED: u16 = 1005;

/// Identifies one connection attempt. Events carrying an older id than the
/// current one belong to a link that is already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

/// What a transport reports back, asynchronously, about a link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Opened(LinkId),
    Text(LinkId, String),
    Closed { link: LinkId, code: u16, reason: String },
}

impl LinkEvent {
    pub fn link(&self) -> LinkId {
        match self {
            LinkEvent::Opened(link) | LinkEvent::Text(link, _) => *link,
            LinkEvent::Closed { link, .. } => *link,
        }
    }
}

/// The only thing that touches the network. Calls must not block: results
/// come back as [`LinkEvent`]s through whatever channel the implementation
/// was built with.
pub trait Transport {
    /// Starts connecting. Success is reported as `Opened`, failure as `Closed`
    /// with [`ABNORMAL_CLOSURE`].
    fn dial(&mut self, link: LinkId, url: &Url);

    fn send_text(&mut self, link: LinkId, text: String) -> Result<(), ScannerError>;

    /// Starts the close handshake. The final `Closed` event still arrives.
    fn close(&mut self, link: LinkId, code: u16, reason: &str);
}

struct ActiveLink {
    id: LinkId,
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

/// WebSocket transport over tokio-tungstenite. Each link runs in its own
/// task that forwards text frames to `events` and drains an outbound queue.
pub struct WsTransport {
    events: mpsc::UnboundedSender<LinkEvent>,
    active: Option<ActiveLink>,
}

impl WsTransport {
    pub fn new(events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { events, active: None }
    }

    fn active(&self, link: LinkId) -> Option<&ActiveLink> {
        self.active.as_ref().filter(|a| a.id == link)
    }
}

impl Transport for WsTransport {
    fn dial(&mut self, link: LinkId, url: &Url) {
        if let Some(old) = self.active.take() {
            debug!(link = old.id.0, "discarding previous link task");
            old.task.abort();
        }
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(link, url.to_string(), outbound_rx, self.events.clone()));
        self.active = Some(ActiveLink { id: link, outbound, task });
    }

    fn send_text(&mut self, link: LinkId, text: String) -> Result<(), ScannerError> {
        let active = self.active(link).ok_or(ScannerError::NotConnected)?;
        active
            .outbound
            .send(Message::Text(text))
            .map_err(|_| ScannerError::Transport("link task has stopped".to_string()))
    }

    fn close(&mut self, link: LinkId, code: u16, reason: &str) {
        if let Some(active) = self.active(link) {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_string().into(),
            };
            let _ = active.outbound.send(Message::Close(Some(frame)));
        }
    }
}

async fn run_link(
    link: LinkId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(link = link.0, url = %url, error = %e, "websocket connect failed");
            let _ = events.send(LinkEvent::Closed {
                link,
                code: ABNORMAL_CLOSURE,
                reason: e.to_string(),
            });
            return;
        }
    };
    info!(link = link.0, url = %url, "websocket connected");
    let _ = events.send(LinkEvent::Opened(link));

    let (mut write, mut read) = stream.split();
    let (code, reason) = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(message) => {
                    if let Err(e) = write.send(message).await {
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                }
                None => {
                    let _ = write.close().await;
                    break (NORMAL_CLOSURE, "transport dropped".to_string());
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(LinkEvent::Text(link, text));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                }
                // ping/pong frames are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => break (ABNORMAL_CLOSURE, e.to_string()),
                None => break (ABNORMAL_CLOSURE, "stream ended".to_string()),
            },
        }
    };

    debug!(link = link.0, code, reason = %reason, "websocket link finished");
    let _ = events.send(LinkEvent::Closed { link, code, reason });
}
