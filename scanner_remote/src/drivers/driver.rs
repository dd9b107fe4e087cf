use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::transport::{LinkEvent, WsTransport};
use crate::jog::{InputSignal, PressKey};
use crate::reset::{ResetClient, ResetOutcome};
use crate::{ClientEvent, ClientNotice, ScannerClient, ScannerClientConfig, ScannerError, Telemetry};

const NOTICE_CAPACITY: usize = 100;

#[derive(Debug)]
enum DriverMessage {
    Event(ClientEvent),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running scanner client.
///
/// The client itself lives in one tokio task that owns the connection, the
/// repeat engine and the view. Input, link events and timers are handled
/// there one at a time; this handle only queues events and reads back
/// [`Telemetry`] and [`ClientNotice`]s.
#[derive(Debug, Clone)]
pub struct ScannerDriver {
    commands: mpsc::UnboundedSender<DriverMessage>,
    telemetry: watch::Receiver<Telemetry>,
    pub notice_channel: broadcast::Sender<ClientNotice>,
    reset: Option<Arc<ResetClient>>,
}

impl ScannerDriver {
    /// Starts the client task and begins connecting. Must be called from
    /// inside a tokio runtime.
    ///
    /// A bad config is an error. A bad identity is not: the driver comes up
    /// disabled, reports it once and never touches the network.
    pub fn spawn(config: ScannerClientConfig, raw_identity: &str) -> Result<ScannerDriver, ScannerError> {
        config.validate()?;

        let (link_tx, link_rx) = mpsc::unbounded_channel::<LinkEvent>();
        let client = ScannerClient::new(&config, raw_identity, WsTransport::new(link_tx));

        let reset = match client.identity() {
            Some(identity) => Some(Arc::new(ResetClient::new(&config, identity)?)),
            None => None,
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (telemetry_tx, telemetry_rx) = watch::channel(client.telemetry());
        let (notice_tx, _rx) = broadcast::channel(NOTICE_CAPACITY);

        let notices = notice_tx.clone();
        tokio::spawn(async move {
            run(client, command_rx, link_rx, telemetry_tx, notices).await;
        });

        Ok(ScannerDriver {
            commands: command_tx,
            telemetry: telemetry_rx,
            notice_channel: notice_tx,
            reset,
        })
    }

    fn send(&self, event: ClientEvent) -> Result<(), ScannerError> {
        self.commands
            .send(DriverMessage::Event(event))
            .map_err(|_| ScannerError::Transport("scanner driver has stopped".to_string()))
    }

    pub fn press(&self, key: PressKey) -> Result<(), ScannerError> {
        self.send(ClientEvent::Press(key))
    }

    pub fn release(&self, key: PressKey) -> Result<(), ScannerError> {
        self.send(ClientEvent::Release(key))
    }

    /// Releases every held key, e.g. when the input surface loses focus.
    pub fn release_all(&self) -> Result<(), ScannerError> {
        self.send(ClientEvent::ReleaseAll)
    }

    pub fn input(&self, signal: InputSignal) -> Result<(), ScannerError> {
        self.send(ClientEvent::Input(signal))
    }

    pub fn connect(&self) -> Result<(), ScannerError> {
        self.send(ClientEvent::Connect)
    }

    pub fn disconnect(&self) -> Result<(), ScannerError> {
        self.send(ClientEvent::Disconnect)
    }

    /// Asks the server to reset the scanner and, once it accepts, zeroes the
    /// local command counter. The outcome is also published as a notice.
    pub async fn reset(&self) -> Result<ResetOutcome, ScannerError> {
        let Some(reset) = self.reset.as_ref() else {
            let error = ScannerError::Reset("client is disabled".to_string());
            let _ = self.notice_channel.send(ClientNotice::ResetFailed { reason: error.to_string() });
            return Err(error);
        };

        match reset.reset().await {
            Ok(outcome) => {
                self.send(ClientEvent::ResetCounter)?;
                let _ = self.notice_channel.send(ClientNotice::ResetSucceeded {
                    message: outcome.message.clone(),
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "scanner reset failed");
                let _ = self.notice_channel.send(ClientNotice::ResetFailed { reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Closes the connection with the normal code and stops the client task.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(DriverMessage::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Latest published telemetry.
    pub fn snapshot(&self) -> Telemetry {
        self.telemetry.borrow().clone()
    }

    pub fn telemetry(&self) -> watch::Receiver<Telemetry> {
        self.telemetry.clone()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<ClientNotice> {
        self.notice_channel.subscribe()
    }
}

async fn run(
    mut client: ScannerClient<WsTransport>,
    mut commands: mpsc::UnboundedReceiver<DriverMessage>,
    mut links: mpsc::UnboundedReceiver<LinkEvent>,
    telemetry: watch::Sender<Telemetry>,
    notices: broadcast::Sender<ClientNotice>,
) {
    client.start();
    publish(&mut client, &telemetry, &notices);

    loop {
        let deadline = client.next_deadline();
        tokio::select! {
            command = commands.recv() => match command {
                Some(DriverMessage::Event(event)) => client.handle(event, Instant::now()),
                Some(DriverMessage::Shutdown(done)) => {
                    client.handle(ClientEvent::Disconnect, Instant::now());
                    publish(&mut client, &telemetry, &notices);
                    let _ = done.send(());
                    break;
                }
                None => {
                    debug!("all driver handles dropped");
                    client.handle(ClientEvent::Disconnect, Instant::now());
                    break;
                }
            },
            Some(event) = links.recv() => client.handle(ClientEvent::Link(event), Instant::now()),
            _ = sleep_until(deadline) => client.advance(Instant::now()),
        }
        publish(&mut client, &telemetry, &notices);
    }

    info!(commands_sent = client.command_count(), "scanner client stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}

fn publish(
    client: &mut ScannerClient<WsTransport>,
    telemetry: &watch::Sender<Telemetry>,
    notices: &broadcast::Sender<ClientNotice>,
) {
    let next = client.telemetry();
    telemetry.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
    for notice in client.drain_notices() {
        // no subscribers is fine
        let _ = notices.send(notice);
    }
}
