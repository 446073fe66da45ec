//! Streaming subscription to a device's live observations
//!
//! A session walks Connecting → AwaitingWelcome → Subscribing → Streaming
//! → Closing. Any handshake deviation ends in Failed and is returned to the
//! caller before a [`Subscription`] exists. Once streaming, a spawned read
//! loop owns the socket and the sending half of the observation channel;
//! dropping that sender when the loop exits is the only end-of-stream
//! signal the consumer sees.

use crate::wire::{decode_sample, kinds, ListenRequest, StreamMessage};
use crate::{SessionError, SessionResult};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use wxb_core::{DeviceId, Observation, ObservationSource};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

/// Next request id; ids are never reused within a process
pub fn next_request_id() -> String {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed).to_string()
}

impl ListenRequest {
    pub fn start(device_id: DeviceId) -> Self {
        Self {
            kind: kinds::LISTEN_START,
            device_id,
            id: next_request_id(),
        }
    }

    pub fn stop(device_id: DeviceId) -> Self {
        Self {
            kind: kinds::LISTEN_STOP,
            device_id,
            id: next_request_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingWelcome,
    Subscribing,
    Streaming,
    Closing,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingWelcome => "awaiting welcome",
            SessionState::Subscribing => "subscribing",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ws_url: String,
    pub token: String,
    pub device_id: DeviceId,
}

impl SessionConfig {
    fn endpoint(&self) -> SessionResult<Url> {
        let mut url = Url::parse(&self.ws_url)?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

/// Backoff policy around the whole connect + handshake sequence
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// A live subscription. Yields observations in wire order until the read
/// loop ends (peer close, read error, or shutdown).
pub struct Subscription {
    observations: mpsc::UnboundedReceiver<Observation>,
    reader: JoinHandle<()>,
}

impl Subscription {
    /// Connect, perform the handshake, and start the read loop.
    ///
    /// Setting `shutdown` to `true` makes the read loop unsubscribe and
    /// close the connection.
    pub async fn open(config: &SessionConfig, shutdown: watch::Receiver<bool>) -> SessionResult<Self> {
        let url = config.endpoint()?;

        debug!(state = %SessionState::Connecting, host = url.host_str().unwrap_or_default());
        let (mut ws, _resp) = connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::Connect(Box::new(e)))?;
        info!("connected to provider stream");

        if let Err(e) = handshake(&mut ws, config.device_id).await {
            warn!(state = %SessionState::Failed, error = %e, "subscription handshake failed");
            let _ = ws.close(None).await;
            return Err(e);
        }

        let (tx, observations) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(ws, config.device_id, tx, shutdown));

        Ok(Self {
            observations,
            reader,
        })
    }

    /// Next observation, or `None` once the read loop has exited
    pub async fn next(&mut self) -> Option<Observation> {
        self.observations.recv().await
    }

    /// Wait for the read loop to finish its close sequence.
    ///
    /// Call after requesting shutdown, or after `next` returned `None`.
    pub async fn join(self) {
        let Self {
            observations,
            reader,
        } = self;
        if let Err(e) = reader.await {
            warn!(error = %e, "subscription reader task failed");
        }
        drop(observations);
    }
}

#[async_trait::async_trait]
impl ObservationSource for Subscription {
    async fn next_observation(&mut self) -> Option<Observation> {
        self.next().await
    }
}

/// Open a subscription, retrying the whole handshake with exponential
/// backoff. Waiting between attempts is cut short by `shutdown`.
pub async fn subscribe_with_retry(
    config: &SessionConfig,
    policy: &RetryPolicy,
    shutdown: &watch::Receiver<bool>,
) -> SessionResult<Subscription> {
    let mut attempt = 1;
    let mut delay = policy.base_delay;

    loop {
        match Subscription::open(config, shutdown.clone()).await {
            Ok(sub) => return Ok(sub),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "subscribe failed, retrying in {:?}",
                    delay
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_requested(shutdown.clone()) => return Err(SessionError::Cancelled),
                }
                delay = (delay * 2).min(policy.max_delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Resolves once shutdown is signalled or its sender is gone
pub async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn handshake(ws: &mut WsStream, device_id: DeviceId) -> SessionResult<()> {
    let welcome = read_control(ws, SessionState::AwaitingWelcome).await?;
    if welcome.kind != kinds::CONNECTION_OPENED {
        return Err(SessionError::Handshake {
            state: SessionState::AwaitingWelcome,
            expected: kinds::CONNECTION_OPENED,
            received: welcome.kind,
        });
    }
    debug!("received connection_opened");

    let request = ListenRequest::start(device_id);
    send_request(ws, &request, SessionState::Subscribing).await?;
    debug!(id = %request.id, device_id, "sent listen_start");

    let ack = read_control(ws, SessionState::Subscribing).await?;
    if ack.kind != kinds::ACK {
        return Err(SessionError::Handshake {
            state: SessionState::Subscribing,
            expected: kinds::ACK,
            received: ack.kind,
        });
    }
    if ack.id.as_deref() != Some(request.id.as_str()) {
        debug!(expected = %request.id, received = ?ack.id, "ack id differs from request id");
    }
    info!(device_id, "subscribed to device observations");
    Ok(())
}

/// Read the next text message, skipping ping/pong frames
async fn read_control(ws: &mut WsStream, state: SessionState) -> SessionResult<StreamMessage> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).map_err(|e| SessionError::Protocol {
                    state,
                    reason: format!("unparsable message: {e}"),
                });
            }
            Some(Ok(Message::Binary(_))) => {
                return Err(SessionError::Protocol {
                    state,
                    reason: "unexpected binary message".into(),
                });
            }
            Some(Ok(Message::Close(_))) | None => return Err(SessionError::Closed { state }),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(SessionError::Transport {
                    state,
                    source: Box::new(e),
                })
            }
        }
    }
}

async fn send_request(ws: &mut WsStream, request: &ListenRequest, state: SessionState) -> SessionResult<()> {
    let json = serde_json::to_string(request)?;
    ws.send(Message::text(json))
        .await
        .map_err(|e| SessionError::Transport {
            state,
            source: Box::new(e),
        })
}

async fn read_loop(
    mut ws: WsStream,
    device_id: DeviceId,
    tx: mpsc::UnboundedSender<Observation>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delivered: u64 = 0;
    let mut stopping = *shutdown.borrow_and_update();
    debug!(state = %SessionState::Streaming, device_id);

    while !stopping {
        let next = tokio::select! {
            changed = shutdown.changed() => {
                // a dropped sender also means shutdown
                stopping = changed.is_err() || *shutdown.borrow_and_update();
                continue;
            }
            next = ws.next() => next,
        };

        let text = match next {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                info!(?frame, "provider closed the stream");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "stream read failed");
                break;
            }
            None => {
                info!("provider stream ended");
                break;
            }
        };

        let msg: StreamMessage = match serde_json::from_str(text.as_str()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "skipping unparsable message");
                continue;
            }
        };
        if msg.kind != kinds::OBS_ST {
            debug!(kind = %msg.kind, "ignoring message");
            continue;
        }

        for sample in msg.obs.unwrap_or_default() {
            let obs = match decode_sample(&sample) {
                Ok(obs) => obs,
                Err(e) => {
                    warn!(error = %e, "skipping malformed sample");
                    continue;
                }
            };
            if tx.send(obs).is_err() {
                warn!("observation receiver dropped, closing subscription");
                stopping = true;
                break;
            }
            delivered += 1;
        }
    }

    close(&mut ws, device_id).await;
    drop(tx);
    info!(delivered, "subscription closed");
}

/// Best-effort unsubscribe and close; the socket may already be broken
async fn close(ws: &mut WsStream, device_id: DeviceId) {
    debug!(state = %SessionState::Closing, device_id);
    let request = ListenRequest::stop(device_id);
    match send_request(ws, &request, SessionState::Closing).await {
        Ok(()) => debug!(id = %request.id, "sent listen_stop"),
        Err(e) => warn!(error = %e, "listen_stop not sent"),
    }
    if let Err(e) = ws.close(None).await {
        debug!(error = %e, "websocket close failed");
    }
}
