// src/trading/stream.rs - Streaming channel to the execution engine (Socket.IO over WebSocket)
//
// The engine is a Socket.IO v4 server. Only the WebSocket transport is spoken here:
// Engine.IO open (`0{..}`), namespace connect (`40`), ping/pong (`2`/`3`), events
// (`42["name",payload]`) and close (`1` / `41`).
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::MirrorError;

pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// What the transport reports upward, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    ConnectError(String),
    Message { event: String, data: Value },
}

/// A named command sent to the engine over the streaming channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub event: String,
    pub data: Value,
}

impl OutboundFrame {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    /// Socket.IO event packet on the default namespace.
    pub fn encode(&self) -> String {
        format!("42{}", json!([self.event, self.data]))
    }
}

/// One decoded Engine.IO / Socket.IO text packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `0{sid, pingInterval, ..}` - transport open, the client must join a namespace.
    Open(Value),
    /// `1` - transport close.
    Close,
    /// `2[probe]` - server heartbeat, answered with `3` + the same payload.
    Ping(String),
    /// `40{sid}` - namespace joined.
    Connected,
    /// `41` - server-side namespace disconnect.
    Disconnect,
    /// `44{message}` - namespace connection refused.
    ConnectError(String),
    /// `42[event, payload, ..]`
    Event { event: String, data: Value },
    /// Anything else the mirror has no use for (noop, acks, binary placeholders).
    Ignored,
}

/// Both ends of an opened streaming channel as seen by its owner.
///
/// Dropping `outbound` tears the connection down.
pub struct StreamChannel {
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
}

/// Opens streaming channels. Connection progress is reported through `StreamChannel::events`,
/// so `open` itself never blocks or fails.
pub trait StreamConnector: Send + Sync {
    fn open(&self, endpoint: &Url) -> StreamChannel;
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Consecutive failed connection attempts tolerated before giving up.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SocketIoConnector {
    policy: ReconnectPolicy,
}

impl SocketIoConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ReconnectPolicy) -> Self {
        Self { policy }
    }
}

impl StreamConnector for SocketIoConnector {
    /// Spawns the socket task, so this must run inside a Tokio runtime.
    fn open(&self, endpoint: &Url) -> StreamChannel {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(
            endpoint.to_string(),
            self.policy.clone(),
            event_tx,
            out_rx,
        ));
        StreamChannel {
            events: event_rx,
            outbound: out_tx,
        }
    }
}

enum PumpExit {
    Local,
    Dropped(String),
    Refused(String),
}

async fn run_socket(
    url: String,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    let mut failures: u32 = 0;

    loop {
        debug!("🔌 [STREAM] Connecting to {}", url);
        let failure = match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                let mut joined = false;
                let (mut ws_sender, mut ws_receiver) = ws_stream.split();

                let exit = loop {
                    tokio::select! {
                        frame = outbound.recv() => match frame {
                            Some(frame) => {
                                if let Err(e) = ws_sender.send(Message::Text(frame.encode())).await {
                                    break PumpExit::Dropped(e.to_string());
                                }
                                debug!("📤 [STREAM] Sent {}", frame.event);
                            }
                            None => {
                                let _ = ws_sender.send(Message::Text("41".to_string())).await;
                                let _ = ws_sender.send(Message::Close(None)).await;
                                break PumpExit::Local;
                            }
                        },
                        msg = ws_receiver.next() => match msg {
                            Some(Ok(Message::Text(text))) => match decode_packet(&text) {
                                Some(Packet::Open(_)) => {
                                    if let Err(e) = ws_sender.send(Message::Text("40".to_string())).await {
                                        break PumpExit::Dropped(e.to_string());
                                    }
                                }
                                Some(Packet::Ping(payload)) => {
                                    if let Err(e) = ws_sender.send(Message::Text(format!("3{}", payload))).await {
                                        error!("❌ [STREAM] Failed to send pong: {}", e);
                                        break PumpExit::Dropped(e.to_string());
                                    }
                                }
                                Some(Packet::Connected) => {
                                    joined = true;
                                    failures = 0;
                                    info!("🔌 [STREAM] Connected to {}", url);
                                    if events.send(TransportEvent::Connected).is_err() {
                                        break PumpExit::Local;
                                    }
                                }
                                Some(Packet::Event { event, data }) => {
                                    if events.send(TransportEvent::Message { event, data }).is_err() {
                                        break PumpExit::Local;
                                    }
                                }
                                Some(Packet::ConnectError(reason)) => break PumpExit::Refused(reason),
                                Some(Packet::Disconnect) => {
                                    break PumpExit::Dropped("io server disconnect".to_string())
                                }
                                Some(Packet::Close) => break PumpExit::Dropped("transport close".to_string()),
                                Some(Packet::Ignored) => {}
                                None => debug!("❓ [STREAM] Ignoring unrecognised packet: {}", text),
                            },
                            Some(Ok(Message::Ping(payload))) => {
                                if let Err(e) = ws_sender.send(Message::Pong(payload)).await {
                                    error!("❌ [STREAM] Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                let reason = frame
                                    .map(|f| f.reason.to_string())
                                    .filter(|r| !r.is_empty())
                                    .unwrap_or_else(|| "closed by server".to_string());
                                break PumpExit::Dropped(reason);
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break PumpExit::Dropped(e.to_string()),
                            None => break PumpExit::Dropped("stream ended".to_string()),
                        }
                    }
                };

                match exit {
                    PumpExit::Local => {
                        info!("🧹 [STREAM] Connection to {} closed locally", url);
                        return;
                    }
                    PumpExit::Dropped(reason) if joined => {
                        warn!("🔌 [STREAM] Connection to {} dropped: {}", url, reason);
                        if events.send(TransportEvent::Disconnected { reason }).is_err() {
                            return;
                        }
                        None
                    }
                    // never joined the namespace: counts as a failed attempt
                    PumpExit::Dropped(reason) | PumpExit::Refused(reason) => Some(reason),
                }
            }
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = failure {
            failures += 1;
            error!("❌ [STREAM] Connection attempt #{} to {} failed: {}", failures, url, reason);
            if events.send(TransportEvent::ConnectError(reason)).is_err() {
                return;
            }
            if failures > policy.max_attempts {
                warn!("⛔ [STREAM] Giving up on {} after {} attempts", url, failures);
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = events.closed() => return,
        }
    }
}

/// Decode one Engine.IO text packet. `None` for text that is not a packet at all.
pub fn decode_packet(text: &str) -> Option<Packet> {
    let mut chars = text.chars();
    let engine_type = chars.next()?;
    let rest = chars.as_str();

    match engine_type {
        '0' => Some(Packet::Open(serde_json::from_str(rest).unwrap_or(Value::Null))),
        '1' => Some(Packet::Close),
        '2' => Some(Packet::Ping(rest.to_string())),
        '3' | '5' | '6' => Some(Packet::Ignored),
        '4' => decode_socket_packet(rest),
        _ => None,
    }
}

fn decode_socket_packet(text: &str) -> Option<Packet> {
    let mut chars = text.chars();
    let socket_type = chars.next()?;
    let mut rest = chars.as_str();

    // optional "/namespace," prefix
    if rest.starts_with('/') {
        rest = match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        };
    }

    match socket_type {
        '0' => Some(Packet::Connected),
        '1' => Some(Packet::Disconnect),
        '2' => {
            // optional ack id before the payload
            let payload = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let Value::Array(items) = serde_json::from_str::<Value>(payload).ok()? else {
                return None;
            };
            let mut items = items.into_iter();
            let event = items.next()?.as_str()?.to_string();
            Some(Packet::Event {
                event,
                data: items.next().unwrap_or(Value::Null),
            })
        }
        '4' => {
            let body: Value = serde_json::from_str(rest).unwrap_or(Value::Null);
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| "namespace connection refused".to_string());
            Some(Packet::ConnectError(message))
        }
        _ => Some(Packet::Ignored),
    }
}

/// Normalise an engine endpoint to its Socket.IO WebSocket URL.
///
/// `http` → `ws`, `https` → `wss`; a bare host gets the default `/socket.io/` path; the
/// Engine.IO version and transport are always pinned in the query.
pub fn stream_url(endpoint: &str) -> Result<Url, MirrorError> {
    let invalid = |reason: String| MirrorError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to {}", scheme)))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(SOCKET_IO_PATH);
    }

    let extra: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "EIO" && k != "transport")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(extra)
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");
    Ok(url)
}
