//! WebSocket session driver for server-push channels.
//!
//! A session pumps typed messages from an `mpsc` receiver to the client
//! and keeps the connection honest:
//!
//! - a protocol-level ping every `ping_interval`
//! - the session ends if the client sends nothing for `idle_timeout`
//! - a client `{"type":"ping"}` text frame is answered with `{"type":"pong"}`
//!
//! ```text
//! Client              Session                  Producer
//!   │                    │<──── mpsc::Sender ──────┤
//!   │<── JSON text ──────┤                         │
//!   │<── Ping ───────────┤ (every ping_interval)   │
//!   ├── {"type":"ping"} >│                         │
//!   │<── {"type":"pong"} ┤                         │
//! ```
//!
//! When the producer drops its sender the session closes the socket.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Keep-alive settings for a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How often the server pings the client
    pub ping_interval: Duration,
    /// How long the client may stay silent before the session ends
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Application-level keep-alive frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Sent by the client
    Ping,
    /// Our answer
    Pong,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection or the socket failed
    ClientGone,
    /// The client was silent for longer than `idle_timeout`
    IdleTimeout,
    /// The producer dropped its sender
    ChannelClosed,
}

/// What to do with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Inbound {
    Reply(String),
    Close,
    Ignore,
}

fn classify(message: &Message) -> Inbound {
    match message {
        Message::Text(text) => match serde_json::from_str::<ControlMessage>(text) {
            Ok(ControlMessage::Ping) => serde_json::to_string(&ControlMessage::Pong)
                .map_or(Inbound::Ignore, Inbound::Reply),
            Ok(ControlMessage::Pong) => Inbound::Ignore,
            Err(_) => {
                debug!("Ignoring unrecognised client message");
                Inbound::Ignore
            },
        },
        Message::Close(_) => Inbound::Close,
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
    }
}

/// Drive one WebSocket connection until either side goes away.
///
/// `greeting` is sent before anything from `outbound`.
pub async fn run_session<T>(
    socket: WebSocket,
    greeting: Option<T>,
    mut outbound: mpsc::Receiver<T>,
    config: SessionConfig,
) -> SessionEnd
where
    T: Serialize + Send + 'static,
{
    let (mut sender, mut receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(8);

    let mut send_task = tokio::spawn(async move {
        if let Some(greeting) = greeting {
            if let Ok(json) = serde_json::to_string(&greeting) {
                if sender.send(Message::Text(json)).await.is_err() {
                    return SessionEnd::ClientGone;
                }
            }
        }

        let start = tokio::time::Instant::now() + config.ping_interval;
        let mut ping = tokio::time::interval_at(start, config.ping_interval);

        loop {
            let message = tokio::select! {
                next = outbound.recv() => match next {
                    Some(item) => match serde_json::to_string(&item) {
                        Ok(json) => Message::Text(json),
                        Err(error) => {
                            warn!(%error, "Failed to serialize outbound message");
                            continue;
                        },
                    },
                    None => {
                        let _ = sender.send(Message::Close(None)).await;
                        return SessionEnd::ChannelClosed;
                    },
                },
                Some(reply) = reply_rx.recv() => Message::Text(reply),
                _ = ping.tick() => Message::Ping(Vec::new()),
            };

            if sender.send(message).await.is_err() {
                return SessionEnd::ClientGone;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        loop {
            match tokio::time::timeout(config.idle_timeout, receiver.next()).await {
                Err(_) => return SessionEnd::IdleTimeout,
                Ok(None | Some(Err(_))) => return SessionEnd::ClientGone,
                Ok(Some(Ok(message))) => match classify(&message) {
                    Inbound::Reply(reply) => {
                        if reply_tx.send(reply).await.is_err() {
                            return SessionEnd::ClientGone;
                        }
                    },
                    Inbound::Close => return SessionEnd::ClientGone,
                    Inbound::Ignore => {},
                },
            }
        }
    });

    let end = tokio::select! {
        end = (&mut send_task) => {
            recv_task.abort();
            end.unwrap_or(SessionEnd::ClientGone)
        },
        end = (&mut recv_task) => {
            send_task.abort();
            end.unwrap_or(SessionEnd::ClientGone)
        },
    };

    debug!(?end, "WebSocket session ended");
    end
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn client_ping_gets_pong() {
        let inbound = classify(&Message::Text(r#"{"type":"ping"}"#.to_string()));
        assert_eq!(inbound, Inbound::Reply(r#"{"type":"pong"}"#.to_string()));
    }

    #[test]
    fn other_frames_are_ignored() {
        assert_eq!(
            classify(&Message::Text(r#"{"type":"subscribe"}"#.to_string())),
            Inbound::Ignore
        );
        assert_eq!(classify(&Message::Text("garbage".to_string())), Inbound::Ignore);
        assert_eq!(classify(&Message::Pong(Vec::new())), Inbound::Ignore);
        assert_eq!(classify(&Message::Close(None)), Inbound::Close);
    }

    #[test]
    fn default_keep_alive() {
        let config = SessionConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
    }
}
