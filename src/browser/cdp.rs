//! Chrome DevTools Protocol client over a WebSocket.
//!
//! Features:
//! - Request/response correlation by auto-incrementing id
//! - Flattened target sessions (`sessionId` on the message envelope)
//! - Event buffering, so events that arrive while a command is in flight
//!   are still seen by a later [`CdpConnection::wait_event`]
//! - Automatic ping/pong

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// Oldest buffered events are dropped past this many.
const MAX_BUFFERED_EVENTS: usize = 1024;

/// A protocol event (a message with a `method` and no `id`).
#[derive(Debug, Clone, PartialEq)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

impl CdpEvent {
    /// `true` if this event is `method` and belongs to `session_id`.
    #[must_use]
    pub fn is(&self, method: &str, session_id: &str) -> bool {
        self.method == method && self.session_id.as_deref() == Some(session_id)
    }
}

/// A decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Incoming {
    Response {
        id: u64,
        result: std::result::Result<Value, Value>,
    },
    Event(CdpEvent),
}

/// Decode a raw text frame. Returns `Ok(None)` for messages that are
/// neither a response nor an event.
pub(crate) fn classify(text: &str) -> Result<Option<Incoming>> {
    let message: Value = serde_json::from_str(text).context("Invalid JSON in CDP message")?;

    if let Some(id) = message.get("id").and_then(Value::as_u64) {
        let result = match message.get("error") {
            Some(error) => Err(error.clone()),
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };
        return Ok(Some(Incoming::Response { id, result }));
    }

    if let Some(method) = message.get("method").and_then(Value::as_str) {
        return Ok(Some(Incoming::Event(CdpEvent {
            method: method.to_string(),
            params: message.get("params").cloned().unwrap_or(Value::Null),
            session_id: message
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string),
        })));
    }

    Ok(None)
}

/// Build the envelope for a command.
pub(crate) fn command(id: u64, method: &str, params: Value, session_id: Option<&str>) -> Value {
    let mut envelope = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if let Some(session) = session_id {
        envelope["sessionId"] = Value::String(session.to_string());
    }
    envelope
}

/// A DevTools WebSocket connection.
pub struct CdpConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    next_id: u64,
    events: VecDeque<CdpEvent>,
}

impl CdpConnection {
    /// Connect to a `ws://` DevTools endpoint.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to DevTools at {}", url);

        // no Origin header: Chromium rejects foreign origins on the debug port
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .context("DevTools WebSocket connection failed")?;

        debug!("DevTools connected: {:?}", response.status());

        Ok(Self {
            stream,
            url: url.to_string(),
            next_id: 0,
            events: VecDeque::new(),
        })
    }

    /// Receive the next text frame. Pings are answered, other control
    /// frames are skipped. `Ok(None)` means the connection closed.
    async fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(msg)) => match msg {
                    Message::Text(text) => return Ok(Some(text)),
                    Message::Ping(data) => {
                        let _ = self.stream.send(Message::Pong(data)).await;
                    }
                    Message::Close(frame) => {
                        info!("DevTools connection closed: {:?}", frame);
                        return Ok(None);
                    }
                    Message::Binary(_) | Message::Pong(_) | Message::Frame(_) => {}
                },
                Some(Err(e)) => {
                    return Err(anyhow::Error::new(e).context("DevTools receive failed"))
                }
                None => return Ok(None),
            }
        }
    }

    /// Receive and decode the next message before `deadline`.
    async fn recv_until(&mut self, deadline: tokio::time::Instant) -> Result<Option<Incoming>> {
        let text = tokio::time::timeout_at(deadline, self.recv_text())
            .await
            .map_err(|_| anyhow!("timed out"))??
            .ok_or_else(|| anyhow!("DevTools connection to {} closed", self.url))?;
        classify(&text)
    }

    fn buffer(&mut self, event: CdpEvent) {
        if self.events.len() == MAX_BUFFERED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Send a command and wait for its response.
    ///
    /// Returns the `result` object, or an error if the browser answered with
    /// an `error` object or `timeout` expired.
    pub async fn call(
        &mut self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;

        let request = command(id, method, params, session_id);
        self.stream
            .send(Message::Text(request.to_string()))
            .await
            .with_context(|| format!("Failed to send CDP command '{method}'"))?;
        debug!("→ {} (id {})", method, id);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let incoming = self
                .recv_until(deadline)
                .await
                .with_context(|| format!("Waiting for response to '{method}' ({timeout:?})"))?;
            match incoming {
                Some(Incoming::Response { id: rid, result }) if rid == id => {
                    return result.map_err(|error| anyhow!("'{method}' failed: {error}"));
                }
                Some(Incoming::Event(event)) => self.buffer(event),
                _ => {}
            }
        }
    }

    /// Wait for the first event (buffered or new) matching `predicate`.
    pub async fn wait_event<F>(&mut self, predicate: F, timeout: Duration) -> Result<CdpEvent>
    where
        F: Fn(&CdpEvent) -> bool,
    {
        let pos = self.events.iter().position(&predicate);
        if let Some(event) = pos.and_then(|p| self.events.remove(p)) {
            return Ok(event);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(Incoming::Event(event)) = self.recv_until(deadline).await? {
                if predicate(&event) {
                    return Ok(event);
                }
                self.buffer(event);
            }
        }
    }

    /// Drop every buffered event.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Close the connection.
    pub async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .context("Failed to close DevTools connection")?;
        Ok(())
    }
}
