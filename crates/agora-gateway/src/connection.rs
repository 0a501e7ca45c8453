use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use agora_types::models::ChatMessage;

use crate::error::GatewayError;
use crate::hub::Hub;

/// Largest inbound frame accepted from a client, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// A client that sends nothing (not even a pong) for this long is dropped.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for writing a single frame to the client.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Ping period. Must be shorter than `READ_TIMEOUT` so a healthy client's
/// pong always arrives in time.
pub const PING_INTERVAL: Duration = Duration::from_secs(READ_TIMEOUT.as_secs() * 9 / 10);

/// Capacity of each connection's outbound queue. A client that falls this
/// far behind is evicted by the hub.
pub const OUTBOUND_CAPACITY: usize = 10;

pub type ConnectionId = Uuid;

/// Write half of a client's duplex channel.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

pub type OutboundSender = mpsc::Sender<Arc<ChatMessage>>;
pub type OutboundReceiver = mpsc::Receiver<Arc<ChatMessage>>;

/// Create the bounded queue the hub uses to hand live messages to a
/// connection's writer loop. The hub owns the only sender, so dropping it
/// closes the queue.
pub fn outbound_queue() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// One authenticated client.
///
/// Shared by the hub (for the history flush at registration) and by the
/// connection's reader and writer loops.
pub struct Connection {
    id: ConnectionId,
    identity: String,
    sink: Mutex<FrameSink>,
}

impl Connection {
    pub fn new(identity: impl Into<String>, sink: FrameSink) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            identity: identity.into(),
            sink: Mutex::new(sink),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Write every message in `history` to the client, in order.
    ///
    /// The sink stays locked for the whole batch so nothing (pings included)
    /// is interleaved with the replay.
    pub async fn write_history(&self, history: &[Arc<ChatMessage>]) -> Result<(), GatewayError> {
        let mut sink = self.sink.lock().await;
        for message in history {
            let frame = Message::Text(message.to_frame()?.into());
            send_with_deadline(&mut sink, frame).await?;
        }
        Ok(())
    }

    pub async fn write_message(&self, message: &ChatMessage) -> Result<(), GatewayError> {
        let frame = Message::Text(message.to_frame()?.into());
        self.send_frame(frame).await
    }

    async fn send_frame(&self, frame: Message) -> Result<(), GatewayError> {
        let mut sink = self.sink.lock().await;
        send_with_deadline(&mut sink, frame).await
    }

    /// Reader loop: turns inbound text frames into chat messages for the hub.
    ///
    /// Returns when the client closes, the transport errors, the client goes
    /// quiet for `READ_TIMEOUT`, sends an oversized frame, or the hub stops.
    pub async fn run_reader<S>(&self, mut stream: S, hub: &Hub)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        loop {
            let frame = match tokio::time::timeout(READ_TIMEOUT, stream.next()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(e))) => {
                    debug!("{} ({}) read error: {}", self.identity, self.id, e);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    info!("{} ({}) idle for {:?}, dropping connection", self.identity, self.id, READ_TIMEOUT);
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    let text = text.as_str();
                    if text.len() > MAX_MESSAGE_SIZE {
                        warn!(
                            "{} ({}) sent oversized frame ({} bytes), dropping connection",
                            self.identity,
                            self.id,
                            text.len()
                        );
                        break;
                    }

                    let message = ChatMessage::from_frame(&self.identity, text);
                    trace!("{} ({}) -> {} bytes", self.identity, self.id, message.text.len());
                    if hub.broadcast(message).await.is_err() {
                        break;
                    }
                }
                Message::Binary(data) => {
                    debug!("{} ({}) ignoring binary frame ({} bytes)", self.identity, self.id, data.len());
                }
                Message::Close(_) => break,
                // Any frame, pongs included, already reset the read deadline.
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }

    /// Writer loop: drains the outbound queue to the client and keeps the
    /// connection alive with periodic pings.
    ///
    /// Returns when the hub closes the queue, or when any write fails.
    pub async fn run_writer(self: Arc<Self>, mut outbound: OutboundReceiver) {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;

        loop {
            tokio::select! {
                message = outbound.recv() => {
                    let Some(message) = message else {
                        // Unregistered by the hub.
                        let _ = self.send_frame(Message::Close(None)).await;
                        break;
                    };

                    if let Err(e) = self.write_message(&message).await {
                        debug!("{} ({}) write failed: {}", self.identity, self.id, e);
                        break;
                    }
                }
                _ = ping.tick() => {
                    if let Err(e) = self.send_frame(Message::Ping(Vec::new().into())).await {
                        debug!("{} ({}) ping failed: {}", self.identity, self.id, e);
                        break;
                    }
                }
            }
        }
    }
}

async fn send_with_deadline(sink: &mut FrameSink, frame: Message) -> Result<(), GatewayError> {
    match tokio::time::timeout(WRITE_TIMEOUT, sink.send(frame)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(GatewayError::WriteTimeout),
    }
}
