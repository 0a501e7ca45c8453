use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use agora_db::Repository;
use agora_types::models::ChatMessage;

use crate::connection::{Connection, ConnectionId, OutboundSender};
use crate::error::GatewayError;

/// Capacity of the hub's event queue. Producers wait when it is full.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Everything the hub can be asked to do. All kinds share one queue so
/// events are handled strictly in submission order.
enum HubEvent {
    Register {
        connection: Arc<Connection>,
        outbound: OutboundSender,
    },
    Unregister(ConnectionId),
    Broadcast(ChatMessage),
    /// Read-only query, answered in queue order.
    Snapshot(oneshot::Sender<HubSnapshot>),
}

/// Point-in-time view of the hub's state.
#[derive(Debug, Clone)]
pub struct HubSnapshot {
    pub connections: Vec<ConnectionId>,
    pub history: Vec<ChatMessage>,
}

impl HubSnapshot {
    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains(&id)
    }
}

/// Handle to the broadcast hub.
///
/// The registry of live connections and the message history are owned by a
/// single task; handles only send events to it.
#[derive(Clone)]
pub struct Hub {
    events: mpsc::Sender<HubEvent>,
}

impl Hub {
    /// Start the hub task. History is loaded from `repo` before the first
    /// event is handled.
    pub fn spawn(repo: Arc<dyn Repository>) -> Self {
        let (events, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        tokio::spawn(run(repo, rx));
        Self { events }
    }

    /// Replay history to `connection`, then add it to the registry. If the
    /// replay fails the connection is never registered and `outbound` is
    /// closed.
    pub async fn register(
        &self,
        connection: Arc<Connection>,
        outbound: OutboundSender,
    ) -> Result<(), GatewayError> {
        self.send(HubEvent::Register { connection, outbound }).await
    }

    /// Remove a connection and close its outbound queue. Unknown ids are
    /// ignored.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), GatewayError> {
        self.send(HubEvent::Unregister(id)).await
    }

    pub async fn broadcast(&self, message: ChatMessage) -> Result<(), GatewayError> {
        self.send(HubEvent::Broadcast(message)).await
    }

    /// Copy of the registry ids and history as of this point in the event
    /// queue. For introspection and tests; nothing on the chat path needs it.
    pub async fn snapshot(&self) -> Result<HubSnapshot, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubEvent::Snapshot(tx)).await?;
        rx.await.map_err(|_| GatewayError::HubClosed)
    }

    async fn send(&self, event: HubEvent) -> Result<(), GatewayError> {
        self.events
            .send(event)
            .await
            .map_err(|_| GatewayError::HubClosed)
    }
}

struct Member {
    connection: Arc<Connection>,
    outbound: OutboundSender,
}

struct HubState {
    repo: Arc<dyn Repository>,
    members: HashMap<ConnectionId, Member>,
    history: Vec<Arc<ChatMessage>>,
}

async fn run(repo: Arc<dyn Repository>, mut events: mpsc::Receiver<HubEvent>) {
    let history = load_history(repo.clone()).await;
    info!("Hub started with {} messages of history", history.len());

    let mut state = HubState {
        repo,
        members: HashMap::new(),
        history,
    };

    while let Some(event) = events.recv().await {
        match event {
            HubEvent::Register { connection, outbound } => state.register(connection, outbound).await,
            HubEvent::Unregister(id) => state.unregister(id),
            HubEvent::Broadcast(message) => state.broadcast(message),
            HubEvent::Snapshot(reply) => {
                let _ = reply.send(state.snapshot());
            }
        }
    }

    debug!("Hub event queue closed, stopping");
}

/// Best effort: a failed load starts the hub with empty history.
async fn load_history(repo: Arc<dyn Repository>) -> Vec<Arc<ChatMessage>> {
    match tokio::task::spawn_blocking(move || repo.list_messages()).await {
        Ok(Ok(rows)) => rows
            .into_iter()
            .map(|row| Arc::new(ChatMessage::new(row.author, row.text)))
            .collect(),
        Ok(Err(e)) => {
            warn!("Failed to load message history, starting empty: {:#}", e);
            Vec::new()
        }
        Err(e) => {
            error!("History load task failed: {}", e);
            Vec::new()
        }
    }
}

impl HubState {
    async fn register(&mut self, connection: Arc<Connection>, outbound: OutboundSender) {
        if let Err(e) = connection.write_history(&self.history).await {
            warn!(
                "{} ({}) history replay failed, not registering: {}",
                connection.identity(),
                connection.id(),
                e
            );
            return;
        }

        debug!(
            "{} ({}) registered after replaying {} messages",
            connection.identity(),
            connection.id(),
            self.history.len()
        );
        self.members
            .insert(connection.id(), Member { connection, outbound });
    }

    fn unregister(&mut self, id: ConnectionId) {
        // Dropping the member drops the only sender, closing the queue.
        if let Some(member) = self.members.remove(&id) {
            debug!("{} ({}) unregistered", member.connection.identity(), id);
        }
    }

    fn broadcast(&mut self, message: ChatMessage) {
        let message = Arc::new(message);
        self.history.push(message.clone());
        self.persist(&message);

        self.members.retain(|id, member| {
            match member.outbound.try_send(message.clone()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "{} ({}) evicted: {}",
                        member.connection.identity(),
                        id,
                        GatewayError::from(e)
                    );
                    false
                }
            }
        });
    }

    /// Fire-and-forget write to the repository. Failures are logged and never
    /// touch in-memory state.
    fn persist(&self, message: &Arc<ChatMessage>) {
        let repo = self.repo.clone();
        let message = message.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = repo.add_message(&message.author, &message.text) {
                warn!("{}", GatewayError::Persistence(e));
            }
        });
    }

    fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            connections: self.members.keys().copied().collect(),
            history: self.history.iter().map(|m| (**m).clone()).collect(),
        }
    }
}
