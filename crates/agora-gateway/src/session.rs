use axum::extract::ws::{Message, WebSocket};
use futures_util::{Stream, StreamExt};
use tracing::{info, warn};

use crate::connection::{Connection, FrameSink, outbound_queue};
use crate::hub::Hub;

/// Serve an upgraded, already-authenticated WebSocket for `identity`.
///
/// Returns once the connection's reader loop has finished.
pub async fn run_session(socket: WebSocket, hub: Hub, identity: String) {
    let (sender, receiver) = socket.split();
    serve_connection(Box::pin(sender), receiver, hub, identity).await;
}

/// Transport-independent part of [`run_session`].
///
/// Registers the connection (the hub replays history first), spawns the
/// writer loop and runs the reader loop in place. Whichever loop ends first
/// ends the connection, and it is unregistered exactly once on the way out.
pub async fn serve_connection<S>(sink: FrameSink, stream: S, hub: Hub, identity: String)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let connection = Connection::new(identity, sink);
    let (outbound_tx, outbound_rx) = outbound_queue();

    if let Err(e) = hub.register(connection.clone(), outbound_tx).await {
        warn!("{} ({}) could not join: {}", connection.identity(), connection.id(), e);
        return;
    }
    info!("{} ({}) connected", connection.identity(), connection.id());

    let mut writer = tokio::spawn(connection.clone().run_writer(outbound_rx));

    tokio::select! {
        _ = connection.run_reader(stream, &hub) => {}
        _ = &mut writer => {}
    }

    // Closing the outbound queue also winds the writer down if it is still
    // running.
    let _ = hub.unregister(connection.id()).await;
    info!("{} ({}) disconnected", connection.identity(), connection.id());
}
