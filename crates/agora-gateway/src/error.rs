use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("delivery failed: {0}")]
    Delivery(DeliveryFailure),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error("websocket write failed: {0}")]
    Transport(#[from] axum::Error),

    #[error("websocket write timed out")]
    WriteTimeout,

    #[error("failed to encode frame: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("hub is no longer running")]
    HubClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("outbound queue is closed")]
    QueueClosed,
}

impl<T> From<TrySendError<T>> for GatewayError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Self::Delivery(DeliveryFailure::QueueFull),
            TrySendError::Closed(_) => Self::Delivery(DeliveryFailure::QueueClosed),
        }
    }
}
