pub mod connection;
pub mod error;
pub mod hub;
pub mod session;

#[cfg(test)]
mod test_support;

pub use connection::{Connection, ConnectionId};
pub use error::{DeliveryFailure, GatewayError};
pub use hub::{Hub, HubSnapshot};
