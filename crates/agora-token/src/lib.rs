/// Agora token authority.
///
/// Credentials are PASETO-style local tokens: the JSON payload is sealed with
/// AES-256-GCM under one process-wide symmetric key, so the token is both
/// opaque to clients and tamper-evident. Access and refresh credentials are
/// issued by the same authority with different validity windows.

pub mod authority;
pub mod error;
pub mod keys;

pub use authority::{Payload, TokenAuthority};
pub use error::TokenError;
