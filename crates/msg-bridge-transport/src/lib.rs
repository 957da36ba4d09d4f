//! Transport adapter boundary for the messaging bridge.
//!
//! The protocol engine underneath (pairing, encryption, wire format) is
//! an external collaborator. This crate defines the vocabulary the
//! lifecycle manager consumes:
//! - `TransportEvent` - Challenge/open/close/credential-update events
//! - `Transport` / `TransportHandle` - Open a session, send through it
//! - `loopback` - In-process transport for development and tests
//!   (feature: loopback)

pub mod event;

#[cfg(feature = "loopback")]
pub mod loopback;

use std::sync::Arc;

use async_trait::async_trait;
use msg_bridge_core::Credentials;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

pub use event::TransportEvent;

/// Suffix the transport appends to bare phone-number recipients to form
/// a fully qualified address.
pub const DEFAULT_ADDRESS_SUFFIX: &str = "@s.whatsapp.net";

/// Capacity of the per-session event channel.
///
/// Events are consumed sequentially; the bound only guards against a
/// stalled consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Transport-level error.
///
/// No raw engine error type crosses this boundary; failures are
/// classified here before reaching the core.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No session is ready for delivery")]
    NotReady,
    #[error("Failed to open transport: {0}")]
    OpenFailed(String),
    #[error("Send rejected by transport: {0}")]
    SendRejected(String),
}

/// Acknowledgement for one delivered message.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    /// Transport-assigned message identifier.
    pub message_id: String,
    /// Delivery timestamp (Unix epoch seconds).
    pub timestamp: i64,
}

/// Factory for transport sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new session, optionally resuming from stored credentials.
    ///
    /// Returns the session handle and the event channel for this
    /// session. The channel closes when the session is torn down.
    ///
    /// # Errors
    /// Returns `TransportError::OpenFailed` if the engine refuses to
    /// start a session.
    async fn open(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<(Arc<dyn TransportHandle>, mpsc::Receiver<TransportEvent>), TransportError>;
}

/// Handle to one open transport session.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Deliver a message to a fully qualified recipient address.
    ///
    /// # Errors
    /// Returns `TransportError::NotReady` if the session is not open, or
    /// `TransportError::SendRejected` if the engine refuses delivery.
    async fn send(&self, recipient: &str, body: &str) -> Result<DeliveryReceipt, TransportError>;

    /// Identifier of the account this session is authenticated as.
    ///
    /// `None` until the session has opened.
    fn identity(&self) -> Option<String>;

    /// Pairing material currently held by the session, if any.
    fn credentials(&self) -> Option<Credentials>;
}
