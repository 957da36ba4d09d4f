//! Outbound message gateway.
//!
//! Validates and normalizes send requests, then forwards them through
//! the lifecycle manager's ready session. No delivery is attempted while
//! the session is not ready.

use msg_bridge_session::LifecycleManager;
use msg_bridge_transport::{DEFAULT_ADDRESS_SUFFIX, DeliveryReceipt, TransportError};
use serde::Deserialize;
use thiserror::Error;

/// One outbound send request.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundMessageRequest {
    /// Recipient: raw phone-number-like string or fully qualified
    /// address.
    #[serde(default)]
    pub to: String,
    /// Message body.
    #[serde(default)]
    pub message: String,
}

/// Gateway error taxonomy surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or missing request fields; never retried.
    #[error("Invalid request: {0}")]
    Validation(String),
    /// The session is not ready; the caller may retry later.
    #[error("Messaging session is not ready")]
    NotReady,
    /// The transport rejected the send; not retried by the bridge.
    #[error("Delivery failed: {0}")]
    Delivery(#[from] TransportError),
}

/// Normalize a recipient into the transport's address convention.
///
/// A recipient that already carries the address suffix passes through
/// unchanged; anything else is reduced to its digits and suffixed.
///
/// # Errors
/// Returns `GatewayError::Validation` if the recipient contains no
/// digits to address.
pub fn normalize_recipient(raw: &str) -> Result<String, GatewayError> {
    if raw.contains(DEFAULT_ADDRESS_SUFFIX) {
        return Ok(raw.to_string());
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(GatewayError::Validation(format!(
            "recipient {raw:?} has no digits to address"
        )));
    }
    Ok(format!("{digits}{DEFAULT_ADDRESS_SUFFIX}"))
}

/// Validates and forwards outbound sends, gated on session readiness.
#[derive(Clone)]
pub struct MessageGateway {
    manager: LifecycleManager,
}

impl MessageGateway {
    /// Create a gateway over the given lifecycle manager.
    #[must_use]
    pub fn new(manager: LifecycleManager) -> Self {
        Self { manager }
    }

    /// Deliver one message through the ready session.
    ///
    /// # Errors
    /// - `Validation` for missing/empty fields or an unaddressable
    ///   recipient
    /// - `NotReady` while the session is not ready
    /// - `Delivery` when the transport rejects the send
    pub async fn send(
        &self,
        request: &OutboundMessageRequest,
    ) -> Result<DeliveryReceipt, GatewayError> {
        if request.to.trim().is_empty() {
            return Err(GatewayError::Validation("missing \"to\"".into()));
        }
        if request.message.is_empty() {
            return Err(GatewayError::Validation("missing \"message\"".into()));
        }

        let recipient = normalize_recipient(&request.to)?;
        let handle = self.manager.ready_handle().ok_or(GatewayError::NotReady)?;

        let receipt = handle.send(&recipient, &request.message).await?;
        tracing::debug!(%recipient, message_id = %receipt.message_id, "message delivered");
        Ok(receipt)
    }
}
