//! Connection state and the snapshot readers observe.

use serde::{Deserialize, Serialize};

use crate::unix_now;

/// Readiness of the session held against the messaging transport.
///
/// Exactly one value holds at any instant; owned exclusively by the
/// lifecycle manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session; nothing in flight.
    #[default]
    Disconnected,
    /// A session was created and the transport is being opened.
    Connecting,
    /// The transport issued a pairing challenge and is waiting for the
    /// end user to authorize the session.
    AwaitingChallenge,
    /// The session is established; outbound delivery is permitted.
    Ready,
}

impl ConnectionState {
    /// Whether outbound message delivery is permitted.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingChallenge => "awaiting_challenge",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// One-time pairing code presented to the end user to authorize a new
/// session.
///
/// At most one challenge is live at a time; a newer challenge fully
/// replaces an older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingChallenge {
    /// Raw challenge payload as issued by the transport.
    pub code: String,
    /// Issue timestamp (Unix epoch seconds).
    pub issued_at: i64,
}

impl PairingChallenge {
    /// Create a challenge stamped with the current time.
    #[must_use]
    pub fn new<S: Into<String>>(code: S) -> Self {
        Self {
            code: code.into(),
            issued_at: unix_now(),
        }
    }
}

/// Point-in-time view of the lifecycle manager.
///
/// Published whole on every transition, so concurrent readers observe
/// either the pre- or post-transition state, never a torn mix.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    /// Current connection state.
    pub state: ConnectionState,
    /// Live pairing challenge, non-empty only while `AwaitingChallenge`.
    pub challenge: Option<PairingChallenge>,
    /// Session owner identifier, non-empty only while `Ready`.
    pub identity: Option<String>,
}
