//! Event vocabulary delivered by a transport session.

use msg_bridge_core::Credentials;

/// Lifecycle event emitted by an open transport session.
///
/// Events arrive on a bounded channel and must be consumed in order: a
/// challenge must never be applied after an open or close that happened
/// later in wall-clock time.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The engine issued a pairing challenge for the end user to scan.
    ///
    /// May be emitted repeatedly; each issue supersedes the previous
    /// challenge.
    ChallengeIssued(String),
    /// The session is established and authenticated.
    Opened,
    /// The session was torn down.
    ///
    /// `permanent` is true only when the remote intentionally terminated
    /// pairing (logged out); every other cause is transient and eligible
    /// for automatic reconnection.
    Closed {
        /// Human-readable close cause, for logging.
        cause: String,
        /// Remote-initiated pairing termination.
        permanent: bool,
    },
    /// The engine rotated pairing material; must be persisted before the
    /// next event is processed.
    CredentialsUpdated(Credentials),
}

impl TransportEvent {
    /// Convenience constructor for close events.
    #[must_use]
    pub fn closed<S: Into<String>>(cause: S, permanent: bool) -> Self {
        Self::Closed {
            cause: cause.into(),
            permanent,
        }
    }
}
