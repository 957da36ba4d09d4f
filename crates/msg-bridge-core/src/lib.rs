//! Core abstractions for the messaging bridge.
//!
//! This crate provides the fundamental building blocks:
//! - `ConnectionState` - Typed session readiness
//! - `PairingChallenge` / `StateSnapshot` - What HTTP readers observe
//! - `Credentials` and the `CredentialStore` persistence contract

pub mod credentials;
pub mod state;

pub use credentials::{CredentialStore, Credentials, StoreError};
pub use state::{ConnectionState, PairingChallenge, StateSnapshot};

/// Current Unix timestamp in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
