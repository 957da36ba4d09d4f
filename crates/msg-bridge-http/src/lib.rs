//! HTTP API surface for the messaging bridge.
//!
//! Stateless JSON handlers over the lifecycle manager's snapshot:
//! - `GET /` - Readiness banner
//! - `GET /status` - Connection state and session owner
//! - `GET /qr` - Pairing challenge rendered as a scannable QR code
//! - `POST /send-message` - Outbound delivery through the gateway

pub mod routes;

pub use routes::{AppState, router};
