//! Connection lifecycle management for the messaging bridge.
//!
//! Provides:
//! - `LifecycleManager` - The state machine that owns session readiness
//! - Credential store implementations (memory, filesystem)

pub mod manager;
pub mod store;

pub use manager::LifecycleManager;
pub use store::{FsStore, MemoryStore};
