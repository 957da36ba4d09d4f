//! The connection lifecycle state machine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use msg_bridge_core::{
    ConnectionState, CredentialStore, PairingChallenge, StateSnapshot, unix_now,
};
use msg_bridge_transport::{Transport, TransportEvent, TransportHandle};
use tokio::sync::watch;
use uuid::Uuid;

/// Fixed delay before reconnecting after a transient disconnect.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// One logical connection attempt.
///
/// Fully replaced on every (re)connect; a prior session's handle is
/// never reused.
struct ActiveSession {
    id: Uuid,
    created_at: i64,
    handle: Option<Arc<dyn TransportHandle>>,
}

struct Inner {
    state: ConnectionState,
    challenge: Option<PairingChallenge>,
    session: Option<ActiveSession>,
}

impl Inner {
    fn is_current(&self, session_id: Uuid) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session_id)
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    reconnect_delay: Duration,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<StateSnapshot>,
}

impl Shared {
    /// Publish a whole snapshot while still holding the state lock, so
    /// readers observe either the pre- or post-transition view.
    fn publish_locked(&self, inner: &Inner) {
        let identity = if inner.state.is_ready() {
            inner
                .session
                .as_ref()
                .and_then(|s| s.handle.as_ref())
                .and_then(|h| h.identity())
        } else {
            None
        };
        self.snapshot_tx.send_replace(StateSnapshot {
            state: inner.state,
            challenge: inner.challenge.clone(),
            identity,
        });
    }
}

/// Owns the connection state machine for the process lifetime.
///
/// Cheap to clone; all clones share the same state. Transport events are
/// consumed sequentially by a per-session driver task, and every
/// transition happens under one exclusive lock, so concurrent HTTP
/// readers always see a consistent state/challenge/identity triple.
#[derive(Clone)]
pub struct LifecycleManager {
    shared: Arc<Shared>,
}

impl LifecycleManager {
    /// Create a manager with the default 5 second reconnect delay.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        Self::with_reconnect_delay(transport, store, RECONNECT_DELAY)
    }

    /// Create a manager with an explicit reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        reconnect_delay: Duration,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(StateSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                transport,
                store,
                reconnect_delay,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    challenge: None,
                    session: None,
                }),
                snapshot_tx,
            }),
        }
    }

    /// Start a connection attempt.
    ///
    /// Fire-and-forget: the transport is opened and driven on a
    /// background task. Idempotent while a session is already in flight;
    /// returns the state the manager is in after the call.
    pub fn connect(&self) -> ConnectionState {
        let session_id = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state != ConnectionState::Disconnected {
                tracing::debug!(state = %inner.state, "connect is a no-op while a session is in flight");
                return inner.state;
            }
            let session = ActiveSession {
                id: Uuid::new_v4(),
                created_at: unix_now(),
                handle: None,
            };
            let session_id = session.id;
            inner.state = ConnectionState::Connecting;
            inner.challenge = None;
            inner.session = Some(session);
            self.shared.publish_locked(&inner);
            session_id
        };

        tracing::info!(%session_id, "opening transport session");
        let driver = self.clone();
        tokio::spawn(async move { driver.drive(session_id).await });
        ConnectionState::Connecting
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.snapshot_tx.borrow().state
    }

    /// Live pairing challenge, if one is awaiting a scan.
    #[must_use]
    pub fn challenge(&self) -> Option<PairingChallenge> {
        self.shared.snapshot_tx.borrow().challenge.clone()
    }

    /// Session owner identifier; non-empty only while `Ready`.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        self.shared.snapshot_tx.borrow().identity.clone()
    }

    /// Point-in-time view of state, challenge, and identity.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot updates; one value per transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Handle of the ready session, or `None` while delivery is not
    /// permitted.
    #[must_use]
    pub fn ready_handle(&self) -> Option<Arc<dyn TransportHandle>> {
        let inner = self.shared.inner.lock().unwrap();
        if inner.state.is_ready() {
            inner.session.as_ref().and_then(|s| s.handle.clone())
        } else {
            None
        }
    }

    /// Drive one session: open the transport, then consume its events in
    /// order until the session closes or is superseded.
    async fn drive(self, session_id: Uuid) {
        let credentials = match self.shared.store.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!("failed to load credentials, pairing from scratch: {e}");
                None
            }
        };

        let (handle, mut events) = match self.shared.transport.open(credentials).await {
            Ok(opened) => opened,
            Err(e) => {
                tracing::warn!(%session_id, "transport open failed: {e}");
                self.handle_closed(session_id, &e.to_string(), false).await;
                return;
            }
        };

        if !self.attach_handle(session_id, &handle) {
            // Superseded while opening; the stale handle is dropped.
            return;
        }

        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::ChallengeIssued(code) => self.handle_challenge(session_id, code),
                TransportEvent::Opened => self.handle_opened(session_id, &handle).await,
                TransportEvent::CredentialsUpdated(credentials) => {
                    if let Err(e) = self.shared.store.save(&credentials).await {
                        tracing::warn!("failed to persist rotated credentials: {e}");
                    }
                }
                TransportEvent::Closed { cause, permanent } => {
                    self.handle_closed(session_id, &cause, permanent).await;
                    return;
                }
            }
        }

        // The engine tore the channel down without a close event; a
        // stale Ready would strand the process with a dead handle.
        self.handle_closed(session_id, "event stream ended", false)
            .await;
    }

    fn attach_handle(&self, session_id: Uuid, handle: &Arc<dyn TransportHandle>) -> bool {
        let mut inner = self.shared.inner.lock().unwrap();
        match inner.session.as_mut() {
            Some(session) if session.id == session_id => {
                session.handle = Some(Arc::clone(handle));
                true
            }
            _ => false,
        }
    }

    fn handle_challenge(&self, session_id: Uuid, code: String) {
        let mut inner = self.shared.inner.lock().unwrap();
        if !inner.is_current(session_id) {
            return;
        }
        match inner.state {
            ConnectionState::Connecting | ConnectionState::AwaitingChallenge => {
                inner.state = ConnectionState::AwaitingChallenge;
                inner.challenge = Some(PairingChallenge::new(code));
                self.shared.publish_locked(&inner);
                tracing::info!("pairing challenge issued; waiting for scan");
            }
            state => {
                tracing::debug!(%state, "ignoring challenge outside the pairing window");
            }
        }
    }

    async fn handle_opened(&self, session_id: Uuid, handle: &Arc<dyn TransportHandle>) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if !inner.is_current(session_id) {
                return;
            }
            inner.state = ConnectionState::Ready;
            inner.challenge = None;
            self.shared.publish_locked(&inner);
        }
        tracing::info!(identity = ?handle.identity(), "session opened");

        // Persisted before the next event is processed; a failure here is
        // survivable, the next connect just re-pairs.
        if let Some(credentials) = handle.credentials() {
            if let Err(e) = self.shared.store.save(&credentials).await {
                tracing::warn!("failed to persist credentials: {e}");
            }
        }
    }

    async fn handle_closed(&self, session_id: Uuid, cause: &str, permanent: bool) {
        let lived_secs = {
            let mut inner = self.shared.inner.lock().unwrap();
            if !inner.is_current(session_id) {
                return;
            }
            let session = inner.session.take();
            inner.state = ConnectionState::Disconnected;
            inner.challenge = None;
            self.shared.publish_locked(&inner);
            session.map(|s| unix_now() - s.created_at)
        };

        if permanent {
            tracing::warn!(%cause, lived_secs, "remote terminated pairing; clearing credentials");
            if let Err(e) = self.shared.store.clear().await {
                tracing::warn!("failed to clear credentials: {e}");
            }
        } else {
            tracing::warn!(
                %cause,
                lived_secs,
                delay = ?self.shared.reconnect_delay,
                "transient disconnect; scheduling reconnect"
            );
            let manager = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(manager.shared.reconnect_delay).await;
                manager.connect();
            });
        }
    }
}
