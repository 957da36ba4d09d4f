//! In-process transport for development and tests.
//!
//! Useful wherever the real protocol engine is not linked: the paired
//! `LoopbackControl` scripts challenge/open/close/credential events and
//! records everything sent through the session.

use std::sync::{Arc, Mutex};

use std::pin::pin;

use async_trait::async_trait;
use msg_bridge_core::{Credentials, unix_now};
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use crate::{
    DeliveryReceipt, EVENT_CHANNEL_CAPACITY, Transport, TransportError, TransportEvent,
    TransportHandle,
};

/// One message recorded by the loopback transport.
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Fully qualified recipient address.
    pub recipient: String,
    /// Message body.
    pub body: String,
}

#[derive(Default)]
struct State {
    event_tx: Option<mpsc::Sender<TransportEvent>>,
    identity: Option<String>,
    credentials: Option<Credentials>,
    sent: Vec<SentMessage>,
    open_count: u32,
    last_open_resumed: bool,
    fail_sends: bool,
}

struct Shared {
    state: Mutex<State>,
    opened: Notify,
}

/// In-process stand-in for the external protocol engine.
pub struct LoopbackTransport {
    shared: Arc<Shared>,
}

impl LoopbackTransport {
    /// Create a transport and the control used to script it.
    #[must_use]
    pub fn new() -> (Self, LoopbackControl) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            opened: Notify::new(),
        });
        let control = LoopbackControl {
            shared: Arc::clone(&shared),
        };
        (Self { shared }, control)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn open(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<(Arc<dyn TransportHandle>, mpsc::Receiver<TransportEvent>), TransportError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let mut state = self.shared.state.lock().unwrap();
        state.open_count += 1;
        state.last_open_resumed = credentials.is_some();
        state.identity = None;
        if let Some(credentials) = credentials {
            state.credentials = Some(credentials);
        }
        state.event_tx = Some(tx);
        drop(state);
        self.shared.opened.notify_waiters();

        let handle = Arc::new(LoopbackHandle {
            shared: Arc::clone(&self.shared),
        });
        Ok((handle, rx))
    }
}

struct LoopbackHandle {
    shared: Arc<Shared>,
}

#[async_trait]
impl TransportHandle for LoopbackHandle {
    async fn send(&self, recipient: &str, body: &str) -> Result<DeliveryReceipt, TransportError> {
        let mut state = self.shared.state.lock().unwrap();
        if state.identity.is_none() {
            return Err(TransportError::NotReady);
        }
        if state.fail_sends {
            return Err(TransportError::SendRejected("simulated failure".into()));
        }
        state.sent.push(SentMessage {
            recipient: recipient.to_string(),
            body: body.to_string(),
        });
        Ok(DeliveryReceipt {
            message_id: Uuid::new_v4().to_string(),
            timestamp: unix_now(),
        })
    }

    fn identity(&self) -> Option<String> {
        self.shared.state.lock().unwrap().identity.clone()
    }

    fn credentials(&self) -> Option<Credentials> {
        self.shared.state.lock().unwrap().credentials.clone()
    }
}

/// Scripts the loopback transport from tests or a local dev shell.
#[derive(Clone)]
pub struct LoopbackControl {
    shared: Arc<Shared>,
}

impl LoopbackControl {
    async fn emit(&self, event: TransportEvent) {
        // Scripted events may race the session open; wait until the
        // event channel exists. The waiter is enabled before the check
        // so an open between the two cannot be missed.
        let tx = loop {
            let mut opened = pin!(self.shared.opened.notified());
            opened.as_mut().enable();
            if let Some(tx) = self.shared.state.lock().unwrap().event_tx.clone() {
                break tx;
            }
            opened.await;
        };
        if tx.send(event).await.is_err() {
            tracing::debug!("loopback event dropped; session receiver gone");
        }
    }

    /// Issue a pairing challenge to the current session.
    pub async fn issue_challenge(&self, code: &str) {
        self.emit(TransportEvent::ChallengeIssued(code.to_string()))
            .await;
    }

    /// Mark the session authenticated as `identity` and emit `Opened`.
    pub async fn open_session(&self, identity: &str) {
        self.shared.state.lock().unwrap().identity = Some(identity.to_string());
        self.emit(TransportEvent::Opened).await;
    }

    /// Rotate pairing material and emit the corresponding event.
    pub async fn update_credentials(&self, credentials: Credentials) {
        self.shared.state.lock().unwrap().credentials = Some(credentials.clone());
        self.emit(TransportEvent::CredentialsUpdated(credentials))
            .await;
    }

    /// Seed pairing material without emitting an event.
    pub fn set_credentials(&self, credentials: Credentials) {
        self.shared.state.lock().unwrap().credentials = Some(credentials);
    }

    /// Tear the session down with a transient cause.
    pub async fn close_session(&self, cause: &str) {
        self.close(cause, false).await;
    }

    /// Tear the session down as a remote-initiated logout.
    pub async fn log_out(&self) {
        self.close("logged out", true).await;
    }

    async fn close(&self, cause: &str, permanent: bool) {
        self.emit(TransportEvent::closed(cause, permanent)).await;
        let mut state = self.shared.state.lock().unwrap();
        state.identity = None;
        state.event_tx = None;
    }

    /// Drop the session's event channel without emitting `Closed`, as
    /// an engine teardown would.
    pub fn drop_session(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.identity = None;
        state.event_tx = None;
    }

    /// Make subsequent sends fail with `SendRejected`.
    pub fn set_fail_sends(&self, fail: bool) {
        self.shared.state.lock().unwrap().fail_sends = fail;
    }

    /// Messages delivered through the session so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.shared.state.lock().unwrap().sent.clone()
    }

    /// How many sessions have been opened against this transport.
    #[must_use]
    pub fn open_count(&self) -> u32 {
        self.shared.state.lock().unwrap().open_count
    }

    /// Whether the most recent open was handed stored credentials.
    #[must_use]
    pub fn last_open_resumed(&self) -> bool {
        self.shared.state.lock().unwrap().last_open_resumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_in_order() {
        let (transport, control) = LoopbackTransport::new();
        let (_handle, mut events) = transport.open(None).await.unwrap();

        control.issue_challenge("pair-me").await;
        control.open_session("owner@s.whatsapp.net").await;

        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::ChallengeIssued(code)) if code == "pair-me"
        ));
        assert!(matches!(events.recv().await, Some(TransportEvent::Opened)));
    }

    #[tokio::test]
    async fn scripted_events_wait_for_the_session_to_open() {
        let (transport, control) = LoopbackTransport::new();

        let scripted = {
            let control = control.clone();
            tokio::spawn(async move { control.issue_challenge("early").await })
        };
        tokio::task::yield_now().await;

        let (_handle, mut events) = transport.open(None).await.unwrap();
        scripted.await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::ChallengeIssued(code)) if code == "early"
        ));
    }

    #[tokio::test]
    async fn send_requires_open_session() {
        let (transport, control) = LoopbackTransport::new();
        let (handle, _events) = transport.open(None).await.unwrap();

        assert!(matches!(
            handle.send("123@s.whatsapp.net", "hi").await,
            Err(TransportError::NotReady)
        ));

        control.open_session("owner@s.whatsapp.net").await;
        let receipt = handle.send("123@s.whatsapp.net", "hi").await.unwrap();
        assert!(!receipt.message_id.is_empty());
        assert_eq!(control.sent().len(), 1);
        assert_eq!(control.sent()[0].recipient, "123@s.whatsapp.net");
    }

    #[tokio::test]
    async fn open_records_credential_resumption() {
        let (transport, control) = LoopbackTransport::new();
        let _ = transport.open(None).await.unwrap();
        assert!(!control.last_open_resumed());

        let _ = transport
            .open(Some(Credentials::new(b"blob".to_vec())))
            .await
            .unwrap();
        assert!(control.last_open_resumed());
        assert_eq!(control.open_count(), 2);
    }
}
