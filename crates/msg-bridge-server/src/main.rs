//! Messaging bridge server.
//!
//! Keeps one session to the messaging transport alive for the process
//! lifetime and exposes it over HTTP.
//!
//! Environment:
//! - `PORT` - HTTP listener port (default 3000)
//! - `AUTH_DIR` - credential persistence root (default `auth_state`)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use msg_bridge_core::CredentialStore;
use msg_bridge_gateway::MessageGateway;
use msg_bridge_http::{AppState, router};
use msg_bridge_session::{FsStore, LifecycleManager};
use msg_bridge_transport::loopback::LoopbackTransport;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_AUTH_DIR: &str = "auth_state";

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let port = match std::env::var("PORT") {
        Ok(raw) => raw.parse().context("invalid PORT")?,
        Err(_) => DEFAULT_PORT,
    };
    let auth_dir =
        std::env::var("AUTH_DIR").unwrap_or_else(|_| DEFAULT_AUTH_DIR.to_string());

    let store: Arc<dyn CredentialStore> = Arc::new(FsStore::new(&auth_dir));

    // Stand-in engine until a real protocol engine is linked; the
    // control is dropped, so the session stays in pairing until then.
    let (transport, _control) = LoopbackTransport::new();

    let manager = LifecycleManager::new(Arc::new(transport), store);
    manager.connect();

    let gateway = MessageGateway::new(manager.clone());
    let app = router(AppState {
        manager,
        gateway,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%auth_dir, "messaging bridge listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
