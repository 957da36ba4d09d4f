//! Route handlers and router assembly.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use msg_bridge_gateway::{GatewayError, MessageGateway, OutboundMessageRequest};
use msg_bridge_session::LifecycleManager;
use qrcode::{QrCode, render::unicode};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle manager queried for readiness snapshots.
    pub manager: LifecycleManager,
    /// Gateway delegated to for outbound sends.
    pub gateway: MessageGateway,
}

/// Build the bridge's router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/qr", get(qr))
        .route("/send-message", post(send_message))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let connection = state.manager.state();
    let status = if connection.is_ready() { "ok" } else { "starting" };
    Json(json!({
        "status": status,
        "message": format!("messaging session is {connection}"),
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.manager.snapshot();
    let status = if snapshot.state.is_ready() {
        "connected"
    } else {
        "disconnected"
    };
    Json(json!({
        "status": status,
        "user": snapshot.identity,
    }))
}

async fn qr(State(state): State<AppState>) -> Response {
    let snapshot = state.manager.snapshot();
    if snapshot.state.is_ready() {
        return Json(json!({"status": "connected"})).into_response();
    }
    match snapshot.challenge {
        Some(challenge) => match render_challenge(&challenge.code) {
            Ok(qr_code) => Json(json!({
                "status": "scan_required",
                "qr_code": qr_code,
            }))
            .into_response(),
            Err(e) => {
                tracing::error!("failed to render pairing challenge: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Failed to render QR code."})),
                )
                    .into_response()
            }
        },
        None => Json(json!({"status": "connecting"})).into_response(),
    }
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<OutboundMessageRequest>,
) -> Response {
    match state.gateway.send(&request).await {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(e) => {
            let status = match &e {
                GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
                GatewayError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
                GatewayError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}

/// Render the raw challenge as a terminal-scannable unicode QR image.
fn render_challenge(code: &str) -> Result<String, qrcode::types::QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr.render::<unicode::Dense1x2>().quiet_zone(false).build())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, header};
    use msg_bridge_core::ConnectionState;
    use msg_bridge_session::{LifecycleManager, MemoryStore};
    use msg_bridge_transport::loopback::{LoopbackControl, LoopbackTransport};
    use tower::ServiceExt;

    use super::*;

    fn setup() -> (Router, LifecycleManager, LoopbackControl) {
        let (transport, control) = LoopbackTransport::new();
        let manager = LifecycleManager::new(Arc::new(transport), Arc::new(MemoryStore::new()));
        let gateway = MessageGateway::new(manager.clone());
        let app = router(AppState {
            manager: manager.clone(),
            gateway,
        });
        (app, manager, control)
    }

    async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn wait_for_state(manager: &LifecycleManager, state: ConnectionState) {
        let mut rx = manager.subscribe();
        rx.wait_for(|snap| snap.state == state).await.unwrap();
    }

    #[tokio::test]
    async fn status_reports_disconnected_before_connect() {
        let (app, _manager, _control) = setup();
        let (status, body) = get_json(&app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "disconnected");
        assert_eq!(body["user"], Value::Null);
    }

    #[tokio::test]
    async fn qr_reports_connecting_without_a_challenge() {
        let (app, manager, _control) = setup();
        manager.connect();
        wait_for_state(&manager, ConnectionState::Connecting).await;

        let (status, body) = get_json(&app, "/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "connecting");
    }

    #[tokio::test]
    async fn send_message_rejects_missing_fields() {
        let (app, _manager, _control) = setup();
        let (status, body) = post_json(&app, "/send-message", json!({"to": "123"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("message"));

        let (status, _) = post_json(&app, "/send-message", json!({"message": "hi"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn send_message_is_unavailable_until_ready() {
        let (app, manager, _control) = setup();
        manager.connect();
        wait_for_state(&manager, ConnectionState::Connecting).await;

        let (status, _) =
            post_json(&app, "/send-message", json!({"to": "123", "message": "hi"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn delivery_failure_maps_to_internal_error() {
        let (app, manager, control) = setup();
        manager.connect();
        control.open_session("owner@s.whatsapp.net").await;
        wait_for_state(&manager, ConnectionState::Ready).await;

        control.set_fail_sends(true);
        let (status, _) =
            post_json(&app, "/send-message", json!({"to": "123", "message": "hi"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn fresh_start_pairing_and_delivery_end_to_end() {
        let (app, manager, control) = setup();

        // Fresh store: Disconnected -> Connecting -> AwaitingChallenge.
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        manager.connect();
        wait_for_state(&manager, ConnectionState::Connecting).await;
        control.issue_challenge("pair-with-me").await;
        wait_for_state(&manager, ConnectionState::AwaitingChallenge).await;

        let (status, body) = get_json(&app, "/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "scan_required");
        assert!(!body["qr_code"].as_str().unwrap().is_empty());

        // Scan happens; the session opens.
        control.open_session("5511000000000@s.whatsapp.net").await;
        wait_for_state(&manager, ConnectionState::Ready).await;

        let (status, body) = get_json(&app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "connected");
        assert_eq!(body["user"], "5511000000000@s.whatsapp.net");

        let (status, body) = get_json(&app, "/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "connected");

        let (status, body) =
            post_json(&app, "/send-message", json!({"to": "123", "message": "hi"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let sent = control.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "123@s.whatsapp.net");
        assert_eq!(sent[0].body, "hi");
    }

    #[tokio::test]
    async fn root_reflects_readiness() {
        let (app, manager, control) = setup();
        let (status, body) = get_json(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "starting");

        manager.connect();
        control.open_session("owner@s.whatsapp.net").await;
        wait_for_state(&manager, ConnectionState::Ready).await;

        let (_, body) = get_json(&app, "/").await;
        assert_eq!(body["status"], "ok");
    }
}
