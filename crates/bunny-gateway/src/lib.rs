//! bunny-gateway - HTTP surface Slack talks to
//!
//! Three Slack endpoints (Events API, slash commands, interactive
//! components) plus a health check. Every request is checked against the
//! app's verification token, acknowledged right away, and queued as an
//! [`IncomingEvent`]; replies go out later through the channel adapter.

pub mod payload;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bunny_core::IncomingEvent;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use payload::{EventEnvelope, InteractionForm, InteractionPayload, SlashCommandForm, extract_message_event};

/// Slack sets this on redeliveries of events we were slow to acknowledge
const RETRY_HEADER: &str = "x-slack-retry-num";

#[derive(Clone)]
pub struct GatewayState {
    verify_token: Arc<str>,
    events: mpsc::Sender<IncomingEvent>,
}

impl GatewayState {
    pub fn new(verify_token: impl Into<String>, events: mpsc::Sender<IncomingEvent>) -> Self {
        Self {
            verify_token: Arc::from(verify_token.into()),
            events,
        }
    }

    fn verify(&self, token: &str) -> bool {
        !self.verify_token.is_empty() && token == &*self.verify_token
    }

    async fn enqueue(&self, event: IncomingEvent) -> StatusCode {
        debug!("Queueing {} event", event.kind());
        match self.events.send(event).await {
            Ok(()) => StatusCode::OK,
            Err(e) => {
                error!("Event bus closed, dropping {} event", e.0.kind());
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .route("/slack/commands", post(slack_commands))
        .route("/slack/actions", post(slack_actions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `cancel` fires
pub async fn serve(listener: TcpListener, state: GatewayState, cancel: CancellationToken) -> anyhow::Result<()> {
    info!("Slack gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("Slack gateway stopped");
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn slack_events(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(envelope): Json<EventEnvelope>,
) -> Response {
    if !state.verify(&envelope.token) {
        warn!("Rejected Events API request with bad token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match envelope.kind.as_str() {
        "url_verification" => Json(json!({ "challenge": envelope.challenge })).into_response(),
        "event_callback" => {
            if let Some(retry) = headers.get(RETRY_HEADER) {
                debug!("Skipping Slack redelivery (retry {:?})", retry);
                return StatusCode::OK.into_response();
            }
            match extract_message_event(&envelope) {
                Some(event) => state.enqueue(event).await.into_response(),
                None => StatusCode::OK.into_response(),
            }
        }
        other => {
            debug!("Ignoring Events API request of type {}", other);
            StatusCode::OK.into_response()
        }
    }
}

async fn slack_commands(
    State(state): State<GatewayState>,
    Form(form): Form<SlashCommandForm>,
) -> StatusCode {
    if !state.verify(&form.token) {
        warn!("Rejected slash command with bad token");
        return StatusCode::UNAUTHORIZED;
    }
    state.enqueue(form.into_event()).await
}

async fn slack_actions(
    State(state): State<GatewayState>,
    Form(form): Form<InteractionForm>,
) -> StatusCode {
    let payload: InteractionPayload = match serde_json::from_str(&form.payload) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Malformed interaction payload: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    if !state.verify(&payload.token) {
        warn!("Rejected interaction with bad token");
        return StatusCode::UNAUTHORIZED;
    }

    match payload.into_event() {
        Some(event) => state.enqueue(event).await,
        None => StatusCode::OK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    const FORM: &str = "application/x-www-form-urlencoded";

    fn app() -> (Router, mpsc::Receiver<IncomingEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (router(GatewayState::new("verify-me", tx)), rx)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_form(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", FORM)
            .body(Body::from(body))
            .unwrap()
    }

    /// Minimal form encoding for the characters these tests use
    fn encode(value: &str) -> String {
        value
            .replace('%', "%25")
            .replace('&', "%26")
            .replace('=', "%3D")
            .replace('+', "%2B")
            .replace('"', "%22")
            .replace(' ', "+")
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _rx) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_url_verification() {
        let (app, _rx) = app();
        let response = app
            .oneshot(post_json(
                "/slack/events",
                json!({"token": "verify-me", "type": "url_verification", "challenge": "abc123"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["challenge"], "abc123");
    }

    #[tokio::test]
    async fn test_event_callback_queues_message() {
        let (app, mut rx) = app();
        let response = app
            .oneshot(post_json(
                "/slack/events",
                json!({
                    "token": "verify-me",
                    "type": "event_callback",
                    "team_id": "T1",
                    "event": {"type": "message", "user": "U1", "channel": "C1", "text": "hello"}
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().kind(), "message");
    }

    #[tokio::test]
    async fn test_mention_delivered_twice_is_queued_once() {
        let (app, mut rx) = app();
        for kind in ["message", "app_mention"] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/slack/events",
                    json!({
                        "token": "verify-me",
                        "type": "event_callback",
                        "team_id": "T1",
                        "event": {
                            "type": kind,
                            "user": "U1",
                            "channel": "C1",
                            "text": "<@UBOT> wallet login crashes",
                            "ts": "1515449522.000016"
                        }
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(rx.recv().await.unwrap().kind(), "message");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retries_are_acknowledged_but_not_queued() {
        let (app, mut rx) = app();
        let mut request = post_json(
            "/slack/events",
            json!({
                "token": "verify-me",
                "type": "event_callback",
                "team_id": "T1",
                "event": {"type": "message", "user": "U1", "channel": "C1", "text": "hello"}
            }),
        );
        request
            .headers_mut()
            .insert(RETRY_HEADER, "1".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bad_token_rejected() {
        let (app, mut rx) = app();
        let response = app
            .oneshot(post_form(
                "/slack/commands",
                "token=wrong&team_id=T1&channel_id=C1&user_id=U1&text=help".to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slash_command_queued() {
        let (app, mut rx) = app();
        let body = format!(
            "token=verify-me&team_id=T1&channel_id=C1&user_id=U1&user_name=ann&command=%2Fbunny&text={}&response_url={}",
            encode("bug wallet \"login crashes\""),
            encode("https://hooks.slack.test/commands/1"),
        );
        let response = app.oneshot(post_form("/slack/commands", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        match rx.recv().await.unwrap() {
            IncomingEvent::Command {
                text,
                user_name,
                response_url,
                ..
            } => {
                assert_eq!(text, "bug wallet \"login crashes\"");
                assert_eq!(user_name, "ann");
                assert_eq!(response_url, "https://hooks.slack.test/commands/1");
            }
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_action_queued() {
        let (app, mut rx) = app();
        let payload = json!({
            "type": "interactive_message",
            "token": "verify-me",
            "callback_id": "yesno_callback",
            "actions": [{"name": "answer", "value": "no"}],
            "team": {"id": "T1"},
            "channel": {"id": "C1"},
            "user": {"id": "U1", "name": "ann"},
            "response_url": "https://hooks.slack.test/actions/1"
        });
        let body = format!("payload={}", encode(&payload.to_string()));
        let response = app.oneshot(post_form("/slack/actions", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        match rx.recv().await.unwrap() {
            IncomingEvent::Action { value, .. } => assert_eq!(value, "no"),
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_action_payload() {
        let (app, _rx) = app();
        let response = app
            .oneshot(post_form("/slack/actions", "payload=not-json".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_closed_bus_returns_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let app = router(GatewayState::new("verify-me", tx));
        let response = app
            .oneshot(post_form(
                "/slack/commands",
                "token=verify-me&text=help".to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
