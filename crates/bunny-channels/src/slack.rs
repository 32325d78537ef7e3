//! Slack channel adapter
//!
//! Inbound: runs the HTTP gateway that Slack's Events API, slash commands
//! and interactive buttons post to. Outbound: `Say` goes through the Web
//! API's `chat.postMessage` as the bot user, `Respond` is POSTed to the
//! `response_url` Slack handed us with the command or click.

use crate::bus::MessageChannel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bunny_core::config::BunnyConfig;
use bunny_core::{ChannelType, IncomingEvent, MessageBody, OutgoingMessage};
use bunny_gateway::GatewayState;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack {method} failed: {error}")]
    Slack { method: &'static str, error: String },

    #[error("response_url rejected the reply with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("reply payload is not a JSON object: {0}")]
    MalformedReply(String),
}

impl ChannelError {
    /// Slack refused what we sent, as opposed to never receiving it
    fn is_rendering(&self) -> bool {
        !matches!(self, ChannelError::Http(_))
    }
}

#[derive(Debug, Clone)]
pub struct SlackChannelConfig {
    /// `host:port` the gateway listens on
    pub bind_addr: String,
    pub api_base: String,
    pub bot_token: String,
    pub verify_token: String,
    pub http_timeout: Duration,
}

impl SlackChannelConfig {
    pub fn from_config(config: &BunnyConfig) -> Self {
        Self {
            bind_addr: format!("{}:{}", config.server.host, config.server.port),
            api_base: config.slack.api_base.trim_end_matches('/').to_string(),
            bot_token: config.slack.bot_token.clone(),
            verify_token: config.slack.verify_token.clone(),
            http_timeout: config.http_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackChannel {
    config: SlackChannelConfig,
    http: reqwest::Client,
    cancel: CancellationToken,
    local_addr: OnceLock<SocketAddr>,
}

impl SlackChannel {
    /// The gateway shuts down when `cancel` fires
    pub fn new(config: SlackChannelConfig, cancel: CancellationToken) -> Result<Self, ChannelError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            cancel,
            local_addr: OnceLock::new(),
        })
    }

    /// Address the gateway is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    async fn deliver(&self, msg: &OutgoingMessage, body: &MessageBody) -> Result<(), ChannelError> {
        let mut payload = body
            .to_payload()
            .ok_or_else(|| ChannelError::MalformedReply(format!("{:?}", body)))?;

        match msg {
            OutgoingMessage::Say { channel_id, .. } => {
                payload.insert("channel".to_string(), Value::String(channel_id.clone()));
                self.post_message(payload).await
            }
            OutgoingMessage::Respond {
                response_url,
                delete_original,
                ..
            } => {
                if *delete_original {
                    payload.insert("delete_original".to_string(), Value::Bool(true));
                }
                self.post_response(response_url, payload).await
            }
        }
    }

    async fn post_message(&self, payload: Map<String, Value>) -> Result<(), ChannelError> {
        let url = format!("{}/chat.postMessage", self.config.api_base);
        debug!("POST {}", url);

        let reply: WebApiResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.config.bot_token)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if !reply.ok {
            return Err(ChannelError::Slack {
                method: "chat.postMessage",
                error: reply.error.unwrap_or_else(|| "unknown_error".to_string()),
            });
        }
        Ok(())
    }

    async fn post_response(&self, response_url: &str, payload: Map<String, Value>) -> Result<(), ChannelError> {
        debug!("POST response_url");
        let response = self
            .http
            .post(response_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageChannel for SlackChannel {
    async fn start(&self, tx: mpsc::Sender<IncomingEvent>) -> Result<()> {
        if self.config.bot_token.is_empty() {
            warn!("Slack bot token missing, replies will fail");
        }

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("binding Slack gateway to {}", self.config.bind_addr))?;
        let addr = listener.local_addr()?;
        if self.local_addr.set(addr).is_err() {
            warn!("Slack channel started twice, now also listening on {}", addr);
        }

        let state = GatewayState::new(self.config.verify_token.clone(), tx);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = bunny_gateway::serve(listener, state, cancel).await {
                error!("Slack gateway failed: {}", e);
            }
        });

        info!("Slack channel listening on {}", addr);
        Ok(())
    }

    async fn send(&self, msg: OutgoingMessage) -> Result<()> {
        match self.deliver(&msg, msg.body()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_rendering() && matches!(msg.body(), MessageBody::Rich(_)) => {
                warn!("Rich reply refused ({}), sending the error as text", e);
                self.deliver(&msg, &MessageBody::text(e.to_string())).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Slack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    async fn post_message(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != "Bearer xoxb-test" {
            return Json(json!({"ok": false, "error": "invalid_auth"}));
        }
        let refuse = body.get("attachments").is_some_and(|a| a == "bad");
        captured
            .lock()
            .unwrap()
            .push(("chat.postMessage".to_string(), body));
        if refuse {
            Json(json!({"ok": false, "error": "invalid_attachments"}))
        } else {
            Json(json!({"ok": true}))
        }
    }

    async fn respond(State(captured): State<Captured>, Json(body): Json<Value>) -> StatusCode {
        captured.lock().unwrap().push(("respond".to_string(), body));
        StatusCode::OK
    }

    async fn gone() -> StatusCode {
        StatusCode::NOT_FOUND
    }

    async fn spawn_fake_slack() -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/chat.postMessage", post(post_message))
            .route("/respond", post(respond))
            .route("/gone", post(gone))
            .with_state(captured.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    fn channel(base: &str) -> SlackChannel {
        SlackChannel::new(
            SlackChannelConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                api_base: format!("{}/api", base),
                bot_token: "xoxb-test".to_string(),
                verify_token: "verify-me".to_string(),
                http_timeout: Duration::from_secs(5),
            },
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_say_posts_message() {
        let (base, captured) = spawn_fake_slack().await;
        channel(&base)
            .send(OutgoingMessage::say("C1", MessageBody::text("hello")))
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].1["channel"], "C1");
        assert_eq!(captured[0].1["text"], "hello");
    }

    #[tokio::test]
    async fn test_refused_rich_reply_falls_back_to_text() {
        let (base, captured) = spawn_fake_slack().await;
        channel(&base)
            .send(OutgoingMessage::say(
                "C1",
                MessageBody::Rich(json!({"text": "pick one", "attachments": "bad"})),
            ))
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 2);
        let fallback = captured[1].1["text"].as_str().unwrap();
        assert!(fallback.contains("invalid_attachments"));
        assert!(captured[1].1.get("attachments").is_none());
    }

    #[tokio::test]
    async fn test_refused_text_reply_is_an_error() {
        let (base, _captured) = spawn_fake_slack().await;
        let mut config = channel(&base).config;
        config.bot_token = "xoxb-wrong".to_string();
        let channel = SlackChannel::new(config, CancellationToken::new()).unwrap();

        let err = channel
            .send(OutgoingMessage::say("C1", MessageBody::text("hello")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_auth"));
    }

    #[tokio::test]
    async fn test_respond_with_delete_original() {
        let (base, captured) = spawn_fake_slack().await;
        channel(&base)
            .send(OutgoingMessage::respond(
                format!("{}/respond", base),
                MessageBody::text("No problem! Maybe later."),
                true,
            ))
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured[0].0, "respond");
        assert_eq!(captured[0].1["delete_original"], true);
        assert_eq!(captured[0].1["text"], "No problem! Maybe later.");
    }

    #[tokio::test]
    async fn test_respond_keeps_original_by_default() {
        let (base, captured) = spawn_fake_slack().await;
        channel(&base)
            .send(OutgoingMessage::respond(
                format!("{}/respond", base),
                MessageBody::text("Done!"),
                false,
            ))
            .await
            .unwrap();
        assert!(captured.lock().unwrap()[0].1.get("delete_original").is_none());
    }

    #[tokio::test]
    async fn test_malformed_rich_reply_sends_error_text() {
        let (base, captured) = spawn_fake_slack().await;
        channel(&base)
            .send(OutgoingMessage::respond(
                format!("{}/respond", base),
                MessageBody::Rich(json!(["not", "an", "object"])),
                false,
            ))
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].1["text"].as_str().unwrap().contains("not a JSON object"));
    }

    #[tokio::test]
    async fn test_expired_response_url_is_an_error() {
        let (base, _captured) = spawn_fake_slack().await;
        let result = channel(&base)
            .send(OutgoingMessage::respond(
                format!("{}/gone", base),
                MessageBody::text("Done!"),
                false,
            ))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_serves_gateway() {
        let cancel = CancellationToken::new();
        let slack = SlackChannel::new(
            SlackChannelConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                api_base: "http://127.0.0.1:9/api".to_string(),
                bot_token: "xoxb-test".to_string(),
                verify_token: "verify-me".to_string(),
                http_timeout: Duration::from_secs(5),
            },
            cancel.clone(),
        )
        .unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        slack.start(tx).await.unwrap();
        let addr = slack.local_addr().unwrap();

        let http = reqwest::Client::new();
        let health: Value = http
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let status = http
            .post(format!("http://{}/slack/commands", addr))
            .form(&[
                ("token", "verify-me"),
                ("team_id", "T1"),
                ("channel_id", "C1"),
                ("user_id", "U1"),
                ("user_name", "ann"),
                ("text", "help"),
                ("response_url", "https://hooks.slack.test/1"),
            ])
            .send()
            .await
            .unwrap()
            .status();
        assert!(status.is_success());
        assert_eq!(rx.recv().await.unwrap().kind(), "command");

        cancel.cancel();
    }
}
