//! Ticket creation through an outbound webhook
//!
//! Each project has an IFTTT applet listening for `<type>_<project>_trello`
//! that turns the three values into a Trello card.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::catalog::ProjectId;
use crate::error::DispatchError;
use crate::ticket::TicketType;

pub const IFTTT_BASE_URL: &str = "https://maker.ifttt.com";

/// Fires a named event with up to three positional values
#[async_trait]
pub trait WebhookTrigger: Send + Sync {
    async fn trigger(&self, event: &str, values: [String; 3]) -> Result<(), DispatchError>;
}

#[derive(Debug, Serialize)]
struct MakerValues<'a> {
    value1: &'a str,
    value2: &'a str,
    value3: &'a str,
}

/// IFTTT Maker webhooks
pub struct IftttMaker {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

impl IftttMaker {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
        })
    }
}

#[async_trait]
impl WebhookTrigger for IftttMaker {
    async fn trigger(&self, event: &str, values: [String; 3]) -> Result<(), DispatchError> {
        // the maker key is part of the path, so transport errors must not carry the URL
        let url = format!("{}/trigger/{}/with/key/{}", self.base_url, event, self.key);
        let [value1, value2, value3] = &values;
        let response = self
            .http
            .post(&url)
            .json(&MakerValues {
                value1,
                value2,
                value3,
            })
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                event: event.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Proof that the webhook accepted the event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub event: String,
}

pub struct TicketDispatcher {
    trigger: Arc<dyn WebhookTrigger>,
}

impl TicketDispatcher {
    pub fn new(trigger: Arc<dyn WebhookTrigger>) -> Self {
        Self { trigger }
    }

    pub fn event_name(ticket_type: TicketType, project: &ProjectId) -> String {
        format!("{}_{}_trello", ticket_type, project)
    }

    /// Fire the webhook once. No retry and no deduplication: calling this
    /// twice files two tickets.
    pub async fn create_ticket(
        &self,
        ticket_type: TicketType,
        project: &ProjectId,
        description: &str,
        requesting_user: &str,
    ) -> Result<Ack, DispatchError> {
        let event = Self::event_name(ticket_type, project);
        let values = [
            description.to_string(),
            requesting_user.to_string(),
            String::new(),
        ];

        match self.trigger.trigger(&event, values).await {
            Ok(()) => {
                info!("Webhook {} accepted (requested by {})", event, requesting_user);
                Ok(Ack { event })
            }
            Err(e) => {
                error!("Webhook {} failed: {}", event, e);
                Err(e)
            }
        }
    }
}
