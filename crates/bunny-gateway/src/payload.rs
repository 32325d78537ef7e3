//! Slack request payloads and their conversion into [`IncomingEvent`]s

use bunny_core::IncomingEvent;
use serde::Deserialize;
use serde_json::Value;

/// Form body of a slash command invocation
#[derive(Debug, Clone, Deserialize)]
pub struct SlashCommandForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub response_url: String,
}

impl SlashCommandForm {
    pub fn into_event(self) -> IncomingEvent {
        IncomingEvent::Command {
            team_id: self.team_id,
            channel_id: self.channel_id,
            user_id: self.user_id,
            user_name: self.user_name,
            text: self.text,
            response_url: self.response_url,
        }
    }
}

/// Interactive components post a single `payload` form field holding JSON
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Legacy interactive message callback (attachment buttons)
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub actions: Vec<ActionRef>,
    #[serde(default)]
    pub team: IdRef,
    #[serde(default)]
    pub channel: IdRef,
    #[serde(default)]
    pub user: IdRef,
    #[serde(default)]
    pub response_url: String,
}

impl InteractionPayload {
    /// `None` when the payload carries no action to act on
    pub fn into_event(self) -> Option<IncomingEvent> {
        let action = self.actions.into_iter().next()?;
        Some(IncomingEvent::Action {
            team_id: self.team.id,
            channel_id: self.channel.id,
            user_id: self.user.id,
            user_name: self.user.name,
            callback_id: self.callback_id,
            value: action.value,
            response_url: self.response_url,
        })
    }
}

/// Outer Events API envelope
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub event: Value,
}

/// Turn an `event_callback` envelope into a message event.
///
/// Only user-authored `message` events with text count. Slack also sends an
/// `app_mention` for every channel message that mentions the bot; those
/// duplicate a `message` event and are skipped, as are edits, joins and
/// other subtypes, and anything posted by a bot.
pub fn extract_message_event(envelope: &EventEnvelope) -> Option<IncomingEvent> {
    let event = &envelope.event;
    let event_type = event.get("type").and_then(Value::as_str)?;
    if event_type != "message" {
        return None;
    }
    if event.get("subtype").is_some() || event.get("bot_id").is_some() {
        return None;
    }

    let text = event.get("text").and_then(Value::as_str)?;
    if text.trim().is_empty() {
        return None;
    }
    let user = event.get("user").and_then(Value::as_str)?;
    let channel = event.get("channel").and_then(Value::as_str)?;
    let team = event
        .get("team")
        .and_then(Value::as_str)
        .unwrap_or(&envelope.team_id);

    Some(IncomingEvent::Message {
        team_id: team.to_string(),
        channel_id: channel.to_string(),
        user_id: user.to_string(),
        text: text.to_string(),
    })
}
