//! Event and message types shared by the gateway, the bus, and the bot

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Chat platforms the bus can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Slack,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Slack => write!(f, "slack"),
        }
    }
}

/// Identifies whose answer a pending confirmation is waiting for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
}

impl ConversationKey {
    pub fn new(
        team_id: impl Into<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.team_id, self.channel_id, self.user_id)
    }
}

/// An event delivered by the chat platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncomingEvent {
    /// Free text typed in a channel or DM the bot can see
    Message {
        team_id: String,
        channel_id: String,
        user_id: String,
        text: String,
    },
    /// `/bunny ...` slash command
    Command {
        team_id: String,
        channel_id: String,
        user_id: String,
        user_name: String,
        text: String,
        response_url: String,
    },
    /// Interactive button click
    Action {
        team_id: String,
        channel_id: String,
        user_id: String,
        user_name: String,
        callback_id: String,
        value: String,
        response_url: String,
    },
}

impl IncomingEvent {
    pub fn conversation_key(&self) -> ConversationKey {
        match self {
            IncomingEvent::Message {
                team_id,
                channel_id,
                user_id,
                ..
            }
            | IncomingEvent::Command {
                team_id,
                channel_id,
                user_id,
                ..
            }
            | IncomingEvent::Action {
                team_id,
                channel_id,
                user_id,
                ..
            } => ConversationKey::new(team_id, channel_id, user_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IncomingEvent::Message { .. } => "message",
            IncomingEvent::Command { .. } => "command",
            IncomingEvent::Action { .. } => "action",
        }
    }
}

/// Body of an outgoing message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text(String),
    /// Raw Slack message payload (`text`, `attachments`, `blocks`, ...)
    Rich(Value),
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        MessageBody::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(text) => Some(text),
            MessageBody::Rich(_) => None,
        }
    }

    /// JSON object ready to be extended with routing fields.
    /// Rich payloads that are not objects yield `None`.
    pub fn to_payload(&self) -> Option<serde_json::Map<String, Value>> {
        match self {
            MessageBody::Text(text) => match json!({ "text": text }) {
                Value::Object(map) => Some(map),
                _ => None,
            },
            MessageBody::Rich(Value::Object(map)) => Some(map.clone()),
            MessageBody::Rich(_) => None,
        }
    }
}

/// A reply the bot wants delivered
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    /// Post into a channel as the bot user
    Say { channel_id: String, body: MessageBody },
    /// Answer through a slash-command or interaction `response_url`
    Respond {
        response_url: String,
        body: MessageBody,
        delete_original: bool,
    },
}

impl OutgoingMessage {
    pub fn say(channel_id: impl Into<String>, body: MessageBody) -> Self {
        OutgoingMessage::Say {
            channel_id: channel_id.into(),
            body,
        }
    }

    pub fn respond(response_url: impl Into<String>, body: MessageBody, delete_original: bool) -> Self {
        OutgoingMessage::Respond {
            response_url: response_url.into(),
            body,
            delete_original,
        }
    }

    pub fn channel(&self) -> ChannelType {
        ChannelType::Slack
    }

    pub fn body(&self) -> &MessageBody {
        match self {
            OutgoingMessage::Say { body, .. } | OutgoingMessage::Respond { body, .. } => body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_key_from_events() {
        let message = IncomingEvent::Message {
            team_id: "T1".to_string(),
            channel_id: "C1".to_string(),
            user_id: "U1".to_string(),
            text: "hi".to_string(),
        };
        let click = IncomingEvent::Action {
            team_id: "T1".to_string(),
            channel_id: "C1".to_string(),
            user_id: "U1".to_string(),
            user_name: "ann".to_string(),
            callback_id: "yesno_callback".to_string(),
            value: "yes".to_string(),
            response_url: "https://hooks.slack.test/1".to_string(),
        };

        assert_eq!(message.conversation_key(), click.conversation_key());
        assert_eq!(message.conversation_key().to_string(), "T1/C1/U1");
        assert_eq!(click.kind(), "action");
    }

    #[test]
    fn test_message_body_payload() {
        let text = MessageBody::text("hello");
        assert_eq!(text.to_payload().unwrap()["text"], "hello");

        let rich = MessageBody::Rich(json!({"text": "hi", "attachments": []}));
        assert!(rich.to_payload().unwrap().contains_key("attachments"));
        assert!(rich.as_text().is_none());

        assert!(MessageBody::Rich(json!(["not", "an", "object"])).to_payload().is_none());
    }

    #[test]
    fn test_incoming_event_serialization() {
        let event = IncomingEvent::Message {
            team_id: "T1".to_string(),
            channel_id: "C1".to_string(),
            user_id: "U1".to_string(),
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "message");

        let back: IncomingEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
