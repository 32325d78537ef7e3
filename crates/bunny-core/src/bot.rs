//! Event routing: the decision flow from an inbound Slack event to replies
//! and ticket side effects.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::ProjectCatalog;
use crate::command::{CommandOutcome, help_text, parse_command};
use crate::confirmation::{
    Answer, CALLBACK_ID, ConfirmationStore, DECLINE_TEXT, REPROMPT_TEXT, Resolution,
    confirmation_prompt, confirmed_text,
};
use crate::dispatcher::TicketDispatcher;
use crate::error::ValidationError;
use crate::interpreter::{IntentInterpreter, InterpretedResult};
use crate::types::{ConversationKey, IncomingEvent, MessageBody, OutgoingMessage};

pub const COMMAND_DONE_TEXT: &str = "Done!";

pub struct Bot {
    catalog: Arc<ProjectCatalog>,
    interpreter: IntentInterpreter,
    confirmations: Arc<ConfirmationStore>,
    dispatcher: TicketDispatcher,
    bot_user_id: Option<String>,
}

impl Bot {
    pub fn new(
        catalog: Arc<ProjectCatalog>,
        interpreter: IntentInterpreter,
        confirmations: Arc<ConfirmationStore>,
        dispatcher: TicketDispatcher,
    ) -> Self {
        Self {
            catalog,
            interpreter,
            confirmations,
            dispatcher,
            bot_user_id: None,
        }
    }

    /// Messages authored by this user id are ignored
    pub fn with_bot_user_id(mut self, bot_user_id: Option<String>) -> Self {
        self.bot_user_id = bot_user_id;
        self
    }

    pub fn confirmations(&self) -> &Arc<ConfirmationStore> {
        &self.confirmations
    }

    pub async fn handle(&self, event: IncomingEvent) -> Vec<OutgoingMessage> {
        self.handle_at(event, Utc::now()).await
    }

    /// Handle `event` as if it arrived at `now`
    pub async fn handle_at(&self, event: IncomingEvent, now: DateTime<Utc>) -> Vec<OutgoingMessage> {
        let key = event.conversation_key();
        debug!("Handling {} from {}", event.kind(), key);

        match event {
            IncomingEvent::Command {
                channel_id,
                user_id,
                user_name,
                text,
                response_url,
                ..
            } => {
                let requester = if user_name.is_empty() { user_id } else { user_name };
                self.handle_command(&channel_id, &requester, &text, &response_url)
                    .await
            }
            IncomingEvent::Message { text, .. } => self.handle_message(key, &text, now).await,
            IncomingEvent::Action {
                callback_id,
                value,
                response_url,
                ..
            } => {
                self.handle_action(&key, &callback_id, &value, &response_url, now)
                    .await
            }
        }
    }

    async fn handle_command(
        &self,
        channel_id: &str,
        requester: &str,
        text: &str,
        response_url: &str,
    ) -> Vec<OutgoingMessage> {
        let reply = match parse_command(&self.catalog, text, requester) {
            CommandOutcome::Help => help_text(&self.catalog),
            CommandOutcome::Invalid(ValidationError::MissingFields) => format!(
                "{}\n{}",
                ValidationError::MissingFields,
                help_text(&self.catalog)
            ),
            CommandOutcome::Invalid(e) => {
                info!("Rejected /bunny command in {}: {:?}", channel_id, e);
                e.to_string()
            }
            CommandOutcome::Ticket(command) => {
                // the reply does not depend on the webhook outcome, which is logged by the dispatcher
                let _ = self
                    .dispatcher
                    .create_ticket(
                        command.verb,
                        &command.project,
                        &command.description,
                        &command.requesting_user,
                    )
                    .await;
                COMMAND_DONE_TEXT.to_string()
            }
        };

        vec![OutgoingMessage::respond(
            response_url,
            MessageBody::Text(reply),
            false,
        )]
    }

    async fn handle_message(&self, key: ConversationKey, text: &str, now: DateTime<Utc>) -> Vec<OutgoingMessage> {
        if self.bot_user_id.as_deref() == Some(key.user_id.as_str()) {
            return Vec::new();
        }

        if self.confirmations.rearm(&key, now) {
            debug!("{} typed instead of clicking, re-prompting", key);
            return vec![OutgoingMessage::say(
                &key.channel_id,
                MessageBody::text(REPROMPT_TEXT),
            )];
        }

        match self.interpreter.interpret(&key, text).await {
            InterpretedResult::Reply(body) => vec![OutgoingMessage::say(&key.channel_id, body)],
            InterpretedResult::Proposal(proposal) => {
                let prompt = confirmation_prompt(&proposal);
                let channel_id = key.channel_id.clone();
                self.confirmations.open(key, proposal, now);
                vec![OutgoingMessage::say(channel_id, prompt)]
            }
            InterpretedResult::Rejected(e) => {
                vec![OutgoingMessage::say(&key.channel_id, MessageBody::text(e.to_string()))]
            }
            // NLU failures were logged by the interpreter and get no reply
            InterpretedResult::Nothing | InterpretedResult::Failed(_) => Vec::new(),
        }
    }

    async fn handle_action(
        &self,
        key: &ConversationKey,
        callback_id: &str,
        value: &str,
        response_url: &str,
        now: DateTime<Utc>,
    ) -> Vec<OutgoingMessage> {
        if callback_id != CALLBACK_ID {
            debug!("Ignoring click with unknown callback {}", callback_id);
            return Vec::new();
        }

        match self.confirmations.resolve(key, Answer::from_value(value), now) {
            Resolution::Confirmed(proposal) => {
                let _ = self
                    .dispatcher
                    .create_ticket(
                        proposal.ticket_type,
                        &proposal.project,
                        &proposal.description,
                        &proposal.requesting_user,
                    )
                    .await;
                vec![OutgoingMessage::respond(
                    response_url,
                    MessageBody::Text(confirmed_text(&proposal)),
                    true,
                )]
            }
            Resolution::Declined(_) => vec![OutgoingMessage::respond(
                response_url,
                MessageBody::text(DECLINE_TEXT),
                true,
            )],
            Resolution::Stale => {
                debug!("No live confirmation for {}, dropping click", key);
                Vec::new()
            }
        }
    }
}
