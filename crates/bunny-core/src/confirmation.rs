//! Yes/no confirmation of ticket proposals
//!
//! A conversation (team, channel, user) has at most one pending
//! confirmation. It is either awaiting an answer or gone: resolving it,
//! replacing it, or letting it expire all remove the entry. Expiry is
//! checked whenever the entry is touched, and the [`Sweep`] impl lets the
//! scheduler clean up entries nobody comes back for.

use bunny_scheduler::Sweep;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::ticket::TicketProposal;
use crate::types::{ConversationKey, MessageBody};

pub const CALLBACK_ID: &str = "yesno_callback";
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

pub const REPROMPT_TEXT: &str = "Please choose a Yes or No button :wink:";
pub const DECLINE_TEXT: &str = "No problem! Maybe later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Anything but an explicit "yes" declines
    pub fn from_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("yes") {
            Answer::Yes
        } else {
            Answer::No
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Confirmed(TicketProposal),
    Declined(TicketProposal),
    /// No live confirmation for this conversation (never opened, already
    /// answered, or expired)
    Stale,
}

#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub proposal: TicketProposal,
    pub expires_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct ConfirmationStore {
    pending: DashMap<ConversationKey, PendingConfirmation>,
    window: chrono::Duration,
}

impl ConfirmationStore {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(60)),
        }
    }

    /// Start waiting for an answer, replacing any earlier proposal for `key`
    pub fn open(&self, key: ConversationKey, proposal: TicketProposal, now: DateTime<Utc>) -> DateTime<Utc> {
        let expires_at = now + self.window;
        debug!("Awaiting confirmation from {} until {}", key, expires_at);
        self.pending.insert(
            key,
            PendingConfirmation {
                proposal,
                expires_at,
            },
        );
        expires_at
    }

    /// Restart the window for a live confirmation. Returns false when there
    /// is nothing live to re-arm.
    pub fn rearm(&self, key: &ConversationKey, now: DateTime<Utc>) -> bool {
        // remove_if drops the guard before returning, so no deadlock with get_mut below
        if self.pending.remove_if(key, |_, p| p.is_expired(now)).is_some() {
            debug!("Confirmation for {} expired", key);
            return false;
        }
        match self.pending.get_mut(key) {
            Some(mut pending) => {
                pending.expires_at = now + self.window;
                true
            }
            None => false,
        }
    }

    pub fn is_awaiting(&self, key: &ConversationKey, now: DateTime<Utc>) -> bool {
        self.pending
            .get(key)
            .is_some_and(|p| !p.is_expired(now))
    }

    /// Take the pending proposal for `key` and apply `answer`. Only the
    /// first resolution of a confirmation sees it.
    pub fn resolve(&self, key: &ConversationKey, answer: Answer, now: DateTime<Utc>) -> Resolution {
        let Some((_, pending)) = self.pending.remove(key) else {
            return Resolution::Stale;
        };
        if pending.is_expired(now) {
            debug!("Late answer from {} ignored", key);
            return Resolution::Stale;
        }
        match answer {
            Answer::Yes => Resolution::Confirmed(pending.proposal),
            Answer::No => Resolution::Declined(pending.proposal),
        }
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| !p.is_expired(now));
        before.saturating_sub(self.pending.len())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for ConfirmationStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Sweep for ConfirmationStore {
    fn name(&self) -> &str {
        "confirmations"
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.sweep_expired(now)
    }
}

fn button(text: &str, value: &str) -> Value {
    json!({
        "name": "answer",
        "text": text,
        "type": "button",
        "value": value,
    })
}

/// The yes/no prompt posted for a proposal
pub fn confirmation_prompt(proposal: &TicketProposal) -> MessageBody {
    MessageBody::Rich(json!({
        "text": format!(
            "Do you want to create a {} ticket for {}?",
            proposal.ticket_type, proposal.project
        ),
        "attachments": [{
            "text": "",
            "fallback": "Yes or No?",
            "callback_id": CALLBACK_ID,
            "actions": [button("Yes", "yes"), button("No", "no")],
        }],
    }))
}

pub fn confirmed_text(proposal: &TicketProposal) -> String {
    format!(
        "Done! Your {} ticket for {} is on its way.",
        proposal.ticket_type, proposal.project
    )
}
