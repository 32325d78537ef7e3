//! Free-text message → NLU → classified result

use bunny_store::{KeyValueStore, StorePath};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::catalog::ProjectCatalog;
use crate::context::{build_contexts, normalize_utterance};
use crate::error::{NluError, ValidationError};
use crate::nlu::{NluClient, NluRequest, NluResult};
use crate::session::SessionStore;
use crate::ticket::{TicketProposal, TicketType};
use crate::types::{ConversationKey, MessageBody};

pub const DEFAULT_LANG: &str = "en";

#[derive(Debug)]
pub enum InterpretedResult {
    /// Send this straight back to the channel
    Reply(MessageBody),
    /// Ask the user to confirm a ticket
    Proposal(TicketProposal),
    /// The NLU picked out a project that is not in the catalog
    Rejected(ValidationError),
    /// Nothing worth answering
    Nothing,
    /// The NLU call failed; already logged
    Failed(NluError),
}

pub struct IntentInterpreter {
    nlu: Arc<dyn NluClient>,
    sessions: Arc<dyn SessionStore>,
    store: Arc<dyn KeyValueStore>,
    catalog: Arc<ProjectCatalog>,
    bot_user_id: Option<String>,
    lang: String,
}

impl IntentInterpreter {
    pub fn new(
        nlu: Arc<dyn NluClient>,
        sessions: Arc<dyn SessionStore>,
        store: Arc<dyn KeyValueStore>,
        catalog: Arc<ProjectCatalog>,
    ) -> Self {
        Self {
            nlu,
            sessions,
            store,
            catalog,
            bot_user_id: None,
            lang: DEFAULT_LANG.to_string(),
        }
    }

    pub fn with_bot_user_id(mut self, bot_user_id: Option<String>) -> Self {
        self.bot_user_id = bot_user_id;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub async fn interpret(&self, key: &ConversationKey, utterance: &str) -> InterpretedResult {
        let query = normalize_utterance(utterance, self.bot_user_id.as_deref());
        if query.is_empty() {
            debug!("Empty utterance from {}, skipping NLU", key);
            return InterpretedResult::Nothing;
        }

        let session_id = self.sessions.get_or_create(&key.channel_id).await;
        let request = NluRequest {
            query,
            session_id,
            lang: self.lang.clone(),
            contexts: build_contexts(&key.user_id, &key.channel_id),
        };

        let response = match self.nlu.query(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("NLU request for {} failed: {}", key, e);
                return InterpretedResult::Failed(e);
            }
        };

        match response.result {
            Some(result) => self.classify(key, &request.query, &result).await,
            None => {
                debug!("NLU response for {} had no result", key);
                InterpretedResult::Nothing
            }
        }
    }

    async fn classify(&self, key: &ConversationKey, query: &str, result: &NluResult) -> InterpretedResult {
        if let Some(payload) = result.slack_payload() {
            return InterpretedResult::Reply(MessageBody::Rich(payload.clone()));
        }

        if let Some(speech) = result.speech() {
            return InterpretedResult::Reply(MessageBody::text(speech));
        }

        let (Some(action), Some(project_name)) = (result.action(), result.parameter("project_name")) else {
            debug!("NLU result for {} is not actionable", key);
            return InterpretedResult::Nothing;
        };

        let project_name = match project_name {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let project = match self.catalog.lookup(&project_name) {
            Ok(project) => project,
            Err(e) => {
                warn!("NLU action {} named unknown project '{}'", action, project_name);
                return InterpretedResult::Rejected(e);
            }
        };

        self.record_parameters(key, &result.parameters).await;

        let ticket_type = infer_ticket_type(result);
        info!(
            "Proposing {} ticket for {} from action {} ({})",
            ticket_type, project, action, key
        );
        InterpretedResult::Proposal(TicketProposal {
            project,
            description: result.resolved_query().unwrap_or(query).to_string(),
            ticket_type,
            requesting_user: key.user_id.clone(),
        })
    }

    /// Best-effort write of the raw NLU parameters at `<team>/<channel>`
    async fn record_parameters(&self, key: &ConversationKey, parameters: &Value) {
        let path = match StorePath::new([key.team_id.as_str(), key.channel_id.as_str()]) {
            Ok(path) => path,
            Err(e) => {
                warn!("Not recording parameters for {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self
            .store
            .set(&path, json!({ "project_name": parameters }))
            .await
        {
            warn!(
                "Failed to record parameters at {} ({}): {}",
                path,
                self.store.backend(),
                e
            );
        }
    }
}

/// An explicit `ticket_type` parameter wins; otherwise any intent whose
/// name mentions "feature" is a feature request and everything else a bug.
pub fn infer_ticket_type(result: &NluResult) -> TicketType {
    if let Some(explicit) = result
        .parameter("ticket_type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
    {
        return explicit;
    }

    match result.intent_name() {
        Some(intent) if intent.to_ascii_lowercase().contains("feature") => TicketType::Feature,
        _ => TicketType::Bug,
    }
}
