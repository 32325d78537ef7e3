//! Utterance normalization and NLU context building

use std::collections::BTreeMap;
use tracing::debug;

use crate::nlu::NluContext;

/// Context name the NLU agent's intents are configured to read
pub const GENERIC_CONTEXT: &str = "generic";

/// Clean up raw Slack text before it goes to the NLU service.
///
/// Slack escapes `&`, `<` and `>` as entities, and phones like to send a
/// right single quotation mark where the user typed an apostrophe. Mentions
/// of the bot itself carry no meaning for intent matching.
pub fn normalize_utterance(text: &str, bot_user_id: Option<&str>) -> String {
    let mut normalized = html_escape::decode_html_entities(text)
        .replace('\u{2019}', "'");

    if let Some(bot_id) = bot_user_id.filter(|id| !id.is_empty()) {
        if normalized.contains(bot_id) {
            normalized = normalized
                .replacen(&format!("<@{}>", bot_id), "", 1)
                .replacen(bot_id, "", 1);
        }
    }

    let normalized = normalized.trim().to_string();
    debug!("Normalized utterance ({} chars)", normalized.len());
    normalized
}

/// Context bundle identifying who is talking and where
pub fn build_contexts(user_id: &str, channel_id: &str) -> Vec<NluContext> {
    let mut parameters = BTreeMap::new();
    parameters.insert("slack_user_id".to_string(), user_id.to_string());
    parameters.insert("slack_channel".to_string(), channel_id.to_string());

    vec![NluContext {
        name: GENERIC_CONTEXT.to_string(),
        parameters,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_entities() {
        assert_eq!(
            normalize_utterance("fish &amp; chips &lt;3", None),
            "fish & chips <3"
        );
    }

    #[test]
    fn test_replaces_curly_apostrophe() {
        assert_eq!(
            normalize_utterance("the app doesn\u{2019}t start", None),
            "the app doesn't start"
        );
    }

    #[test]
    fn test_strips_bot_mention() {
        assert_eq!(
            normalize_utterance("<@UBOT1> wallet is broken", Some("UBOT1")),
            "wallet is broken"
        );
        assert_eq!(
            normalize_utterance("hey UBOT1 wallet is broken", Some("UBOT1")),
            "hey  wallet is broken"
        );
        assert_eq!(
            normalize_utterance("<@UOTHER> hi", Some("UBOT1")),
            "<@UOTHER> hi"
        );
    }

    #[test]
    fn test_strips_each_mention_form_once() {
        assert_eq!(
            normalize_utterance("<@UBOT1> ask UBOT1 about UBOT1", Some("UBOT1")),
            "ask  about UBOT1"
        );
    }

    #[test]
    fn test_build_contexts() {
        let contexts = build_contexts("U1", "C1");
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].name, "generic");
        assert_eq!(contexts[0].parameters["slack_user_id"], "U1");
        assert_eq!(contexts[0].parameters["slack_channel"], "C1");
    }
}
