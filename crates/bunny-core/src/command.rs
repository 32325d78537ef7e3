//! `/bunny` slash command parsing
//!
//! `/bunny <bug|feature> <project> <description>` files a ticket without
//! going through NLU. Anything the parser does not recognise falls back to
//! the usage text.

use crate::catalog::{ProjectCatalog, ProjectId};
use crate::error::ValidationError;
use crate::ticket::TicketType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: TicketType,
    pub project: ProjectId,
    pub description: String,
    pub requesting_user: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Ticket(Command),
    Help,
    Invalid(ValidationError),
}

/// Usage text listing the projects currently connected
pub fn help_text(catalog: &ProjectCatalog) -> String {
    let projects = catalog
        .iter()
        .map(|p| format!("`{}`", p))
        .collect::<Vec<_>>()
        .join(", ");

    [
        "I will respond to the following Slack commands:".to_string(),
        "`/bunny help` - to see this message.".to_string(),
        "`/bunny bug [project] [short description]` - to create a bug ticket for the given project.".to_string(),
        "`/bunny feature [project] [short description]` - to create a feature ticket for the given project.".to_string(),
        "The following projects are connected today:".to_string(),
        projects,
    ]
    .join("\n")
}

pub fn parse_command(catalog: &ProjectCatalog, raw_text: &str, requesting_user: &str) -> CommandOutcome {
    let (verb, rest) = split_word(raw_text.trim());
    if verb.is_empty() {
        return CommandOutcome::Help;
    }

    // `help` and unknown verbs both end up here
    let Ok(verb) = verb.parse::<TicketType>() else {
        return CommandOutcome::Help;
    };

    let (project, description) = split_word(rest);
    let description = unquote(description.trim());
    if project.is_empty() || description.is_empty() {
        return CommandOutcome::Invalid(ValidationError::MissingFields);
    }

    match catalog.lookup(project) {
        Ok(project) => CommandOutcome::Ticket(Command {
            verb,
            project,
            description: description.to_string(),
            requesting_user: requesting_user.to_string(),
        }),
        Err(e) => CommandOutcome::Invalid(e),
    }
}

/// Split off the first whitespace-delimited word
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

/// Drop one pair of surrounding straight or curly double quotes
fn unquote(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}')] {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> CommandOutcome {
        parse_command(&ProjectCatalog::default(), text, "ann")
    }

    #[test]
    fn test_bug_command() {
        match parse("bug wallet \"login crashes\"") {
            CommandOutcome::Ticket(cmd) => {
                assert_eq!(cmd.verb, TicketType::Bug);
                assert_eq!(cmd.project.as_str(), "wallet");
                assert_eq!(cmd.description, "login crashes");
                assert_eq!(cmd.requesting_user, "ann");
            }
            other => panic!("expected ticket, got {:?}", other),
        }
    }

    #[test]
    fn test_feature_command_unquoted() {
        match parse("feature maneko dark mode for the dashboard") {
            CommandOutcome::Ticket(cmd) => {
                assert_eq!(cmd.verb, TicketType::Feature);
                assert_eq!(cmd.description, "dark mode for the dashboard");
            }
            other => panic!("expected ticket, got {:?}", other),
        }
    }

    #[test]
    fn test_curly_quotes() {
        match parse("bug wallet \u{201c}login crashes\u{201d}") {
            CommandOutcome::Ticket(cmd) => assert_eq!(cmd.description, "login crashes"),
            other => panic!("expected ticket, got {:?}", other),
        }
    }

    #[test]
    fn test_help_outcomes() {
        assert_eq!(parse(""), CommandOutcome::Help);
        assert_eq!(parse("   "), CommandOutcome::Help);
        assert_eq!(parse("help"), CommandOutcome::Help);
        assert_eq!(parse("deploy wallet now"), CommandOutcome::Help);
    }

    #[test]
    fn test_missing_fields() {
        let missing = CommandOutcome::Invalid(ValidationError::MissingFields);
        assert_eq!(parse("bug"), missing);
        assert_eq!(parse("bug wallet"), missing);
        assert_eq!(parse("feature wallet   "), missing);
        assert_eq!(parse("bug wallet \"\""), missing);
    }

    #[test]
    fn test_invalid_project() {
        assert_eq!(
            parse("bug badproject \"x\""),
            CommandOutcome::Invalid(ValidationError::InvalidProject {
                project: "badproject".to_string()
            })
        );
    }

    #[test]
    fn test_help_text_lists_projects() {
        let help = help_text(&ProjectCatalog::default());
        assert!(help.contains("/bunny bug [project]"));
        assert!(help.contains("`wallet`"));
        assert!(help.contains("`essencex`"));
    }
}
