//! Error types for bunny-core

use std::path::PathBuf;

/// User input that cannot become a ticket. The display text is what the
/// user sees in Slack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Something is missing!")]
    MissingFields,

    #[error("Invalid project identifier!")]
    InvalidProject { project: String },
}

#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("NLU request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("NLU service returned {code}: {message}")]
    Service { code: u16, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook rejected event {event} with status {status}: {body}")]
    Rejected {
        event: String,
        status: u16,
        body: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
