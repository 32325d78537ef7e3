//! bunny-core - Intent-to-action decision flow for the bunny Slack bot
//!
//! An inbound Slack event is either a `/bunny` slash command, a free-text
//! message, or a button click. Commands are parsed directly into tickets;
//! messages go through the NLU service and may turn into a ticket proposal
//! that waits for a yes/no click before the webhook fires.

pub mod bot;
pub mod catalog;
pub mod command;
pub mod config;
pub mod confirmation;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod interpreter;
pub mod nlu;
pub mod session;
pub mod ticket;
pub mod types;

pub use bot::Bot;
pub use catalog::{ProjectCatalog, ProjectId};
pub use command::{Command, CommandOutcome, parse_command};
pub use config::BunnyConfig;
pub use confirmation::{Answer, ConfirmationStore, Resolution};
pub use dispatcher::{IftttMaker, TicketDispatcher, WebhookTrigger};
pub use error::{ConfigError, DispatchError, NluError, ValidationError};
pub use interpreter::{IntentInterpreter, InterpretedResult};
pub use nlu::{ApiAiClient, NluClient, NluRequest, NluResponse};
pub use session::{InMemorySessionStore, SessionStore};
pub use ticket::{TicketProposal, TicketType};
pub use types::{ChannelType, ConversationKey, IncomingEvent, MessageBody, OutgoingMessage};
