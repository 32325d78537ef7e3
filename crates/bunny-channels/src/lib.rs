//! Channel adapters and message bus for bunny
//!
//! The bus collects inbound events from every registered adapter and routes
//! the bot's replies back out through the adapter that owns their channel.

pub mod bus;
pub mod slack;

pub use bus::{BusSender, MessageBus, MessageChannel};
pub use slack::{ChannelError, SlackChannel, SlackChannelConfig};
