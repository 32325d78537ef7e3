//! Central message bus for routing events between channels and the bot

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bunny_core::{ChannelType, IncomingEvent, OutgoingMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Trait that all channel adapters implement
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Start listening for events, sending them to the provided sender.
    /// Implementations spawn their own tasks and return once listening.
    async fn start(&self, tx: mpsc::Sender<IncomingEvent>) -> Result<()>;

    /// Deliver a reply through this channel
    async fn send(&self, msg: OutgoingMessage) -> Result<()>;

    fn channel_type(&self) -> ChannelType;
}

pub struct MessageBus {
    channels: HashMap<ChannelType, Box<dyn MessageChannel>>,
    incoming_tx: mpsc::Sender<IncomingEvent>,
    incoming_rx: mpsc::Receiver<IncomingEvent>,
}

impl MessageBus {
    /// Create a new message bus with the specified buffer size for incoming events
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size);
        info!("Created message bus with buffer size {}", buffer_size);
        Self {
            channels: HashMap::new(),
            incoming_tx: tx,
            incoming_rx: rx,
        }
    }

    pub fn register(&mut self, channel: Box<dyn MessageChannel>) {
        let channel_type = channel.channel_type();
        info!("Registering channel: {}", channel_type);
        self.channels.insert(channel_type, channel);
    }

    /// Start all registered channel listeners
    pub async fn start_all(&self) -> Result<()> {
        info!("Starting all {} registered channels", self.channels.len());

        for (channel_type, channel) in &self.channels {
            debug!("Starting channel: {}", channel_type);
            if let Err(e) = channel.start(self.incoming_tx.clone()).await {
                error!("Failed to start channel {}: {}", channel_type, e);
                return Err(anyhow!("Failed to start channel {}: {}", channel_type, e));
            }
            info!("Started channel: {}", channel_type);
        }
        Ok(())
    }

    /// Receive the next incoming event from any channel
    pub async fn recv(&mut self) -> Option<IncomingEvent> {
        self.incoming_rx.recv().await
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Split the bus into its receiver and a send-only handle.
    ///
    /// The bus's own sender is dropped here, so the receiver closes once
    /// every running channel has stopped.
    pub fn split(self) -> (mpsc::Receiver<IncomingEvent>, BusSender) {
        let sender = BusSender {
            channels: self.channels,
        };
        (self.incoming_rx, sender)
    }
}

/// Send-only handle for the message bus
pub struct BusSender {
    channels: HashMap<ChannelType, Box<dyn MessageChannel>>,
}

impl BusSender {
    /// Route a reply to the channel that owns it
    pub async fn send(&self, msg: OutgoingMessage) -> Result<()> {
        let channel_type = msg.channel();
        debug!("Routing outgoing message to channel: {}", channel_type);

        let channel = self
            .channels
            .get(&channel_type)
            .ok_or_else(|| anyhow!("No channel registered for type: {}", channel_type))?;

        channel.send(msg).await
    }

    pub fn has_channel(&self, channel_type: &ChannelType) -> bool {
        self.channels.contains_key(channel_type)
    }
}
