mod handler;

use crate::config::Config;
use crate::error::RelayError;
use anyhow::Result;
use async_trait::async_trait;
use serenity::all::{
    ChannelId, Client, CreateAttachment, CreateMessage, EditMessage, GatewayIntents, Http,
    MessageId,
};
use std::sync::Arc;
use tokio::sync::watch;

pub use handler::Handler;

/// File to upload alongside a Discord message.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Discord operations used by the relay handlers.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// Posts a message and returns its id.
    async fn send(
        &self,
        channel_id: u64,
        text: &str,
        upload: Option<Upload>,
    ) -> Result<u64, RelayError>;

    /// Fetches a message and replaces its text.
    async fn edit(&self, channel_id: u64, message_id: u64, text: &str) -> Result<(), RelayError>;
}

/// One-shot "Discord is ready" signal. Opened once by the gateway `ready`
/// event and never closed again.
#[derive(Clone)]
pub struct ReadyGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadyGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns true only for the call that actually opened the gate.
    pub fn open(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once opened
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct DiscordBot {
    token: String,
    http: Arc<Http>,
    ready: ReadyGate,
}

impl DiscordBot {
    pub fn new(config: &Config, ready: ReadyGate) -> Self {
        Self {
            token: config.discord_token.clone(),
            http: Arc::new(Http::new(&config.discord_token)),
            ready,
        }
    }

    pub async fn start(&self, handler: Handler) -> Result<()> {
        // Configure intents to receive message events
        let intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await?;

        // Start client, this is a blocking operation
        client.start().await?;

        Ok(())
    }
}

#[async_trait]
impl DiscordApi for DiscordBot {
    async fn send(
        &self,
        channel_id: u64,
        text: &str,
        upload: Option<Upload>,
    ) -> Result<u64, RelayError> {
        self.ready.wait().await;

        let mut msg = CreateMessage::new();
        if !text.is_empty() {
            msg = msg.content(text);
        }
        if let Some(upload) = upload {
            msg = msg.add_file(CreateAttachment::bytes(upload.data, upload.file_name));
        }

        let sent = ChannelId::new(channel_id)
            .send_message(&self.http, msg)
            .await?;

        Ok(sent.id.get())
    }

    async fn edit(&self, channel_id: u64, message_id: u64, text: &str) -> Result<(), RelayError> {
        self.ready.wait().await;

        let mut message = ChannelId::new(channel_id)
            .message(&self.http, MessageId::new(message_id))
            .await?;
        message
            .edit(&self.http, EditMessage::new().content(text))
            .await?;

        Ok(())
    }
}
