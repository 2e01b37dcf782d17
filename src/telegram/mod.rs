pub mod event;

use crate::config::Config;
use crate::error::RelayError;
use crate::router::Router;
use anyhow::Result;
use async_trait::async_trait;
use event::TelegramEvent;
use std::convert::Infallible;
use std::sync::Arc;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId};
use tracing::{debug, info};

/// A Telegram file fetched from the Bot API.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Server-side path, e.g. `music/file_3.mp3`.
    pub path: String,
    pub data: Vec<u8>,
}

/// Telegram operations used by the router and relay handlers.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32, RelayError>;
    async fn edit_text(&self, chat_id: i64, message_id: i32, text: &str) -> Result<(), RelayError>;
    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile, RelayError>;
}

pub struct TelegramClient {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: &Config) -> Self {
        Self {
            bot: Bot::new(&config.telegram_token),
            http: reqwest::Client::new(),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The bot's own username, used to recognise commands addressed to it.
    pub async fn username(&self) -> Result<String> {
        let me = self.bot.get_me().await?;
        Ok(me.user.username.clone().unwrap_or_default())
    }

    /// Acknowledges every queued update so that polling starts with fresh ones.
    pub async fn skip_pending_updates(&self) -> Result<()> {
        let pending = self.bot.get_updates().offset(-1).timeout(0).await?;

        if let Some(last) = pending.last() {
            let offset = i32::try_from(last.id.0)?.saturating_add(1);
            self.bot.get_updates().offset(offset).timeout(0).await?;
            info!(offset, "Skipped queued Telegram updates");
        } else {
            debug!("No queued Telegram updates to skip");
        }

        Ok(())
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32, RelayError> {
        let sent = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(sent.id.0)
    }

    async fn edit_text(&self, chat_id: i64, message_id: i32, text: &str) -> Result<(), RelayError> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile, RelayError> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await?;

        let url = self
            .bot
            .api_url()
            .join(&format!("file/bot{}/{}", self.bot.token(), file.path))
            .map_err(|e| RelayError::Telegram(format!("Invalid file url: {}", e)))?;

        let data = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(DownloadedFile {
            path: file.path,
            data: data.to_vec(),
        })
    }
}

/// Long-polls Telegram and hands every relevant update to the router. Each
/// event runs as its own task so a slow relay does not hold up the next one.
pub async fn run_dispatcher(bot: Bot, router: Arc<Router>) {
    let handler = dptree::entry().endpoint(|update: Update, router: Arc<Router>| async move {
        if let Some(event) = TelegramEvent::from_update(&update) {
            tokio::spawn(async move { router.handle(event).await });
        }
        Ok::<(), Infallible>(())
    });

    info!("Starting Telegram long polling");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .default_handler(|_update| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
