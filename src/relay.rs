//! Relay handlers: one operation per kind of content, each converting the
//! event, fetching any file, and calling the other platform.

use crate::bridge::Bridge;
use crate::convert::{
    self, chunks, compose, extension_for, path_extension, Mentions, DISCORD_MAX_LEN,
    TELEGRAM_MAX_LEN,
};
use crate::discord::{DiscordApi, Upload};
use crate::error::RelayError;
use crate::message_map::{MapDirection, MessageKey, MessageStore};
use crate::telegram::event::{CanonicalMessage, Content, FormattedText, Sender};
use crate::telegram::TelegramApi;
use std::sync::Arc;
use tracing::{debug, info};

/// A file to carry over from Telegram, resolved lazily by [`Relay::relay_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    pub file_id: String,
    pub file_name: String,
    pub caption: Option<FormattedText>,
    /// Take the extension from Telegram's server-side path instead.
    pub server_extension: bool,
}

impl AttachmentDescriptor {
    /// Describes the file carried by `content`, if it carries one.
    pub fn for_content(content: &Content, bridge: &Bridge) -> Option<Self> {
        let descriptor = match content {
            Content::Photo { file, caption } => Self {
                file_id: file.file_id.clone(),
                file_name: "photo.jpg".to_string(),
                caption: caption.clone(),
                server_extension: false,
            },
            Content::Sticker { file, emoji } => Self {
                file_id: file.file_id.clone(),
                file_name: "sticker.webp".to_string(),
                caption: emoji
                    .as_ref()
                    .filter(|_| bridge.telegram.send_emoji_with_stickers)
                    .map(FormattedText::plain),
                server_extension: false,
            },
            Content::Document { file, caption } => Self {
                file_id: file.file_id.clone(),
                file_name: file
                    .file_name
                    .clone()
                    .unwrap_or_else(|| convert::file_name("file", file.mime_type.as_deref())),
                caption: caption.clone(),
                server_extension: false,
            },
            Content::Voice { file, caption } => Self {
                file_id: file.file_id.clone(),
                file_name: convert::file_name(
                    "voice",
                    Some(file.mime_type.as_deref().unwrap_or("audio/ogg")),
                ),
                caption: caption.clone(),
                server_extension: false,
            },
            Content::Audio { file, caption } => Self {
                file_id: file.file_id.clone(),
                file_name: convert::file_name("audio", file.mime_type.as_deref()),
                caption: caption.clone(),
                server_extension: file.mime_type.as_deref().and_then(extension_for).is_none(),
            },
            Content::Video { file, caption } => Self {
                file_id: file.file_id.clone(),
                file_name: file
                    .file_name
                    .clone()
                    .unwrap_or_else(|| convert::file_name("video", file.mime_type.as_deref())),
                caption: caption.clone(),
                server_extension: false,
            },
            Content::Text(_) | Content::Join(_) | Content::Leave(_) | Content::Unsupported => {
                return None
            }
        };
        Some(descriptor)
    }

    /// Final upload name once the server-side path is known.
    pub fn resolved_name(&self, server_path: &str) -> String {
        if !self.server_extension {
            return self.file_name.clone();
        }
        match (self.file_name.rsplit_once('.'), path_extension(server_path)) {
            (Some((stem, _)), Some(ext)) => format!("{}.{}", stem, ext),
            _ => self.file_name.clone(),
        }
    }
}

/// A Discord message headed for Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordPost {
    pub message_id: u64,
    pub author: String,
    pub content: String,
    pub attachments: Vec<String>,
}

impl DiscordPost {
    fn telegram_text(&self) -> String {
        let mut text = format!("{}:", self.author);
        if !self.content.is_empty() {
            text.push('\n');
            text.push_str(&self.content);
        }
        for url in &self.attachments {
            text.push('\n');
            text.push_str(url);
        }
        text
    }
}

fn telegram_source_id(message_id: i32) -> u64 {
    u64::from(message_id.unsigned_abs())
}

pub struct Relay {
    discord: Arc<dyn DiscordApi>,
    telegram: Arc<dyn TelegramApi>,
    messages: Arc<dyn MessageStore>,
    mentions: Mentions,
}

impl Relay {
    pub fn new(
        discord: Arc<dyn DiscordApi>,
        telegram: Arc<dyn TelegramApi>,
        messages: Arc<dyn MessageStore>,
        mentions: Mentions,
    ) -> Self {
        Self {
            discord,
            telegram,
            messages,
            mentions,
        }
    }

    pub async fn relay_text(
        &self,
        bridge: &Bridge,
        msg: &CanonicalMessage,
        body: &FormattedText,
    ) -> Result<(), RelayError> {
        let repr = compose(&msg.from, Some(body), &self.mentions);
        self.send_to_discord(bridge, msg, &repr.text, None).await
    }

    pub async fn relay_file(
        &self,
        bridge: &Bridge,
        msg: &CanonicalMessage,
        attachment: AttachmentDescriptor,
    ) -> Result<(), RelayError> {
        let file = self.telegram.download_file(&attachment.file_id).await?;
        let upload = Upload {
            file_name: attachment.resolved_name(&file.path),
            data: file.data,
        };
        debug!(bridge = %bridge.name, file_name = %upload.file_name, "Downloaded Telegram file");

        let repr = compose(&msg.from, attachment.caption.as_ref(), &self.mentions);
        self.send_to_discord(bridge, msg, &repr.text, Some(upload))
            .await
    }

    /// Sends `text` in order, one piece at a time, with the upload on the
    /// last piece. Only the last piece is recorded for later edits.
    async fn send_to_discord(
        &self,
        bridge: &Bridge,
        msg: &CanonicalMessage,
        text: &str,
        mut upload: Option<Upload>,
    ) -> Result<(), RelayError> {
        let mut pieces = chunks(text, DISCORD_MAX_LEN).peekable();
        let mut last_id = None;

        while let Some(piece) = pieces.next() {
            let file = if pieces.peek().is_none() {
                upload.take()
            } else {
                None
            };
            last_id = Some(
                self.discord
                    .send(bridge.discord.channel_id, piece, file)
                    .await?,
            );
        }

        if let Some(discord_id) = last_id {
            self.messages.insert(
                MessageKey::new(
                    MapDirection::TelegramToDiscord,
                    bridge.telegram.chat_id,
                    telegram_source_id(msg.message_id),
                ),
                discord_id,
            );
            info!(
                bridge = %bridge.name,
                telegram_id = msg.message_id,
                discord_id,
                "Relayed {} to Discord",
                msg.content.kind()
            );
        }

        Ok(())
    }

    pub async fn relay_join(&self, bridge: &Bridge, user: &Sender) -> Result<(), RelayError> {
        self.discord
            .send(bridge.discord.channel_id, &convert::join_notice(user), None)
            .await?;
        Ok(())
    }

    pub async fn relay_leave(&self, bridge: &Bridge, user: &Sender) -> Result<(), RelayError> {
        self.discord
            .send(bridge.discord.channel_id, &convert::leave_notice(user), None)
            .await?;
        Ok(())
    }

    /// Applies a Telegram edit to the Discord message it was relayed as. The
    /// new text is not re-chunked.
    pub async fn relay_edit(&self, bridge: &Bridge, msg: &CanonicalMessage) -> Result<(), RelayError> {
        let source_id = telegram_source_id(msg.message_id);
        let key = MessageKey::new(
            MapDirection::TelegramToDiscord,
            bridge.telegram.chat_id,
            source_id,
        );
        let discord_id = self
            .messages
            .get(&key)
            .ok_or(RelayError::MissingCorrespondence(source_id))?;

        let repr = compose(&msg.from, msg.content.body(), &self.mentions);
        self.discord
            .edit(bridge.discord.channel_id, discord_id, &repr.text)
            .await?;

        info!(bridge = %bridge.name, telegram_id = msg.message_id, discord_id, "Relayed edit to Discord");
        Ok(())
    }

    pub async fn relay_to_telegram(&self, bridge: &Bridge, post: &DiscordPost) -> Result<(), RelayError> {
        let text = post.telegram_text();
        let mut last_id = None;

        for piece in chunks(&text, TELEGRAM_MAX_LEN) {
            last_id = Some(self.telegram.send_text(bridge.telegram.chat_id, piece).await?);
        }

        if let Some(telegram_id) = last_id {
            self.messages.insert(
                MessageKey::new(
                    MapDirection::DiscordToTelegram,
                    bridge.telegram.chat_id,
                    post.message_id,
                ),
                telegram_source_id(telegram_id),
            );
            info!(
                bridge = %bridge.name,
                discord_id = post.message_id,
                telegram_id,
                "Relayed message to Telegram"
            );
        }

        Ok(())
    }

    pub async fn relay_edit_to_telegram(
        &self,
        bridge: &Bridge,
        post: &DiscordPost,
    ) -> Result<(), RelayError> {
        let key = MessageKey::new(
            MapDirection::DiscordToTelegram,
            bridge.telegram.chat_id,
            post.message_id,
        );
        let telegram_id = self
            .messages
            .get(&key)
            .ok_or(RelayError::MissingCorrespondence(post.message_id))?;
        let telegram_id = i32::try_from(telegram_id)
            .map_err(|_| RelayError::Telegram(format!("Invalid message id {}", telegram_id)))?;

        self.telegram
            .edit_text(bridge.telegram.chat_id, telegram_id, &post.telegram_text())
            .await?;

        info!(bridge = %bridge.name, discord_id = post.message_id, telegram_id, "Relayed edit to Telegram");
        Ok(())
    }
}
