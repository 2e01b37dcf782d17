//! Canonical, platform-agnostic shape of inbound Telegram updates.
//!
//! Ordinary messages and channel posts collapse into [`TelegramEvent::Message`],
//! their edited variants into [`TelegramEvent::Edited`]. Everything past this
//! module works on these types only.

use teloxide::types::{
    Chat, FileMeta, Message, MessageEntity, MessageEntityKind, Update, UpdateKind, User,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre { language: Option<String> },
    TextLink { url: String },
    Url,
    Mention,
    /// Anything without a Discord counterpart.
    Plain,
}

/// Formatting span. `offset` and `length` count UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedText {
    pub text: String,
    pub entities: Vec<Entity>,
}

impl FormattedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl FileRef {
    fn new(meta: &FileMeta, file_name: Option<&String>, mime_type: Option<String>) -> Self {
        Self {
            file_id: meta.id.to_string(),
            file_name: file_name.cloned(),
            mime_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(FormattedText),
    Photo {
        file: FileRef,
        caption: Option<FormattedText>,
    },
    Sticker {
        file: FileRef,
        emoji: Option<String>,
    },
    Document {
        file: FileRef,
        caption: Option<FormattedText>,
    },
    Voice {
        file: FileRef,
        caption: Option<FormattedText>,
    },
    Audio {
        file: FileRef,
        caption: Option<FormattedText>,
    },
    Video {
        file: FileRef,
        caption: Option<FormattedText>,
    },
    Join(Vec<Sender>),
    Leave(Sender),
    Unsupported,
}

impl Content {
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Photo { .. } => "photo",
            Content::Sticker { .. } => "sticker",
            Content::Document { .. } => "document",
            Content::Voice { .. } => "voice",
            Content::Audio { .. } => "audio",
            Content::Video { .. } => "video",
            Content::Join(_) => "join",
            Content::Leave(_) => "leave",
            Content::Unsupported => "unsupported",
        }
    }

    /// The user-written text of the message, if it carries any.
    pub fn body(&self) -> Option<&FormattedText> {
        match self {
            Content::Text(text) => Some(text),
            Content::Photo { caption, .. }
            | Content::Document { caption, .. }
            | Content::Voice { caption, .. }
            | Content::Audio { caption, .. }
            | Content::Video { caption, .. } => caption.as_ref(),
            Content::Sticker { .. }
            | Content::Join(_)
            | Content::Leave(_)
            | Content::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    pub message_id: i32,
    pub chat_id: i64,
    pub from: Sender,
    pub content: Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramEvent {
    Message(CanonicalMessage),
    Edited(CanonicalMessage),
}

impl TelegramEvent {
    pub fn from_update(update: &Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => {
                Some(Self::Message(CanonicalMessage::from_message(msg)))
            }
            UpdateKind::EditedMessage(msg) | UpdateKind::EditedChannelPost(msg) => {
                Some(Self::Edited(CanonicalMessage::from_message(msg)))
            }
            _ => None,
        }
    }

    pub fn message(&self) -> &CanonicalMessage {
        match self {
            Self::Message(msg) | Self::Edited(msg) => msg,
        }
    }
}

impl CanonicalMessage {
    pub fn from_message(msg: &Message) -> Self {
        let from = match &msg.from {
            Some(user) => sender_from_user(user),
            // Channel posts carry no sender, so the channel speaks for itself
            None => sender_from_chat(&msg.chat),
        };

        Self {
            message_id: msg.id.0,
            chat_id: msg.chat.id.0,
            from,
            content: content_of(msg),
        }
    }
}

pub fn sender_from_user(user: &User) -> Sender {
    Sender {
        id: user.id.0,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
    }
}

fn sender_from_chat(chat: &Chat) -> Sender {
    Sender {
        id: chat.id.0.unsigned_abs(),
        first_name: chat.title().unwrap_or("Channel").to_string(),
        last_name: None,
        username: chat.username().map(str::to_string),
    }
}

fn content_of(msg: &Message) -> Content {
    if let Some(text) = msg.text() {
        return Content::Text(formatted(text, msg.entities()));
    }

    let caption = msg
        .caption()
        .map(|caption| formatted(caption, msg.caption_entities()));

    if let Some(photos) = msg.photo() {
        let largest = photos
            .iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height));
        if let Some(photo) = largest {
            return Content::Photo {
                file: FileRef::new(&photo.file, None, None),
                caption,
            };
        }
    }

    if let Some(sticker) = msg.sticker() {
        let meta = sticker
            .thumbnail
            .as_ref()
            .map(|thumb| &thumb.file)
            .unwrap_or(&sticker.file);
        return Content::Sticker {
            file: FileRef::new(meta, None, None),
            emoji: sticker.emoji.clone(),
        };
    }

    if let Some(doc) = msg.document() {
        return Content::Document {
            file: FileRef::new(
                &doc.file,
                doc.file_name.as_ref(),
                doc.mime_type.as_ref().map(|m| m.essence_str().to_string()),
            ),
            caption,
        };
    }

    if let Some(voice) = msg.voice() {
        return Content::Voice {
            file: FileRef::new(
                &voice.file,
                None,
                voice.mime_type.as_ref().map(|m| m.essence_str().to_string()),
            ),
            caption,
        };
    }

    if let Some(audio) = msg.audio() {
        return Content::Audio {
            file: FileRef::new(
                &audio.file,
                audio.file_name.as_ref(),
                audio.mime_type.as_ref().map(|m| m.essence_str().to_string()),
            ),
            caption,
        };
    }

    if let Some(video) = msg.video() {
        return Content::Video {
            file: FileRef::new(
                &video.file,
                video.file_name.as_ref(),
                video.mime_type.as_ref().map(|m| m.essence_str().to_string()),
            ),
            caption,
        };
    }

    if let Some(users) = msg.new_chat_members() {
        return Content::Join(users.iter().map(sender_from_user).collect());
    }

    if let Some(user) = msg.left_chat_member() {
        return Content::Leave(sender_from_user(user));
    }

    Content::Unsupported
}

fn formatted(text: &str, entities: Option<&[MessageEntity]>) -> FormattedText {
    FormattedText {
        text: text.to_string(),
        entities: entities
            .unwrap_or_default()
            .iter()
            .map(entity_from)
            .collect(),
    }
}

pub fn entity_from(entity: &MessageEntity) -> Entity {
    let kind = match &entity.kind {
        MessageEntityKind::Bold => EntityKind::Bold,
        MessageEntityKind::Italic => EntityKind::Italic,
        MessageEntityKind::Underline => EntityKind::Underline,
        MessageEntityKind::Strikethrough => EntityKind::Strikethrough,
        MessageEntityKind::Spoiler => EntityKind::Spoiler,
        MessageEntityKind::Code => EntityKind::Code,
        MessageEntityKind::Pre { language } => EntityKind::Pre {
            language: language.clone(),
        },
        MessageEntityKind::TextLink { url } => EntityKind::TextLink {
            url: url.to_string(),
        },
        MessageEntityKind::Url => EntityKind::Url,
        MessageEntityKind::Mention => EntityKind::Mention,
        _ => EntityKind::Plain,
    };

    Entity {
        kind,
        offset: entity.offset,
        length: entity.length,
    }
}
