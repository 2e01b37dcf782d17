//! Turns Telegram content into Discord-ready text and file names.

use crate::telegram::event::{Entity, EntityKind, FormattedText, Sender};
use std::collections::HashMap;

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MAX_LEN: usize = 2000;

/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MAX_LEN: usize = 4096;

pub const NO_HANDLE: &str = "No username";

/// Telegram handle (without `@`) to Discord user id.
#[derive(Debug, Clone, Default)]
pub struct Mentions(HashMap<String, u64>);

impl Mentions {
    pub fn new(table: HashMap<String, u64>) -> Self {
        Self(
            table
                .into_iter()
                .map(|(handle, id)| (handle.trim_start_matches('@').to_lowercase(), id))
                .collect(),
        )
    }

    pub fn discord_id(&self, handle: &str) -> Option<u64> {
        self.0.get(&handle.trim_start_matches('@').to_lowercase()).copied()
    }
}

/// Sender attribution plus the final Discord text, built fresh per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRepresentation {
    pub display_name: String,
    pub handle: String,
    pub text: String,
}

pub fn display_name(sender: &Sender) -> String {
    match &sender.last_name {
        Some(last) if !last.is_empty() => format!("{} {}", sender.first_name, last),
        _ => sender.first_name.clone(),
    }
}

pub fn handle(sender: &Sender) -> String {
    match &sender.username {
        Some(username) => format!("@{}", username),
        None => NO_HANDLE.to_string(),
    }
}

fn sender_label(display_name: &str, handle: &str) -> String {
    format!(
        "**{} ({})**",
        escape_markdown(display_name),
        escape_markdown(handle)
    )
}

/// Attributed message: sender label, then the converted body if any.
pub fn compose(
    sender: &Sender,
    body: Option<&FormattedText>,
    mentions: &Mentions,
) -> ContentRepresentation {
    let display_name = display_name(sender);
    let handle = handle(sender);
    let label = sender_label(&display_name, &handle);

    let text = match body {
        Some(body) if !body.text.is_empty() => {
            format!("{}\n{}", label, to_discord_markdown(body, mentions))
        }
        _ => label,
    };

    ContentRepresentation {
        display_name,
        handle,
        text,
    }
}

pub fn join_notice(sender: &Sender) -> String {
    format!(
        "{} joined the Telegram side of the chat",
        sender_label(&display_name(sender), &handle(sender))
    )
}

pub fn leave_notice(sender: &Sender) -> String {
    format!(
        "{} left the Telegram side of the chat",
        sender_label(&display_name(sender), &handle(sender))
    )
}

/// Renders Telegram entities as Discord markdown. Entities that overlap
/// without nesting, or point outside the text, degrade to plain text.
pub fn to_discord_markdown(body: &FormattedText, mentions: &Mentions) -> String {
    let units: Vec<u16> = body.text.encode_utf16().collect();

    let mut spans: Vec<&Entity> = body
        .entities
        .iter()
        .filter(|e| e.length > 0 && e.offset + e.length <= units.len())
        .collect();
    spans.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.length.cmp(&a.length)));

    let mut out = String::with_capacity(body.text.len());
    render(&units, 0, units.len(), &spans, mentions, &mut out);
    out
}

fn render(
    units: &[u16],
    start: usize,
    end: usize,
    spans: &[&Entity],
    mentions: &Mentions,
    out: &mut String,
) {
    let mut pos = start;
    let mut i = 0;

    while i < spans.len() {
        let entity = spans[i];
        let entity_end = entity.offset + entity.length;

        // Spans nested in this one
        let mut j = i + 1;
        while j < spans.len() && spans[j].offset < entity_end {
            j += 1;
        }

        if entity.offset < pos || entity_end > end {
            i = j;
            continue;
        }

        push_escaped(&units[pos..entity.offset], out);
        let inner = &units[entity.offset..entity_end];
        let children = &spans[i + 1..j];

        match &entity.kind {
            EntityKind::Bold => wrap("**", units, entity, children, mentions, out),
            EntityKind::Italic => wrap("*", units, entity, children, mentions, out),
            EntityKind::Underline => wrap("__", units, entity, children, mentions, out),
            EntityKind::Strikethrough => wrap("~~", units, entity, children, mentions, out),
            EntityKind::Spoiler => wrap("||", units, entity, children, mentions, out),
            EntityKind::Code => push_code(&String::from_utf16_lossy(inner), out),
            EntityKind::Pre { language } => {
                let code = String::from_utf16_lossy(inner);
                let fence = "`".repeat(longest_backtick_run(&code).max(2) + 1);
                out.push_str(&fence);
                out.push_str(language.as_deref().unwrap_or(""));
                out.push('\n');
                out.push_str(&code);
                out.push('\n');
                out.push_str(&fence);
            }
            EntityKind::TextLink { url } => {
                out.push('[');
                render(units, entity.offset, entity_end, children, mentions, out);
                out.push_str("](");
                out.push_str(url);
                out.push(')');
            }
            EntityKind::Url => out.push_str(&String::from_utf16_lossy(inner)),
            EntityKind::Mention => {
                let text = String::from_utf16_lossy(inner);
                match mentions.discord_id(&text) {
                    Some(id) => out.push_str(&format!("<@{}>", id)),
                    None => push_escaped(inner, out),
                }
            }
            EntityKind::Plain => {
                render(units, entity.offset, entity_end, children, mentions, out)
            }
        }

        pos = entity_end;
        i = j;
    }

    push_escaped(&units[pos..end], out);
}

fn wrap(
    marker: &str,
    units: &[u16],
    entity: &Entity,
    children: &[&Entity],
    mentions: &Mentions,
    out: &mut String,
) {
    out.push_str(marker);
    render(
        units,
        entity.offset,
        entity.offset + entity.length,
        children,
        mentions,
        out,
    );
    out.push_str(marker);
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

/// Inline code whose fence is longer than any backtick run inside it.
fn push_code(code: &str, out: &mut String) {
    let fence = "`".repeat(longest_backtick_run(code) + 1);
    // A leading or trailing backtick would merge with the fence
    let pad = if code.starts_with('`') || code.ends_with('`') {
        " "
    } else {
        ""
    };
    out.push_str(&fence);
    out.push_str(pad);
    out.push_str(code);
    out.push_str(pad);
    out.push_str(&fence);
}

fn push_escaped(units: &[u16], out: &mut String) {
    out.push_str(&escape_markdown(&String::from_utf16_lossy(units)));
}

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Splits `text` into pieces of at most `limit` characters, lazily and in
/// order. Concatenating the pieces gives back `text`.
pub fn chunks(text: &str, limit: usize) -> Chunks<'_> {
    Chunks {
        rest: text,
        limit: limit.max(1),
    }
}

pub struct Chunks<'a> {
    rest: &'a str,
    limit: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let split_at = self
            .rest
            .char_indices()
            .nth(self.limit)
            .map(|(idx, _)| idx)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(split_at);
        self.rest = rest;
        Some(chunk)
    }
}

/// Canonical extension for a content type, if it is one we know.
pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    let ext = match mime_type.trim().to_ascii_lowercase().as_str() {
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "text/plain" => "txt",
        _ => return None,
    };
    Some(ext)
}

pub const UNKNOWN_EXTENSION: &str = "bin";

/// `base.ext`, with the extension taken from the content type.
pub fn file_name(base: &str, mime_type: Option<&str>) -> String {
    let ext = mime_type
        .and_then(extension_for)
        .unwrap_or(UNKNOWN_EXTENSION);
    format!("{}.{}", base, ext)
}

/// Extension of a Telegram server-side file path such as `music/file_3.mp3`.
pub fn path_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}
