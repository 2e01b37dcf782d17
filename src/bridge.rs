use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Which way messages flow across a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Both,
    TelegramToDiscord,
    DiscordToTelegram,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    pub chat_id: i64,
    #[serde(default = "enabled")]
    pub relay_join_messages: bool,
    #[serde(default = "enabled")]
    pub relay_leave_messages: bool,
    #[serde(default = "enabled")]
    pub send_emoji_with_stickers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordSettings {
    pub channel_id: u64,
}

/// One Telegram chat paired with one Discord channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Bridge {
    pub name: String,
    #[serde(default)]
    pub direction: Direction,
    pub telegram: TelegramSettings,
    pub discord: DiscordSettings,
}

fn enabled() -> bool {
    true
}

impl Bridge {
    pub fn relays_to_discord(&self) -> bool {
        self.direction != Direction::DiscordToTelegram
    }

    pub fn relays_to_telegram(&self) -> bool {
        self.direction != Direction::TelegramToDiscord
    }
}

/// Immutable lookup of bridges, built once at startup.
#[derive(Debug, Default)]
pub struct BridgeRegistry {
    by_chat: HashMap<i64, Arc<Bridge>>,
    by_channel: HashMap<u64, Vec<Arc<Bridge>>>,
}

impl BridgeRegistry {
    pub fn new(bridges: Vec<Bridge>) -> Result<Self> {
        let mut registry = Self::default();

        for bridge in bridges {
            let bridge = Arc::new(bridge);
            let chat_id = bridge.telegram.chat_id;
            if bridge.discord.channel_id == 0 {
                return Err(anyhow!("Bridge {} has no Discord channel id", bridge.name));
            }
            if let Some(existing) = registry.by_chat.insert(chat_id, Arc::clone(&bridge)) {
                return Err(anyhow!(
                    "Telegram chat {} is used by both bridge {} and bridge {}",
                    chat_id,
                    existing.name,
                    bridge.name
                ));
            }
            registry
                .by_channel
                .entry(bridge.discord.channel_id)
                .or_default()
                .push(bridge);
        }

        Ok(registry)
    }

    /// Bridge for a Telegram chat. `None` means the chat is unmanaged.
    pub fn resolve(&self, chat_id: i64) -> Option<Arc<Bridge>> {
        self.by_chat.get(&chat_id).cloned()
    }

    /// All bridges fed by a Discord channel.
    pub fn resolve_discord(&self, channel_id: u64) -> &[Arc<Bridge>] {
        self.by_channel
            .get(&channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_chat.len()
    }
}

#[cfg(test)]
pub(crate) fn test_bridge(name: &str, chat_id: i64, channel_id: u64) -> Bridge {
    Bridge {
        name: name.to_string(),
        direction: Direction::Both,
        telegram: TelegramSettings {
            chat_id,
            relay_join_messages: true,
            relay_leave_messages: true,
            send_emoji_with_stickers: true,
        },
        discord: DiscordSettings { channel_id },
    }
}
