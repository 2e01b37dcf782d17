use super::ReadyGate;
use crate::bridge::{Bridge, BridgeRegistry};
use crate::relay::{DiscordPost, Relay};
use serenity::all::{
    ChannelId, Context, EventHandler, Message, MessageType, MessageUpdateEvent, Ready, User,
};
use std::sync::Arc;
use tracing::{error, info};

/// Gateway events: opens the readiness gate and relays channel messages
/// towards Telegram.
pub struct Handler {
    registry: Arc<BridgeRegistry>,
    relay: Arc<Relay>,
    ready: ReadyGate,
}

impl Handler {
    pub fn new(registry: Arc<BridgeRegistry>, relay: Arc<Relay>, ready: ReadyGate) -> Self {
        Self {
            registry,
            relay,
            ready,
        }
    }

    fn outbound_bridges(&self, channel_id: ChannelId) -> Vec<Arc<Bridge>> {
        self.registry
            .resolve_discord(channel_id.get())
            .iter()
            .filter(|bridge| bridge.relays_to_telegram())
            .cloned()
            .collect()
    }
}

fn author_name(user: &User, nick: Option<&str>) -> String {
    pick_author(nick, user.global_name.as_deref(), &user.name)
}

/// Guild nickname, then global display name, then account name.
fn pick_author(nick: Option<&str>, global_name: Option<&str>, name: &str) -> String {
    nick.filter(|n| !n.is_empty())
        .or(global_name.filter(|n| !n.is_empty()))
        .unwrap_or(name)
        .to_string()
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        if self.ready.open() {
            info!("Connected to Discord as {}", ready.user.name);
        } else {
            info!("Reconnected to Discord as {}", ready.user.name);
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        // Ignore bot messages to prevent loops
        if msg.author.bot {
            return;
        }

        // Ignore system messages
        if msg.kind != MessageType::Regular && msg.kind != MessageType::InlineReply {
            return;
        }

        let bridges = self.outbound_bridges(msg.channel_id);
        if bridges.is_empty() {
            return;
        }

        let nick = msg.member.as_ref().and_then(|member| member.nick.as_deref());
        let post = DiscordPost {
            message_id: msg.id.get(),
            author: author_name(&msg.author, nick),
            content: msg.content.clone(),
            attachments: msg.attachments.iter().map(|a| a.url.clone()).collect(),
        };

        for bridge in bridges {
            if let Err(e) = self.relay.relay_to_telegram(&bridge, &post).await {
                error!(
                    bridge = %bridge.name,
                    discord_id = post.message_id,
                    error = %e,
                    "Failed to relay Discord message"
                );
            }
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        // Embed-only updates carry neither author nor content
        let (Some(author), Some(content)) = (event.author.as_ref(), event.content.as_ref()) else {
            return;
        };
        if author.bot {
            return;
        }

        let bridges = self.outbound_bridges(event.channel_id);
        if bridges.is_empty() {
            return;
        }

        let nick = event
            .member
            .as_ref()
            .and_then(Option::as_ref)
            .and_then(|member| member.nick.as_deref());
        let post = DiscordPost {
            message_id: event.id.get(),
            author: author_name(author, nick),
            content: content.clone(),
            attachments: event
                .attachments
                .as_ref()
                .map(|attachments| attachments.iter().map(|a| a.url.clone()).collect())
                .unwrap_or_default(),
        };

        for bridge in bridges {
            if let Err(e) = self.relay.relay_edit_to_telegram(&bridge, &post).await {
                error!(
                    bridge = %bridge.name,
                    discord_id = post.message_id,
                    error = %e,
                    "Failed to relay Discord edit"
                );
            }
        }
    }
}
