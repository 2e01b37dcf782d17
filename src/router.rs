//! Entry point for Telegram events: answers chat-info requests, resolves the
//! bridge, applies its direction, then dispatches on the kind of content.

use crate::bridge::{Bridge, BridgeRegistry};
use crate::error::RelayError;
use crate::relay::{AttachmentDescriptor, Relay};
use crate::telegram::event::{CanonicalMessage, Content, TelegramEvent};
use crate::telegram::TelegramApi;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, error};

/// Sent to any chat that has no bridge.
pub const ADVISORY_NOTICE: &str = "This is an instance of Telecord, a bot that bridges Telegram chats \
with Discord channels. This chat is not bridged to anything. \
Setup instructions: https://github.com/telecord/telecord \
Support chat: https://t.me/telecord_support";

const CHAT_INFO_COMMAND: &str = "/chatinfo";

pub struct Router {
    registry: Arc<BridgeRegistry>,
    relay: Arc<Relay>,
    telegram: Arc<dyn TelegramApi>,
    bot_username: String,
}

impl Router {
    pub fn new(
        registry: Arc<BridgeRegistry>,
        relay: Arc<Relay>,
        telegram: Arc<dyn TelegramApi>,
        bot_username: String,
    ) -> Self {
        Self {
            registry,
            relay,
            telegram,
            bot_username,
        }
    }

    /// Runs one event through every stage. Failures are logged here and
    /// never reach the caller.
    pub async fn handle(&self, event: TelegramEvent) {
        if self.answer_chat_info(&event).await.is_break() {
            return;
        }

        let bridge = match self.resolve_bridge(event.message()).await {
            ControlFlow::Continue(bridge) => bridge,
            ControlFlow::Break(()) => return,
        };

        if !bridge.relays_to_discord() {
            return;
        }

        let msg = event.message();
        if let Err(err) = self.dispatch(&bridge, &event).await {
            error!(
                bridge = %bridge.name,
                kind = msg.content.kind(),
                message_id = msg.message_id,
                edited = matches!(event, TelegramEvent::Edited(_)),
                error = %err,
                "Dropped Telegram event"
            );
        }
    }

    /// `/chatinfo@<bot>` works in any chat, bridged or not.
    async fn answer_chat_info(&self, event: &TelegramEvent) -> ControlFlow<()> {
        let TelegramEvent::Message(msg) = event else {
            return ControlFlow::Continue(());
        };
        let Content::Text(body) = &msg.content else {
            return ControlFlow::Continue(());
        };
        if !self.is_chat_info_command(&body.text) {
            return ControlFlow::Continue(());
        }

        let reply = format!("chatID: {}", msg.chat_id);
        if let Err(err) = self.telegram.send_text(msg.chat_id, &reply).await {
            error!(chat_id = msg.chat_id, error = %err, "Failed to send chat info");
        }
        ControlFlow::Break(())
    }

    fn is_chat_info_command(&self, text: &str) -> bool {
        if self.bot_username.is_empty() {
            return false;
        }
        match text.trim().split_once('@') {
            Some((command, name)) => {
                command == CHAT_INFO_COMMAND && name.eq_ignore_ascii_case(&self.bot_username)
            }
            None => false,
        }
    }

    async fn resolve_bridge(&self, msg: &CanonicalMessage) -> ControlFlow<(), Arc<Bridge>> {
        if let Some(bridge) = self.registry.resolve(msg.chat_id) {
            return ControlFlow::Continue(bridge);
        }

        debug!(chat_id = msg.chat_id, "Message from unbridged chat");
        if let Err(err) = self.telegram.send_text(msg.chat_id, ADVISORY_NOTICE).await {
            error!(chat_id = msg.chat_id, error = %err, "Failed to send advisory notice");
        }
        ControlFlow::Break(())
    }

    async fn dispatch(&self, bridge: &Bridge, event: &TelegramEvent) -> Result<(), RelayError> {
        let msg = match event {
            // A caption-less edit still replaces the counterpart with the bare label
            TelegramEvent::Edited(msg) => return self.relay.relay_edit(bridge, msg).await,
            TelegramEvent::Message(msg) => msg,
        };

        match &msg.content {
            Content::Text(body) => self.relay.relay_text(bridge, msg, body).await,
            Content::Photo { .. }
            | Content::Sticker { .. }
            | Content::Document { .. }
            | Content::Voice { .. }
            | Content::Audio { .. }
            | Content::Video { .. } => match AttachmentDescriptor::for_content(&msg.content, bridge) {
                Some(attachment) => self.relay.relay_file(bridge, msg, attachment).await,
                None => Ok(()),
            },
            Content::Join(users) => {
                if bridge.telegram.relay_join_messages {
                    for user in users {
                        if let Err(err) = self.relay.relay_join(bridge, user).await {
                            error!(bridge = %bridge.name, user_id = user.id, error = %err, "Failed to relay join");
                        }
                    }
                }
                Ok(())
            }
            Content::Leave(user) => {
                if bridge.telegram.relay_leave_messages {
                    self.relay.relay_leave(bridge, user).await?;
                }
                Ok(())
            }
            Content::Unsupported => {
                debug!(bridge = %bridge.name, message_id = msg.message_id, "Unsupported message kind");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{test_bridge, Direction};
    use crate::convert::Mentions;
    use crate::message_map::{MapDirection, MessageKey, MessageMap, MessageStore};
    use crate::telegram::event::{FileRef, FormattedText, Sender};
    use crate::testing::{FakeDiscord, FakeTelegram};

    const CHAT: i64 = -100;
    const CHANNEL: u64 = 77;

    struct Harness {
        router: Router,
        discord: Arc<FakeDiscord>,
        telegram: Arc<FakeTelegram>,
        messages: Arc<MessageMap>,
    }

    fn harness(bridges: Vec<Bridge>) -> Harness {
        let discord = Arc::new(FakeDiscord::default());
        let telegram = Arc::new(FakeTelegram::default());
        let messages = Arc::new(MessageMap::new(None));
        let relay = Arc::new(Relay::new(
            discord.clone(),
            telegram.clone(),
            messages.clone(),
            Mentions::default(),
        ));
        let registry = Arc::new(BridgeRegistry::new(bridges).unwrap());
        let router = Router::new(registry, relay, telegram.clone(), "relaybot".to_string());

        Harness {
            router,
            discord,
            telegram,
            messages,
        }
    }

    fn default_harness() -> Harness {
        harness(vec![test_bridge("main", CHAT, CHANNEL)])
    }

    fn sender(first_name: &str, username: Option<&str>) -> Sender {
        Sender {
            id: 1,
            first_name: first_name.to_string(),
            last_name: None,
            username: username.map(str::to_string),
        }
    }

    fn message(chat_id: i64, message_id: i32, content: Content) -> CanonicalMessage {
        CanonicalMessage {
            message_id,
            chat_id,
            from: sender("Ada", Some("ada")),
            content,
        }
    }

    fn text(chat_id: i64, message_id: i32, body: &str) -> TelegramEvent {
        TelegramEvent::Message(message(
            chat_id,
            message_id,
            Content::Text(FormattedText::plain(body)),
        ))
    }

    #[tokio::test]
    async fn unbridged_chat_gets_one_notice_per_event() {
        let h = default_harness();

        h.router.handle(text(-5, 1, "hello")).await;
        h.router.handle(text(-5, 2, "anyone?")).await;

        let sent = h.telegram.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|s| s.chat_id == -5 && s.text == ADVISORY_NOTICE));
        assert!(h.discord.sent().is_empty());
    }

    #[tokio::test]
    async fn notice_failure_is_swallowed() {
        let h = default_harness();
        h.telegram.set_failing(true);

        h.router.handle(text(-5, 1, "hello")).await;

        assert!(h.telegram.sent().is_empty());
        assert!(h.discord.sent().is_empty());
    }

    #[tokio::test]
    async fn chat_info_answers_in_any_chat() {
        let h = default_harness();

        h.router.handle(text(-5, 1, "/chatinfo@RelayBot")).await;
        h.router.handle(text(CHAT, 2, " /chatinfo@relaybot ")).await;

        let sent = h.telegram.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text, "chatID: -5");
        assert_eq!(sent[1].text, "chatID: -100");
        assert!(h.discord.sent().is_empty());
    }

    #[tokio::test]
    async fn chat_info_for_other_bots_is_relayed() {
        let h = default_harness();

        h.router.handle(text(CHAT, 1, "/chatinfo@otherbot")).await;

        assert!(h.telegram.sent().is_empty());
        assert_eq!(h.discord.sent().len(), 1);
    }

    #[tokio::test]
    async fn forbidden_direction_is_silent() {
        let mut bridge = test_bridge("reverse", CHAT, CHANNEL);
        bridge.direction = Direction::DiscordToTelegram;
        let h = harness(vec![bridge]);

        h.router.handle(text(CHAT, 1, "hello")).await;

        assert!(h.discord.sent().is_empty());
        assert!(h.telegram.sent().is_empty());
    }

    #[tokio::test]
    async fn text_is_relayed_and_recorded() {
        let h = default_harness();

        h.router.handle(text(CHAT, 3, "hello")).await;

        let sent = h.discord.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, CHANNEL);
        assert_eq!(sent[0].text, "**Ada (@ada)**\nhello");
        let key = MessageKey::new(MapDirection::TelegramToDiscord, CHAT, 3);
        assert_eq!(h.messages.get(&key), Some(sent[0].message_id));
    }

    #[tokio::test]
    async fn edit_after_relay_edits_counterpart() {
        let h = default_harness();
        h.router.handle(text(CHAT, 3, "helo")).await;
        let original = h.discord.sent()[0].message_id;

        let edited = message(CHAT, 3, Content::Text(FormattedText::plain("hello")));
        h.router.handle(TelegramEvent::Edited(edited)).await;

        let edits = h.discord.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].message_id, original);
        assert_eq!(edits[0].text, "**Ada (@ada)**\nhello");
    }

    #[tokio::test]
    async fn removing_caption_edits_counterpart() {
        let h = default_harness();
        h.telegram.add_file("photo-1", "photos/file_1.jpg");
        let photo = |caption: Option<&str>| Content::Photo {
            file: FileRef {
                file_id: "photo-1".to_string(),
                file_name: None,
                mime_type: None,
            },
            caption: caption.map(FormattedText::plain),
        };

        h.router
            .handle(TelegramEvent::Message(message(CHAT, 5, photo(Some("old caption")))))
            .await;
        let original = h.discord.sent()[0].message_id;

        h.router
            .handle(TelegramEvent::Edited(message(CHAT, 5, photo(None))))
            .await;

        let edits = h.discord.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].message_id, original);
        assert_eq!(edits[0].text, "**Ada (@ada)**");
    }

    #[tokio::test]
    async fn edit_without_counterpart_is_dropped() {
        let h = default_harness();

        let edited = message(CHAT, 42, Content::Text(FormattedText::plain("hello")));
        h.router.handle(TelegramEvent::Edited(edited)).await;

        assert!(h.discord.edits().is_empty());
        assert!(h.discord.sent().is_empty());
    }

    #[tokio::test]
    async fn join_notices_follow_bridge_flag() {
        let mut quiet = test_bridge("quiet", CHAT, CHANNEL);
        quiet.telegram.relay_join_messages = false;
        let loud = test_bridge("loud", -200, CHANNEL);
        let h = harness(vec![quiet, loud]);
        let users = vec![sender("Bob", Some("bob")), sender("Eve", None)];

        h.router
            .handle(TelegramEvent::Message(message(CHAT, 1, Content::Join(users.clone()))))
            .await;
        assert!(h.discord.sent().is_empty());

        h.router
            .handle(TelegramEvent::Message(message(-200, 2, Content::Join(users))))
            .await;
        let sent = h.discord.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].text.contains("Bob") && sent[0].text.contains("@bob"));
        assert!(sent[1].text.contains("Eve") && sent[1].text.contains("No username"));
        assert_eq!(h.messages.len(), 0);
    }

    #[tokio::test]
    async fn leave_notice_follows_bridge_flag() {
        let mut bridge = test_bridge("main", CHAT, CHANNEL);
        bridge.telegram.relay_leave_messages = false;
        let h = harness(vec![bridge]);

        let leave = Content::Leave(sender("Bob", Some("bob")));
        h.router
            .handle(TelegramEvent::Message(message(CHAT, 1, leave.clone())))
            .await;
        assert!(h.discord.sent().is_empty());

        let h = default_harness();
        h.router
            .handle(TelegramEvent::Message(message(CHAT, 1, leave)))
            .await;
        let sent = h.discord.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("left"));
    }

    #[tokio::test]
    async fn document_without_name_uses_content_type() {
        let h = default_harness();
        h.telegram.add_file("doc-1", "documents/file_1");
        let doc = Content::Document {
            file: FileRef {
                file_id: "doc-1".to_string(),
                file_name: None,
                mime_type: Some("audio/ogg".to_string()),
            },
            caption: None,
        };

        h.router
            .handle(TelegramEvent::Message(message(CHAT, 8, doc)))
            .await;

        let sent = h.discord.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].file_name.as_deref(), Some("file.ogg"));
    }

    #[tokio::test]
    async fn failed_send_does_not_block_next_event() {
        let h = default_harness();

        h.discord.set_failing(true);
        h.router.handle(text(CHAT, 1, "lost")).await;
        h.discord.set_failing(false);
        h.router.handle(text(CHAT, 2, "delivered")).await;

        let sent = h.discord.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.ends_with("delivered"));
        assert_eq!(
            h.messages
                .get(&MessageKey::new(MapDirection::TelegramToDiscord, CHAT, 1)),
            None
        );
    }

    #[tokio::test]
    async fn unsupported_content_is_ignored() {
        let h = default_harness();

        h.router
            .handle(TelegramEvent::Message(message(CHAT, 1, Content::Unsupported)))
            .await;

        assert!(h.discord.sent().is_empty());
        assert!(h.telegram.sent().is_empty());
    }
}
