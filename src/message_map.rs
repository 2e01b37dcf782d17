//! Correspondence between relayed messages on both platforms, used to
//! find the counterpart of an edited message.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Which way the recorded message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapDirection {
    TelegramToDiscord,
    DiscordToTelegram,
}

/// Entries are scoped by the bridge's Telegram chat, since Telegram message
/// ids are only unique within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub direction: MapDirection,
    pub telegram_chat: i64,
    pub source_id: u64,
}

impl MessageKey {
    pub fn new(direction: MapDirection, telegram_chat: i64, source_id: u64) -> Self {
        Self {
            direction,
            telegram_chat,
            source_id,
        }
    }
}

/// Lookup/insert contract for the correspondence table. Implementations may
/// bound or persist the table; callers only rely on last-write-wins per key.
pub trait MessageStore: Send + Sync {
    fn insert(&self, key: MessageKey, destination_id: u64);
    fn get(&self, key: &MessageKey) -> Option<u64>;
}

#[derive(Default)]
struct MapInner {
    entries: HashMap<MessageKey, u64>,
    order: VecDeque<MessageKey>,
}

/// In-memory table. Without a capacity it never evicts; with one, the
/// oldest recorded key is dropped first.
#[derive(Default)]
pub struct MessageMap {
    inner: Mutex<MapInner>,
    capacity: Option<usize>,
}

impl MessageMap {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(MapInner::default()),
            capacity: capacity.filter(|cap| *cap > 0),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl MessageStore for MessageMap {
    fn insert(&self, key: MessageKey, destination_id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if inner.entries.insert(key, destination_id).is_some() {
            return;
        }
        inner.order.push_back(key);

        if let Some(capacity) = self.capacity {
            while inner.entries.len() > capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    fn get(&self, key: &MessageKey) -> Option<u64> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(key)
            .copied()
    }
}
