//! Recording fakes for the platform clients.

use crate::discord::{DiscordApi, Upload};
use crate::error::RelayError;
use crate::telegram::{DownloadedFile, TelegramApi};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordSend {
    pub channel_id: u64,
    pub text: String,
    pub file_name: Option<String>,
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordEdit {
    pub channel_id: u64,
    pub message_id: u64,
    pub text: String,
}

#[derive(Default)]
pub struct FakeDiscord {
    sent: Mutex<Vec<DiscordSend>>,
    edits: Mutex<Vec<DiscordEdit>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl FakeDiscord {
    pub fn sent(&self) -> Vec<DiscordSend> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<DiscordEdit> {
        self.edits.lock().unwrap().clone()
    }

    /// Makes every following call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Discord("Missing Access".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscordApi for FakeDiscord {
    async fn send(
        &self,
        channel_id: u64,
        text: &str,
        upload: Option<Upload>,
    ) -> Result<u64, RelayError> {
        self.check()?;
        let message_id = 1000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(DiscordSend {
            channel_id,
            text: text.to_string(),
            file_name: upload.map(|u| u.file_name),
            message_id,
        });
        Ok(message_id)
    }

    async fn edit(&self, channel_id: u64, message_id: u64, text: &str) -> Result<(), RelayError> {
        self.check()?;
        self.edits.lock().unwrap().push(DiscordEdit {
            channel_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSend {
    pub chat_id: i64,
    pub text: String,
    pub message_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramEdit {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
}

#[derive(Default)]
pub struct FakeTelegram {
    sent: Mutex<Vec<TelegramSend>>,
    edits: Mutex<Vec<TelegramEdit>>,
    /// file id -> server-side path
    files: Mutex<HashMap<String, String>>,
    next_id: AtomicI32,
    failing: AtomicBool,
}

impl FakeTelegram {
    pub fn sent(&self) -> Vec<TelegramSend> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<TelegramEdit> {
        self.edits.lock().unwrap().clone()
    }

    pub fn add_file(&self, file_id: &str, path: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), path.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Telegram("Forbidden".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TelegramApi for FakeTelegram {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32, RelayError> {
        self.check()?;
        let message_id = 500 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(TelegramSend {
            chat_id,
            text: text.to_string(),
            message_id,
        });
        Ok(message_id)
    }

    async fn edit_text(&self, chat_id: i64, message_id: i32, text: &str) -> Result<(), RelayError> {
        self.check()?;
        self.edits.lock().unwrap().push(TelegramEdit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile, RelayError> {
        self.check()?;
        let path = self
            .files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| RelayError::Telegram(format!("file {} not found", file_id)))?;
        Ok(DownloadedFile {
            path,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        })
    }
}
