//! In-process fakes for the bot's collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::llm::ReplyGenerator;
use crate::platform::{ChatId, Messenger};
use crate::vision::ImageClassifier;

pub const LABELS: &[&str] = &["potted plant", "daisy", "watering can"];

#[derive(Default)]
pub struct FakeGenerator {
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reply_for(&self, text: &str) -> String {
        format!("Oh, {}? Move me closer to the window.", text)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyGenerator for FakeGenerator {
    async fn generate(&self, user_text: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(user_text.to_string());
        if self.fail {
            bail!("completion API unavailable");
        }
        Ok(self.reply_for(user_text))
    }
}

#[derive(Default)]
pub struct FakeClassifier {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageClassifier for FakeClassifier {
    fn classify(&self, image: &[u8]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("cannot decode image");
        }
        Ok(LABELS[image.len() % LABELS.len()].to_string())
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    fail_downloads: bool,
    fail_sends: bool,
    file_lookups: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
    send_attempts: AtomicUsize,
    sent: Mutex<Vec<(ChatId, String)>>,
}

impl FakeMessenger {
    pub fn failing_downloads() -> Self {
        Self {
            fail_downloads: true,
            ..Self::default()
        }
    }

    pub fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn file_lookups(&self) -> Vec<String> {
        self.file_lookups.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.file_lookups.lock().unwrap().len()
            + self.downloads.lock().unwrap().len()
            + self.send_attempts()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn get_file_path(&self, file_id: &str) -> Result<String> {
        self.file_lookups.lock().unwrap().push(file_id.to_string());
        Ok(format!("photos/{}.jpg", file_id))
    }

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(file_path.to_string());
        if self.fail_downloads {
            bail!("Telegram file download failed (404 Not Found)");
        }
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00])
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends {
            bail!("Telegram sendMessage failed (403 Forbidden)");
        }
        self.sent.lock().unwrap().push((chat_id.clone(), text.to_string()));
        Ok(())
    }
}
