//! Clipboard collaborator. OS access lives in the host; surfaces see this trait.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::history::ContentItem;

#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Current clipboard content, or `None` when empty or unreadable.
    async fn read(&self) -> Option<Vec<ContentItem>>;
    async fn write(&self, content: &[ContentItem]) -> bool;
}

/// Clipboard kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    content: Mutex<Option<Vec<ContentItem>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(Some(vec![ContentItem::text(text)])),
        }
    }

    pub fn set(&self, content: Option<Vec<ContentItem>>) {
        *self.content.lock().expect("clipboard mutex poisoned") = content;
    }

    pub fn current(&self) -> Option<Vec<ContentItem>> {
        self.content.lock().expect("clipboard mutex poisoned").clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn read(&self) -> Option<Vec<ContentItem>> {
        self.current().filter(|items| !items.is_empty())
    }

    async fn write(&self, content: &[ContentItem]) -> bool {
        if content.is_empty() {
            return false;
        }
        self.set(Some(content.to_vec()));
        true
    }
}
