//! Per-chat buffer of photos waiting for their accompanying text.
//!
//! Photos sent without a caption are parked here. The next text message (or
//! captioned photo) drains the buffer in one step, so a concurrent delivery for
//! the same chat either lands before the drain and is consumed, or after it and
//! starts a fresh buffer. Nothing is persisted across restarts.

use crate::media::IngestedPhoto;
use dashmap::DashMap;

#[derive(Default)]
pub struct PendingPhotoStore {
    buffers: DashMap<i64, Vec<IngestedPhoto>>,
}

impl PendingPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a photo for `chat_id` and return the buffered count.
    pub fn append(&self, chat_id: i64, photo: IngestedPhoto) -> usize {
        let mut entry = self.buffers.entry(chat_id).or_default();
        entry.push(photo);
        entry.len()
    }

    /// Take every buffered photo for `chat_id`, leaving the chat with no buffer.
    pub fn drain(&self, chat_id: i64) -> Vec<IngestedPhoto> {
        self.buffers
            .remove(&chat_id)
            .map(|(_, photos)| photos)
            .unwrap_or_default()
    }

    pub fn len(&self, chat_id: i64) -> usize {
        self.buffers.get(&chat_id).map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, chat_id: i64) -> bool {
        self.len(chat_id) == 0
    }

    /// Number of chats currently holding buffered photos.
    pub fn active_chats(&self) -> usize {
        self.buffers.len()
    }
}
