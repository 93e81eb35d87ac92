use serde::{Deserialize, Serialize};

/// One resolution of an inbound photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoVariant {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

impl PhotoVariant {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Payload of an inbound chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text(String),
    /// All sizes the transport offers for one photo, plus its caption
    Photo {
        variants: Vec<PhotoVariant>,
        caption: Option<String>,
    },
    /// Stickers, voice, documents and anything else we don't handle
    Unsupported,
}

/// Normalized message from any chat transport
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_id: String,
    pub user_name: String,
    pub content: InboundContent,
}

/// What the dispatcher did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Quick-action menu was shown
    Menu,
    /// Photo buffered; carries the chat's new buffer size
    PhotoBuffered(usize),
    /// `/cancel`; carries the number of discarded photos
    Cancelled(usize),
    /// A workflow ran and its reply was delivered
    Completed { charts_sent: usize, charts_failed: usize },
    /// Text arrived with nothing to process
    Ignored,
    Unsupported,
    /// The turn failed and the user got the generic failure reply
    Failed(String),
}
