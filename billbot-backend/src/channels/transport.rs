use crate::error::BotError;
use async_trait::async_trait;

/// Image to send to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    pub caption: Option<String>,
}

/// Direct download location for a transport file handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub url: String,
    /// Server-side path; its last segment names the file
    pub path: String,
}

/// Capabilities the conversation layer needs from a chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), BotError>;

    async fn send_image(&self, chat_id: i64, image: OutboundImage) -> Result<(), BotError>;

    /// Show the "typing" presence once; platforms expire it after a few seconds
    async fn send_typing(&self, chat_id: i64) -> Result<(), BotError>;

    async fn resolve_file(&self, file_id: &str) -> Result<ResolvedFile, BotError>;
}
