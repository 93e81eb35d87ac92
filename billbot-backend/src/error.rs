//! Error taxonomy for the conversation layer.
//!
//! Per-item failures (photo download, chart fetch/decode) are recoverable and
//! get reported for that item only. Everything else aborts the current turn and
//! is answered with a generic failure reply by the dispatcher.

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("too many redirects (limit {limit}) while fetching {url}")]
    TooManyRedirects { url: String, limit: usize },
    #[error("no image data: {0}")]
    NoImageData(String),
    #[error("image decode failed: {0}")]
    ImageDecode(String),
    #[error("agent produced no final output")]
    EmptyResult,
    #[error("agent error: {0}")]
    Agent(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl BotError {
    /// Errors that only affect a single photo or chart.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BotError::Download(_)
                | BotError::TooManyRedirects { .. }
                | BotError::NoImageData(_)
                | BotError::ImageDecode(_)
        )
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Download(err.to_string())
    }
}

impl From<teloxide::RequestError> for BotError {
    fn from(err: teloxide::RequestError) -> Self {
        BotError::Transport(err.to_string())
    }
}

impl From<base64::DecodeError> for BotError {
    fn from(err: base64::DecodeError) -> Self {
        BotError::ImageDecode(err.to_string())
    }
}
