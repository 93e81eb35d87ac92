use crate::channels::transport::ChatTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default refresh period; Telegram drops the indicator after ~5s
pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_millis(4500);

/// Keeps a chat's "typing" indicator alive until stopped or dropped.
///
/// Dropping the guard stops the refresh loop, so every exit path of the
/// owning scope releases it.
pub struct TypingIndicator {
    chat_id: i64,
    handle: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    pub fn start(transport: Arc<dyn ChatTransport>, chat_id: i64, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = transport.send_typing(chat_id).await {
                    log::debug!("[TYPING] chat {}: {}", chat_id, e);
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self {
            chat_id,
            handle: Some(handle),
        }
    }

    /// Stop refreshing. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::debug!("[TYPING] Stopped for chat {}", self.chat_id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::transport::{OutboundImage, ResolvedFile};
    use crate::error::BotError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        typing: AtomicUsize,
    }

    #[async_trait]
    impl ChatTransport for CountingTransport {
        async fn send_text(&self, _chat_id: i64, _text: &str) -> Result<(), BotError> {
            Ok(())
        }

        async fn send_image(&self, _chat_id: i64, _image: OutboundImage) -> Result<(), BotError> {
            Ok(())
        }

        async fn send_typing(&self, _chat_id: i64) -> Result<(), BotError> {
            self.typing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn resolve_file(&self, _file_id: &str) -> Result<ResolvedFile, BotError> {
            Err(BotError::Transport("unused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_refreshes_until_stopped() {
        let transport = Arc::new(CountingTransport::default());
        let mut typing = TypingIndicator::start(transport.clone(), 1, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(55)).await;
        typing.stop();
        assert!(!typing.is_active());
        let sent = transport.typing.load(Ordering::SeqCst);
        assert!(sent >= 2, "expected repeated typing signals, got {}", sent);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(transport.typing.load(Ordering::SeqCst), sent);

        // second stop is a no-op
        typing.stop();
    }

    #[tokio::test]
    async fn test_drop_stops_indicator() {
        let transport = Arc::new(CountingTransport::default());
        {
            let _typing = TypingIndicator::start(transport.clone(), 1, Duration::from_millis(10));
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        let sent = transport.typing.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(transport.typing.load(Ordering::SeqCst), sent);
    }
}
