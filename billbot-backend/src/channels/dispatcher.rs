use crate::ai::{ContentPartBuilder, WorkflowResult, WorkflowRunner};
use crate::channels::transport::{ChatTransport, OutboundImage};
use crate::channels::types::{DispatchOutcome, InboundContent, InboundMessage, PhotoVariant};
use crate::channels::typing::{DEFAULT_TYPING_INTERVAL, TypingIndicator};
use crate::channels::util::{TELEGRAM_MAX_MESSAGE_CHARS, preview, split_message};
use crate::error::BotError;
use crate::media::{ImageDeliveryResolver, IngestedPhoto, PhotoIngestor, select_largest};
use crate::quick_actions::QuickActionRegistry;
use crate::session::PendingPhotoStore;
use std::sync::Arc;
use std::time::Duration;

pub const FAILURE_REPLY: &str = "处理失败，请稍后重试。";
pub const UNSUPPORTED_REPLY: &str = "暂不支持这种消息类型，请发送文字或账单图片。";
const PHOTO_DOWNLOAD_FAILED_REPLY: &str = "图片下载失败，请重新发送。";

fn photo_buffered_reply(count: usize) -> String {
    format!(
        "已收到图片，共{}张。请继续发送图片，或发送文字说明（例如“午餐100元”）开始记账。",
        count
    )
}

fn cancel_reply(discarded: usize) -> String {
    if discarded == 0 {
        "当前没有待处理的图片。".to_string()
    } else {
        format!("已清空{}张待处理的图片。", discarded)
    }
}

fn chart_failed_notice(label: &str) -> String {
    format!("图表「{}」发送失败。", label)
}

/// Built-in commands handled before quick-action resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinCommand {
    Menu,
    Cancel,
}

fn builtin_command(text: &str) -> Option<BuiltinCommand> {
    let command = text.strip_prefix('/')?;
    let command = command.split_once('@').map_or(command, |(name, _)| name);
    match command {
        "start" | "help" | "menu" => Some(BuiltinCommand::Menu),
        "cancel" => Some(BuiltinCommand::Cancel),
        _ => None,
    }
}

/// Per-chat conversation state machine.
///
/// A chat is idle until an uncaptioned photo arrives; photos then accumulate in
/// the pending store until text (or a captioned photo) drains them into one
/// workflow run. Quick actions run on their own and leave the buffer alone.
pub struct ConversationDispatcher {
    transport: Arc<dyn ChatTransport>,
    workflow: WorkflowRunner,
    pending: PendingPhotoStore,
    ingestor: PhotoIngestor,
    delivery: ImageDeliveryResolver,
    quick_actions: &'static QuickActionRegistry,
    typing_interval: Duration,
}

impl ConversationDispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>, workflow: WorkflowRunner) -> Self {
        Self {
            transport,
            workflow,
            pending: PendingPhotoStore::new(),
            ingestor: PhotoIngestor::new(crate::http::shared_client().clone()),
            delivery: ImageDeliveryResolver::default(),
            quick_actions: QuickActionRegistry::global(),
            typing_interval: DEFAULT_TYPING_INTERVAL,
        }
    }

    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.typing_interval = interval;
        self
    }

    pub fn pending_photos(&self) -> &PendingPhotoStore {
        &self.pending
    }

    /// Handle one inbound message end to end. Never fails: every error is
    /// logged and answered in the chat.
    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        match &message.content {
            InboundContent::Text(text) => self.handle_text(&message, text.trim()).await,
            InboundContent::Photo { variants, caption } => {
                let caption = caption.as_deref().map(str::trim).filter(|c| !c.is_empty());
                self.handle_photo(&message, variants, caption).await
            }
            InboundContent::Unsupported => {
                log::info!("[DISPATCH] Unsupported message in chat {}", message.chat_id);
                self.reply(message.chat_id, UNSUPPORTED_REPLY).await;
                DispatchOutcome::Unsupported
            }
        }
    }

    async fn handle_text(&self, message: &InboundMessage, text: &str) -> DispatchOutcome {
        if text.is_empty() {
            return DispatchOutcome::Ignored;
        }

        match builtin_command(text) {
            Some(BuiltinCommand::Menu) => {
                self.reply(message.chat_id, &self.quick_actions.menu_text()).await;
                return DispatchOutcome::Menu;
            }
            Some(BuiltinCommand::Cancel) => {
                let discarded = self.pending.drain(message.chat_id).len();
                log::info!(
                    "[DISPATCH] Chat {} cancelled, discarded {} photo(s)",
                    message.chat_id,
                    discarded
                );
                self.reply(message.chat_id, &cancel_reply(discarded)).await;
                return DispatchOutcome::Cancelled(discarded);
            }
            None => {}
        }

        if let Some(action) = self.quick_actions.resolve(text) {
            log::info!(
                "[DISPATCH] Chat {} triggered quick action {}",
                message.chat_id,
                action.key
            );
            return self.run_turn(message, action.prompt, Vec::new()).await;
        }

        let photos = self.pending.drain(message.chat_id);
        log::info!(
            "[DISPATCH] Chat {} text with {} buffered photo(s): {}",
            message.chat_id,
            photos.len(),
            preview(text, 50)
        );
        self.run_turn(message, text, photos).await
    }

    async fn handle_photo(
        &self,
        message: &InboundMessage,
        variants: &[PhotoVariant],
        caption: Option<&str>,
    ) -> DispatchOutcome {
        let Some(variant) = select_largest(variants) else {
            log::warn!("[PHOTO] Chat {} sent a photo without variants", message.chat_id);
            self.reply(message.chat_id, UNSUPPORTED_REPLY).await;
            return DispatchOutcome::Unsupported;
        };

        let photo = match self.ingestor.download(self.transport.as_ref(), variant).await {
            Ok(photo) => photo,
            Err(e) => {
                log::error!(
                    "[PHOTO] Chat {} download of {} failed: {}",
                    message.chat_id,
                    variant.file_id,
                    e
                );
                self.reply(message.chat_id, PHOTO_DOWNLOAD_FAILED_REPLY).await;
                return DispatchOutcome::Failed(e.to_string());
            }
        };

        match caption {
            None => {
                let count = self.pending.append(message.chat_id, photo);
                log::info!(
                    "[DISPATCH] Chat {} buffered photo, {} pending",
                    message.chat_id,
                    count
                );
                self.reply(message.chat_id, &photo_buffered_reply(count)).await;
                DispatchOutcome::PhotoBuffered(count)
            }
            Some(caption) => {
                let mut photos = self.pending.drain(message.chat_id);
                photos.push(photo);
                log::info!(
                    "[DISPATCH] Chat {} captioned photo, {} photo(s) in turn",
                    message.chat_id,
                    photos.len()
                );
                self.run_turn(message, caption, photos).await
            }
        }
    }

    /// Upload photos, run the agent and deliver its answer. The typing
    /// indicator covers the upload and the run and is gone before any reply.
    async fn run_turn(
        &self,
        message: &InboundMessage,
        text: &str,
        photos: Vec<IngestedPhoto>,
    ) -> DispatchOutcome {
        let mut typing =
            TypingIndicator::start(self.transport.clone(), message.chat_id, self.typing_interval);
        let result = self.execute(message, text, photos).await;
        typing.stop();

        match result {
            Ok(result) => self.deliver(message.chat_id, result).await,
            Err(e) => {
                log::error!(
                    "[DISPATCH] Chat {} (user {}) workflow failed: {}",
                    message.chat_id,
                    message.user_id,
                    e
                );
                self.reply(message.chat_id, FAILURE_REPLY).await;
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }

    async fn execute(
        &self,
        message: &InboundMessage,
        text: &str,
        photos: Vec<IngestedPhoto>,
    ) -> Result<WorkflowResult, BotError> {
        let parts = ContentPartBuilder::build(self.workflow.runtime(), text, photos).await?;
        self.workflow.run(parts, &message.user_id).await
    }

    /// Text first, then each chart. A chart that can't be resolved or sent
    /// gets a one-line notice instead.
    async fn deliver(&self, chat_id: i64, result: WorkflowResult) -> DispatchOutcome {
        self.reply(chat_id, &result.output_text).await;

        let mut charts_sent = 0;
        let mut charts_failed = 0;
        for chart in &result.images {
            let label = chart.caption.as_deref().unwrap_or(&chart.file_name);
            let sent = match self.delivery.resolve(chart).await {
                Ok(image) => {
                    let outbound = OutboundImage {
                        bytes: image.bytes,
                        file_name: image.file_name,
                        content_type: image.content_type,
                        caption: image.caption,
                    };
                    self.transport.send_image(chat_id, outbound).await
                }
                Err(e) => Err(e),
            };

            match sent {
                Ok(()) => charts_sent += 1,
                Err(e) => {
                    charts_failed += 1;
                    log::warn!(
                        "[DELIVERY] Chat {} chart {} not delivered (recoverable={}): {}",
                        chat_id,
                        chart.file_name,
                        e.is_recoverable(),
                        e
                    );
                    self.reply(chat_id, &chart_failed_notice(label)).await;
                }
            }
        }

        DispatchOutcome::Completed {
            charts_sent,
            charts_failed,
        }
    }

    /// Send text, split to Telegram's limit. Send failures are only logged.
    async fn reply(&self, chat_id: i64, text: &str) {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_CHARS) {
            if let Err(e) = self.transport.send_text(chat_id, &chunk).await {
                log::error!("[DISPATCH] Chat {} failed to send reply: {}", chat_id, e);
            }
        }
    }
}
