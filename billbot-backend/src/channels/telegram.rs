use crate::channels::dispatcher::ConversationDispatcher;
use crate::channels::transport::{ChatTransport, OutboundImage, ResolvedFile};
use crate::channels::types::{InboundContent, InboundMessage, PhotoVariant};
use crate::channels::util::preview;
use crate::config::Config;
use crate::error::BotError;
use crate::quick_actions::QuickActionRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatAction, InputFile, Message};

/// Direct download URL for a file path returned by `getFile`.
pub fn file_download_url(api_url: &str, token: &str, path: &str) -> String {
    format!(
        "{}/file/bot{}/{}",
        api_url.trim_end_matches('/'),
        token,
        path.trim_start_matches('/')
    )
}

/// Telegram side of the `ChatTransport` seam
pub struct TelegramTransport {
    bot: Bot,
    token: String,
    api_url: String,
}

impl TelegramTransport {
    pub fn new(bot: Bot, token: &str, api_url: &str) -> Self {
        Self {
            bot,
            token: token.to_string(),
            api_url: api_url.to_string(),
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }

    async fn send_image(&self, chat_id: i64, image: OutboundImage) -> Result<(), BotError> {
        log::debug!(
            "[TELEGRAM] Sending {} ({}, {} bytes) to chat {}",
            image.file_name,
            image.content_type,
            image.bytes.len(),
            chat_id
        );
        let photo = InputFile::memory(image.bytes).file_name(image.file_name);
        let request = self.bot.send_photo(ChatId(chat_id), photo);
        match image.caption {
            Some(caption) => request.caption(caption).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), BotError> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await?;
        Ok(())
    }

    async fn resolve_file(&self, file_id: &str) -> Result<ResolvedFile, BotError> {
        let file = self.bot.get_file(file_id).await?;
        if file.path.is_empty() {
            return Err(BotError::Download(format!(
                "Telegram returned no file path for {}",
                file_id
            )));
        }
        Ok(ResolvedFile {
            url: file_download_url(&self.api_url, &self.token, &file.path),
            path: file.path,
        })
    }
}

/// Normalize a Telegram message. Messages without a sender are dropped.
fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from()?;
    let user_name = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    let content = if let Some(text) = msg.text() {
        InboundContent::Text(text.to_string())
    } else if let Some(photos) = msg.photo() {
        InboundContent::Photo {
            variants: photos
                .iter()
                .map(|p| PhotoVariant {
                    file_id: p.file.id.clone(),
                    width: p.width,
                    height: p.height,
                })
                .collect(),
            caption: msg.caption().map(str::to_string),
        }
    } else {
        InboundContent::Unsupported
    };

    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        user_id: user.id.0.to_string(),
        user_name,
        content,
    })
}

/// Slash commands shown in Telegram's command menu.
pub fn bot_commands(registry: &QuickActionRegistry) -> Vec<BotCommand> {
    let mut commands = vec![BotCommand::new("start", "显示快捷操作菜单")];
    commands.extend(
        registry
            .actions()
            .iter()
            .map(|action| BotCommand::new(action.key.to_string(), action.title)),
    );
    commands.push(BotCommand::new("cancel", "清空待处理的图片"));
    commands
}

async fn handle_message(
    msg: Message,
    dispatcher: Arc<ConversationDispatcher>,
) -> ResponseResult<()> {
    let Some(inbound) = to_inbound(&msg) else {
        log::debug!("[TELEGRAM] Ignoring message without sender in chat {}", msg.chat.id);
        return Ok(());
    };

    log::info!(
        "[TELEGRAM] Message from {} ({}) in chat {}: {}",
        inbound.user_name,
        inbound.user_id,
        inbound.chat_id,
        match &inbound.content {
            InboundContent::Text(text) => preview(text, 50),
            InboundContent::Photo { .. } => "<photo>".to_string(),
            InboundContent::Unsupported => "<unsupported>".to_string(),
        }
    );

    let outcome = dispatcher.dispatch(inbound).await;
    log::debug!("[TELEGRAM] Dispatch outcome: {:?}", outcome);
    Ok(())
}

pub fn build_bot(config: &Config) -> Bot {
    let bot = Bot::new(&config.telegram_bot_token);
    match reqwest::Url::parse(&config.telegram_api_url) {
        Ok(url) => bot.set_api_url(url),
        Err(e) => {
            log::warn!(
                "[TELEGRAM] Invalid TELEGRAM_API_URL {}: {}, using default",
                config.telegram_api_url,
                e
            );
            bot
        }
    }
}

/// Register commands and long-poll until Ctrl-C.
///
/// Updates from one chat are handled in arrival order; different chats run
/// concurrently.
pub async fn start_telegram_listener(bot: Bot, dispatcher: Arc<ConversationDispatcher>) {
    if let Err(e) = bot
        .set_my_commands(bot_commands(QuickActionRegistry::global()))
        .await
    {
        log::error!("[TELEGRAM] Failed to register bot commands: {}", e);
    }

    match bot.get_me().await {
        Ok(me) => log::info!("[TELEGRAM] Connected as @{}", me.username()),
        Err(e) => log::warn!("[TELEGRAM] getMe failed: {}", e),
    }

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("[TELEGRAM] Listener stopped");
}
