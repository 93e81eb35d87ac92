use dotenv::dotenv;
use std::sync::Arc;

mod ai;
mod channels;
mod config;
mod error;
mod http;
mod media;
mod quick_actions;
mod session;
#[cfg(test)]
mod test_support;

use ai::{OpenAiAgentRuntime, WorkflowRunner};
use channels::ConversationDispatcher;
use channels::telegram::{self, TelegramTransport};
use config::Config;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Fatal: {}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Starting billbot (model {}, tool server {} at {})",
        config.agent.model,
        config.agent.mcp_server_label,
        config.agent.mcp_server_url
    );

    let runtime = Arc::new(OpenAiAgentRuntime::new(&config.agent));
    if !ai::AgentRuntime::is_configured(runtime.as_ref()) {
        log::warn!("OPENAI_API_KEY is not set; every workflow run will fail until it is configured");
    }
    let workflow = WorkflowRunner::new(runtime, &config.agent);

    let bot = telegram::build_bot(&config);
    let transport = Arc::new(TelegramTransport::new(
        bot.clone(),
        &config.telegram_bot_token,
        &config.telegram_api_url,
    ));

    let dispatcher = Arc::new(
        ConversationDispatcher::new(transport, workflow).with_typing_interval(config.typing_interval),
    );

    telegram::start_telegram_listener(bot, dispatcher).await;
}
