use crate::error::BotError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AGENT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_AGENT_TEMPERATURE: f32 = 0.2;
const DEFAULT_AGENT_MAX_OUTPUT_TOKENS: u32 = 2048;
const DEFAULT_FINANCE_MCP_URL: &str = "http://localhost:8000/mcp";
const DEFAULT_FINANCE_MCP_LABEL: &str = "finance";
const DEFAULT_TYPING_INTERVAL_MS: u64 = 4500;

/// Settings handed to the agent runtime and the workflow runner.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// `None` leaves the agent unconfigured; workflow runs then fail fast
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub mcp_server_url: String,
    pub mcp_server_label: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_AGENT_MODEL.to_string(),
            temperature: DEFAULT_AGENT_TEMPERATURE,
            max_output_tokens: DEFAULT_AGENT_MAX_OUTPUT_TOKENS,
            mcp_server_url: DEFAULT_FINANCE_MCP_URL.to_string(),
            mcp_server_label: DEFAULT_FINANCE_MCP_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub agent: AgentSettings,
    pub typing_interval: Duration,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Only the Telegram token is mandatory. A missing agent key is tolerated
    /// here and reported per workflow run instead.
    pub fn from_env() -> Result<Self, BotError> {
        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BotError::Configuration("TELEGRAM_BOT_TOKEN must be set".to_string()))?;

        let agent = AgentSettings {
            api_key: env::var("OPENAI_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: env::var("AGENT_MODEL").unwrap_or_else(|_| DEFAULT_AGENT_MODEL.to_string()),
            temperature: parse_or_default("AGENT_TEMPERATURE", DEFAULT_AGENT_TEMPERATURE),
            max_output_tokens: parse_or_default(
                "AGENT_MAX_OUTPUT_TOKENS",
                DEFAULT_AGENT_MAX_OUTPUT_TOKENS,
            ),
            mcp_server_url: env::var("FINANCE_MCP_URL")
                .unwrap_or_else(|_| DEFAULT_FINANCE_MCP_URL.to_string()),
            mcp_server_label: env::var("FINANCE_MCP_LABEL")
                .unwrap_or_else(|_| DEFAULT_FINANCE_MCP_LABEL.to_string()),
        };

        Ok(Self {
            telegram_bot_token,
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            agent,
            typing_interval: Duration::from_millis(parse_or_default(
                "TYPING_INTERVAL_MS",
                DEFAULT_TYPING_INTERVAL_MS,
            )),
        })
    }
}

fn parse_or_default<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_value<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            log::warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_falls_back_on_garbage() {
        assert_eq!(parse_value("AGENT_MAX_OUTPUT_TOKENS", "4096", 2048u32), 4096);
        assert_eq!(parse_value("AGENT_MAX_OUTPUT_TOKENS", " 512 ", 2048u32), 512);
        assert_eq!(parse_value("AGENT_MAX_OUTPUT_TOKENS", "lots", 2048u32), 2048);
        assert_eq!(parse_value("AGENT_TEMPERATURE", "0.7", 0.2f32), 0.7);
    }

    #[test]
    fn test_agent_settings_default() {
        let settings = AgentSettings::default();
        assert!(settings.api_key.is_none());
        assert_eq!(settings.model, DEFAULT_AGENT_MODEL);
        assert_eq!(settings.mcp_server_label, "finance");
        assert_eq!(settings.max_output_tokens, 2048);
    }
}
