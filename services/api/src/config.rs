use std::net::SocketAddr;
use tracing::Level;

/// The persona the assistant speaks with for the whole session.
const DEFAULT_INSTRUCTIONS: &str = "\
You are Search Assistant, an AI expert in finding results on the web. Your role is to:

- Help users discover results based on their search query
- Guide the conversation in a warm, friendly, and concise manner
- Ask focused questions about what topic they want to search

Conversation flow:
1. Start with a brief, welcoming greeting
2. Ask about search topics

Guidelines:
- Keep responses brief and focused
- Offer to text the user a link when they want to keep a result
";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Constructed once in `main` and passed by reference everywhere a session
/// needs it; there is no ambient mutable configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Base WebSocket URL of the realtime conversation service.
    pub realtime_api_url: String,
    pub realtime_model: String,
    pub openai_api_key: String,
    /// Voice used for the assistant's audio output.
    pub voice: String,
    /// System persona instructions sent during session negotiation.
    pub instructions: String,
    pub search_api_key: String,
    pub sms_account_sid: String,
    pub sms_auth_token: String,
    /// Sender number for SMS delivery.
    pub sms_from_number: String,
    /// The single preconfigured recipient for `send_result`.
    pub sms_to_number: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let realtime_api_url = std::env::var("REALTIME_API_URL")
            .unwrap_or_else(|_| "wss://api.openai.com/v1/realtime".to_string());
        let realtime_model = std::env::var("REALTIME_MODEL")
            .unwrap_or_else(|_| "gpt-4o-realtime-preview-2024-10-01".to_string());
        let voice = std::env::var("VOICE").unwrap_or_else(|_| "alloy".to_string());
        let instructions = std::env::var("SYSTEM_INSTRUCTIONS")
            .unwrap_or_else(|_| DEFAULT_INSTRUCTIONS.to_string());

        Ok(Self {
            bind_address,
            log_level,
            realtime_api_url,
            realtime_model,
            openai_api_key: require("OPENAI_API_KEY")?,
            voice,
            instructions,
            search_api_key: require("SEARCH_API_KEY")?,
            sms_account_sid: require("SMS_ACCOUNT_SID")?,
            sms_auth_token: require("SMS_AUTH_TOKEN")?,
            sms_from_number: require("SMS_FROM_NUMBER")?,
            sms_to_number: require("SMS_TO_NUMBER")?,
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}
