use std::path::PathBuf;

use super::utils::{env_var, env_var_or, parse_bool, parse_env};
use super::{
    DEFAULT_CHAT_SYSTEM_INSTRUCTION, DEFAULT_GEMINI_API_BASE_URL, DEFAULT_GEMINI_CHAT_MODEL,
    DEFAULT_GEMINI_LIVE_MODEL, DEFAULT_GEMINI_LIVE_URL, DEFAULT_RELAY_PATH,
    DEFAULT_TELEGRAM_API_BASE_URL, ServerConfig, TlsConfig, validation,
};

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded by `main` before this is called, so actual
    /// environment variables take precedence over .env values.
    ///
    /// # Example
    /// ```rust,no_run
    /// use dispatch_gateway::config::ServerConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ServerConfig::from_env()?;
    /// println!("Relay mounted on {}", config.relay_path);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_from_env()?;
        validation::validate(&config)?;
        Ok(config)
    }
}

/// Build a configuration from environment variables and defaults, without validation.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let tls = load_tls_from_env()?;

    Ok(ServerConfig {
        host: env_var_or("HOST", "0.0.0.0"),
        port: parse_env::<u16>("PORT")?.unwrap_or(3000),
        tls,
        google_api_key: env_var("GOOGLE_API_KEY"),
        relay_path: env_var_or("RELAY_PATH", DEFAULT_RELAY_PATH),
        gemini_live_url: env_var_or("GEMINI_LIVE_URL", DEFAULT_GEMINI_LIVE_URL),
        gemini_live_model: env_var_or("GEMINI_LIVE_MODEL", DEFAULT_GEMINI_LIVE_MODEL),
        relay_idle_timeout_seconds: parse_env::<u64>("RELAY_IDLE_TIMEOUT_SECONDS")?
            .filter(|secs| *secs > 0),
        relay_preopen_buffer_frames: parse_env::<usize>("RELAY_PREOPEN_BUFFER_FRAMES")?
            .unwrap_or(0),
        gemini_api_base_url: env_var_or("GEMINI_API_BASE_URL", DEFAULT_GEMINI_API_BASE_URL),
        gemini_chat_model: env_var_or("GEMINI_CHAT_MODEL", DEFAULT_GEMINI_CHAT_MODEL),
        chat_max_output_tokens: parse_env::<u32>("CHAT_MAX_OUTPUT_TOKENS")?.unwrap_or(200),
        chat_temperature: parse_env::<f32>("CHAT_TEMPERATURE")?.unwrap_or(0.7),
        chat_system_instruction: env_var_or(
            "CHAT_SYSTEM_INSTRUCTION",
            DEFAULT_CHAT_SYSTEM_INSTRUCTION,
        ),
        telegram_bot_token: env_var("TELEGRAM_BOT_TOKEN"),
        telegram_chat_id: env_var("TELEGRAM_CHAT_ID"),
        telegram_api_base_url: env_var_or("TELEGRAM_API_BASE_URL", DEFAULT_TELEGRAM_API_BASE_URL),
        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: parse_env::<u32>("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(60),
        rate_limit_burst_size: parse_env::<u32>("RATE_LIMIT_BURST_SIZE")?.unwrap_or(10),
        max_websocket_connections: parse_env::<usize>("MAX_WEBSOCKET_CONNECTIONS")?,
        max_connections_per_ip: parse_env::<u32>("MAX_CONNECTIONS_PER_IP")?.unwrap_or(100),
    })
}

fn load_tls_from_env() -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    let enabled = env_var("TLS_ENABLED")
        .map(|v| parse_bool(&v))
        .unwrap_or(false);
    if !enabled {
        return Ok(None);
    }

    match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        _ => Err("TLS_ENABLED is set but TLS_CERT_PATH and TLS_KEY_PATH are not both set".into()),
    }
}
