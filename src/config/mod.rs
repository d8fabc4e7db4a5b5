//! Configuration module for the dispatch gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use dispatch_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

/// Default path the voice relay is mounted on.
pub const DEFAULT_RELAY_PATH: &str = "/ws/gemini";

/// Gemini Live bidirectional streaming endpoint (v1alpha).
pub const DEFAULT_GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Model announced in the upstream setup message.
pub const DEFAULT_GEMINI_LIVE_MODEL: &str = "models/gemini-2.0-flash-exp";

/// Base URL of the Gemini REST API used by the chat endpoint.
pub const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used by the chat endpoint.
pub const DEFAULT_GEMINI_CHAT_MODEL: &str = "gemini-1.5-flash";

/// Base URL of the Telegram Bot API.
pub const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

/// Default system instruction for the dispatch chat operator.
///
/// Only the `[COMPLETE]` contract matters to the server; the rest is product copy
/// and is expected to be overridden through `CHAT_SYSTEM_INSTRUCTION`.
pub const DEFAULT_CHAT_SYSTEM_INSTRUCTION: &str = "You are the dispatch operator of a roadside \
assistance service. Qualify the emergency to send a tow truck: 1. exact location, 2. type of \
breakdown, 3. phone number. Be professional, concise and efficient. Once you have ALL the \
information, end your answer with [COMPLETE] followed by the JSON: { location, issue, phone }.";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS)
/// - Voice relay settings (path, upstream endpoint, model, optional hardening)
/// - Chat intake settings (Gemini REST model and generation parameters)
/// - Lead delivery settings (Telegram bot)
/// - Security settings (CORS, rate limiting, connection limits)
///
/// The configuration is built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Upstream credential shared by the relay and the chat endpoint
    pub google_api_key: Option<String>,

    // Voice relay
    pub relay_path: String,
    pub gemini_live_url: String,
    pub gemini_live_model: String,
    /// Close both legs after this many seconds without traffic.
    /// Default: None (sessions live until one side closes)
    pub relay_idle_timeout_seconds: Option<u64>,
    /// Frames held while the upstream leg is still connecting.
    /// Default: 0 (frames received before upstream open are dropped)
    pub relay_preopen_buffer_frames: usize,

    // Chat intake
    pub gemini_api_base_url: String,
    pub gemini_chat_model: String,
    pub chat_max_output_tokens: u32,
    pub chat_temperature: f32,
    pub chat_system_instruction: String,

    // Lead delivery
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_base_url: String,

    // Security settings
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent relay sessions
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum relay sessions per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.google_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.telegram_bot_token {
            token.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tls: None,
            google_api_key: None,
            relay_path: DEFAULT_RELAY_PATH.to_string(),
            gemini_live_url: DEFAULT_GEMINI_LIVE_URL.to_string(),
            gemini_live_model: DEFAULT_GEMINI_LIVE_MODEL.to_string(),
            relay_idle_timeout_seconds: None,
            relay_preopen_buffer_frames: 0,
            gemini_api_base_url: DEFAULT_GEMINI_API_BASE_URL.to_string(),
            gemini_chat_model: DEFAULT_GEMINI_CHAT_MODEL.to_string(),
            chat_max_output_tokens: 200,
            chat_temperature: 0.7,
            chat_system_instruction: DEFAULT_CHAT_SYSTEM_INSTRUCTION.to_string(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_base_url: DEFAULT_TELEGRAM_API_BASE_URL.to_string(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Environment variables (and the .env file loaded by `main`) provide the base
    /// configuration; YAML values override them. Validation runs on the merged result.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Google credential, if one is configured and non-empty.
    pub fn google_api_key(&self) -> Option<&str> {
        self.google_api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Telegram bot token and chat id, when both are configured.
    pub fn telegram_credentials(&self) -> Option<(&str, &str)> {
        match (
            self.telegram_bot_token.as_deref(),
            self.telegram_chat_id.as_deref(),
        ) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some((token, chat_id))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_ENABLED",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "GOOGLE_API_KEY",
        "RELAY_PATH",
        "GEMINI_LIVE_URL",
        "GEMINI_LIVE_MODEL",
        "RELAY_IDLE_TIMEOUT_SECONDS",
        "RELAY_PREOPEN_BUFFER_FRAMES",
        "GEMINI_API_BASE_URL",
        "GEMINI_CHAT_MODEL",
        "CHAT_MAX_OUTPUT_TOKENS",
        "CHAT_TEMPERATURE",
        "CHAT_SYSTEM_INSTRUCTION",
        "TELEGRAM_BOT_TOKEN",
        "TELEGRAM_CHAT_ID",
        "TELEGRAM_API_BASE_URL",
        "CORS_ALLOWED_ORIGINS",
        "RATE_LIMIT_REQUESTS_PER_SECOND",
        "RATE_LIMIT_BURST_SIZE",
        "MAX_WEBSOCKET_CONNECTIONS",
        "MAX_CONNECTIONS_PER_IP",
    ];

    fn cleanup_env_vars() {
        unsafe {
            for key in ENV_KEYS {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:3000");
        assert_eq!(config.relay_path, "/ws/gemini");
        assert_eq!(config.gemini_live_model, "models/gemini-2.0-flash-exp");
        assert_eq!(config.relay_idle_timeout_seconds, None);
        assert_eq!(config.relay_preopen_buffer_frames, 0);
        assert!(!config.is_tls_enabled());
        assert!(config.google_api_key().is_none());
    }

    #[test]
    fn test_google_api_key_ignores_empty_value() {
        let mut config = ServerConfig::default();
        config.google_api_key = Some(String::new());
        assert!(config.google_api_key().is_none());

        config.google_api_key = Some("key".to_string());
        assert_eq!(config.google_api_key(), Some("key"));
    }

    #[test]
    fn test_telegram_credentials_require_both_values() {
        let mut config = ServerConfig::default();
        config.telegram_bot_token = Some("token".to_string());
        assert!(config.telegram_credentials().is_none());

        config.telegram_chat_id = Some("42".to_string());
        assert_eq!(config.telegram_credentials(), Some(("token", "42")));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.relay_path, DEFAULT_RELAY_PATH);
        assert_eq!(config.gemini_live_url, DEFAULT_GEMINI_LIVE_URL);
        assert_eq!(config.rate_limit_requests_per_second, 60);
        assert_eq!(config.max_websocket_connections, None);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_relay_settings() {
        cleanup_env_vars();

        unsafe {
            env::set_var("GOOGLE_API_KEY", "env-google-key");
            env::set_var("RELAY_PATH", "/ws/voice");
            env::set_var("GEMINI_LIVE_MODEL", "models/gemini-live-test");
            env::set_var("RELAY_IDLE_TIMEOUT_SECONDS", "120");
            env::set_var("RELAY_PREOPEN_BUFFER_FRAMES", "16");
            env::set_var("PORT", "8080");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.google_api_key(), Some("env-google-key"));
        assert_eq!(config.relay_path, "/ws/voice");
        assert_eq!(config.gemini_live_model, "models/gemini-live-test");
        assert_eq!(config.relay_idle_timeout_seconds, Some(120));
        assert_eq!(config.relay_preopen_buffer_frames, 16);
        assert_eq!(config.port, 8080);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_relative_relay_path() {
        cleanup_env_vars();

        unsafe {
            env::set_var("RELAY_PATH", "ws/gemini");
        }

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("RELAY_PATH"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

providers:
  google_api_key: "yaml-key"

relay:
  path: "/ws/live"
  idle_timeout_seconds: 300
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("GOOGLE_API_KEY", "env-key");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.google_api_key(), Some("yaml-key"));
        assert_eq!(config.relay_path, "/ws/live");
        assert_eq!(config.relay_idle_timeout_seconds, Some(300));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_half_configured_telegram() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            r#"
providers:
  telegram_bot_token: "123:abc"
"#,
        )
        .unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("TELEGRAM_CHAT_ID"));

        cleanup_env_vars();
    }
}
