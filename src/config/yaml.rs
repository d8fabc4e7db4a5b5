use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///   tls:
///     enabled: true
///     cert_path: "/etc/dispatch/cert.pem"
///     key_path: "/etc/dispatch/key.pem"
///
/// providers:
///   google_api_key: "your-google-key"
///   telegram_bot_token: "123456:ABC"
///   telegram_chat_id: "-100123456"
///
/// relay:
///   path: "/ws/gemini"
///   upstream_url: "wss://generativelanguage.googleapis.com/ws/..."
///   model: "models/gemini-2.0-flash-exp"
///   idle_timeout_seconds: 600
///   preopen_buffer_frames: 0
///
/// chat:
///   api_base_url: "https://generativelanguage.googleapis.com/v1beta"
///   model: "gemini-1.5-flash"
///   max_output_tokens: 200
///   temperature: 0.7
///   system_instruction: "..."
///
/// telegram:
///   api_base_url: "https://api.telegram.org"
///
/// security:
///   cors_allowed_origins: "https://example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 500
///   max_connections_per_ip: 20
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub relay: Option<RelayYaml>,
    pub chat: Option<ChatYaml>,
    pub telegram: Option<TelegramYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// Google API key for Gemini Live (relay) and Gemini REST (chat)
    pub google_api_key: Option<String>,
    /// Telegram bot token used to deliver leads
    pub telegram_bot_token: Option<String>,
    /// Telegram chat that receives leads
    pub telegram_chat_id: Option<String>,
}

/// Voice relay configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub path: Option<String>,
    pub upstream_url: Option<String>,
    pub model: Option<String>,
    /// 0 disables the idle timeout
    pub idle_timeout_seconds: Option<u64>,
    pub preopen_buffer_frames: Option<usize>,
}

/// Chat intake configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChatYaml {
    pub api_base_url: Option<String>,
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
}

/// Telegram delivery configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelegramYaml {
    pub api_base_url: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent relay sessions
    pub max_websocket_connections: Option<usize>,
    /// Maximum relay sessions per IP address
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  tls:
    enabled: true
    cert_path: "/tmp/cert.pem"
    key_path: "/tmp/key.pem"

providers:
  google_api_key: "g-key"
  telegram_bot_token: "123:abc"
  telegram_chat_id: "-100"

relay:
  path: "/ws/voice"
  upstream_url: "ws://127.0.0.1:9000/live"
  model: "models/test-model"
  idle_timeout_seconds: 60
  preopen_buffer_frames: 8

chat:
  model: "gemini-test"
  max_output_tokens: 64
  temperature: 0.2

security:
  cors_allowed_origins: "*"
  max_websocket_connections: 10
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host, Some("127.0.0.1".to_string()));
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.tls.as_ref().unwrap().enabled, Some(true));

        let providers = config.providers.as_ref().unwrap();
        assert_eq!(providers.google_api_key, Some("g-key".to_string()));
        assert_eq!(providers.telegram_chat_id, Some("-100".to_string()));

        let relay = config.relay.as_ref().unwrap();
        assert_eq!(relay.path, Some("/ws/voice".to_string()));
        assert_eq!(relay.idle_timeout_seconds, Some(60));
        assert_eq!(relay.preopen_buffer_frames, Some(8));

        let chat = config.chat.as_ref().unwrap();
        assert_eq!(chat.max_output_tokens, Some(64));
        assert_eq!(chat.temperature, Some(0.2));

        let security = config.security.as_ref().unwrap();
        assert_eq!(security.cors_allowed_origins, Some("*".to_string()));
        assert_eq!(security.max_websocket_connections, Some(10));
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.relay.is_none());
        assert!(config.providers.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "relay:\n  path: \"/ws/test\"\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(
            config.relay.unwrap().path,
            Some("/ws/test".to_string())
        );
    }
}
