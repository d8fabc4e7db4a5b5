use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Merge environment configuration (base) with YAML overrides.
///
/// Every value present in the YAML replaces the environment value; absent
/// YAML values keep the environment value (or its default).
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(true) => match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    _ => {
                        return Err(
                            "server.tls.enabled is true but cert_path and key_path are not both set"
                                .into(),
                        );
                    }
                },
                Some(false) => config.tls = None,
                None => {}
            }
        }
    }

    if let Some(providers) = yaml.providers {
        if providers.google_api_key.is_some() {
            config.google_api_key = providers.google_api_key;
        }
        if providers.telegram_bot_token.is_some() {
            config.telegram_bot_token = providers.telegram_bot_token;
        }
        if providers.telegram_chat_id.is_some() {
            config.telegram_chat_id = providers.telegram_chat_id;
        }
    }

    if let Some(relay) = yaml.relay {
        if let Some(path) = relay.path {
            config.relay_path = path;
        }
        if let Some(url) = relay.upstream_url {
            config.gemini_live_url = url;
        }
        if let Some(model) = relay.model {
            config.gemini_live_model = model;
        }
        if let Some(secs) = relay.idle_timeout_seconds {
            config.relay_idle_timeout_seconds = (secs > 0).then_some(secs);
        }
        if let Some(frames) = relay.preopen_buffer_frames {
            config.relay_preopen_buffer_frames = frames;
        }
    }

    if let Some(chat) = yaml.chat {
        if let Some(base) = chat.api_base_url {
            config.gemini_api_base_url = base;
        }
        if let Some(model) = chat.model {
            config.gemini_chat_model = model;
        }
        if let Some(tokens) = chat.max_output_tokens {
            config.chat_max_output_tokens = tokens;
        }
        if let Some(temperature) = chat.temperature {
            config.chat_temperature = temperature;
        }
        if let Some(instruction) = chat.system_instruction {
            config.chat_system_instruction = instruction;
        }
    }

    if let Some(telegram) = yaml.telegram
        && let Some(base) = telegram.api_base_url
    {
        config.telegram_api_base_url = base;
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if security.max_websocket_connections.is_some() {
            config.max_websocket_connections = security.max_websocket_connections;
        }
        if let Some(per_ip) = security.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    Ok(config)
}
