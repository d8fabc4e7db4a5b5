use url::Url;

use super::ServerConfig;

/// Validate a merged configuration.
///
/// Checks that:
/// - the relay path is absolute
/// - the upstream endpoint is a `ws`/`wss` URL
/// - the REST base URLs parse
/// - Telegram credentials are either both set or both unset
/// - rate limiting and per-IP connection limits are non-zero
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_relay_path(&config.relay_path)?;
    validate_live_url(&config.gemini_live_url)?;
    validate_http_url("GEMINI_API_BASE_URL", &config.gemini_api_base_url)?;
    validate_http_url("TELEGRAM_API_BASE_URL", &config.telegram_api_base_url)?;
    validate_telegram(
        config.telegram_bot_token.as_deref(),
        config.telegram_chat_id.as_deref(),
    )?;

    if config.rate_limit_requests_per_second == 0 {
        return Err("RATE_LIMIT_REQUESTS_PER_SECOND must be greater than 0".into());
    }
    if config.rate_limit_burst_size == 0 {
        return Err("RATE_LIMIT_BURST_SIZE must be greater than 0".into());
    }
    if config.max_connections_per_ip == 0 {
        return Err("MAX_CONNECTIONS_PER_IP must be greater than 0".into());
    }

    Ok(())
}

fn validate_relay_path(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.starts_with('/') {
        return Err(format!("RELAY_PATH must start with '/', got: {path}").into());
    }
    if path.contains(['?', '#', '{', '}', '*']) {
        return Err(format!("RELAY_PATH must be a literal path, got: {path}").into());
    }
    if path == "/" || path.starts_with("/api/") {
        return Err(format!("RELAY_PATH conflicts with a built-in route: {path}").into());
    }
    Ok(())
}

fn validate_live_url(raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(raw).map_err(|e| format!("Invalid GEMINI_LIVE_URL '{raw}': {e}"))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!("GEMINI_LIVE_URL must use ws or wss, got: {other}").into()),
    }
}

fn validate_http_url(key: &str, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(raw).map_err(|e| format!("Invalid {key} '{raw}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{key} must use http or https, got: {other}").into()),
    }
}

fn validate_telegram(
    token: Option<&str>,
    chat_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (token, chat_id) {
        (Some(_), None) => Err("TELEGRAM_BOT_TOKEN is set but TELEGRAM_CHAT_ID is missing".into()),
        (None, Some(_)) => Err("TELEGRAM_CHAT_ID is set but TELEGRAM_BOT_TOKEN is missing".into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_relay_path() {
        assert!(validate_relay_path("/ws/gemini").is_ok());
        assert!(validate_relay_path("ws/gemini").is_err());
        assert!(validate_relay_path("/ws/{id}").is_err());
        assert!(validate_relay_path("/ws/gemini?x=1").is_err());
        assert!(validate_relay_path("/").is_err());
        assert!(validate_relay_path("/api/chat").is_err());
    }

    #[test]
    fn test_validate_live_url_scheme() {
        assert!(validate_live_url("wss://example.com/live").is_ok());
        assert!(validate_live_url("ws://127.0.0.1:9000").is_ok());
        assert!(validate_live_url("https://example.com/live").is_err());
        assert!(validate_live_url("not a url").is_err());
    }

    #[test]
    fn test_validate_telegram_pairs() {
        assert!(validate_telegram(None, None).is_ok());
        assert!(validate_telegram(Some("t"), Some("c")).is_ok());
        assert!(validate_telegram(Some("t"), None).is_err());
        assert!(validate_telegram(None, Some("c")).is_err());
    }

    #[test]
    fn test_validate_rate_limit_zero() {
        let mut config = ServerConfig::default();
        config.rate_limit_requests_per_second = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_per_ip_limit_zero() {
        let mut config = ServerConfig::default();
        config.max_connections_per_ip = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("MAX_CONNECTIONS_PER_IP"));

        config.max_connections_per_ip = 1;
        assert!(validate(&config).is_ok());
    }
}
