use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use super::{RelayError, RelayResult};
use crate::config::ServerConfig;

/// Upstream WebSocket stream type.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MODEL_PREFIX: &str = "models/";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// First message sent on every upstream connection.
///
/// Serializes to
/// `{"setup":{"model":"models/...","generationConfig":{"responseModalities":["AUDIO"]}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupMessage {
    pub setup: SetupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupConfig {
    pub model: String,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Audio,
    Text,
}

/// Opens upstream connections for relay sessions.
///
/// Holds the endpoint, credential and model read from configuration. The
/// credential is attached as the `key` query parameter and never appears in
/// logs; use [`UpstreamConnector::redacted_url`] for diagnostics.
#[derive(Clone)]
pub struct UpstreamConnector {
    endpoint: String,
    api_key: Zeroizing<String>,
    model: String,
    connect_timeout: Duration,
}

impl std::fmt::Debug for UpstreamConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConnector")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl UpstreamConnector {
    /// Create a connector. Fails with [`RelayError::MissingCredential`] when the
    /// key is empty.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl AsRef<str>,
    ) -> RelayResult<Self> {
        let api_key = Zeroizing::new(api_key.into());
        if api_key.trim().is_empty() {
            return Err(RelayError::MissingCredential);
        }

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            model: normalize_model(model.as_ref()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn from_config(config: &ServerConfig) -> RelayResult<Self> {
        let api_key = config.google_api_key().ok_or(RelayError::MissingCredential)?;
        Self::new(&config.gemini_live_url, api_key, &config.gemini_live_model)
    }

    /// Fully qualified model id, always `models/`-prefixed.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Upstream URL including the credential.
    pub fn url(&self) -> RelayResult<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            RelayError::UpstreamConstruction(format!("invalid endpoint '{}': {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RelayError::UpstreamConstruction(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// Upstream URL with the credential masked.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.endpoint) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("key", "***");
                url.to_string()
            }
            Err(_) => self.endpoint.clone(),
        }
    }

    /// Build the WebSocket handshake request.
    pub fn build_request(&self) -> RelayResult<Request> {
        let url = self.url()?;
        url.as_str()
            .into_client_request()
            .map_err(|e| RelayError::UpstreamConstruction(e.to_string()))
    }

    pub fn setup_message(&self) -> SetupMessage {
        SetupMessage {
            setup: SetupConfig {
                model: self.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec![ResponseModality::Audio],
                },
            },
        }
    }

    /// Setup message as the JSON text frame sent upstream.
    pub fn setup_frame(&self) -> RelayResult<String> {
        serde_json::to_string(&self.setup_message())
            .map_err(|e| RelayError::Serialization(e.to_string()))
    }

    /// Open the upstream connection.
    ///
    /// Transport failures and timeouts map to [`RelayError::UpstreamConnection`].
    pub async fn connect(request: Request, timeout: Duration) -> RelayResult<UpstreamSocket> {
        debug!(host = ?request.uri().host(), "Connecting to upstream");

        let (socket, _response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| {
                RelayError::UpstreamConnection(format!(
                    "connection timed out after {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| RelayError::UpstreamConnection(e.to_string()))?;

        Ok(socket)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

fn normalize_model(model: &str) -> String {
    let model = model.trim();
    if model.starts_with(MODEL_PREFIX) {
        model.to_string()
    } else {
        format!("{MODEL_PREFIX}{model}")
    }
}
