use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{ChatError, ChatResult};
use crate::config::ServerConfig;
use crate::core::conversation::{ChatPart, ChatTurn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Sampling limits sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 200,
            temperature: 0.7,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<ChatTurn>,
    generation_config: GenerationSettings,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ChatPart>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Client for the hosted model's single-shot text generation endpoint.
#[derive(Clone)]
pub struct GeminiChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Zeroizing<String>,
    system_instruction: String,
    settings: GenerationSettings,
}

impl std::fmt::Debug for GeminiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("settings", &self.settings)
            .finish()
    }
}

impl GeminiChatClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        model: impl AsRef<str>,
        api_key: impl Into<String>,
    ) -> ChatResult<Self> {
        let api_key = Zeroizing::new(api_key.into());
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingCredential);
        }

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model
                .as_ref()
                .trim()
                .trim_start_matches("models/")
                .to_string(),
            api_key,
            system_instruction: String::new(),
            settings: GenerationSettings::default(),
        })
    }

    pub fn from_config(config: &ServerConfig, http: reqwest::Client) -> ChatResult<Self> {
        let api_key = config.google_api_key().ok_or(ChatError::MissingCredential)?;
        Ok(Self::new(
            http,
            &config.gemini_api_base_url,
            &config.gemini_chat_model,
            api_key,
        )?
        .with_system_instruction(&config.chat_system_instruction)
        .with_settings(GenerationSettings {
            max_output_tokens: config.chat_max_output_tokens,
            temperature: config.chat_temperature,
        }))
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send `message` after `history` and return the model's reply text.
    ///
    /// History roles are folded to `model`/`user` before sending.
    pub async fn send(&self, history: &[ChatTurn], message: &str) -> ChatResult<String> {
        let mut contents: Vec<ChatTurn> = history.iter().map(ChatTurn::normalized).collect();
        contents.push(ChatTurn::user(message));

        let body = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: [TextPart {
                    text: &self.system_instruction,
                }],
            },
            contents,
            generation_config: self.settings,
        };

        debug!(
            model = %self.model,
            turns = body.contents.len(),
            "Sending chat request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .map(|b| b.error.message)
                .unwrap_or(raw);
            warn!(status = status.as_u16(), "Model API returned an error");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(text)
    }
}
