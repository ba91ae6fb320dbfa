//! OpenAI-compatible chat-completions parser.
//!
//! Works against any endpoint that implements `/chat/completions` with
//! `response_format: {"type": "json_object"}` (OpenAI, Azure-style proxies,
//! LiteLLM, Ollama's OpenAI shim).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::config::AiConfig;

use super::prompt::{system_prompt, user_prompt};
use super::response::parse_menu_content;
use super::{MenuParser, ParseError, ParseMenuInput, ParsedMenu, TokenUsage};

pub struct OpenAiMenuParser {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_input_chars: usize,
}

impl std::fmt::Debug for OpenAiMenuParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiMenuParser")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"****")
            .finish()
    }
}

impl OpenAiMenuParser {
    /// Builds a parser from config, reading the API key from the environment
    /// variable named by `api_key_env`.
    pub fn from_config(config: &AiConfig) -> Result<Self, ParseError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ParseError::NotConfigured(format!("{} not set", config.api_key_env))
        })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, ParseError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ParseError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_input_chars: config.max_input_chars,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, input: &ParseMenuInput) -> Result<ParsedMenu, ParseError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(input, self.max_input_chars),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ParseError::Request(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ParseError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ParseError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ParseError::Api { status, message });
        }

        parse_chat_response(&body, &self.model)
    }
}

#[async_trait]
impl MenuParser for OpenAiMenuParser {
    async fn parse(&self, input: &ParseMenuInput) -> Result<ParsedMenu, ParseError> {
        let span = info_span!(
            "ai.parse",
            model = %self.model,
            text_chars = input.text.chars().count()
        );
        self.send(input).instrument(span).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    total_tokens: Option<u64>,
}

impl From<ChatUsage> for TokenUsage {
    fn from(usage: ChatUsage) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage
                .total_tokens
                .unwrap_or(usage.prompt_tokens.saturating_add(usage.completion_tokens)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Turns a chat-completions response body into a [`ParsedMenu`].
fn parse_chat_response(body: &str, requested_model: &str) -> Result<ParsedMenu, ParseError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let model = response
        .model
        .unwrap_or_else(|| requested_model.to_string());
    let usage = response.usage.map(TokenUsage::from);

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Malformed("no choices in response".to_string()))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(ParseError::Api {
            status: 200,
            message: "response blocked by provider content filter".to_string(),
        });
    }

    let content = choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ParseError::Malformed("empty message content".to_string()))?;

    let mut menu = parse_menu_content(&content, &model, usage)?;
    if choice.finish_reason.as_deref() == Some("length") {
        warn!("AI response hit the output token limit");
        menu.warnings
            .push("AI response hit the output token limit; later items may be missing".to_string());
    }
    debug!(items = menu.items.len(), "Parsed AI response");
    Ok(menu)
}
