//! AI menu parsing: the parser contract, its result types and the shipped
//! OpenAI-compatible implementation.

pub mod openai;
pub mod prompt;
pub mod response;
pub mod usage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::OpenAiMenuParser;
pub use usage::TokenUsage;

/// Upper bound on candidates a single parse may yield.
pub const MAX_MENU_ITEMS: usize = 150;

/// Errors from an AI parse call.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("AI request failed: {0}")]
    Request(String),

    #[error("AI provider returned error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("AI provider rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Malformed AI response: {0}")]
    Malformed(String),

    #[error("AI provider not configured: {0}")]
    NotConfigured(String),
}

/// Text plus the hints passed to the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseMenuInput {
    pub text: String,
    pub restaurant_name: Option<String>,
    pub menu_name: Option<String>,
    pub upload_file_name: Option<String>,
    pub locale: Option<String>,
}

/// A raw allergen or dietary label as produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMenuTag {
    pub code: Option<String>,
    pub label: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPrice {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    /// Price as printed, e.g. "Market price" or "£12 / £18".
    pub textual: Option<String>,
}

/// One candidate dish.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMenuItem {
    pub name: String,
    pub description: Option<String>,
    pub section: Option<String>,
    pub category: Option<String>,
    pub price: Option<ParsedPrice>,
    /// Always within [0, 1] when present.
    pub confidence: Option<f64>,
    pub raw_text: Option<String>,
    pub allergens: Vec<ParsedMenuTag>,
    pub dietary_tags: Vec<ParsedMenuTag>,
    pub ai_payload: serde_json::Value,
}

impl ParsedMenuItem {
    /// Minimal item, mostly useful when building fixtures.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            section: None,
            category: None,
            price: None,
            confidence: None,
            raw_text: None,
            allergens: Vec::new(),
            dietary_tags: Vec::new(),
            ai_payload: serde_json::Value::Null,
        }
    }
}

/// Result of one parse call.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMenu {
    pub model: String,
    pub items: Vec<ParsedMenuItem>,
    pub summary: Option<String>,
    pub warnings: Vec<String>,
    pub usage: Option<TokenUsage>,
}

/// Converts menu text into structured candidate items.
///
/// Implementations apply their own timeouts; the worker treats any error,
/// including a timeout, as a failed run for that upload.
#[async_trait]
pub trait MenuParser: Send + Sync {
    async fn parse(&self, input: &ParseMenuInput) -> Result<ParsedMenu, ParseError>;
}

/// Drops confidence values that are not finite or fall outside [0, 1].
pub fn normalize_confidence(value: Option<f64>) -> Option<f64> {
    value.filter(|c| c.is_finite() && (0.0..=1.0).contains(c))
}
