//! Token accounting reported by AI providers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Token counts for one provider call.
///
/// Counts come from the provider and are summed with saturating arithmetic.
///
/// Serialized camelCase. Deserialization also accepts the snake_case field
/// names some providers (and older stored rows) use, and derives
/// `totalTokens` from the other two counts when it is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Reads a usage object in either naming convention.
    ///
    /// Returns `None` when `value` is not an object or carries none of the
    /// known counters.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |camel: &str, snake: &str| {
            obj.get(camel)
                .and_then(as_count)
                .or_else(|| obj.get(snake).and_then(as_count))
        };

        let input = field("inputTokens", "input_tokens");
        let output = field("outputTokens", "output_tokens");
        let total = field("totalTokens", "total_tokens");

        if input.is_none() && output.is_none() && total.is_none() {
            return None;
        }

        let input_tokens = input.unwrap_or(0);
        let output_tokens = output.unwrap_or(0);
        Some(Self {
            input_tokens,
            output_tokens,
            total_tokens: total.unwrap_or(input_tokens.saturating_add(output_tokens)),
        })
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.is_finite()).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for TokenUsage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| D::Error::custom("expected a token usage object"))
    }
}
