//! Normalisation of the JSON document returned by the model.
//!
//! The model output is treated as untrusted: nameless items are dropped,
//! confidence values outside [0, 1] become absent, and tags and prices are
//! accepted in the handful of shapes models actually produce.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    normalize_confidence, ParseError, ParsedMenu, ParsedMenuItem, ParsedMenuTag, ParsedPrice,
    TokenUsage, MAX_MENU_ITEMS,
};

static PRICE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("valid price regex"));

/// Parses the model's message content into a [`ParsedMenu`].
pub fn parse_menu_content(
    content: &str,
    model: &str,
    usage: Option<TokenUsage>,
) -> Result<ParsedMenu, ParseError> {
    let body = strip_code_fence(content);
    let document: Value = serde_json::from_str(body)
        .map_err(|e| ParseError::Malformed(format!("response is not JSON: {}", e)))?;

    let (raw_items, root) = match &document {
        Value::Array(items) => (items.as_slice(), None),
        Value::Object(obj) => match obj.get("items") {
            Some(Value::Array(items)) => (items.as_slice(), Some(obj)),
            Some(Value::Null) | None => {
                return Err(ParseError::Malformed(
                    "response has no items array".to_string(),
                ))
            }
            Some(_) => {
                return Err(ParseError::Malformed("items is not an array".to_string()));
            }
        },
        _ => {
            return Err(ParseError::Malformed(
                "expected a JSON object with an items array".to_string(),
            ))
        }
    };

    let summary = root.and_then(|obj| string_field(obj, &["summary"]));
    let mut warnings: Vec<String> = root
        .and_then(|obj| obj.get("warnings"))
        .and_then(Value::as_array)
        .map(|ws| {
            ws.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut items = Vec::with_capacity(raw_items.len().min(MAX_MENU_ITEMS));
    let mut skipped = 0usize;
    for raw in raw_items {
        match item_from_value(raw) {
            Some(item) => items.push(item),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {} parsed item(s) without a name", skipped);
        warnings.push(format!("Skipped {} item(s) without a name", skipped));
    }

    if items.len() > MAX_MENU_ITEMS {
        warnings.push(format!(
            "Response listed {} items; kept the first {}",
            items.len(),
            MAX_MENU_ITEMS
        ));
        items.truncate(MAX_MENU_ITEMS);
    }

    Ok(ParsedMenu {
        model: model.to_string(),
        items,
        summary,
        warnings,
        usage,
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn item_from_value(value: &Value) -> Option<ParsedMenuItem> {
    let obj = value.as_object()?;
    let name = string_field(obj, &["name", "title"])?;

    Some(ParsedMenuItem {
        name,
        description: string_field(obj, &["description"]),
        section: string_field(obj, &["section"]),
        category: string_field(obj, &["category"]),
        price: obj.get("price").and_then(price_from_value),
        confidence: obj.get("confidence").and_then(confidence_from_value),
        raw_text: string_field(obj, &["rawText", "raw_text"]),
        allergens: obj.get("allergens").map(tags_from_value).unwrap_or_default(),
        dietary_tags: ["dietaryTags", "dietary_tags", "dietary"]
            .iter()
            .find_map(|key| obj.get(*key))
            .map(tags_from_value)
            .unwrap_or_default(),
        ai_payload: value.clone(),
    })
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Non-numeric confidence values are treated as absent.
pub fn confidence_from_value(value: &Value) -> Option<f64> {
    normalize_confidence(value.as_f64())
}

fn tags_from_value(value: &Value) -> Vec<ParsedMenuTag> {
    match value {
        Value::Array(entries) => entries.iter().filter_map(tag_from_value).collect(),
        Value::String(list) => list
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(|label| ParsedMenuTag {
                code: None,
                label: label.to_string(),
                confidence: None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn tag_from_value(value: &Value) -> Option<ParsedMenuTag> {
    match value {
        Value::String(label) => {
            let label = label.trim();
            (!label.is_empty()).then(|| ParsedMenuTag {
                code: None,
                label: label.to_string(),
                confidence: None,
            })
        }
        Value::Object(obj) => {
            let code = string_field(obj, &["code"]);
            let label = string_field(obj, &["label", "name"]).or_else(|| code.clone())?;
            Some(ParsedMenuTag {
                code,
                label,
                confidence: obj.get("confidence").and_then(confidence_from_value),
            })
        }
        _ => None,
    }
}

fn price_from_value(value: &Value) -> Option<ParsedPrice> {
    match value {
        Value::Number(n) => n.as_f64().filter(|a| a.is_finite() && *a >= 0.0).map(|a| {
            ParsedPrice {
                amount: Some(a),
                currency: None,
                textual: None,
            }
        }),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| ParsedPrice {
                amount: amount_from_text(s),
                currency: None,
                textual: Some(s.to_string()),
            })
        }
        Value::Object(obj) => {
            let amount = match obj.get("amount") {
                Some(Value::Number(n)) => n.as_f64().filter(|a| a.is_finite() && *a >= 0.0),
                Some(Value::String(s)) => amount_from_text(s),
                _ => None,
            };
            let currency = string_field(obj, &["currency"]);
            let textual = string_field(obj, &["textual", "text"]);
            if amount.is_none() && currency.is_none() && textual.is_none() {
                return None;
            }
            Some(ParsedPrice {
                amount,
                currency,
                textual,
            })
        }
        _ => None,
    }
}

/// First number in a printed price, e.g. `"£12.50"` → `12.5`.
///
/// The last separator is decimal when a dot is followed by one or two
/// digits, or a comma by exactly two; every other separator groups
/// thousands, so `"1,250"` is `1250`.
fn amount_from_text(text: &str) -> Option<f64> {
    let token = PRICE_AMOUNT.find(text)?.as_str();

    let (whole, fraction) = match token.rfind(|c| c == '.' || c == ',') {
        Some(at) if is_decimal_separator(&token[at..]) => (&token[..at], Some(&token[at + 1..])),
        _ => (token, None),
    };

    let mut number: String = whole.chars().filter(char::is_ascii_digit).collect();
    if let Some(fraction) = fraction {
        number.push('.');
        number.push_str(fraction);
    }
    number.parse().ok()
}

fn is_decimal_separator(tail: &str) -> bool {
    let digits = tail.len() - 1;
    if tail.starts_with('.') {
        (1..=2).contains(&digits)
    } else {
        digits == 2
    }
}
