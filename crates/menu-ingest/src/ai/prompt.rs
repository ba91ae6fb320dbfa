//! Prompt construction for menu parsing.

use std::fmt::Write;

use super::{ParseMenuInput, MAX_MENU_ITEMS};

/// Describes the JSON document the model must return.
pub fn system_prompt() -> String {
    format!(
        r#"You extract dishes from restaurant menus.
Respond with a single JSON object and nothing else:
{{
  "summary": string,
  "warnings": [string],
  "items": [
    {{
      "name": string,
      "description": string | null,
      "section": string | null,
      "category": string | null,
      "price": {{"amount": number | null, "currency": string | null, "textual": string | null}} | null,
      "confidence": number between 0 and 1,
      "rawText": string | null,
      "allergens": [{{"code": string | null, "label": string, "confidence": number | null}}],
      "dietaryTags": [{{"code": string | null, "label": string, "confidence": number | null}}]
    }}
  ]
}}
Rules:
- Only list dishes and drinks that are actually on the menu. Never invent items.
- Return at most {max} items.
- Allergens use the 14 UK/EU regulated allergens where possible (e.g. "gluten", "dairy", "nuts").
- Dietary tags describe suitability (e.g. "vegan", "vegetarian", "gluten-free").
- Put anything you could not read or were unsure about in "warnings"."#,
        max = MAX_MENU_ITEMS
    )
}

/// Builds the user message: hints first, then the (truncated) menu text.
pub fn user_prompt(input: &ParseMenuInput, max_input_chars: usize) -> String {
    let mut prompt = String::new();

    // Writing to a String cannot fail.
    if let Some(name) = &input.restaurant_name {
        let _ = writeln!(prompt, "Restaurant: {}", sanitize_for_prompt(name));
    }
    if let Some(menu) = &input.menu_name {
        let _ = writeln!(prompt, "Menu: {}", sanitize_for_prompt(menu));
    }
    if let Some(file) = &input.upload_file_name {
        let _ = writeln!(prompt, "File: {}", sanitize_for_prompt(file));
    }
    let _ = writeln!(
        prompt,
        "Locale: {}",
        input.locale.as_deref().unwrap_or("en-GB")
    );

    let (text, truncated) = truncate_chars(&input.text, max_input_chars);
    if truncated {
        let _ = writeln!(
            prompt,
            "Note: the menu text was truncated to {} characters.",
            max_input_chars
        );
    }

    prompt.push_str("\n--- MENU TEXT ---\n");
    prompt.push_str(&sanitize_for_prompt(text));
    prompt.push_str("\n--- END MENU TEXT ---\n");
    prompt
}

/// Escapes chat-template control sequences so document text cannot close
/// the user turn or open a system turn.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

/// Returns at most `max_chars` characters of `text` and whether it was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
