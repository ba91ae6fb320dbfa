//! Maps raw AI tag labels onto canonical [`IdentifiedTag`]s.

use crate::ai::ParsedMenuTag;
use crate::model::{IdentifiedTag, TagSource};

/// Maps one parsed tag. A model-supplied code is kept as given (trimmed);
/// without one the code is a slug of the label. The confidence is clamped
/// to [0, 1].
pub fn map_ai_tag(tag: &ParsedMenuTag) -> IdentifiedTag {
    let label = tag.label.trim().to_string();
    let code = tag
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| slugify(&label));

    IdentifiedTag {
        code,
        label,
        confidence: tag.confidence.filter(|c| !c.is_nan()).map(clamp_unit),
        source: TagSource::Ai,
    }
}

/// Maps a list of parsed tags, dropping ones without a usable label and
/// keeping only the first tag for each code.
pub fn map_ai_tags(tags: &[ParsedMenuTag]) -> Vec<IdentifiedTag> {
    let mut mapped: Vec<IdentifiedTag> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = map_ai_tag(tag);
        if tag.code.is_empty() || mapped.iter().any(|m| m.code == tag.code) {
            continue;
        }
        mapped.push(tag);
    }
    mapped
}

/// Clamps into [0, 1].
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Lowercase alphanumeric runs joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(code: Option<&str>, label: &str, confidence: Option<f64>) -> ParsedMenuTag {
        ParsedMenuTag {
            code: code.map(str::to_string),
            label: label.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_code_defaults_to_slug_of_label() {
        let mapped = map_ai_tag(&tag(None, "Gluten Free", None));
        assert_eq!(mapped.code, "gluten-free");
        assert_eq!(mapped.label, "Gluten Free");
        assert_eq!(mapped.source, TagSource::Ai);
        assert_eq!(mapped.confidence, None);
    }

    #[test]
    fn test_given_code_is_kept() {
        let mapped = map_ai_tag(&tag(Some("dairy"), "dairy", Some(0.9)));
        assert_eq!(mapped.code, "dairy");
        assert_eq!(mapped.label, "dairy");
        assert_eq!(mapped.confidence, Some(0.9));
    }

    #[test]
    fn test_model_code_is_not_slugified() {
        let mapped = map_ai_tag(&tag(Some("  EU-14:Celery "), "Celery", None));
        assert_eq!(mapped.code, "EU-14:Celery");

        let blank = map_ai_tag(&tag(Some("   "), "Tree Nuts", None));
        assert_eq!(blank.code, "tree-nuts");
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(map_ai_tag(&tag(None, "nuts", Some(1.4))).confidence, Some(1.0));
        assert_eq!(map_ai_tag(&tag(None, "nuts", Some(-2.0))).confidence, Some(0.0));
        assert_eq!(map_ai_tag(&tag(None, "nuts", Some(f64::NAN))).confidence, None);
    }

    #[test]
    fn test_map_ai_tags_drops_empty_and_duplicates() {
        let mapped = map_ai_tags(&[
            tag(None, "Dairy", Some(0.8)),
            tag(Some("dairy"), "Milk", Some(0.6)),
            tag(None, "  ", None),
            tag(None, "!!!", None),
            tag(None, "Sesame", None),
        ]);
        let codes: Vec<_> = mapped.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["dairy", "sesame"]);
        assert_eq!(mapped[0].label, "Dairy");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Tree Nuts (almond) "), "tree-nuts-almond");
        assert_eq!(slugify("crustaceans"), "crustaceans");
        assert_eq!(slugify("Sulphur--Dioxide"), "sulphur-dioxide");
        assert_eq!(slugify("Végétarien"), "végétarien");
    }
}
