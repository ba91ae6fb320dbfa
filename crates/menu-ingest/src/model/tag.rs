use serde::{Deserialize, Serialize};

/// Where a tag value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Ai,
    Manual,
    Regulatory,
}

/// A canonical allergen or dietary tag with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedTag {
    pub code: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub source: TagSource,
}
