//! Decoding of stored analysis content.
//!
//! The summarization provider returns structured content blocks, and the
//! store keeps them serialized. Historically the stored value has taken
//! several shapes (a block list, a single block, a bare string), so the
//! decoder enumerates each recognized shape as an explicit variant with an
//! explicit fallback, rather than sniffing fields at render time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kernel::ContentBlock;

/// Every shape a stored analysis is known to take.
///
/// Variant order matters: serde tries them top to bottom, so the most
/// specific shapes come first and `Other` catches anything unrecognized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisContent {
    /// A list of content blocks (the provider's native response shape).
    Blocks(Vec<ContentBlock>),
    /// A single content block.
    Single(ContentBlock),
    /// A bare string.
    Text(String),
    /// Anything else: preserved as-is and rendered from its serialized form.
    Other(Value),
}

impl AnalysisContent {
    /// Decode a stored analysis string.
    ///
    /// Returns `None` for the empty placeholder. A non-empty value that is
    /// not valid JSON is treated as bare text rather than rejected.
    pub fn decode(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<AnalysisContent>(raw) {
            Ok(content) => Some(content),
            Err(_) => Some(AnalysisContent::Text(raw.to_string())),
        }
    }

    /// Extract displayable text.
    ///
    /// Text blocks contribute their text; blocks without text are skipped.
    /// If nothing displayable remains, the raw serialized form is returned
    /// so the observer always sees something.
    pub fn display_text(&self) -> String {
        let rendered = match self {
            AnalysisContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| b.text.clone())
                .collect::<Vec<_>>()
                .join("\n\n"),
            AnalysisContent::Single(block) => block.text.clone().unwrap_or_default(),
            AnalysisContent::Text(text) => text.clone(),
            AnalysisContent::Other(value) => value.to_string(),
        };

        if rendered.trim().is_empty() {
            serde_json::to_string(self).unwrap_or_default()
        } else {
            rendered
        }
    }
}
