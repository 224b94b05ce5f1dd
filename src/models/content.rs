//! Typed view of a page body and the legacy-shape normalization applied when
//! documents cross the store boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Structured body of a page document.
///
/// Stores keep the raw JSON value; this type is used to validate admin
/// writes and to describe the compiled templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A titled group of blocks in a legal document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Block {
    Paragraph { text: String },
    List { items: Vec<String> },
    Subheading { text: String },
    RichParagraph { parts: Vec<InlineSpan> },
}

/// A run of text inside a rich paragraph, optionally linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineSpan {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Check that a body is well formed before it is persisted.
pub fn validate_content(content: &Value) -> Result<(), AppError> {
    if !content.is_object() {
        return Err(AppError::BadRequest("Page content must be an object".into()));
    }

    serde_json::from_value::<PageContent>(content.clone())
        .map(|_| ())
        .map_err(|e| AppError::BadRequest(format!("Malformed page content: {}", e)))
}

/// Map legacy body shapes onto the canonical one.
///
/// - `address: [..]` becomes `addressLine1` / `addressLine2`
/// - bare string blocks become paragraphs, bare string arrays become lists
///
/// Canonical input comes back unchanged.
pub fn normalize_legacy_content(content: Value) -> Value {
    let mut map = match content {
        Value::Object(map) => map,
        other => return other,
    };

    if let Some(Value::Array(lines)) = map.get("address").cloned() {
        map.remove("address");
        let lines: Vec<String> = lines
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();

        if !map.contains_key("addressLine1") && !map.contains_key("addressLine2") {
            if let Some((first, rest)) = lines.split_first() {
                map.insert("addressLine1".into(), Value::String(first.clone()));
                if !rest.is_empty() {
                    map.insert("addressLine2".into(), Value::String(rest.join(", ")));
                }
            }
        }
    }

    if let Some(Value::Array(sections)) = map.get_mut("sections") {
        for section in sections.iter_mut() {
            if let Some(Value::Array(blocks)) = section.get_mut("blocks") {
                for block in blocks.iter_mut() {
                    normalize_block(block);
                }
            }
        }
    }

    Value::Object(map)
}

fn normalize_block(block: &mut Value) {
    let replacement = match block {
        Value::String(text) => serde_json::json!({ "type": "paragraph", "text": text }),
        Value::Array(items) if items.iter().all(Value::is_string) => {
            serde_json::json!({ "type": "list", "items": items })
        }
        _ => return,
    };
    *block = replacement;
}
