use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::content::normalize_legacy_content;

/// Schema version stamped on documents that don't carry one.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// The closed set of page documents managed by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSlug {
    TermsOfService,
    PrivacyPolicy,
    Contact,
}

impl PageSlug {
    /// Every managed slug, in sweep order.
    pub const ALL: [PageSlug; 3] = [
        PageSlug::TermsOfService,
        PageSlug::PrivacyPolicy,
        PageSlug::Contact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageSlug::TermsOfService => "terms-of-service",
            PageSlug::PrivacyPolicy => "privacy-policy",
            PageSlug::Contact => "contact",
        }
    }

    /// Legal documents are organised in sections; a copy with one section or
    /// fewer is considered a placeholder.
    pub fn has_sections(&self) -> bool {
        matches!(self, PageSlug::TermsOfService | PageSlug::PrivacyPolicy)
    }

    /// File name of the JSON mirror (`page.<slug>.json`).
    pub fn file_name(&self) -> String {
        format!("page.{}.json", self.as_str())
    }
}

impl fmt::Display for PageSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageSlug {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageSlug::ALL
            .into_iter()
            .find(|slug| slug.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown page slug '{}'", s)))
    }
}

/// A structured page document as stored in both backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDocument {
    pub schema_version: u32,
    pub slug: PageSlug,
    /// Revision marker. Only advanced by writes and read-time upgrades.
    pub updated_at: DateTime<Utc>,
    /// Opaque SEO metadata (title, description, keywords).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<Value>,
    #[serde(default = "empty_object")]
    pub content: Value,
    /// Unknown top-level keys, kept so admin writes round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl PageDocument {
    /// Whether the body carries anything worth seeding from.
    pub fn has_content(&self) -> bool {
        match &self.content {
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::String(text) => !text.is_empty(),
            _ => false,
        }
    }

    /// Make sure the revision marker lands strictly after `previous`.
    pub fn advance_past(&mut self, previous: Option<DateTime<Utc>>) {
        if let Some(previous) = previous {
            if self.updated_at <= previous {
                self.updated_at = previous + Duration::milliseconds(1);
            }
        }
    }

    /// Serialize back into the raw JSON shape used on disk and in the record store.
    pub fn to_value(&self) -> Result<Value, AppError> {
        serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize page document: {}", e)))
    }
}

/// Revision timestamps are kept at millisecond precision so they survive a
/// round trip through either store unchanged.
pub fn revision_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(3)
}

/// Normalize whatever was loaded for `slug` into a well-formed [`PageDocument`].
///
/// Non-object input is treated as a bare content body. The requested slug is
/// always stamped onto the result. `updatedAt` is only replaced when
/// `touch_revision` is set or when no usable timestamp is present.
pub fn ensure_document(
    slug: PageSlug,
    raw: Value,
    touch_revision: bool,
    now: DateTime<Utc>,
) -> PageDocument {
    let mut fields = match raw {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("content".to_string(), other);
            map
        }
    };

    fields.remove("slug");
    // Mongo's primary key never belongs to the document itself.
    fields.remove("_id");

    let schema_version = fields
        .remove("schemaVersion")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_SCHEMA_VERSION);

    let stored_at = fields
        .remove("updatedAt")
        .and_then(|v| v.as_str().map(str::to_owned))
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|ts| ts.with_timezone(&Utc));

    let updated_at = match stored_at {
        Some(ts) if !touch_revision => ts,
        _ => revision_timestamp(now),
    };

    let seo = fields.remove("seo").filter(|v| !v.is_null());
    let content = normalize_legacy_content(fields.remove("content").unwrap_or_else(empty_object));

    PageDocument {
        schema_version,
        slug,
        updated_at,
        seo,
        content,
        extra: fields,
    }
}

/// Number of sections in the body, 0 when absent or not an array.
pub fn count_sections(doc: &PageDocument) -> usize {
    doc.content
        .get("sections")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}
