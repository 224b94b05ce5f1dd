use serde_json::{json, Value};

use crate::models::page::PageSlug;

// Embedded at build time so a fresh deployment can seed both stores.
const TERMS_OF_SERVICE: &str = include_str!("../../page_templates/page.terms-of-service.json");
const PRIVACY_POLICY: &str = include_str!("../../page_templates/page.privacy-policy.json");
const CONTACT: &str = include_str!("../../page_templates/page.contact.json");

fn template_source(slug: PageSlug) -> &'static str {
    match slug {
        PageSlug::TermsOfService => TERMS_OF_SERVICE,
        PageSlug::PrivacyPolicy => PRIVACY_POLICY,
        PageSlug::Contact => CONTACT,
    }
}

/// The compiled default document for `slug`, as raw JSON.
///
/// Callers normalize it with `ensure_document` like any stored copy.
pub fn template_document(slug: PageSlug) -> Value {
    match serde_json::from_str(template_source(slug)) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Compiled template for '{}' is not valid JSON: {}", slug, e);
            json!({ "content": { "h1": slug.as_str() } })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::validate_content;
    use crate::models::page::{count_sections, ensure_document};
    use chrono::Utc;

    #[test]
    fn test_templates_are_canonical() {
        for slug in PageSlug::ALL {
            let raw: Value = serde_json::from_str(template_source(slug)).unwrap();
            assert_eq!(raw["slug"], slug.as_str());
            validate_content(&raw["content"]).unwrap();
        }
    }

    #[test]
    fn test_legal_templates_are_complete() {
        for slug in [PageSlug::TermsOfService, PageSlug::PrivacyPolicy] {
            let doc = ensure_document(slug, template_document(slug), false, Utc::now());
            assert!(count_sections(&doc) >= 2, "{} template is a placeholder", slug);
        }
    }

    #[test]
    fn test_contact_template_fields() {
        let doc = template_document(PageSlug::Contact);
        assert_eq!(doc["content"]["h1"], "Contact Us");
        assert!(doc["content"]["email"].is_string());
        assert!(doc["content"].get("sections").is_none());
        assert!(doc.get("updatedAt").is_none());
    }
}
