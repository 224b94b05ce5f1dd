use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::page_repository::PageRepository;
use crate::error::AppError;
use crate::models::content::validate_content;
use crate::models::page::{count_sections, ensure_document, PageDocument, PageSlug};
use crate::models::templates::template_document;
use crate::storage::file_store::MirrorStore;
use crate::sync::throttle::SyncThrottle;

/// Where an upgraded record took its content from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradeSource {
    File,
    Template,
}

/// Which store ended up canonical for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Resolution {
    /// No record and no usable file: the compiled template was seeded.
    SeededFromTemplate,
    /// No record: the file mirror was copied into the record store.
    SeededFromFile,
    /// The record was a placeholder and got replaced by a fuller copy.
    Upgraded { source: UpgradeSource },
    /// The record is authoritative.
    Record,
    /// The record store was unreachable; served from file or template.
    Fallback,
}

/// Outcome of [`resolve_page`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub document: PageDocument,
    pub outcome: Resolution,
    /// Whether this read wrote the file mirror.
    pub mirrored: bool,
}

/// Per-slug line of a sweep report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedPage {
    pub slug: PageSlug,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Resolution>,
    pub mirrored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// True when the throttle rejected the sweep.
    pub skipped: bool,
    pub pages: Vec<SyncedPage>,
}

/// Resolve the canonical document for `slug`, seeding or upgrading whichever
/// store is behind.
///
/// Reads never move `updatedAt`, except when a placeholder record is upgraded.
/// That case can only fire while the record has one section or fewer, so it
/// runs at most once per slug.
pub async fn resolve_page(
    repo: &dyn PageRepository,
    mirror: &dyn MirrorStore,
    slug: PageSlug,
    now: DateTime<Utc>,
) -> Result<Resolved, AppError> {
    // 1. Load the file mirror, the record and the template without touching revisions
    let file = match mirror.load(slug).await {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Failed to read mirror for '{}': {e}", slug);
            None
        }
    };
    let file_exists = file.is_some();
    let file_doc = file
        .and_then(|f| f.value)
        .map(|raw| ensure_document(slug, raw, false, now));
    let template_doc = ensure_document(slug, template_document(slug), false, now);

    let record = match repo.find_by_slug(slug).await {
        Ok(record) => record.map(|raw| ensure_document(slug, raw, false, now)),
        Err(e) => {
            // 2. Record store unavailable: serve what we have, write nothing
            tracing::warn!("Record store unavailable for '{}', falling back: {e}", slug);
            let document = match file_doc {
                Some(doc) if doc.has_content() => doc,
                _ => template_doc,
            };
            return Ok(Resolved {
                document,
                outcome: Resolution::Fallback,
                mirrored: false,
            });
        }
    };

    let Some(record) = record else {
        // 3. First read for this slug: seed the record store
        let (seed, outcome) = match file_doc {
            Some(doc) if doc.has_content() => (doc, Resolution::SeededFromFile),
            _ => (template_doc, Resolution::SeededFromTemplate),
        };

        if let Err(e) = repo.create_or_update(&seed).await {
            tracing::warn!("Failed to seed record for '{}': {e}", slug);
        } else {
            tracing::info!("Seeded record for '{}' ({:?})", slug, outcome);
        }

        let mirrored = !file_exists && mirror_document(mirror, &seed).await;
        return Ok(Resolved {
            document: seed,
            outcome,
            mirrored,
        });
    };

    // 4. Placeholder record while a fuller copy exists elsewhere
    if slug.has_sections() {
        if let Some((source, doc)) = pick_upgrade(&record, file_doc.as_ref(), &template_doc) {
            let mut upgraded = ensure_document(slug, doc.to_value()?, true, now);
            upgraded.advance_past(Some(record.updated_at));

            tracing::info!(
                "Upgrading placeholder record for '{}' from {:?} ({} -> {} sections)",
                slug,
                source,
                count_sections(&record),
                count_sections(&upgraded)
            );

            if let Err(e) = repo.create_or_update(&upgraded).await {
                tracing::warn!("Failed to persist upgraded record for '{}': {e}", slug);
            }

            let mirrored = !file_exists && mirror_document(mirror, &upgraded).await;
            return Ok(Resolved {
                document: upgraded,
                outcome: Resolution::Upgraded { source },
                mirrored,
            });
        }
    }

    // 5. The record is authoritative; only create a missing mirror
    let mirrored = !file_exists && mirror_document(mirror, &record).await;
    Ok(Resolved {
        document: record,
        outcome: Resolution::Record,
        mirrored,
    })
}

/// Pick the fuller of file and template when `record` looks like a placeholder.
fn pick_upgrade<'a>(
    record: &PageDocument,
    file: Option<&'a PageDocument>,
    template: &'a PageDocument,
) -> Option<(UpgradeSource, &'a PageDocument)> {
    let record_sections = count_sections(record);
    let file_sections = file.map(count_sections).unwrap_or(0);
    let template_sections = count_sections(template);

    if record_sections > 1 || file_sections.max(template_sections) < 2 {
        return None;
    }

    match (file, file_sections.cmp(&template_sections)) {
        (Some(file), Ordering::Greater | Ordering::Equal) => Some((UpgradeSource::File, file)),
        _ => Some((UpgradeSource::Template, template)),
    }
}

/// Apply an admin write: merge over the current record, advance the revision,
/// persist, then mirror.
///
/// A failed record read or write fails the request before anything is stored.
/// A failed mirror write is logged; the next read recreates a missing mirror.
pub async fn apply_page(
    repo: &dyn PageRepository,
    mirror: &dyn MirrorStore,
    slug: PageSlug,
    data: Value,
    now: DateTime<Utc>,
) -> Result<PageDocument, AppError> {
    // 1. Only objects are accepted
    let Value::Object(incoming) = data else {
        return Err(AppError::BadRequest("Page data must be an object".into()));
    };

    // 2. Current state; the write merges over it, so it must be known
    let prior = repo
        .find_by_slug(slug)
        .await
        .map_err(|e| {
            tracing::warn!("Could not load current record for '{}': {e}", slug);
            AppError::Database(format!("Failed to load page '{}': {}", slug, e))
        })?
        .map(|raw| ensure_document(slug, raw, false, now));
    let previous_revision = prior.as_ref().map(|doc| doc.updated_at);

    // 3. Shallow merge of the incoming top-level keys
    let mut merged = match prior {
        Some(doc) => match doc.to_value()? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };
    merged.extend(incoming);

    // 4. Every accepted write advances the revision
    let mut doc = ensure_document(slug, Value::Object(merged), true, now);
    doc.advance_past(previous_revision);

    // 5. Reject malformed bodies before touching either store
    validate_content(&doc.content)?;

    // 6. Persist (fatal on failure)
    repo.create_or_update(&doc).await?;
    tracing::info!("Saved page '{}' at revision {}", slug, doc.updated_at);

    // 7. Mirror (best effort)
    mirror_document(mirror, &doc).await;

    Ok(doc)
}

/// Resolve every managed slug, unless the throttle says a sweep ran recently.
pub async fn sync_all_pages(
    repo: &dyn PageRepository,
    mirror: &dyn MirrorStore,
    throttle: &SyncThrottle,
    now: DateTime<Utc>,
) -> SyncReport {
    if !throttle.should_run(now) {
        tracing::debug!("Skipping page sync, last run at {:?}", throttle.last_run());
        return SyncReport {
            skipped: true,
            pages: Vec::new(),
        };
    }

    let mut pages = Vec::with_capacity(PageSlug::ALL.len());
    for slug in PageSlug::ALL {
        let line = match resolve_page(repo, mirror, slug, now).await {
            Ok(resolved) => SyncedPage {
                slug,
                outcome: Some(resolved.outcome),
                mirrored: resolved.mirrored,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Sync failed for '{}': {e}", slug);
                SyncedPage {
                    slug,
                    outcome: None,
                    mirrored: false,
                    error: Some(e.to_string()),
                }
            }
        };
        pages.push(line);
    }

    SyncReport {
        skipped: false,
        pages,
    }
}

/// Write the file mirror, logging instead of failing. Returns whether it landed.
async fn mirror_document(mirror: &dyn MirrorStore, doc: &PageDocument) -> bool {
    match mirror.write(doc.slug, doc).await {
        Ok(path) => {
            tracing::info!("Mirrored '{}' to {}", doc.slug, path.display());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to mirror '{}': {e}", doc.slug);
            false
        }
    }
}
