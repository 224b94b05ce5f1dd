use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::models::page::{PageDocument, PageSlug};

/// Repository trait for the page record store.
///
/// This trait allows mocking the database layer in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Find the stored record for a slug, as raw JSON.
    ///
    /// The sync engine normalizes it, so legacy shapes are returned as-is.
    async fn find_by_slug(&self, slug: PageSlug) -> Result<Option<Value>, AppError>;

    /// Create the record or replace the existing one (matched by slug).
    async fn create_or_update(&self, doc: &PageDocument) -> Result<(), AppError>;
}

/// MongoDB implementation of the PageRepository.
pub struct MongoPageRepository {
    collection: mongodb::Collection<bson::Document>,
}

impl MongoPageRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("pages"),
        }
    }

    /// Create the unique slug index.
    ///
    /// Concurrent seeding requests both upsert the same slug; the index makes
    /// the server collapse them onto one record instead of inserting twice.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let index = IndexModel::builder()
            .keys(doc! { "slug": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection
            .create_index(index)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl PageRepository for MongoPageRepository {
    async fn find_by_slug(&self, slug: PageSlug) -> Result<Option<Value>, AppError> {
        use bson::doc;

        let found = self
            .collection
            .find_one(doc! { "slug": slug.as_str() })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(found.map(|mut record| {
            record.remove("_id");
            bson::Bson::Document(record).into_relaxed_extjson()
        }))
    }

    async fn create_or_update(&self, doc: &PageDocument) -> Result<(), AppError> {
        use bson::doc;
        use mongodb::options::ReplaceOptions;

        let record = bson::to_document(doc).map_err(|e| {
            AppError::Database(format!("Failed to encode page '{}': {}", doc.slug, e))
        })?;

        let filter = doc! { "slug": doc.slug.as_str() };
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(filter, record)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
