#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

use pagesync::app::{build_router, AppState};
use pagesync::auth::authorizer::TokenAuthorizer;
use pagesync::auth::models::{AuthenticatedUser, Role};
use pagesync::db::page_repository::{MongoPageRepository, PageRepository};
use pagesync::error::AppError;
use pagesync::models::page::{PageDocument, PageSlug};
use pagesync::storage::file_store::{FileStore, MirrorStore};
use pagesync::sync::throttle::SyncThrottle;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const EDITOR_TOKEN: &str = "editor-token";
pub const VIEWER_TOKEN: &str = "viewer-token";

/// Record store kept in memory, with switches to simulate an outage.
#[derive(Default)]
pub struct MemoryPageRepository {
    records: Mutex<HashMap<PageSlug, Value>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemoryPageRepository {
    pub fn get(&self, slug: PageSlug) -> Option<Value> {
        self.records.lock().unwrap().get(&slug).cloned()
    }

    pub fn insert(&self, slug: PageSlug, raw: Value) {
        self.records.lock().unwrap().insert(slug, raw);
    }
}

#[async_trait]
impl PageRepository for MemoryPageRepository {
    async fn find_by_slug(&self, slug: PageSlug) -> Result<Option<Value>, AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database("connection refused".into()));
        }
        Ok(self.get(slug))
    }

    async fn create_or_update(&self, doc: &PageDocument) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("connection refused".into()));
        }
        self.insert(doc.slug, doc.to_value()?);
        Ok(())
    }
}

/// Router wired to an in-memory record store and a temporary content directory.
pub struct TestEnv {
    pub content_dir: TempDir,
    pub repo: Arc<MemoryPageRepository>,
    pub router: Router,
}

impl TestEnv {
    pub fn start() -> Self {
        Self::with_sync_ttl(chrono::Duration::minutes(5))
    }

    pub fn with_sync_ttl(ttl: chrono::Duration) -> Self {
        let content_dir = tempfile::tempdir().expect("Failed to create content dir");
        let repo = Arc::new(MemoryPageRepository::default());

        let file_store = FileStore::new(
            Some(content_dir.path().to_path_buf()),
            content_dir.path().to_path_buf(),
        );

        let authorizer = TokenAuthorizer::new()
            .with_token(ADMIN_TOKEN, user("admin", Role::Admin))
            .with_token(EDITOR_TOKEN, user("editor", Role::Editor))
            .with_token(VIEWER_TOKEN, user("viewer", Role::Viewer));

        let state = AppState {
            page_repo: repo.clone(),
            mirror: Arc::new(file_store),
            authorizer: Arc::new(authorizer),
            sync_throttle: Arc::new(SyncThrottle::new(ttl)),
        };

        Self {
            router: build_router(state),
            content_dir,
            repo,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    pub fn mirror_path(&self, slug: PageSlug) -> PathBuf {
        self.content_dir.path().join(slug.file_name())
    }

    pub fn read_mirror(&self, slug: PageSlug) -> Option<Value> {
        let text = std::fs::read_to_string(self.mirror_path(slug)).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn write_mirror(&self, slug: PageSlug, value: &Value) {
        write_json(&self.mirror_path(slug), value);
    }
}

pub fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn user(id: &str, role: Role) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: id.to_string(),
        roles: vec![role],
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// A running MongoDB container and a repository pointed at a fresh database.
pub struct MongoEnv {
    _mongo: ContainerAsync<Mongo>,
    pub repo: Arc<MongoPageRepository>,
}

impl MongoEnv {
    pub async fn start() -> Self {
        let mongo_container = Mongo::default()
            .start()
            .await
            .expect("Failed to start MongoDB container");

        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database(&format!("pagesync_test_{}", uuid::Uuid::new_v4().simple()));

        let repo = MongoPageRepository::new(&mongo_db);
        repo.ensure_indexes()
            .await
            .expect("Failed to create indexes");

        Self {
            _mongo: mongo_container,
            repo: Arc::new(repo),
        }
    }

    pub fn mirror(&self, dir: &Path) -> Arc<dyn MirrorStore> {
        Arc::new(FileStore::new(Some(dir.to_path_buf()), dir.to_path_buf()))
    }
}
