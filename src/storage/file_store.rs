use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::models::page::{PageDocument, PageSlug};

/// Subfolder searched for below the working directory and its ancestors.
pub const CONTENT_SUBDIR: &str = "content/seo";

/// How many parents of the working directory are searched.
const MAX_ANCESTORS: usize = 4;

/// A mirror file found on disk.
#[derive(Debug, Clone)]
pub struct MirrorFile {
    pub path: PathBuf,
    /// Parsed contents; `None` when the file exists but can't be read.
    pub value: Option<Value>,
}

/// Trait for the JSON mirror of page documents.
///
/// Abstracted as a trait so tests can count and fail writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Locate the mirror for `slug`. Returns `None` if no file exists.
    async fn load(&self, slug: PageSlug) -> Result<Option<MirrorFile>, AppError>;

    /// Persist `doc` at its existing location, or the default one.
    async fn write(&self, slug: PageSlug, doc: &PageDocument) -> Result<PathBuf, AppError>;
}

/// Filesystem implementation of MirrorStore.
#[derive(Debug, Clone)]
pub struct FileStore {
    override_dir: Option<PathBuf>,
    working_dir: PathBuf,
}

impl FileStore {
    /// Create with explicit values (useful for testing / DI).
    pub fn new(override_dir: Option<PathBuf>, working_dir: PathBuf) -> Self {
        Self {
            override_dir,
            working_dir,
        }
    }

    /// Create a store rooted at the process working directory.
    ///
    /// `override_dir` usually comes from `PAGESYNC_CONTENT_DIR`.
    pub fn from_current_dir(override_dir: Option<PathBuf>) -> Result<Self, AppError> {
        let working_dir = std::env::current_dir()
            .map_err(|e| AppError::Storage(format!("Cannot read working directory: {}", e)))?;
        Ok(Self::new(override_dir, working_dir))
    }

    /// Directories searched for mirror files, closest first.
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(MAX_ANCESTORS + 2);
        if let Some(dir) = &self.override_dir {
            dirs.push(dir.clone());
        }
        dirs.extend(
            self.working_dir
                .ancestors()
                .take(MAX_ANCESTORS + 1)
                .map(|dir| dir.join(CONTENT_SUBDIR)),
        );
        dirs
    }

    /// First candidate that already holds `page.<slug>.json`.
    pub async fn resolve_existing_path(&self, slug: PageSlug) -> Option<PathBuf> {
        let file_name = slug.file_name();
        for dir in self.candidate_dirs() {
            let path = dir.join(&file_name);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::debug!("Resolved mirror for '{}' at {}", slug, path.display());
                return Some(path);
            }
        }
        None
    }

    /// Where a mirror is created when none exists yet: the override directory
    /// if configured, else the outermost candidate.
    pub fn default_path(&self, slug: PageSlug) -> PathBuf {
        let dir = match &self.override_dir {
            Some(dir) => dir.clone(),
            None => self
                .candidate_dirs()
                .pop()
                .unwrap_or_else(|| self.working_dir.join(CONTENT_SUBDIR)),
        };
        dir.join(slug.file_name())
    }
}

#[async_trait]
impl MirrorStore for FileStore {
    async fn load(&self, slug: PageSlug) -> Result<Option<MirrorFile>, AppError> {
        let Some(path) = self.resolve_existing_path(slug).await else {
            return Ok(None);
        };
        let value = read_json(&path).await;
        if value.is_none() {
            tracing::warn!("Mirror file {} exists but could not be parsed", path.display());
        }
        Ok(Some(MirrorFile { path, value }))
    }

    async fn write(&self, slug: PageSlug, doc: &PageDocument) -> Result<PathBuf, AppError> {
        let path = match self.resolve_existing_path(slug).await {
            Some(path) => path,
            None => self.default_path(slug),
        };
        atomic_write(&path, doc).await?;
        Ok(path)
    }
}

/// Read and parse a JSON file. Any failure yields `None`.
pub async fn read_json(path: &Path) -> Option<Value> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Temporary sibling used while writing `path`: `<name>.<uuid>.tmp`.
///
/// Unique per call, so concurrent writers never share a temp file.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// Write `doc` so that readers only ever see the old or the new file.
///
/// The pretty-printed JSON goes to a fresh temp file next to the target and
/// is renamed over it once flushed. Concurrent writers each rename a complete
/// file; the last rename wins.
pub async fn atomic_write(path: &Path, doc: &PageDocument) -> Result<(), AppError> {
    let mut bytes = serde_json::to_vec_pretty(doc)
        .map_err(|e| AppError::Storage(format!("Failed to encode page '{}': {}", doc.slug, e)))?;
    bytes.push(b'\n');

    let tmp = write_temp(path, &bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        discard_temp(&tmp).await;
        return Err(AppError::Storage(format!(
            "Failed to move {} into place: {}",
            tmp.display(),
            e
        )));
    }

    tracing::debug!("Wrote mirror {}", path.display());
    Ok(())
}

async fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf, AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let tmp = temp_path(path);
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", tmp.display(), e)))?;

    let written = match file.write_all(bytes).await {
        Ok(()) => file.sync_all().await,
        Err(e) => Err(e),
    };
    drop(file);
    if let Err(e) = written {
        discard_temp(&tmp).await;
        return Err(AppError::Storage(format!(
            "Failed to write {}: {}",
            tmp.display(),
            e
        )));
    }

    Ok(tmp)
}

async fn discard_temp(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        tracing::debug!("Could not remove {}: {e}", tmp.display());
    }
}
