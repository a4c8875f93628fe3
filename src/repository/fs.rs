//! Filesystem content repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::error::{Result, SanitizerError};
use crate::record::{ContentFilter, ContentRecord};
use crate::repository::ContentRepository;

/// Repository that stores each record as `<id>.json` under a base directory.
///
/// Records are returned in file-name order. Records read by [`get`] are kept
/// in an in-process cache until
/// [`invalidate_cache`](ContentRepository::invalidate_cache) evicts them.
/// Bulk reads through [`fetch`] bypass the cache.
///
/// [`fetch`]: ContentRepository::fetch
/// [`get`]: FsRepository::get
///
/// # Example
///
/// ```rust,no_run
/// use ucf_content_sanitizer::FsRepository;
///
/// let repository = FsRepository::new("/var/data/content");
/// ```
pub struct FsRepository {
    base_dir: PathBuf,
    cache: Mutex<HashMap<String, ContentRecord>>,
}

impl FsRepository {
    /// Create a new `FsRepository` rooted at the given directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(SanitizerError::InvalidRecordId(id.to_string()));
        }
        Ok(self.base_dir.join(format!("{id}.json")))
    }

    /// Store a complete record, replacing any existing one with the same id.
    pub async fn insert(&self, record: &ContentRecord) -> Result<()> {
        let path = self.path_for(&record.id)?;
        tokio::fs::create_dir_all(&self.base_dir).await?;
        write_record(&path, record)
            .await
            .map_err(|e| SanitizerError::RepositoryUpdate {
                id: record.id.clone(),
                source: Box::new(e),
            })?;
        self.cache.lock().await.remove(&record.id);
        Ok(())
    }

    /// Read record `id`, serving it from the cache when present.
    pub async fn get(&self, id: &str) -> Result<Option<ContentRecord>> {
        if let Some(record) = self.cache.lock().await.get(id) {
            return Ok(Some(record.clone()));
        }

        let path = self.path_for(id)?;
        let record = match read_record(&path).await {
            Ok(record) => record,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.cache
            .lock()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(Some(record))
    }

    /// Returns `true` if record `id` is currently cached.
    pub async fn is_cached(&self, id: &str) -> bool {
        self.cache.lock().await.contains_key(id)
    }

    async fn list_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file()
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

async fn read_record(path: &Path) -> std::io::Result<ContentRecord> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        )
    })
}

async fn write_record(path: &Path, record: &ContentRecord) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await
}

impl ContentRepository for FsRepository {
    async fn fetch(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        let files = self
            .list_files()
            .await
            .map_err(|e| SanitizerError::RepositoryFetch(Box::new(e)))?;

        let records = futures::future::try_join_all(files.iter().map(|path| read_record(path)))
            .await
            .map_err(|e| SanitizerError::RepositoryFetch(Box::new(e)))?;

        let records: Vec<ContentRecord> = records
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();

        tracing::debug!(
            "Fetched {} records from {}",
            records.len(),
            self.base_dir.display()
        );
        Ok(records)
    }

    async fn update_body(&self, id: &str, body: &str) -> Result<()> {
        let update_err = |e: std::io::Error| SanitizerError::RepositoryUpdate {
            id: id.to_string(),
            source: Box::new(e),
        };

        let path = self.path_for(id)?;
        let mut record = read_record(&path).await.map_err(update_err)?;
        record.body = body.to_string();
        write_record(&path, &record).await.map_err(update_err)?;

        tracing::debug!("Wrote {} bytes of body to {}", body.len(), path.display());
        Ok(())
    }

    async fn invalidate_cache(&self, id: &str) {
        self.cache.lock().await.remove(id);
    }
}
