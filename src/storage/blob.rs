//! Object storage backends

use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Whether a stored object is link-accessible by anyone
///
/// Forwarded to the backend untouched; the pipeline enforces nothing beyond
/// passing it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }
}

impl From<bool> for Visibility {
    fn from(public: bool) -> Self {
        if public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// Raw object storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError>;

    async fn read(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError>;

    /// Store `bytes` under `key`, replacing any previous object, and return
    /// a locator (URL) for it
    async fn write(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        visibility: Visibility,
    ) -> Result<String, StoreError>;
}

/// Local-directory object store: objects live at `{root}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_relative(bucket)?;
        validate_relative(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    /// Create the bucket directory if it is missing
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        validate_relative(bucket)?;
        tokio::fs::create_dir_all(self.root.join(bucket)).await?;
        Ok(())
    }
}

fn validate_relative(name: &str) -> Result<(), StoreError> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(name.to_string()))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let path = self.object_path(bucket, key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn read(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("{bucket}/{key}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        visibility: Visibility,
    ) -> Result<String, StoreError> {
        self.ensure_bucket(bucket).await?;

        let path = self.object_path(bucket, key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        tokio::fs::create_dir_all(parent).await?;

        // Write beside the target and rename so readers never see a torn `latest`.
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(
            ".{}.{}-{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&temp, &bytes).await?;
        set_visibility(&temp, visibility).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(unix)]
async fn set_visibility(path: &Path, visibility: Visibility) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if visibility.is_public() { 0o644 } else { 0o600 };
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_visibility(_path: &Path, _visibility: Visibility) -> std::io::Result<()> {
    Ok(())
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    visibility: Visibility,
}

/// In-process object store, locators are `mem://{bucket}/{key}`
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects()
            .get(&object_id(bucket, key))
            .map(|object| object.bytes.clone())
    }

    pub fn visibility(&self, bucket: &str, key: &str) -> Option<Visibility> {
        self.objects()
            .get(&object_id(bucket, key))
            .map(|object| object.visibility)
    }

    /// All stored ids as `{bucket}/{key}`, sorted
    pub fn ids(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

fn object_id(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects().contains_key(&object_id(bucket, key)))
    }

    async fn read(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        self.get(bucket, key)
            .ok_or_else(|| StoreError::NotFound(object_id(bucket, key)))
    }

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        visibility: Visibility,
    ) -> Result<String, StoreError> {
        let id = object_id(bucket, key);
        self.objects()
            .insert(id.clone(), StoredObject { bytes, visibility });
        Ok(format!("mem://{id}"))
    }
}
