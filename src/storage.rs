use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::errors::ServiceError;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Image binaries stored as flat files under one root directory.
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    root: PathBuf,
}

impl LocalImageStorage {
    /// Opens the storage root, creating it if absent.
    pub async fn init(root: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "Image storage ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a storage key to its path, refusing anything but a single plain file name.
    fn resolve(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == key => Ok(self.root.join(name)),
            _ => Err(ServiceError::BadRequest(format!(
                "Invalid storage key: {}",
                key
            ))),
        }
    }

    /// Writes `content` under `key`, replacing any existing file.
    ///
    /// Bytes land in a sibling temp file first and are renamed into place, so a
    /// failed write never leaves a truncated file under `key`.
    pub async fn write(&self, key: &str, content: &[u8]) -> Result<(), ServiceError> {
        let target = self.resolve(key)?;
        let staging = self.root.join(format!(".{}.part", key));

        if let Err(e) = fs::write(&staging, content).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(key, bytes = content.len(), "Stored image content");
        Ok(())
    }

    /// Reads the file stored under `key`, or `None` if there is none.
    pub async fn read(&self, key: &str) -> Result<Option<Bytes>, ServiceError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(content) => Ok(Some(Bytes::from(content))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the file under `key`. Returns `false` if it was already gone.
    pub async fn remove(&self, key: &str) -> Result<bool, ServiceError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Content type served for a stored key, inferred from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
