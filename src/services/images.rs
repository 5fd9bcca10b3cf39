use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{BaseUrl, ImageSummary},
    errors::ServiceError,
    repositories::{ImageRepository, NewImage},
    storage::{content_type_for, LocalImageStorage},
};

const MAX_FILE_NAME_LEN: usize = 255;

/// An uploaded file as received from the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub content: Bytes,
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
}

/// Client-supplied metadata stored next to the file.
#[derive(Debug, Validate)]
struct ImageAttributes {
    #[validate(length(max = 255, message = "Description cannot exceed 255 characters"))]
    description: Option<String>,
    #[validate(length(max = 100, message = "File type cannot exceed 100 characters"))]
    file_type: Option<String>,
}

/// Binary content ready to be served.
#[derive(Debug, Clone)]
pub struct ImageContent {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub storage_key: String,
}

/// Image metadata in the database, binaries on the local filesystem.
#[derive(Clone)]
pub struct ImageService {
    images: Arc<dyn ImageRepository>,
    storage: LocalImageStorage,
}

impl ImageService {
    pub fn new(images: Arc<dyn ImageRepository>, storage: LocalImageStorage) -> Self {
        Self { images, storage }
    }

    pub async fn list(&self, base: &BaseUrl) -> Result<Vec<ImageSummary>, ServiceError> {
        let images = self.images.find_all().await?;
        Ok(images
            .into_iter()
            .map(|image| ImageSummary::from_model(image, base))
            .collect())
    }

    #[instrument(skip(self, base))]
    pub async fn get_metadata(&self, id: i64, base: &BaseUrl) -> Result<ImageSummary, ServiceError> {
        self.images
            .find_by_id(id)
            .await?
            .map(|image| ImageSummary::from_model(image, base))
            .ok_or_else(|| ServiceError::not_found("Image", id))
    }

    /// Loads the stored binary. Missing metadata and a missing file both read as `NotFound`.
    #[instrument(skip(self))]
    pub async fn load_content(&self, id: i64) -> Result<ImageContent, ServiceError> {
        let image = self
            .images
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Image", id))?;

        let bytes = self.storage.read(&image.file_path).await?.ok_or_else(|| {
            warn!(image_id = id, key = %image.file_path, "Image file missing from storage");
            ServiceError::NotFound(format!("File not found: {}", image.file_name))
        })?;

        Ok(ImageContent {
            bytes,
            content_type: content_type_for(&image.file_path),
            storage_key: image.file_path,
        })
    }

    /// Writes the upload under a generated key, then records its metadata.
    ///
    /// The original file name is kept for display only. If the metadata insert
    /// fails the freshly written file is removed again.
    #[instrument(skip(self, upload, base), fields(size = upload.content.len()))]
    pub async fn store(
        &self,
        upload: UploadedFile,
        description: Option<String>,
        base: &BaseUrl,
    ) -> Result<ImageSummary, ServiceError> {
        let file_name = clean_file_name(upload.original_filename.as_deref())?;
        let attributes = ImageAttributes {
            description: description.filter(|d| !d.trim().is_empty()),
            file_type: upload.content_type,
        };
        attributes.validate()?;
        let storage_key = storage_key_for(&file_name);

        self.storage
            .write(&storage_key, &upload.content)
            .await
            .map_err(|e| {
                error!(file_name = %file_name, error = %e, "Could not store file");
                e
            })?;

        let new_image = NewImage {
            file_name,
            file_path: storage_key.clone(),
            file_type: attributes.file_type,
            file_size: i64::try_from(upload.content.len()).ok(),
            description: attributes.description,
            created_at: Utc::now(),
        };

        match self.images.insert(new_image).await {
            Ok(image) => {
                info!(image_id = image.id, key = %storage_key, "Image stored");
                Ok(ImageSummary::from_model(image, base))
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&storage_key).await {
                    warn!(key = %storage_key, error = %cleanup, "Could not remove orphaned image file");
                }
                Err(e)
            }
        }
    }

    /// Deletes the metadata row, then the file. A file that is already gone or
    /// cannot be removed is logged and does not fail the call.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let image = self.images.delete_by_id(id).await?;

        match self.storage.remove(&image.file_path).await {
            Ok(true) => {}
            Ok(false) => warn!(image_id = id, key = %image.file_path, "Image file was already gone"),
            Err(e) => {
                warn!(image_id = id, key = %image.file_path, error = %e, "Could not delete image file")
            }
        }

        info!(image_id = id, "Image deleted");
        Ok(())
    }
}

/// Normalizes the client-supplied name to its last path segment, rejecting traversal.
fn clean_file_name(original: Option<&str>) -> Result<String, ServiceError> {
    let original = original.map(str::trim).unwrap_or_default();
    if original.is_empty() {
        return Err(ServiceError::BadRequest("File name is required".to_string()));
    }

    let normalized = original.replace('\\', "/");
    if normalized.contains("..") {
        return Err(ServiceError::BadRequest(format!(
            "Filename contains invalid path sequence: {}",
            original
        )));
    }

    let name = normalized
        .rsplit('/')
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ServiceError::BadRequest("File name is required".to_string()));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(ServiceError::BadRequest(format!(
            "File name cannot exceed {} characters",
            MAX_FILE_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Random key that keeps the original extension when it is a plain alphanumeric suffix.
fn storage_key_for(file_name: &str) -> String {
    let token = Uuid::new_v4();
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 10
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!("{}.{}", token, ext.to_ascii_lowercase())
        }
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::image;
    use crate::repositories::image_repository::MockImageRepository;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn base() -> BaseUrl {
        BaseUrl::new("http://localhost:8080")
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            content: Bytes::from_static(b"GIF89a"),
            original_filename: Some(name.to_string()),
            content_type: Some("image/gif".to_string()),
        }
    }

    fn stored(id: i64, key: &str) -> image::Model {
        let now = Utc::now();
        image::Model {
            id,
            file_name: "pizza.gif".into(),
            file_path: key.into(),
            file_type: Some("image/gif".into()),
            file_size: Some(6),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn storage(dir: &TempDir) -> LocalImageStorage {
        LocalImageStorage::init(dir.path().join("images")).await.unwrap()
    }

    fn stored_files(storage: &LocalImageStorage) -> usize {
        std::fs::read_dir(storage.root()).unwrap().count()
    }

    #[tokio::test]
    async fn traversal_name_is_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let mut images = MockImageRepository::new();
        images.expect_insert().never();
        let service = ImageService::new(Arc::new(images), storage.clone());

        let err = service
            .store(upload("../../etc/passwd"), None, &base())
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::BadRequest(msg) if msg == "Filename contains invalid path sequence: ../../etc/passwd");
        assert_eq!(stored_files(&storage), 0);
    }

    #[tokio::test]
    async fn store_keeps_original_name_and_generates_key() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let mut images = MockImageRepository::new();
        images
            .expect_insert()
            .withf(|new| {
                new.file_name == "pizza.GIF"
                    && new.file_path != "pizza.GIF"
                    && new.file_path.ends_with(".gif")
                    && new.file_size == Some(6)
            })
            .returning(|new| {
                Ok(image::Model {
                    id: 12,
                    file_name: new.file_name,
                    file_path: new.file_path,
                    file_type: new.file_type,
                    file_size: new.file_size,
                    description: new.description,
                    created_at: new.created_at,
                    updated_at: new.created_at,
                })
            });
        let service = ImageService::new(Arc::new(images), storage.clone());

        let summary = service
            .store(upload("C:\\photos\\pizza.GIF"), Some("Margherita".into()), &base())
            .await
            .unwrap();

        assert_eq!(summary.file_name, "pizza.GIF");
        assert_eq!(summary.url, "http://localhost:8080/api/images/12/content");
        assert_eq!(stored_files(&storage), 1);
    }

    #[tokio::test]
    async fn failed_insert_removes_written_file() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let mut images = MockImageRepository::new();
        images
            .expect_insert()
            .returning(|_| Err(ServiceError::InternalError("insert failed".into())));
        let service = ImageService::new(Arc::new(images), storage.clone());

        assert!(service.store(upload("a.png"), None, &base()).await.is_err());
        assert_eq!(stored_files(&storage), 0);
    }

    #[tokio::test]
    async fn delete_succeeds_when_file_already_removed() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let mut images = MockImageRepository::new();
        images
            .expect_delete_by_id()
            .times(1)
            .returning(|id| Ok(stored(id, "gone.gif")));
        let service = ImageService::new(Arc::new(images), storage);

        service.delete(3).await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_stored_file() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        storage.write("kept.gif", b"GIF89a").await.unwrap();
        let mut images = MockImageRepository::new();
        images
            .expect_delete_by_id()
            .returning(|id| Ok(stored(id, "kept.gif")));
        let service = ImageService::new(Arc::new(images), storage.clone());

        service.delete(3).await.unwrap();
        assert_eq!(stored_files(&storage), 0);
    }

    #[tokio::test]
    async fn delete_missing_image_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        storage.write("other.gif", b"GIF89a").await.unwrap();
        let mut images = MockImageRepository::new();
        images
            .expect_delete_by_id()
            .returning(|id| Err(ServiceError::not_found("Image", id)));
        let service = ImageService::new(Arc::new(images), storage.clone());

        let err = service.delete(8).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(msg) if msg == "Image not found with id: 8");
        assert_eq!(stored_files(&storage), 1);
    }

    #[tokio::test]
    async fn oversized_metadata_is_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let mut images = MockImageRepository::new();
        images.expect_insert().never();
        let service = ImageService::new(Arc::new(images), storage.clone());

        let err = service
            .store(upload("pizza.gif"), Some("d".repeat(256)), &base())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(fields) => {
            assert_eq!(fields["description"], "Description cannot exceed 255 characters");
        });

        let long_type = UploadedFile {
            content_type: Some(format!("image/{}", "x".repeat(100))),
            ..upload("pizza.gif")
        };
        let err = service.store(long_type, None, &base()).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(fields) => {
            assert_eq!(fields["fileType"], "File type cannot exceed 100 characters");
        });

        assert_eq!(stored_files(&storage), 0);
    }

    #[tokio::test]
    async fn content_for_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut images = MockImageRepository::new();
        images
            .expect_find_by_id()
            .returning(|id| Ok(Some(stored(id, "lost.gif"))));
        let service = ImageService::new(Arc::new(images), storage(&dir).await);

        let err = service.load_content(1).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(msg) if msg == "File not found: pizza.gif");
    }

    #[tokio::test]
    async fn content_is_served_with_inferred_type() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        storage.write("abc.gif", b"GIF89a").await.unwrap();
        let mut images = MockImageRepository::new();
        images
            .expect_find_by_id()
            .returning(|id| Ok(Some(stored(id, "abc.gif"))));
        let service = ImageService::new(Arc::new(images), storage);

        let content = service.load_content(1).await.unwrap();
        assert_eq!(content.content_type, "image/gif");
        assert_eq!(content.storage_key, "abc.gif");
        assert_eq!(&content.bytes[..], b"GIF89a");
    }

    #[test]
    fn file_names_are_cleaned() {
        assert_eq!(clean_file_name(Some("menu/pizza.jpg")).unwrap(), "pizza.jpg");
        assert!(clean_file_name(None).is_err());
        assert!(clean_file_name(Some("dir/")).is_err());
        assert!(clean_file_name(Some("..\\secret.png")).is_err());
        assert!(clean_file_name(Some(&"a".repeat(256))).is_err());
    }

    #[test]
    fn storage_keys_drop_unusual_extensions() {
        assert!(storage_key_for("pizza.JPG").ends_with(".jpg"));
        assert!(!storage_key_for("noext").contains('.'));
        assert!(!storage_key_for("weird.j p g").contains(' '));
        assert!(!storage_key_for(".hidden").contains('.'));
        assert_ne!(storage_key_for("a.png"), storage_key_for("a.png"));
    }
}
