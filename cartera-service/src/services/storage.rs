use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const VOUCHER_PREFIX: &str = "vouchers";

/// Extensions accepted for vouchers and the content type each is served with.
const VOUCHER_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("heic", "image/heic"),
];

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(AppError::bad_request("Invalid file key"));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(key)?;
        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::not_found("Voucher file not found"))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// Lower-cased extension of a file name, if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Content type for a stored file, guessed from its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    file_extension(file_name)
        .and_then(|ext| {
            VOUCHER_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

/// Check an uploaded voucher and return the storage key it will be kept under.
pub fn voucher_key(file_name: &str, size: usize, max_bytes: usize) -> Result<String, AppError> {
    if size == 0 {
        return Err(AppError::bad_request("The voucher file is empty"));
    }
    if size > max_bytes {
        return Err(AppError::bad_request(format!(
            "The voucher exceeds the maximum size of {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    let ext = file_extension(file_name)
        .filter(|ext| VOUCHER_TYPES.iter().any(|(known, _)| known == ext))
        .ok_or_else(|| AppError::bad_request("The voucher must be an image or a PDF"))?;
    Ok(format!("{}/{}.{}", VOUCHER_PREFIX, Uuid::new_v4(), ext))
}

/// File name shown to users for a stored key.
pub fn display_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn voucher_key_keeps_extension() {
        let key = voucher_key("Comprobante.PDF", 1024, 20 * MB).unwrap();
        assert!(key.starts_with("vouchers/"));
        assert!(key.ends_with(".pdf"));
    }

    #[test]
    fn voucher_key_rejects_other_types_and_sizes() {
        assert!(voucher_key("notes.txt", 10, 20 * MB).is_err());
        assert!(voucher_key("no-extension", 10, 20 * MB).is_err());
        assert!(voucher_key("big.png", 21 * MB, 20 * MB).is_err());
        assert!(voucher_key("empty.png", 0, 20 * MB).is_err());
    }

    #[test]
    fn content_type_is_guessed_from_extension() {
        assert_eq!(content_type_for("vouchers/a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("vouchers/a.pdf"), "application/pdf");
        assert_eq!(content_type_for("vouchers/a"), "application/octet-stream");
    }

    #[tokio::test]
    async fn local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage
            .upload("vouchers/test.pdf", b"%PDF-1.4".to_vec())
            .await
            .unwrap();
        let data = storage.download("vouchers/test.pdf").await.unwrap();
        assert_eq!(data, b"%PDF-1.4");

        storage.delete("vouchers/test.pdf").await.unwrap();
        assert!(matches!(
            storage.download("vouchers/test.pdf").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn local_storage_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        assert!(storage.download("../etc/passwd").await.is_err());
        assert!(storage.upload("/tmp/x", vec![1]).await.is_err());
    }
}
