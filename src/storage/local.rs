use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;

use super::{BlobStore, StorageError};

/// A directory laid out like the bucket: `<root>/<folder>/<file>`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl BlobStore for LocalStore {
    // Folders are flat; nested directories are not descended into.
    async fn list(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join(folder);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(format!("{folder}/{}", entry.file_name().to_string_lossy()));
            }
        }
        Ok(names)
    }

    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.path_of(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(
        &self,
        name: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.path_of(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.path_of(name)).await?)
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(StorageError::NotFound(self.root.display().to_string())),
        }
    }

    async fn make_public(&self, name: &str) -> Result<String, StorageError> {
        let path = fs::canonicalize(self.path_of(name)).await?;
        Ok(format!("file://{}", path.display()))
    }

    fn location(&self, name: &str) -> String {
        self.path_of(name).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_list_and_read() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());

        store
            .write_text("fichaum/20250101_000000.json", "{\"theme\": \"IA\"}", "application/json")
            .await
            .unwrap();

        let names = store.list("fichaum").await.unwrap();
        assert_eq!(names, vec!["fichaum/20250101_000000.json"]);
        assert_eq!(
            store.read_text("fichaum/20250101_000000.json").await.unwrap(),
            "{\"theme\": \"IA\"}"
        );
        assert!(store.exists("fichaum/20250101_000000.json").await.unwrap());
    }

    #[tokio::test]
    async fn listing_a_missing_folder_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        assert!(store.list("rascunho").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reading_a_missing_blob_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        let err = store.read_bytes("htmlblog/a.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_encoding_error() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        store
            .write("htmlblog/a.html", &[0xff, 0xfe, 0x00], "text/html")
            .await
            .unwrap();
        let err = store.read_text("htmlblog/a.html").await.unwrap_err();
        assert!(matches!(err, StorageError::Encoding(_)));
    }

    #[tokio::test]
    async fn check_access_requires_root_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(LocalStore::new(tmp.path().to_path_buf()).check_access().await.is_ok());
        assert!(
            LocalStore::new(tmp.path().join("nope"))
                .check_access()
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn make_public_returns_file_url() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        store.write("htmlblog/a.jpg", b"jpg", "image/jpeg").await.unwrap();
        let url = store.make_public("htmlblog/a.jpg").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("htmlblog/a.jpg"));
    }
}
