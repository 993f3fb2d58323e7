use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 匯出到本機目錄的儲存實作
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    fn location(&self, path: &str) -> String {
        self.full_path(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().display().to_string());

        storage.write_file("nested/alerts.csv", b"a,b\n1,2\n").await.unwrap();
        let data = tokio::fs::read(dir.path().join("nested/alerts.csv")).await.unwrap();

        assert_eq!(data, b"a,b\n1,2\n");
        assert!(storage.location("nested/alerts.csv").ends_with("alerts.csv"));
    }

    #[tokio::test]
    async fn test_write_over_file_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blocked"), b"file").unwrap();
        let storage = LocalStorage::new(dir.path().display().to_string());

        // 父路徑是檔案，無法建立目錄
        let err = storage.write_file("blocked/alerts.csv", b"a").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::SentinelError::IoError(_)));
    }
}
