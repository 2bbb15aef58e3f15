use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use fleet_errors::{FleetError, FleetResult};
use tracing::debug;

/// 按名称加载脚本资源
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, name: &str) -> FleetResult<Vec<u8>>;
    async fn list(&self) -> FleetResult<Vec<String>>;
}

/// 从本地目录加载资源，名称只允许单层文件名
pub struct DirAssetLoader {
    root: PathBuf,
}

impl DirAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn validate_name(name: &str) -> FleetResult<()> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(FleetError::validation_error(format!("资源名称无效: {name}")))
        }
    }
}

#[async_trait]
impl AssetLoader for DirAssetLoader {
    async fn load(&self, name: &str) -> FleetResult<Vec<u8>> {
        Self::validate_name(name)?;
        let path = self.root.join(name);
        debug!("加载资源: {}", path.display());

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FleetError::not_found("资源", name),
            _ => FleetError::Internal(format!("读取资源 {name} 失败: {e}")),
        })
    }

    async fn list(&self) -> FleetResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| FleetError::Internal(format!("读取资源目录失败: {e}")))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FleetError::Internal(format!("读取资源目录失败: {e}")))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if let Some(name) = entry.file_name().to_str() {
                if is_file && Self::validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime.sh"), b"uptime\n").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let loader = DirAssetLoader::new(dir.path());
        assert_eq!(loader.load("uptime.sh").await.unwrap(), b"uptime\n");
        assert_eq!(loader.list().await.unwrap(), vec!["uptime.sh".to_string()]);
        assert!(matches!(
            loader.load("missing.sh").await,
            Err(FleetError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DirAssetLoader::new(dir.path());
        for name in ["../etc/passwd", "a/b", "", ".profile"] {
            assert!(matches!(
                loader.load(name).await,
                Err(FleetError::Validation(_))
            ));
        }
    }
}
