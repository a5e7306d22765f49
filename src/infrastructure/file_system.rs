use crate::core::{interfaces::FileSystemService, models::Asset};
use crate::utils::{Logger, Result, SatchelError};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct TokioFileSystemService;

#[async_trait::async_trait]
impl FileSystemService for TokioFileSystemService {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).await.map_err(SatchelError::Io)
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_directory(parent).await?;
        }

        fs::write(path, content).await.map_err(SatchelError::Io)
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(SatchelError::Io)
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !dir.is_dir() {
            return Ok(files);
        }

        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let mut entries = fs::read_dir(&current).await.map_err(SatchelError::Io)?;
            while let Some(entry) = entries.next_entry().await.map_err(SatchelError::Io)? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(SatchelError::Io)?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Writes a complete output set next to the output directory and swaps it
/// into place. The previous output stays untouched until every file of the
/// new one is on disk.
pub struct Publisher {
    outdir: PathBuf,
}

impl Publisher {
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
        }
    }

    pub async fn publish(&self, assets: &[Asset]) -> Result<()> {
        let _timer = crate::utils::Timer::start("Publishing output");
        let staging = self.sibling("staging");

        if let Err(e) = self.write_all(&staging, assets).await {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        let previous = self.sibling("previous");
        let had_previous = self.outdir.exists();
        if had_previous {
            if let Err(e) = fs::rename(&self.outdir, &previous).await {
                let _ = fs::remove_dir_all(&staging).await;
                return Err(SatchelError::Io(e));
            }
        }

        if let Err(e) = fs::rename(&staging, &self.outdir).await {
            if had_previous {
                let _ = fs::rename(&previous, &self.outdir).await;
            }
            let _ = fs::remove_dir_all(&staging).await;
            return Err(SatchelError::Io(e));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&previous).await {
                Logger::warn(&format!(
                    "could not remove previous output {}: {}",
                    previous.display(),
                    e
                ));
            }
        }

        Ok(())
    }

    async fn write_all(&self, staging: &Path, assets: &[Asset]) -> Result<()> {
        let fs_service = TokioFileSystemService;
        fs_service.create_directory(staging).await?;

        for asset in assets {
            let target = staging.join(&asset.file_name);
            fs_service.write_file(&target, &asset.bytes).await?;
        }

        Ok(())
    }

    /// `<parent>/.<outdir>-<purpose>-<uuid>`
    fn sibling(&self, purpose: &str) -> PathBuf {
        let name = self
            .outdir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dist");
        let parent = self
            .outdir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        parent.join(format!(".{}-{}-{}", name, purpose, uuid::Uuid::new_v4()))
    }
}
