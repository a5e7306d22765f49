use crate::core::models::*;
use crate::utils::Result;
use async_trait::async_trait;
use std::path::Path;

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
    /// Every file under `dir`, recursively, sorted
    async fn list_files(&self, dir: &Path) -> Result<Vec<std::path::PathBuf>>;
    fn file_exists(&self, path: &Path) -> bool;
}

/// Build service interface
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn build(&mut self) -> Result<BuildResult>;
}

/// Network access of the installed offline cache
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Where the installed cache looks for a newer manifest
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn latest(&self) -> Result<CacheManifest>;
}

/// Receives non-fatal runtime failures
pub trait Telemetry: Send + Sync {
    fn report_update_failure(&self, manifest_version: &str, error: &str);
}

/// Telemetry sink that only logs
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn report_update_failure(&self, manifest_version: &str, error: &str) {
        tracing::warn!(
            "offline cache update to {} failed: {}",
            manifest_version,
            error
        );
    }
}
