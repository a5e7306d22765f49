use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::utils::{Result, SatchelError};

/// What a discovered source file is, as far as emission is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Script,
    Style,
    Static,
}

impl ModuleKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" | "json" => {
                ModuleKind::Script
            }
            "css" => ModuleKind::Style,
            _ => ModuleKind::Static,
        }
    }
}

/// A source file taking part in the build
#[derive(Debug, Clone)]
pub struct Module {
    /// Root-relative path with `/` separators
    pub id: String,
    pub path: PathBuf,
    pub kind: ModuleKind,
    /// Package owning this file when it lives under `node_modules`
    pub package: Option<String>,
    /// Bare package specifiers imported by this module
    pub imports: Vec<String>,
    /// Resolved import specifiers, as written, to the module id they load
    pub dependencies: BTreeMap<String, String>,
    /// Listed in `entries`; runs as soon as its chunk loads
    pub entry: bool,
    pub content: Vec<u8>,
}

impl Module {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, content: Vec<u8>) -> Self {
        let id = id.into();
        let path = path.into();
        let kind = ModuleKind::from_extension(
            path.extension().and_then(|s| s.to_str()).unwrap_or(""),
        );
        let package = owning_package(&id);

        Self {
            id,
            path,
            kind,
            package,
            imports: Vec::new(),
            dependencies: BTreeMap::new(),
            entry: false,
            content,
        }
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_dependencies(mut self, dependencies: BTreeMap<String, String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn as_entry(mut self) -> Self {
        self.entry = true;
        self
    }

    /// Module text; scripts and styles must be UTF-8
    pub fn source(&self) -> Result<&str> {
        std::str::from_utf8(&self.content).map_err(|e| {
            SatchelError::parse(format!("{} is not valid UTF-8: {}", self.id, e))
        })
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn file_stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset")
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("bin")
            .to_lowercase()
    }
}

/// Package name owning a module id, taken from the last `node_modules` segment.
/// Scoped packages keep their scope (`@vueuse/core`).
pub fn owning_package(id: &str) -> Option<String> {
    let marker = "node_modules/";
    let start = id.rfind(marker)? + marker.len();
    let mut segments = id[start..].split('/');
    let first = segments.next().filter(|s| !s.is_empty())?;

    if first.starts_with('@') {
        let second = segments.next().filter(|s| !s.is_empty())?;
        Some(format!("{}/{}", first, second))
    } else {
        Some(first.to_string())
    }
}

/// Module path relative to the project root, always with `/`
pub fn module_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Declared by a manual chunk rule
    Manual,
    /// Catch-all application chunk
    Default,
}

/// Named group of modules emitted together. Immutable once planned.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    pub modules: Vec<Arc<Module>>,
}

impl Chunk {
    pub fn size_bytes(&self) -> usize {
        self.modules.iter().map(|m| m.size()).sum()
    }

    pub fn module_ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.iter().any(|m| m.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Script,
    Style,
    Other,
}

impl MediaCategory {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "mjs" => MediaCategory::Script,
            "css" => MediaCategory::Style,
            _ => MediaCategory::Other,
        }
    }
}

/// Where an emitted file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOrigin {
    Chunk(String),
    Static(String),
    SourceMap,
    /// Copied verbatim from the public directory
    Public,
    /// Produced by a stage after emission (service worker, manifests)
    Generated,
}

/// An emitted output file. Hashed assets are content-addressed.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    /// Path relative to the output directory, `/` separated
    pub file_name: String,
    pub hash: Option<String>,
    pub category: MediaCategory,
    pub origin: AssetOrigin,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn extension(&self) -> &str {
        self.file_name.rsplit('.').next().unwrap_or("")
    }

    /// Unhashed file produced after emission
    pub fn generated(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let name = file_name
            .rsplit('/')
            .next()
            .and_then(|f| f.split('.').next())
            .unwrap_or("generated")
            .to_string();
        let category = MediaCategory::from_extension(file_name.rsplit('.').next().unwrap_or(""));

        Self {
            name,
            file_name,
            hash: None,
            category,
            origin: AssetOrigin::Generated,
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Fetched and stored when the service worker installs
    Precache,
    /// Fetched on first use, then served cache-first
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifestEntry {
    pub url: String,
    pub revision: String,
    pub strategy: CacheStrategy,
    pub size: u64,
}

/// Versioned list of cacheable URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: String,
    pub entries: Vec<CacheManifestEntry>,
}

impl CacheManifest {
    pub fn precached(&self) -> impl Iterator<Item = &CacheManifestEntry> {
        self.entries
            .iter()
            .filter(|e| e.strategy == CacheStrategy::Precache)
    }

    pub fn get(&self, url: &str) -> Option<&CacheManifestEntry> {
        self.entries.iter().find(|e| e.url == url)
    }
}

/// Icon entry of the installable-app descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub sizes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Installable-app descriptor (`manifest.webmanifest`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppManifest {
    pub name: String,
    #[serde(alias = "shortName")]
    pub short_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_display")]
    pub display: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default, alias = "startUrl")]
    pub start_url: String,
    #[serde(default = "default_orientation")]
    pub orientation: String,
    #[serde(alias = "themeColor")]
    pub theme_color: String,
    #[serde(alias = "backgroundColor")]
    pub background_color: String,
    #[serde(default)]
    pub icons: Vec<ManifestIcon>,
}

fn default_display() -> String {
    "standalone".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_orientation() -> String {
    "any".to_string()
}

/// Per-chunk line of the build report
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub name: String,
    pub kind: ChunkKind,
    pub modules: Vec<String>,
    pub size: usize,
}

impl From<&Chunk> for ChunkSummary {
    fn from(chunk: &Chunk) -> Self {
        Self {
            name: chunk.name.clone(),
            kind: chunk.kind.clone(),
            modules: chunk.modules.iter().map(|m| m.id.clone()).collect(),
            size: chunk.size_bytes(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildResult {
    pub chunks: Vec<ChunkSummary>,
    pub assets: Vec<Asset>,
    pub cache_manifest: Option<CacheManifest>,
    pub warnings: Vec<String>,
    pub build_time: Duration,
    pub outdir: PathBuf,
}

impl BuildResult {
    pub fn asset(&self, file_name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.file_name == file_name)
    }

    pub fn chunk_asset(&self, chunk: &str, category: MediaCategory) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|a| a.origin == AssetOrigin::Chunk(chunk.to_string()) && a.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owning_package() {
        assert_eq!(
            owning_package("node_modules/vue/dist/vue.runtime.esm-bundler.js"),
            Some("vue".to_string())
        );
        assert_eq!(
            owning_package("node_modules/@vueuse/core/index.mjs"),
            Some("@vueuse/core".to_string())
        );
        assert_eq!(
            owning_package("node_modules/naive-ui/node_modules/vueuc/lib/index.js"),
            Some("vueuc".to_string())
        );
        assert_eq!(owning_package("src/tools/base64.ts"), None);
    }

    #[test]
    fn test_module_kind_from_path() {
        let script = Module::new("src/main.ts", "/p/src/main.ts", b"x".to_vec());
        let style = Module::new("src/app.css", "/p/src/app.css", b"x".to_vec());
        let image = Module::new("src/logo.PNG", "/p/src/logo.PNG", vec![0, 1]);

        assert_eq!(script.kind, ModuleKind::Script);
        assert_eq!(style.kind, ModuleKind::Style);
        assert_eq!(image.kind, ModuleKind::Static);
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn test_module_id_uses_forward_slashes() {
        let root = Path::new("/project");
        let path = Path::new("/project/src/tools/json.ts");
        assert_eq!(module_id(root, path), "src/tools/json.ts");
    }

    #[test]
    fn test_manifest_accepts_camel_case_aliases() {
        let json = r##"{
            "name": "ToolsApp Lab",
            "shortName": "ToolsApp",
            "theme_color": "#0B0E14",
            "background_color": "#0B0E14"
        }"##;
        let manifest: WebAppManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.short_name, "ToolsApp");
        assert_eq!(manifest.display, "standalone");
        assert!(manifest.icons.is_empty());
    }
}
