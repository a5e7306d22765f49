use crate::core::models::WebAppManifest;
use crate::utils::{Result, SatchelError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Named chunk and the packages it owns. Rules are evaluated in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRule {
    pub name: String,
    pub packages: Vec<String>,
}

impl ChunkRule {
    pub fn new(name: impl Into<String>, packages: &[&str]) -> Self {
        Self {
            name: name.into(),
            packages: packages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Import prefix rewritten to a root-relative directory (`@` -> `./src`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub find: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5173,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegisterType {
    /// New service worker activates as soon as it is installed
    AutoUpdate,
    /// New service worker waits until the page asks it to activate
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PwaConfig {
    pub register_type: RegisterType,
    pub manifest: WebAppManifest,
    /// Query parameters appended to `start_url` (`utm_source=pwa`)
    pub attribution: Vec<(String, String)>,
    /// Public files precached in addition to the manifest icons
    pub include_assets: Vec<String>,
    pub maximum_file_size_to_cache_in_bytes: u64,
}

pub const DEFAULT_MAX_PRECACHE_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Resolved options for one build invocation. Read-only once validated.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub root: PathBuf,
    pub outdir: PathBuf,
    pub public_dir: PathBuf,
    pub base: String,
    pub entries: Vec<String>,
    pub alias: Vec<AliasRule>,
    pub external: Vec<String>,
    pub define: BTreeMap<String, String>,
    pub assets_dir: String,
    pub minify: bool,
    pub drop_console: bool,
    pub drop_debugger: bool,
    pub pure_funcs: Vec<String>,
    pub sourcemap: bool,
    /// Size in KiB above which a chunk is reported
    pub chunk_size_warning_limit: usize,
    pub manual_chunks: Vec<ChunkRule>,
    pub default_chunk: String,
    pub server: ServerConfig,
    pub pwa: Option<PwaConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            outdir: PathBuf::from("dist"),
            public_dir: PathBuf::from("public"),
            base: "/".to_string(),
            entries: vec!["src/main.ts".to_string()],
            alias: vec![AliasRule {
                find: "@".to_string(),
                replacement: "./src".to_string(),
            }],
            external: Vec::new(),
            define: BTreeMap::new(),
            assets_dir: "assets".to_string(),
            minify: true,
            drop_console: true,
            drop_debugger: true,
            pure_funcs: vec!["console.log".to_string()],
            sourcemap: false,
            chunk_size_warning_limit: 1000,
            manual_chunks: Vec::new(),
            default_chunk: "index".to_string(),
            server: ServerConfig::default(),
            pwa: None,
        }
    }
}

impl BuildConfig {
    /// Fail fast on configuration that would make planning or emission
    /// meaningless. Runs before any asset is produced.
    pub fn validate(&self) -> Result<()> {
        if !self.base.starts_with('/') && !self.base.starts_with("./") && !self.base.contains("://") {
            return Err(SatchelError::config(format!(
                "base must be absolute (\"/\"), relative (\"./\") or a full URL, got \"{}\"",
                self.base
            )));
        }

        if self.entries.is_empty() {
            return Err(SatchelError::config("at least one entry is required"));
        }

        if self.default_chunk.trim().is_empty() {
            return Err(SatchelError::config("defaultChunk must not be empty"));
        }

        if self.assets_dir.trim().is_empty() || self.assets_dir.starts_with('/') {
            return Err(SatchelError::config(format!(
                "assetsDir must be a relative directory, got \"{}\"",
                self.assets_dir
            )));
        }

        let mut names = HashSet::new();
        for (index, rule) in self.manual_chunks.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(SatchelError::config(format!(
                    "manualChunks[{}] has an empty name",
                    index
                )));
            }

            if rule.name == self.default_chunk {
                return Err(SatchelError::config(format!(
                    "manualChunks[{}] uses the default chunk name \"{}\"",
                    index, rule.name
                )));
            }

            if !names.insert(rule.name.as_str()) {
                return Err(SatchelError::config(format!(
                    "manualChunks[{}]: chunk \"{}\" is declared twice",
                    index, rule.name
                )));
            }

            if rule.packages.is_empty() {
                return Err(SatchelError::config(format!(
                    "manualChunks[{}] (\"{}\") lists no packages",
                    index, rule.name
                )));
            }

            for package in &rule.packages {
                if !is_valid_package_name(package) {
                    return Err(SatchelError::config(format!(
                        "manualChunks[{}] (\"{}\"): \"{}\" is not a package name",
                        index, rule.name, package
                    )));
                }
            }
        }

        if self.server.port == 0 {
            return Err(SatchelError::config("server.port must not be 0"));
        }

        if let Some(pwa) = &self.pwa {
            crate::infrastructure::pwa::validate_manifest(&pwa.manifest)?;
        }

        Ok(())
    }

    /// Public URL of an output file
    pub fn public_url(&self, file_name: &str) -> String {
        if self.base.ends_with('/') {
            format!("{}{}", self.base, file_name)
        } else {
            format!("{}/{}", self.base, file_name)
        }
    }
}

/// npm-style package name: optional `@scope/`, no whitespace, no path tricks
pub fn is_valid_package_name(name: &str) -> bool {
    let valid_segment = |s: &str| {
        !s.is_empty()
            && !s.starts_with('.')
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
    };

    match name.strip_prefix('@') {
        Some(scoped) => {
            let mut parts = scoped.splitn(2, '/');
            match (parts.next(), parts.next()) {
                (Some(scope), Some(pkg)) => valid_segment(scope) && valid_segment(pkg),
                _ => false,
            }
        }
        None => valid_segment(name),
    }
}
