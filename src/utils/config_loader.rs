use crate::core::config::{
    AliasRule, BuildConfig, ChunkRule, PwaConfig, RegisterType, DEFAULT_MAX_PRECACHE_FILE_SIZE,
};
use crate::core::models::WebAppManifest;
use crate::utils::{EnvInputs, Logger, Result, SatchelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "satchel.config.json";

/// Configuration file format (satchel.config.json). Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatchelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// Entry files relative to the root (default `src/main.ts`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<Vec<AliasRule>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<Vec<String>>,

    /// Strings are inserted as expressions, other values JSON-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub define: Option<BTreeMap<String, serde_json::Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pwa: Option<PwaSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_console: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_debugger: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pure_funcs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<bool>,
    /// KiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size_warning_limit: Option<usize>,
    /// Ordered: the first rule listing a package owns it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_chunks: Option<Vec<ChunkRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_chunk: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwaSection {
    #[serde(default = "default_register_type")]
    pub register_type: RegisterType,
    pub manifest: WebAppManifest,
    #[serde(default)]
    pub include_assets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_file_size_to_cache_in_bytes: Option<u64>,
    /// Query string appended to `start_url`, e.g. `utm_source=pwa&utm_medium=pwa`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

fn default_register_type() -> RegisterType {
    RegisterType::AutoUpdate
}

/// Values given on the command line. `None` leaves the file value in place.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub outdir: Option<String>,
    pub base: Option<String>,
    pub minify: Option<bool>,
    pub drop_console: Option<bool>,
    pub sourcemap: Option<bool>,
    pub port: Option<u16>,
    pub host: Option<String>,
}

/// Config loader that supports config files with CLI override
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `satchel.config.json` from the project root if present
    pub fn load_from_file(root: &Path) -> Result<Option<SatchelConfig>> {
        let config_path = root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            Logger::debug("No satchel.config.json found, using defaults");
            return Ok(None);
        }

        Logger::debug(&format!("Loading config from {}", config_path.display()));

        let content = std::fs::read_to_string(&config_path)?;

        let config: SatchelConfig = serde_json::from_str(&content).map_err(|e| {
            SatchelError::config(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))
        })?;

        Ok(Some(config))
    }

    /// Merge file config with CLI arguments (CLI > file > defaults)
    pub fn merge_with_cli(
        file_config: Option<SatchelConfig>,
        root: PathBuf,
        cli: &CliOverrides,
    ) -> Result<BuildConfig> {
        let file = file_config.unwrap_or_default();
        let build = file.build.unwrap_or_default();
        let server = file.server.unwrap_or_default();
        let defaults = BuildConfig::default();

        let outdir = cli
            .outdir
            .clone()
            .or(build.out_dir)
            .unwrap_or_else(|| "dist".to_string());
        let public_dir = build.public_dir.unwrap_or_else(|| "public".to_string());

        let mut define = BTreeMap::new();
        for (key, value) in file.define.unwrap_or_default() {
            let expression = match value {
                serde_json::Value::String(expression) => expression,
                other => other.to_string(),
            };
            define.insert(key, expression);
        }

        let base = cli.base.clone().or(file.base).unwrap_or(defaults.base);

        let pwa = file.pwa.map(|section| {
            PwaConfig {
                register_type: section.register_type,
                manifest: section.manifest,
                attribution: parse_attribution(section.attribution.as_deref().unwrap_or("")),
                include_assets: section.include_assets,
                maximum_file_size_to_cache_in_bytes: section
                    .maximum_file_size_to_cache_in_bytes
                    .unwrap_or(DEFAULT_MAX_PRECACHE_FILE_SIZE),
            }
        });

        Ok(BuildConfig {
            outdir: resolve_against(&root, &outdir),
            public_dir: resolve_against(&root, &public_dir),
            base,
            entries: file.entries.unwrap_or(defaults.entries),
            alias: file.alias.unwrap_or(defaults.alias),
            external: file.external.unwrap_or_default(),
            define,
            assets_dir: build.assets_dir.unwrap_or(defaults.assets_dir),
            minify: cli.minify.or(build.minify).unwrap_or(defaults.minify),
            drop_console: cli
                .drop_console
                .or(build.drop_console)
                .unwrap_or(defaults.drop_console),
            drop_debugger: build.drop_debugger.unwrap_or(defaults.drop_debugger),
            pure_funcs: build.pure_funcs.unwrap_or(defaults.pure_funcs),
            sourcemap: cli.sourcemap.or(build.sourcemap).unwrap_or(defaults.sourcemap),
            chunk_size_warning_limit: build
                .chunk_size_warning_limit
                .unwrap_or(defaults.chunk_size_warning_limit),
            manual_chunks: build.manual_chunks.unwrap_or_default(),
            default_chunk: build.default_chunk.unwrap_or(defaults.default_chunk),
            server: crate::core::config::ServerConfig {
                host: cli.host.clone().or(server.host).unwrap_or(defaults.server.host),
                port: cli.port.or(server.port).unwrap_or(defaults.server.port),
            },
            pwa,
            root,
        })
    }

    /// File, CLI and environment layered, then validated
    pub fn resolve(root: PathBuf, cli: &CliOverrides, env: &EnvInputs) -> Result<BuildConfig> {
        let file_config = Self::load_from_file(&root)?;
        let mut config = Self::merge_with_cli(file_config, root, cli)?;
        // an explicit --base beats BASE_URL
        let env = match cli.base {
            Some(_) => EnvInputs {
                base_url: None,
                ..env.clone()
            },
            None => env.clone(),
        };
        env.apply(&mut config)?;
        default_start_url(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Example config file (`satchel info --example-config`)
    pub fn generate_example() -> String {
        let example = SatchelConfig {
            base: Some("/".to_string()),
            entries: Some(vec!["src/main.ts".to_string()]),
            alias: Some(vec![AliasRule {
                find: "@".to_string(),
                replacement: "./src".to_string(),
            }]),
            external: None,
            define: None,
            build: Some(BuildSection {
                out_dir: Some("dist".to_string()),
                assets_dir: Some("assets".to_string()),
                public_dir: Some("public".to_string()),
                minify: Some(true),
                drop_console: Some(true),
                drop_debugger: Some(true),
                pure_funcs: Some(vec!["console.log".to_string()]),
                sourcemap: Some(false),
                chunk_size_warning_limit: Some(1000),
                manual_chunks: Some(vec![
                    ChunkRule::new("vue-vendor", &["vue", "vue-router", "pinia"]),
                    ChunkRule::new("editor", &["monaco-editor"]),
                ]),
                default_chunk: Some("index".to_string()),
            }),
            server: Some(ServerSection {
                port: Some(5173),
                host: Some("localhost".to_string()),
            }),
            pwa: Some(PwaSection {
                register_type: RegisterType::AutoUpdate,
                manifest: WebAppManifest {
                    name: "My Tools".to_string(),
                    short_name: "Tools".to_string(),
                    description: "Handy tools that work offline.".to_string(),
                    display: "standalone".to_string(),
                    lang: "en-US".to_string(),
                    start_url: "/".to_string(),
                    orientation: "any".to_string(),
                    theme_color: "#18a058".to_string(),
                    background_color: "#ffffff".to_string(),
                    icons: vec![crate::core::models::ManifestIcon {
                        src: "/android-chrome-512x512.png".to_string(),
                        mime_type: "image/png".to_string(),
                        sizes: "512x512".to_string(),
                        purpose: Some("any maskable".to_string()),
                    }],
                },
                include_assets: vec!["favicon.ico".to_string()],
                maximum_file_size_to_cache_in_bytes: Some(DEFAULT_MAX_PRECACHE_FILE_SIZE),
                attribution: Some("utm_source=pwa&utm_medium=pwa".to_string()),
            }),
        };

        serde_json::to_string_pretty(&example).unwrap_or_else(|_| "{}".to_string())
    }
}

/// An empty manifest `start_url` follows the final base, env included
fn default_start_url(config: &mut BuildConfig) {
    let base = config.base.clone();
    if let Some(pwa) = config.pwa.as_mut() {
        if pwa.manifest.start_url.trim().is_empty() {
            pwa.manifest.start_url = base;
        }
    }
}

fn resolve_against(root: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        root.join(path)
    }
}

/// `a=1&b=2` -> [(a, 1), (b, 2)], order kept
pub fn parse_attribution(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
