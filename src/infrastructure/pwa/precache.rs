use super::web_manifest::MANIFEST_FILE_NAME;
use crate::core::config::{BuildConfig, DEFAULT_MAX_PRECACHE_FILE_SIZE};
use crate::core::models::{
    Asset, AssetOrigin, CacheManifest, CacheManifestEntry, CacheStrategy, MediaCategory,
};
use crate::utils::{content_hash, Logger};
use std::collections::HashSet;

pub const PRECACHE_MANIFEST_FILE_NAME: &str = "precache-manifest.json";
pub const SERVICE_WORKER_FILE_NAME: &str = "sw.js";
pub const REGISTER_SW_FILE_NAME: &str = "registerSW.js";

#[derive(Debug, Default)]
pub struct PrecacheOutcome {
    pub manifest: CacheManifest,
    pub warnings: Vec<String>,
}

/// Decides the caching strategy of every emitted file
pub struct PrecacheBuilder<'c> {
    config: &'c BuildConfig,
    max_size: u64,
    /// Public files precached on install (icons and `includeAssets`)
    pinned: HashSet<String>,
}

impl<'c> PrecacheBuilder<'c> {
    pub fn new(config: &'c BuildConfig) -> Self {
        let mut pinned = HashSet::new();
        let mut max_size = DEFAULT_MAX_PRECACHE_FILE_SIZE;

        if let Some(pwa) = &config.pwa {
            max_size = pwa.maximum_file_size_to_cache_in_bytes;
            for icon in &pwa.manifest.icons {
                pinned.insert(icon.src.trim_start_matches('/').to_string());
            }
            for asset in &pwa.include_assets {
                pinned.insert(asset.trim_start_matches('/').to_string());
            }
        }

        Self {
            config,
            max_size,
            pinned,
        }
    }

    pub fn build(&self, assets: &[Asset]) -> PrecacheOutcome {
        let mut warnings = Vec::new();
        let mut entries = Vec::new();

        for asset in assets {
            if matches!(
                asset.file_name.as_str(),
                SERVICE_WORKER_FILE_NAME | PRECACHE_MANIFEST_FILE_NAME
            ) {
                continue;
            }

            let size = asset.size() as u64;
            let mut strategy = self.strategy_for(asset);

            if strategy == CacheStrategy::Precache && size > self.max_size {
                let warning = format!(
                    "{} is {} bytes, above the {} byte precache limit; caching at runtime",
                    asset.file_name, size, self.max_size
                );
                Logger::warn(&warning);
                warnings.push(warning);
                strategy = CacheStrategy::Runtime;
            }

            entries.push(CacheManifestEntry {
                url: self.config.public_url(&asset.file_name),
                // equals the filename hash except for scripts carrying a
                // sourceMappingURL trailer
                revision: content_hash(&asset.bytes),
                strategy,
                size,
            });
        }

        entries.sort_by(|a, b| a.url.cmp(&b.url));
        entries.dedup_by(|a, b| a.url == b.url);

        let version = manifest_version(&entries);
        let manifest = CacheManifest { version, entries };

        let precached: Vec<_> = manifest.precached().collect();
        Logger::precache_summary(
            precached.len(),
            manifest.entries.len() - precached.len(),
            precached.iter().map(|e| e.size).sum(),
        );

        PrecacheOutcome { manifest, warnings }
    }

    fn strategy_for(&self, asset: &Asset) -> CacheStrategy {
        match asset.origin {
            AssetOrigin::SourceMap => return CacheStrategy::Runtime,
            AssetOrigin::Public if !self.pinned.contains(&asset.file_name) => {
                return match asset.extension() {
                    "html" => CacheStrategy::Precache,
                    _ => CacheStrategy::Runtime,
                };
            }
            _ => {}
        }

        if self.pinned.contains(&asset.file_name) || asset.file_name == MANIFEST_FILE_NAME {
            return CacheStrategy::Precache;
        }

        match asset.category {
            MediaCategory::Script | MediaCategory::Style => CacheStrategy::Precache,
            MediaCategory::Other => match asset.extension() {
                "html" | "webmanifest" => CacheStrategy::Precache,
                _ => CacheStrategy::Runtime,
            },
        }
    }
}

/// Version derived from every entry, so any content change yields a new one
pub fn manifest_version(entries: &[CacheManifestEntry]) -> String {
    let mut material = String::new();
    for entry in entries {
        material.push_str(&entry.url);
        material.push(' ');
        material.push_str(&entry.revision);
        material.push('\n');
    }
    content_hash(material.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{PwaConfig, RegisterType};
    use crate::core::models::{ManifestIcon, WebAppManifest};

    fn hashed(file_name: &str, category: MediaCategory, origin: AssetOrigin, size: usize) -> Asset {
        let bytes = vec![b'x'; size];
        Asset {
            name: "n".to_string(),
            file_name: file_name.to_string(),
            hash: Some(content_hash(&bytes)),
            category,
            origin,
            bytes,
        }
    }

    fn public(file_name: &str) -> Asset {
        let mut asset = Asset::generated(file_name, b"icon".to_vec());
        asset.origin = AssetOrigin::Public;
        asset
    }

    fn config() -> BuildConfig {
        BuildConfig {
            base: "/it-tools/".to_string(),
            pwa: Some(PwaConfig {
                register_type: RegisterType::AutoUpdate,
                manifest: WebAppManifest {
                    name: "Tools".to_string(),
                    short_name: "Tools".to_string(),
                    description: String::new(),
                    display: "standalone".to_string(),
                    lang: "en".to_string(),
                    start_url: "/it-tools/".to_string(),
                    orientation: "any".to_string(),
                    theme_color: "#000".to_string(),
                    background_color: "#000".to_string(),
                    icons: vec![ManifestIcon {
                        src: "/android-chrome-512x512.png".to_string(),
                        mime_type: "image/png".to_string(),
                        sizes: "512x512".to_string(),
                        purpose: Some("any maskable".to_string()),
                    }],
                },
                attribution: Vec::new(),
                include_assets: vec!["favicon.ico".to_string()],
                maximum_file_size_to_cache_in_bytes: 1024,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_strategies_and_order() {
        let assets = vec![
            hashed("assets/js/index-aaaa.js", MediaCategory::Script, AssetOrigin::Chunk("index".into()), 10),
            hashed("assets/css/index-bbbb.css", MediaCategory::Style, AssetOrigin::Chunk("index".into()), 10),
            hashed("assets/woff2/inter-cccc.woff2", MediaCategory::Other, AssetOrigin::Static("src/inter.woff2".into()), 10),
            public("android-chrome-512x512.png"),
            public("favicon.ico"),
            public("robots.txt"),
            Asset::generated(MANIFEST_FILE_NAME, b"{}".to_vec()),
            Asset::generated(SERVICE_WORKER_FILE_NAME, b"sw".to_vec()),
        ];

        let config = config();
        let outcome = PrecacheBuilder::new(&config).build(&assets);
        let manifest = outcome.manifest;

        let urls: Vec<&str> = manifest.entries.iter().map(|e| e.url.as_str()).collect();
        let mut sorted = urls.clone();
        sorted.sort();
        assert_eq!(urls, sorted);
        assert!(manifest.get("/it-tools/sw.js").is_none());

        let strategy = |url: &str| manifest.get(url).unwrap().strategy;
        assert_eq!(strategy("/it-tools/assets/js/index-aaaa.js"), CacheStrategy::Precache);
        assert_eq!(strategy("/it-tools/assets/css/index-bbbb.css"), CacheStrategy::Precache);
        assert_eq!(strategy("/it-tools/assets/woff2/inter-cccc.woff2"), CacheStrategy::Runtime);
        assert_eq!(strategy("/it-tools/android-chrome-512x512.png"), CacheStrategy::Precache);
        assert_eq!(strategy("/it-tools/favicon.ico"), CacheStrategy::Precache);
        assert_eq!(strategy("/it-tools/robots.txt"), CacheStrategy::Runtime);
        assert_eq!(strategy("/it-tools/manifest.webmanifest"), CacheStrategy::Precache);
    }

    #[test]
    fn test_oversized_entries_demoted() {
        let assets = vec![hashed(
            "assets/js/editor-dddd.js",
            MediaCategory::Script,
            AssetOrigin::Chunk("editor".into()),
            4096,
        )];

        let config = config();
        let outcome = PrecacheBuilder::new(&config).build(&assets);

        assert_eq!(outcome.manifest.entries[0].strategy, CacheStrategy::Runtime);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_version_changes_with_content() {
        let config = config();
        let a = PrecacheBuilder::new(&config).build(&[hashed(
            "assets/js/index-aaaa.js",
            MediaCategory::Script,
            AssetOrigin::Chunk("index".into()),
            10,
        )]);
        let b = PrecacheBuilder::new(&config).build(&[hashed(
            "assets/js/index-aaaa.js",
            MediaCategory::Script,
            AssetOrigin::Chunk("index".into()),
            11,
        )]);
        assert_ne!(a.manifest.version, b.manifest.version);
    }

    #[test]
    fn test_empty_outcome() {
        let outcome = PrecacheOutcome::default();
        assert!(outcome.manifest.entries.is_empty());
        assert_eq!(outcome.manifest.precached().count(), 0);
        assert!(outcome.warnings.is_empty());
    }
}
