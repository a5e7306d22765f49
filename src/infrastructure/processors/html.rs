use crate::core::config::BuildConfig;
use crate::core::models::{Asset, AssetOrigin, MediaCategory};
use once_cell::sync::Lazy;
use regex::Regex;

/// Development entry scripts (`<script type="module" src="/src/main.ts">`)
static LOCAL_MODULE_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)[ \t]*<script\b[^>]*\btype\s*=\s*["']module["'][^>]*\bsrc\s*=\s*["'](?:\.?/)?[^"':]+["'][^>]*>\s*</script>[ \t]*\r?\n?"#)
        .expect("valid regex")
});

/// Rewrites the application's `index.html` to load the emitted assets
pub struct HtmlInjector<'c> {
    config: &'c BuildConfig,
}

impl<'c> HtmlInjector<'c> {
    pub fn new(config: &'c BuildConfig) -> Self {
        Self { config }
    }

    /// Replace development entry scripts with the emitted chunk scripts and
    /// styles. Rule chunks are preloaded, the default chunk is the entry.
    pub fn inject(&self, template: &str, assets: &[Asset]) -> String {
        let stripped = LOCAL_MODULE_SCRIPT.replace_all(template, "");

        let mut tags = Vec::new();
        let default_chunk = AssetOrigin::Chunk(self.config.default_chunk.clone());

        for asset in assets.iter().filter(|a| a.category == MediaCategory::Style) {
            tags.push(format!(
                r#"<link rel="stylesheet" crossorigin href="{}">"#,
                self.config.public_url(&asset.file_name)
            ));
        }

        for asset in assets.iter().filter(|a| a.category == MediaCategory::Script) {
            if !matches!(asset.origin, AssetOrigin::Chunk(_)) {
                continue;
            }
            let url = self.config.public_url(&asset.file_name);
            if asset.origin == default_chunk {
                tags.push(format!(r#"<script type="module" crossorigin src="{}"></script>"#, url));
            } else {
                tags.push(format!(r#"<link rel="modulepreload" crossorigin href="{}">"#, url));
            }
        }

        if self.config.pwa.is_some() {
            tags.push(format!(
                r#"<link rel="manifest" href="{}">"#,
                self.config.public_url("manifest.webmanifest")
            ));
            tags.push(format!(
                r#"<script id="satchel-register-sw" src="{}"></script>"#,
                self.config.public_url("registerSW.js")
            ));
        }

        let block: String = tags.iter().map(|t| format!("  {}\n", t)).collect();

        match stripped.find("</head>") {
            Some(index) => format!("{}{}{}", &stripped[..index], block, &stripped[index..]),
            None => format!("{}{}", block, stripped),
        }
    }

    pub fn emit(&self, template: &str, assets: &[Asset]) -> Asset {
        let mut asset = Asset::generated("index.html", self.inject(template, assets).into_bytes());
        asset.origin = AssetOrigin::Public;
        asset
    }
}
