// Offline cache: web app manifest, precache manifest, service worker
pub mod precache;
pub mod runtime;
pub mod service_worker;
pub mod web_manifest;

pub use precache::*;
pub use runtime::*;
pub use service_worker::*;
pub use web_manifest::*;

use crate::core::config::{BuildConfig, RegisterType};
use crate::core::models::{Asset, CacheManifest};
use crate::utils::{Logger, Result};

#[derive(Debug)]
pub struct CacheArtifacts {
    /// Files to add to the output, in write order
    pub assets: Vec<Asset>,
    pub manifest: CacheManifest,
    pub warnings: Vec<String>,
}

/// Derive the offline cache files from everything emitted so far.
///
/// Without a `pwa` section only `precache-manifest.json` is produced.
pub fn generate_cache_artifacts(config: &BuildConfig, emitted: &[Asset]) -> Result<CacheArtifacts> {
    let _timer = crate::utils::Timer::start("Generating offline cache");
    let mut warnings = Vec::new();
    let mut added = Vec::new();

    if let Some(pwa) = &config.pwa {
        for icon in &pwa.manifest.icons {
            let file_name = icon.src.trim_start_matches('/');
            if !emitted.iter().any(|a| a.file_name == file_name) {
                let warning = format!("manifest icon {} is not in the public directory", icon.src);
                Logger::warn(&warning);
                warnings.push(warning);
            }
        }

        added.push(Asset::generated(
            MANIFEST_FILE_NAME,
            render_manifest(&pwa.manifest, &pwa.attribution)?,
        ));
        added.push(Asset::generated(
            REGISTER_SW_FILE_NAME,
            render_register_script(config, pwa.register_type)?.into_bytes(),
        ));
    }

    let mut all = emitted.to_vec();
    all.extend(added.iter().cloned());

    let outcome = PrecacheBuilder::new(config).build(&all);
    warnings.extend(outcome.warnings);
    let manifest = outcome.manifest;

    added.push(Asset::generated(
        PRECACHE_MANIFEST_FILE_NAME,
        serde_json::to_vec_pretty(&manifest)?,
    ));

    if let Some(pwa) = &config.pwa {
        added.push(Asset::generated(
            SERVICE_WORKER_FILE_NAME,
            render_service_worker(&manifest, config, pwa.register_type)?.into_bytes(),
        ));
    }

    Ok(CacheArtifacts {
        assets: added,
        manifest,
        warnings,
    })
}

/// Register type of the configured app, auto-update when no `pwa` section
pub fn register_type(config: &BuildConfig) -> RegisterType {
    config
        .pwa
        .as_ref()
        .map(|p| p.register_type)
        .unwrap_or(RegisterType::AutoUpdate)
}
