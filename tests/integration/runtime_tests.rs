use crate::fixture::{Fixture, PWA_CONFIG};
use async_trait::async_trait;
use satchel::core::config::RegisterType;
use satchel::core::interfaces::{AssetFetcher, LogTelemetry, ManifestSource};
use satchel::core::models::{CacheManifest, MediaCategory};
use satchel::infrastructure::pwa::{register_type, CacheState, OfflineCache, UpdateOutcome};
use satchel::utils::{CliOverrides, Result, SatchelError};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Serves URLs from a built output directory, like the preview server would
struct DirFetcher {
    dist: PathBuf,
    fetched: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl DirFetcher {
    fn new(dist: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            dist,
            fetched: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    fn take_fetched(&self) -> Vec<String> {
        std::mem::take(&mut *self.fetched.lock().unwrap())
    }
}

#[async_trait]
impl AssetFetcher for DirFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            return Err(SatchelError::fetch(format!("{}: connection reset", url)));
        }
        let path = self.dist.join(url.trim_start_matches('/'));
        tokio::fs::read(&path)
            .await
            .map_err(|e| SatchelError::fetch(format!("{}: {}", url, e)))
    }
}

struct DistManifestSource {
    dist: PathBuf,
}

#[async_trait]
impl ManifestSource for DistManifestSource {
    async fn latest(&self) -> Result<CacheManifest> {
        let bytes = tokio::fs::read(self.dist.join("precache-manifest.json")).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn changed_tool(fixture: &Fixture) {
    fixture.write(
        "src/tools/my-tool.ts",
        "import { defineStore } from 'pinia';\nexport const useTool = defineStore('my-tool', () => ({ count: 42 }));\n",
    );
}

#[tokio::test]
async fn test_update_to_rebuilt_app() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let first = fixture.build(&CliOverrides::default()).await.unwrap();
    let config = fixture.config(&CliOverrides::default()).unwrap();
    assert_eq!(register_type(&config), RegisterType::AutoUpdate);

    let fetcher = DirFetcher::new(fixture.dist());
    let cache = OfflineCache::new(fetcher.clone(), Arc::new(LogTelemetry), register_type(&config));
    let state = cache.install(first.cache_manifest.clone().unwrap()).await.unwrap();
    assert_eq!(state, CacheState::Active);
    fetcher.take_fetched();

    changed_tool(&fixture);
    let second = fixture.build(&CliOverrides::default()).await.unwrap();

    let source = DistManifestSource { dist: fixture.dist() };
    let outcome = cache.check_for_update(&source).await;
    let new_version = second.cache_manifest.as_ref().unwrap().version.clone();
    assert_eq!(
        outcome,
        UpdateOutcome::Activated {
            from: first.cache_manifest.as_ref().unwrap().version.clone(),
            to: new_version.clone(),
        }
    );
    assert_eq!(cache.active_version(), Some(new_version));

    let vendor = second.chunk_asset("vue-vendor", MediaCategory::Script).unwrap();
    let index = second.chunk_asset("index", MediaCategory::Script).unwrap();
    let fetched = fetcher.take_fetched();
    assert!(!fetched.contains(&format!("/{}", vendor.file_name)));
    assert!(fetched.contains(&format!("/{}", index.file_name)));

    let served = cache.serve(&format!("/{}", index.file_name)).await.unwrap();
    assert_eq!(served.as_slice(), index.bytes.as_slice());
    // served from the cache, not the network
    assert!(fetcher.take_fetched().is_empty());
}

#[tokio::test]
async fn test_failed_update_keeps_serving_previous_build() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let first = fixture.build(&CliOverrides::default()).await.unwrap();
    let first_index = first.chunk_asset("index", MediaCategory::Script).unwrap().clone();

    let fetcher = DirFetcher::new(fixture.dist());
    let cache = OfflineCache::new(fetcher.clone(), Arc::new(LogTelemetry), RegisterType::AutoUpdate);
    cache.install(first.cache_manifest.clone().unwrap()).await.unwrap();

    changed_tool(&fixture);
    let second = fixture.build(&CliOverrides::default()).await.unwrap();
    let second_index = second.chunk_asset("index", MediaCategory::Script).unwrap();
    fetcher
        .failing
        .lock()
        .unwrap()
        .insert(format!("/{}", second_index.file_name));

    let outcome = cache.check_for_update(&DistManifestSource { dist: fixture.dist() }).await;
    assert!(matches!(outcome, UpdateOutcome::Failed { .. }), "{:?}", outcome);

    let first_version = first.cache_manifest.as_ref().unwrap().version.clone();
    assert_eq!(cache.active_version(), Some(first_version));
    assert_eq!(cache.state(), CacheState::Active);

    // the old index script is gone from dist but still served offline
    let url = format!("/{}", first_index.file_name);
    assert!(!fixture.dist().join(&first_index.file_name).exists());
    let served = cache.serve(&url).await.unwrap();
    assert_eq!(served.as_slice(), first_index.bytes.as_slice());
}

#[tokio::test]
async fn test_unchanged_build_is_up_to_date() {
    let fixture = Fixture::tools_app(PWA_CONFIG);
    let first = fixture.build(&CliOverrides::default()).await.unwrap();

    let fetcher = DirFetcher::new(fixture.dist());
    let cache = OfflineCache::new(fetcher.clone(), Arc::new(LogTelemetry), RegisterType::Prompt);
    assert_eq!(
        cache.install(first.cache_manifest.clone().unwrap()).await.unwrap(),
        CacheState::Waiting
    );
    cache.activate().unwrap();

    fixture.build(&CliOverrides::default()).await.unwrap();
    let outcome = cache.check_for_update(&DistManifestSource { dist: fixture.dist() }).await;
    assert_eq!(outcome, UpdateOutcome::UpToDate);
}
