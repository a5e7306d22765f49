// In-process model of the installed offline cache
//
// Installing -> Waiting -> Active -> Updating -> Active
//
// A new manifest only replaces the active one after every precache entry of
// it was fetched and verified. Until then the previous manifest keeps
// serving, including when the update task is aborted half way.

use crate::core::config::RegisterType;
use crate::core::interfaces::{AssetFetcher, ManifestSource, Telemetry};
use crate::core::models::{CacheManifest, CacheManifestEntry, CacheStrategy};
use crate::utils::{content_hash, Logger, Result, SatchelError};
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// First install in progress, nothing to serve yet
    Installing,
    /// A complete version is installed and waits for activation
    Waiting,
    Active,
    /// Fetching a newer version while the active one keeps serving
    Updating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    /// Swapped in (auto-update)
    Activated { from: String, to: String },
    /// Installed and waiting for `activate` (prompt)
    Waiting { version: String },
    /// Previous version still active; failure was reported
    Failed { version: String, error: String },
}

/// One complete, immutable set of cached files
#[derive(Debug, Clone)]
pub struct CachedVersion {
    pub manifest: CacheManifest,
    files: HashMap<String, Arc<Vec<u8>>>,
}

impl CachedVersion {
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn file(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.files.get(url).cloned()
    }
}

struct Inner {
    state: CacheState,
    active: Option<Arc<CachedVersion>>,
    waiting: Option<Arc<CachedVersion>>,
    runtime: HashMap<String, Arc<Vec<u8>>>,
}

pub struct OfflineCache {
    inner: RwLock<Inner>,
    fetcher: Arc<dyn AssetFetcher>,
    telemetry: Arc<dyn Telemetry>,
    register_type: RegisterType,
}

impl OfflineCache {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        telemetry: Arc<dyn Telemetry>,
        register_type: RegisterType,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: CacheState::Installing,
                active: None,
                waiting: None,
                runtime: HashMap::new(),
            }),
            fetcher,
            telemetry,
            register_type,
        }
    }

    pub fn state(&self) -> CacheState {
        self.inner.read().state
    }

    pub fn active_version(&self) -> Option<String> {
        self.inner.read().active.as_ref().map(|v| v.version().to_string())
    }

    pub fn active(&self) -> Option<Arc<CachedVersion>> {
        self.inner.read().active.clone()
    }

    /// First install. Auto-update activates right away, prompt waits.
    pub async fn install(&self, manifest: CacheManifest) -> Result<CacheState> {
        if self.state() != CacheState::Installing {
            return Err(SatchelError::fetch("offline cache is already installed"));
        }

        let version = self.fetch_version(manifest, None).await?;
        Logger::info(&format!("🗂️  Offline cache {} installed", version.version()));

        {
            let mut inner = self.inner.write();
            inner.waiting = Some(Arc::new(version));
            inner.state = CacheState::Waiting;
        }

        if self.register_type == RegisterType::AutoUpdate {
            self.activate()?;
        }
        Ok(self.state())
    }

    /// Promote the waiting version
    pub fn activate(&self) -> Result<String> {
        let mut inner = self.inner.write();
        let waiting = inner
            .waiting
            .take()
            .ok_or_else(|| SatchelError::fetch("no installed version is waiting"))?;

        let version = waiting.version().to_string();
        inner.active = Some(waiting);
        inner.state = CacheState::Active;
        inner.runtime.clear();
        Ok(version)
    }

    /// Check `source` for a newer manifest and install it. Never fails: a
    /// fetch failure leaves the active version serving and goes to telemetry.
    pub async fn check_for_update(&self, source: &dyn ManifestSource) -> UpdateOutcome {
        let current = {
            let inner = self.inner.read();
            if inner.state != CacheState::Active {
                return UpdateOutcome::UpToDate;
            }
            match &inner.active {
                Some(active) => active.clone(),
                None => return UpdateOutcome::UpToDate,
            }
        };

        let latest = match source.latest().await {
            Ok(latest) => latest,
            Err(e) => return self.fail(current.version(), &e.to_string()),
        };

        if latest.version == current.version() {
            return UpdateOutcome::UpToDate;
        }

        let guard = UpdatingGuard::begin(self);
        let to = latest.version.clone();

        match self.fetch_version(latest, Some(&current)).await {
            Ok(version) => {
                guard.complete();
                let version = Arc::new(version);
                let mut inner = self.inner.write();
                match self.register_type {
                    RegisterType::AutoUpdate => {
                        inner.active = Some(version);
                        inner.runtime.clear();
                        inner.state = CacheState::Active;
                        UpdateOutcome::Activated {
                            from: current.version().to_string(),
                            to,
                        }
                    }
                    RegisterType::Prompt => {
                        inner.waiting = Some(version);
                        inner.state = CacheState::Waiting;
                        UpdateOutcome::Waiting { version: to }
                    }
                }
            }
            Err(e) => {
                drop(guard);
                self.fail(&to, &e.to_string())
            }
        }
    }

    /// Serve a URL. Precached files come from the active version, runtime
    /// entries are cached on first use, anything else goes to the network.
    pub async fn serve(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        let (active, cached) = {
            let inner = self.inner.read();
            (inner.active.clone(), inner.runtime.get(url).cloned())
        };

        if let Some(bytes) = active.as_ref().and_then(|v| v.file(url)) {
            return Ok(bytes);
        }
        if let Some(bytes) = cached {
            return Ok(bytes);
        }

        let bytes = Arc::new(self.fetcher.fetch(url).await?);
        let is_runtime = active
            .as_ref()
            .and_then(|v| v.manifest.get(url))
            .map(|e| e.strategy == CacheStrategy::Runtime)
            .unwrap_or(false);
        if is_runtime {
            self.inner.write().runtime.insert(url.to_string(), bytes.clone());
        }

        Ok(bytes)
    }

    /// Check for updates once now, then every `interval` if given. Serving
    /// never waits on this task.
    pub fn spawn_update_checker(
        self: &Arc<Self>,
        source: Arc<dyn ManifestSource>,
        interval: Option<Duration>,
    ) -> UpdateChecker {
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let outcome = cache.check_for_update(source.as_ref()).await;
                Logger::debug(&format!("offline cache update check: {:?}", outcome));

                match interval {
                    Some(interval) => tokio::time::sleep(interval).await,
                    None => break,
                }
            }
        });

        UpdateChecker { handle }
    }

    /// Fetch every precache entry; unchanged revisions are reused from `previous`
    async fn fetch_version(
        &self,
        manifest: CacheManifest,
        previous: Option<&CachedVersion>,
    ) -> Result<CachedVersion> {
        let entries: Vec<CacheManifestEntry> = manifest.precached().cloned().collect();

        let fetches = entries.iter().map(|entry| async move {
            let reusable = previous.and_then(|prev| {
                let same = prev
                    .manifest
                    .get(&entry.url)
                    .map(|e| e.revision == entry.revision)
                    .unwrap_or(false);
                if same {
                    prev.file(&entry.url)
                } else {
                    None
                }
            });

            if let Some(bytes) = reusable {
                return Ok::<_, SatchelError>((entry.url.clone(), bytes));
            }

            let bytes = self.fetcher.fetch(&entry.url).await?;
            let revision = content_hash(&bytes);
            if revision != entry.revision {
                return Err(SatchelError::fetch(format!(
                    "{}: expected revision {}, got {}",
                    entry.url, entry.revision, revision
                )));
            }
            Ok((entry.url.clone(), Arc::new(bytes)))
        });

        let files = try_join_all(fetches).await?.into_iter().collect();
        Ok(CachedVersion { manifest, files })
    }

    fn fail(&self, version: &str, error: &str) -> UpdateOutcome {
        self.telemetry.report_update_failure(version, error);
        UpdateOutcome::Failed {
            version: version.to_string(),
            error: error.to_string(),
        }
    }
}

/// Puts the cache back to `Active` unless the update completed, including
/// when the update future is dropped by an abort
struct UpdatingGuard<'c> {
    cache: &'c OfflineCache,
    completed: bool,
}

impl<'c> UpdatingGuard<'c> {
    fn begin(cache: &'c OfflineCache) -> Self {
        cache.inner.write().state = CacheState::Updating;
        Self {
            cache,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            let mut inner = self.cache.inner.write();
            if inner.state == CacheState::Updating {
                inner.state = CacheState::Active;
            }
        }
    }
}

/// Handle of the background update task
pub struct UpdateChecker {
    handle: JoinHandle<()>,
}

impl UpdateChecker {
    /// Page unload: stop checking. An update in flight is abandoned and the
    /// active version stays.
    pub fn unload(self) {
        self.handle.abort();
    }
}
