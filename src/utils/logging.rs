use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub struct Logger;

impl Logger {
    /// Install the global subscriber. `RUST_LOG` wins over the default filter.
    pub fn init(verbose: bool) {
        let default_filter = if verbose { "satchel=debug" } else { "satchel=info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        // A second init (tests, embedding) is not an error.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn build_start(root: &str, outdir: &str, base: &str) {
        info!("🔨 satchel - production build");
        info!("📁 Input: {}", root);
        info!("📦 Output: {}", outdir);
        info!("🌐 Base: {}", base);
    }

    pub fn modules_discovered(scripts: usize, styles: usize, statics: usize) {
        info!(
            "📦 Discovered {} script, {} style and {} static modules",
            scripts, styles, statics
        );
    }

    pub fn chunk_planned(name: &str, modules: usize, size: usize) {
        info!("  ├─ {} ({} modules, {:.1} kB)", name, modules, size as f64 / 1024.0);
    }

    pub fn processing_module(id: &str, stage: &str) {
        debug!("⚡ {}: {}", stage, id);
    }

    pub fn asset_emitted(path: &str, size: usize) {
        debug!("📝 Emitted {} ({} bytes)", path, size);
    }

    pub fn precache_summary(precached: usize, runtime: usize, bytes: u64) {
        info!(
            "🗂️  Precache: {} entries ({:.1} kB), {} runtime entries",
            precached,
            bytes as f64 / 1024.0,
            runtime
        );
    }

    pub fn build_complete(assets: usize, build_time: Duration, outdir: &str) {
        info!("✅ Built {} assets in {:.2?} → {}", assets, build_time, outdir);
    }

    pub fn info(msg: &str) {
        info!("{}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
