// Stats Plugin: logs build statistics once the output is published

use crate::core::models::{BuildResult, CacheStrategy, MediaCategory};
use crate::core::plugin::{Stage, StageContext};
use crate::utils::{Logger, Result};

/// Logs configuration at build start and per-chunk / precache figures at the end
pub struct StatsPlugin {
    verbose: bool,
}

impl StatsPlugin {
    /// * `verbose` - also list every output file
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Stage for StatsPlugin {
    fn name(&self) -> &str {
        "stats"
    }

    fn on_build_start(&self, context: &StageContext) -> Result<()> {
        let config = &context.config;
        Logger::debug(&format!("  Minification: {}", config.minify));
        Logger::debug(&format!(
            "  Drop console: {}, drop debugger: {}",
            config.drop_console, config.drop_debugger
        ));
        Logger::debug(&format!("  Source maps: {}", config.sourcemap));
        Logger::debug(&format!("  Chunk rules: {}", config.manual_chunks.len()));
        Logger::debug(&format!("  PWA: {}", config.pwa.is_some()));
        Ok(())
    }

    fn on_build_end(&self, _context: &StageContext, result: &BuildResult) -> Result<()> {
        let count = |category: MediaCategory| {
            result
                .assets
                .iter()
                .filter(|a| a.category == category)
                .count()
        };

        Logger::info("📊 Build Statistics");
        Logger::info(&format!("  ⚡ Build time: {:?}", result.build_time));
        Logger::info(&format!("  📦 Chunks: {}", result.chunks.len()));
        Logger::info(&format!(
            "  📂 Output files: {} ({} scripts, {} styles)",
            result.assets.len(),
            count(MediaCategory::Script),
            count(MediaCategory::Style)
        ));

        if let Some(manifest) = &result.cache_manifest {
            let runtime = manifest
                .entries
                .iter()
                .filter(|e| e.strategy == CacheStrategy::Runtime)
                .count();
            Logger::info(&format!(
                "  🗂️  Cache manifest {}: {} precache, {} runtime",
                manifest.version,
                manifest.entries.len() - runtime,
                runtime
            ));
        }

        if !result.warnings.is_empty() {
            Logger::info(&format!("  ⚠️  Warnings: {}", result.warnings.len()));
        }

        if self.verbose {
            for chunk in &result.chunks {
                Logger::info(&format!(
                    "  🧩 {}: {} modules, {} bytes",
                    chunk.name,
                    chunk.modules.len(),
                    chunk.size
                ));
            }
        }

        Ok(())
    }
}
