use crate::core::config::BuildConfig;
use crate::core::interfaces::{BuildService, FileSystemService};
use crate::core::models::{Asset, AssetOrigin, BuildResult, ChunkSummary};
use crate::core::plugin::{StageContext, StagePipeline};
use crate::infrastructure::discovery::{DiscoveryResult, ModuleDiscovery};
use crate::infrastructure::processors::{BuildEmitter, ChunkPlan, ChunkPlanner, HtmlInjector};
use crate::infrastructure::pwa::generate_cache_artifacts;
use crate::infrastructure::{Publisher, TokioFileSystemService};
use crate::utils::{Logger, Result, SatchelError, Timer};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Production build: discovery, planning, emission, offline cache, publish
pub struct SatchelBuildService {
    config: Arc<BuildConfig>,
    fs_service: Arc<dyn FileSystemService>,
    pipeline: Arc<StagePipeline>,
    context: StageContext,
}

impl SatchelBuildService {
    pub fn new(
        config: BuildConfig,
        fs_service: Arc<dyn FileSystemService>,
        pipeline: StagePipeline,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            context: StageContext::new(config.clone()),
            config,
            fs_service,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Tokio file system and the built-in stage chain
    pub fn with_defaults(config: BuildConfig, verbose: bool) -> Result<Self> {
        let pipeline = crate::plugins::default_pipeline(&config, verbose)?;
        Ok(Self::new(config, Arc::new(TokioFileSystemService), pipeline))
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub async fn discover(&self) -> Result<DiscoveryResult> {
        ModuleDiscovery::new(self.config.clone(), self.fs_service.clone(), self.pipeline.clone())
            .discover()
            .await
    }

    /// Discovery and planning only (`satchel plan`)
    pub async fn plan(&self) -> Result<(DiscoveryResult, ChunkPlan)> {
        self.config.validate()?;
        let discovery = self.discover().await?;
        let plan = self.plan_modules(&discovery);
        Ok((discovery, plan))
    }

    fn plan_modules(&self, discovery: &DiscoveryResult) -> ChunkPlan {
        let _timer = Timer::start("Chunk planning");
        let plan = ChunkPlanner::from_config(&self.config).plan(&discovery.modules);

        Logger::info(&format!("🧩 Planned {} chunks", plan.chunks.len()));
        for chunk in &plan.chunks {
            Logger::chunk_planned(&chunk.name, chunk.modules.len(), chunk.size_bytes());
        }

        plan
    }

    /// Files of the public directory, copied unhashed to the output root
    async fn public_assets(&self) -> Result<Vec<Asset>> {
        let public_dir = &self.config.public_dir;
        let mut assets = Vec::new();

        for path in self.fs_service.list_files(public_dir).await? {
            let file_name = relative_file_name(public_dir, &path)?;
            let bytes = self.fs_service.read_file(&path).await?;
            let mut asset = Asset::generated(file_name, bytes);
            asset.origin = AssetOrigin::Public;
            assets.push(asset);
        }

        if !assets.is_empty() {
            Logger::debug(&format!("📁 Copied {} public files", assets.len()));
        }
        Ok(assets)
    }

    /// `index.html` with the emitted entry, preload and stylesheet tags
    async fn html_asset(&self, emitted: &[Asset]) -> Result<Option<Asset>> {
        let template_path = self.config.root.join("index.html");
        if !self.fs_service.file_exists(&template_path) {
            Logger::debug("No index.html template, skipping HTML injection");
            return Ok(None);
        }

        let bytes = self.fs_service.read_file(&template_path).await?;
        let template = String::from_utf8(bytes)
            .map_err(|e| SatchelError::parse(format!("index.html is not valid UTF-8: {}", e)))?;

        Ok(Some(HtmlInjector::new(&self.config).emit(&template, emitted)))
    }
}

#[async_trait]
impl BuildService for SatchelBuildService {
    async fn build(&mut self) -> Result<BuildResult> {
        let start = Instant::now();
        let config = self.config.clone();

        config.validate()?;
        Logger::build_start(
            &config.root.display().to_string(),
            &config.outdir.display().to_string(),
            &config.base,
        );
        self.pipeline.on_build_start(&self.context)?;

        let discovery = self.discover().await?;
        let mut warnings = discovery.warnings.clone();

        let plan = self.plan_modules(&discovery);
        warnings.extend(plan.warnings.iter().map(|w| w.to_string()));

        let emitted = BuildEmitter::new(config.clone(), self.pipeline.clone())
            .emit(&plan)
            .await?;
        warnings.extend(emitted.warnings);
        let mut assets = emitted.assets;

        for public in self.public_assets().await? {
            if assets.iter().any(|a| a.file_name == public.file_name) {
                let warning = format!("public file {} collides with an emitted asset", public.file_name);
                Logger::warn(&warning);
                warnings.push(warning);
                continue;
            }
            assets.push(public);
        }

        if let Some(html) = self.html_asset(&assets).await? {
            assets.retain(|a| a.file_name != html.file_name);
            assets.push(html);
        }

        let stage_assets = self.pipeline.generate_bundle(&assets, &self.context)?;
        assets.extend(stage_assets);

        let cache = generate_cache_artifacts(&config, &assets)?;
        warnings.extend(cache.warnings);
        assets.extend(cache.assets);

        Publisher::new(config.outdir.clone()).publish(&assets).await?;

        let result = BuildResult {
            chunks: plan.chunks.iter().map(ChunkSummary::from).collect(),
            assets,
            cache_manifest: Some(cache.manifest),
            warnings,
            build_time: start.elapsed(),
            outdir: config.outdir.clone(),
        };

        Logger::build_complete(
            result.assets.len(),
            result.build_time,
            &config.outdir.display().to_string(),
        );
        self.pipeline.on_build_end(&self.context, &result)?;

        Ok(result)
    }
}

/// `/`-separated path of `path` below `dir`
fn relative_file_name(dir: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(dir).map_err(|_| {
        SatchelError::build(format!("{} is outside {}", path.display(), dir.display()))
    })?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
