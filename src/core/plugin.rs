// Build pipeline stages
// An explicit ordered chain: resolve identifiers, transform modules, emit assets

use crate::core::config::BuildConfig;
use crate::core::models::{Asset, BuildResult, Module};
use crate::utils::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Context provided to stages during execution
#[derive(Debug, Clone)]
pub struct StageContext {
    pub config: Arc<BuildConfig>,
}

impl StageContext {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }
}

/// One named step of the build pipeline.
///
/// Every hook has a pass-through default so a stage only implements the
/// capabilities it needs:
/// - `resolve_id`: map an import specifier to a file
/// - `transform`: rewrite the code of a script module
/// - `generate_bundle`: add assets once every chunk is emitted
pub trait Stage: Send + Sync {
    /// Unique name for this stage
    fn name(&self) -> &str;

    /// Called once before discovery
    fn on_build_start(&self, _context: &StageContext) -> Result<()> {
        Ok(())
    }

    /// Return Some(path) to override default resolution
    fn resolve_id(
        &self,
        _specifier: &str,
        _importer: &Path,
        _context: &StageContext,
    ) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Return Some(code) to replace the module code, None to leave it unchanged.
    /// Called from emission worker threads.
    fn transform(
        &self,
        _code: &str,
        _module: &Module,
        _context: &StageContext,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    /// Return additional assets; `assets` holds everything emitted so far
    fn generate_bundle(&self, _assets: &[Asset], _context: &StageContext) -> Result<Vec<Asset>> {
        Ok(Vec::new())
    }

    /// Called after a successful publish
    fn on_build_end(&self, _context: &StageContext, _result: &BuildResult) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of stages. Order is the registration order and never changes.
pub struct StagePipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl StagePipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn with(mut self, stage: Arc<dyn Stage>) -> Self {
        self.register(stage);
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn on_build_start(&self, context: &StageContext) -> Result<()> {
        for stage in &self.stages {
            stage.on_build_start(context)?;
        }
        Ok(())
    }

    /// First stage returning a path wins
    pub fn resolve_id(
        &self,
        specifier: &str,
        importer: &Path,
        context: &StageContext,
    ) -> Result<Option<PathBuf>> {
        for stage in &self.stages {
            if let Some(resolved) = stage.resolve_id(specifier, importer, context)? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Each stage receives the output of the previous one
    pub fn transform(&self, mut code: String, module: &Module, context: &StageContext) -> Result<String> {
        for stage in &self.stages {
            if let Some(transformed) = stage.transform(&code, module, context)? {
                code = transformed;
            }
        }
        Ok(code)
    }

    /// Collect assets from every stage, each seeing what earlier stages added
    pub fn generate_bundle(&self, emitted: &[Asset], context: &StageContext) -> Result<Vec<Asset>> {
        let mut all = emitted.to_vec();
        let mut added = Vec::new();

        for stage in &self.stages {
            let produced = stage.generate_bundle(&all, context)?;
            all.extend(produced.iter().cloned());
            added.extend(produced);
        }

        Ok(added)
    }

    pub fn on_build_end(&self, context: &StageContext, result: &BuildResult) -> Result<()> {
        for stage in &self.stages {
            stage.on_build_end(context, result)?;
        }
        Ok(())
    }
}

impl Default for StagePipeline {
    fn default() -> Self {
        Self::new()
    }
}
