use crate::core::config::BuildConfig;
use crate::core::interfaces::FileSystemService;
use crate::core::models::{module_id, Module, ModuleKind};
use crate::core::plugin::{StageContext, StagePipeline};
use crate::infrastructure::node_resolver::{normalize, NodeModuleResolver};
use crate::utils::{Logger, Result, SatchelError, Timer};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `import x from '...'`, `import '...'`, `export ... from '...'`
static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(?:import|export)\b(?:[^'";]*?\bfrom\s*)?\s*['"]([^'"\n]+)['"]"#)
        .expect("valid regex")
});

static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).expect("valid regex")
});

static CSS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:url\()?\s*['"]([^'"\n]+)['"]"#).expect("valid regex")
});

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

static LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*//.*$").expect("valid regex"));

/// Import specifiers of a script module, in source order, deduplicated
pub fn extract_script_imports(code: &str) -> Vec<String> {
    let without_blocks = BLOCK_COMMENT.replace_all(code, "");
    let code = LINE_COMMENT.replace_all(&without_blocks, "");

    let mut seen = HashSet::new();
    let mut specifiers: Vec<(usize, String)> = STATIC_IMPORT
        .captures_iter(&code)
        .chain(DYNAMIC_IMPORT.captures_iter(&code))
        .filter_map(|caps| caps.get(1).map(|m| (m.start(), m.as_str().to_string())))
        .collect();
    specifiers.sort_by_key(|(start, _)| *start);

    specifiers
        .into_iter()
        .map(|(_, s)| s)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

pub fn extract_style_imports(code: &str) -> Vec<String> {
    let code = BLOCK_COMMENT.replace_all(code, "");
    CSS_IMPORT
        .captures_iter(&code)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|s| !s.contains("://") && !s.starts_with("//"))
        .collect()
}

#[derive(Debug, Default)]
pub struct DiscoveryResult {
    /// Ordered by module id
    pub modules: Vec<Arc<Module>>,
    pub warnings: Vec<String>,
}

impl DiscoveryResult {
    pub fn count(&self, kind: ModuleKind) -> usize {
        self.modules.iter().filter(|m| m.kind == kind).count()
    }
}

/// Walks the import graph from the configured entries
pub struct ModuleDiscovery {
    config: Arc<BuildConfig>,
    fs: Arc<dyn FileSystemService>,
    pipeline: Arc<StagePipeline>,
    context: StageContext,
    resolver: NodeModuleResolver,
}

impl ModuleDiscovery {
    pub fn new(
        config: Arc<BuildConfig>,
        fs: Arc<dyn FileSystemService>,
        pipeline: Arc<StagePipeline>,
    ) -> Self {
        Self {
            context: StageContext::new(config.clone()),
            resolver: NodeModuleResolver::new(config.root.clone()),
            config,
            fs,
            pipeline,
        }
    }

    pub async fn discover(&self) -> Result<DiscoveryResult> {
        let _timer = Timer::start("Module discovery");
        let mut warnings = Vec::new();
        let entries = self.entry_paths()?;
        let mut queue: VecDeque<PathBuf> = entries.iter().cloned().collect();
        let mut visited: HashSet<PathBuf> = queue.iter().cloned().collect();
        let mut modules = Vec::new();

        while let Some(path) = queue.pop_front() {
            let content = self.fs.read_file(&path).await?;
            let id = module_id(&self.config.root, &path);
            let mut module = Module::new(id, path.clone(), content);
            if entries.contains(&path) {
                module = module.as_entry();
            }

            let specifiers = match module.kind {
                ModuleKind::Script if module.extension() != "json" => {
                    extract_script_imports(module.source()?)
                }
                ModuleKind::Style => extract_style_imports(module.source()?),
                _ => Vec::new(),
            };

            let mut packages = Vec::new();
            let mut dependencies = BTreeMap::new();
            for specifier in specifiers {
                if NodeModuleResolver::is_bare(&specifier) && !self.is_aliased(&specifier) {
                    let (package, _) = NodeModuleResolver::split_specifier(&specifier);
                    if !packages.contains(&package) {
                        packages.push(package);
                    }
                }

                if specifier.contains("://") || specifier.starts_with("data:") {
                    continue;
                }

                if self.is_external(&specifier) {
                    Logger::debug(&format!("external: {}", specifier));
                    continue;
                }

                match self.resolve(&specifier, &path)? {
                    Some(resolved) => {
                        dependencies.insert(specifier.clone(), module_id(&self.config.root, &resolved));
                        if visited.insert(resolved.clone()) {
                            queue.push_back(resolved);
                        }
                    }
                    None => {
                        let warning = format!(
                            "could not resolve \"{}\" imported by {}",
                            specifier, module.id
                        );
                        Logger::warn(&warning);
                        warnings.push(warning);
                    }
                }
            }

            modules.push(Arc::new(
                module.with_imports(packages).with_dependencies(dependencies),
            ));
        }

        modules.sort_by(|a, b| a.id.cmp(&b.id));

        let result = DiscoveryResult { modules, warnings };
        Logger::modules_discovered(
            result.count(ModuleKind::Script),
            result.count(ModuleKind::Style),
            result.count(ModuleKind::Static),
        );
        Ok(result)
    }

    /// Configured entries; a missing default `src/main.ts` falls back to `src/main.js`
    fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for entry in &self.config.entries {
            let candidate = normalize(&self.config.root.join(entry));
            let resolved = self.resolver.resolve_path(&candidate).or_else(|| {
                entry
                    .strip_suffix(".ts")
                    .map(|stem| self.config.root.join(format!("{}.js", stem)))
                    .filter(|js| js.is_file())
                    .map(|js| normalize(&js))
            });

            match resolved {
                Some(path) => {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
                None => {
                    return Err(SatchelError::config(format!(
                        "entry \"{}\" not found under {}",
                        entry,
                        self.config.root.display()
                    )))
                }
            }
        }

        Ok(paths)
    }

    fn resolve(&self, specifier: &str, importer: &Path) -> Result<Option<PathBuf>> {
        if let Some(target) = self.pipeline.resolve_id(specifier, importer, &self.context)? {
            return Ok(self.resolver.resolve_path(&normalize(&target)));
        }
        Ok(self.resolver.resolve(specifier, importer))
    }

    fn is_aliased(&self, specifier: &str) -> bool {
        self.config.alias.iter().any(|rule| {
            specifier == rule.find || specifier.starts_with(&format!("{}/", rule.find))
        })
    }

    fn is_external(&self, specifier: &str) -> bool {
        let (package, _) = NodeModuleResolver::split_specifier(specifier);
        self.config
            .external
            .iter()
            .any(|e| e == specifier || *e == package)
    }
}
