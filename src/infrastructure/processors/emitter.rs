use super::chunk_planner::ChunkPlan;
use super::css_processor::LightningCssProcessor;
use super::linker::{external_binding, LinkTarget, ModuleLinker, REGISTRY_PRELUDE};
use super::typescript::{Lowered, TypeScriptLowering};
use crate::core::config::BuildConfig;
use crate::core::models::{Asset, AssetOrigin, Chunk, ChunkKind, MediaCategory, Module, ModuleKind};
use crate::core::plugin::{StageContext, StagePipeline};
use crate::utils::{
    content_hash, external_comment, relative_source, ErrorContext, Logger, Result, SatchelError, Timer,
};
use oxc_sourcemap::ConcatSourceMapBuilder;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Turns planned chunks into content-hashed assets
#[derive(Clone)]
pub struct BuildEmitter {
    config: Arc<BuildConfig>,
    pipeline: Arc<StagePipeline>,
    context: StageContext,
    lowering: TypeScriptLowering,
    css: LightningCssProcessor,
}

#[derive(Debug, Default)]
pub struct EmitOutput {
    /// Chunk assets in plan order, then static assets
    pub assets: Vec<Asset>,
    pub warnings: Vec<String>,
}

/// What a chunk script does beyond registering its modules
#[derive(Debug, Default)]
struct Loader {
    /// Sibling chunk scripts to evaluate first, as `./name.js`
    imports: Vec<String>,
    /// Entry modules to run once everything is registered
    entries: Vec<String>,
}

impl BuildEmitter {
    pub fn new(config: Arc<BuildConfig>, pipeline: Arc<StagePipeline>) -> Self {
        let css = LightningCssProcessor::new(config.minify);
        let lowering = TypeScriptLowering::new().with_source_maps(config.sourcemap && !config.minify);
        Self {
            context: StageContext::new(config.clone()),
            config,
            pipeline,
            lowering,
            css,
        }
    }

    /// Emit every chunk of the plan. Chunks run on the rayon pool; the first
    /// module error fails the whole emission.
    pub async fn emit(&self, plan: &ChunkPlan) -> Result<EmitOutput> {
        let _timer = Timer::start("Emitting chunks");
        let mut warnings = Vec::new();

        if self.config.sourcemap && self.config.minify {
            let warning = "sourcemap is only generated for unminified builds; skipping maps".to_string();
            Logger::warn(&warning);
            warnings.push(warning);
        }

        let emitter = self.clone();
        let chunks = plan.chunks.clone();
        let per_chunk = tokio::task::spawn_blocking(move || emitter.emit_chunks(&chunks))
            .await
            .map_err(|e| SatchelError::build(format!("Emission task failed: {}", e)))??;

        let mut seen = HashSet::new();
        let mut assets = Vec::new();
        for asset in per_chunk.into_iter().flatten() {
            // identical static files imported from two places share one name
            if seen.insert(asset.file_name.clone()) {
                Logger::asset_emitted(&asset.file_name, asset.size());
                assets.push(asset);
            }
        }

        Ok(EmitOutput { assets, warnings })
    }

    /// Assets per chunk, in plan order.
    ///
    /// The default chunk is the one the page loads: it imports every other
    /// chunk script and runs the entry modules. Other chunks only register
    /// their modules, so they are emitted first and their hashed names are
    /// known when the default chunk is written.
    pub fn emit_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<Asset>>> {
        let targets = self.link_targets(chunks);
        let has_default = chunks.iter().any(|c| c.kind == ChunkKind::Default);
        let is_loader = |chunk: &Chunk| !has_default || chunk.kind == ChunkKind::Default;

        let mut emitted: Vec<Option<Vec<Asset>>> = chunks
            .par_iter()
            .map(|chunk| {
                if is_loader(chunk) {
                    Ok(None)
                } else {
                    self.emit_chunk(chunk, &targets, &Loader::default()).map(Some)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let imports: Vec<String> = emitted
            .iter()
            .flatten()
            .flatten()
            .filter(|a| a.category == MediaCategory::Script)
            .map(|a| format!("./{}", base_name(&a.file_name)))
            .collect();

        let entries_of = |chunk: &Chunk| -> Vec<String> {
            let modules: Vec<&Arc<Module>> = if has_default {
                chunks.iter().flat_map(|c| c.modules.iter()).collect()
            } else {
                chunk.modules.iter().collect()
            };
            modules
                .into_iter()
                .filter(|m| m.entry && m.kind == ModuleKind::Script)
                .map(|m| m.id.clone())
                .collect()
        };

        for (index, chunk) in chunks.iter().enumerate() {
            if is_loader(chunk) {
                let loader = Loader {
                    imports: if has_default { imports.clone() } else { Vec::new() },
                    entries: entries_of(chunk),
                };
                emitted[index] = Some(self.emit_chunk(chunk, &targets, &loader)?);
            }
        }

        Ok(emitted.into_iter().flatten().collect())
    }

    /// What importing each module of the plan yields
    fn link_targets(&self, chunks: &[Chunk]) -> HashMap<String, LinkTarget> {
        chunks
            .iter()
            .flat_map(|c| c.modules.iter())
            .map(|module| {
                let target = match module.kind {
                    ModuleKind::Script => LinkTarget::Script,
                    ModuleKind::Style => LinkTarget::Style,
                    ModuleKind::Static => LinkTarget::Static(self.config.public_url(&self.static_file_name(module))),
                };
                (module.id.clone(), target)
            })
            .collect()
    }

    /// Script asset, style asset and one asset per static module of a chunk
    fn emit_chunk(&self, chunk: &Chunk, targets: &HashMap<String, LinkTarget>, loader: &Loader) -> Result<Vec<Asset>> {
        let mut assets = Vec::new();

        let scripts: Vec<&Arc<Module>> = chunk
            .modules
            .iter()
            .filter(|m| m.kind == ModuleKind::Script)
            .collect();
        if !scripts.is_empty() || !loader.entries.is_empty() {
            assets.extend(self.emit_script(&chunk.name, &scripts, targets, loader)?);
        }

        let styles: Vec<&Arc<Module>> = chunk
            .modules
            .iter()
            .filter(|m| m.kind == ModuleKind::Style)
            .collect();
        if !styles.is_empty() {
            assets.push(self.emit_style(&chunk.name, &styles)?);
        }

        for module in chunk.modules.iter().filter(|m| m.kind == ModuleKind::Static) {
            assets.push(self.emit_static(module));
        }

        Ok(assets)
    }

    /// Module code after lowering and the stage chain
    pub fn transform_module(&self, module: &Module) -> Result<Lowered> {
        Logger::processing_module(&module.id, "transform");
        let source = module.source()?;

        let lowered = if module.extension() == "json" {
            Lowered {
                code: json_to_module(source, module)?,
                map: None,
            }
        } else {
            self.lowering.lower(source, &module.path)?
        };

        Ok(Lowered {
            code: self.pipeline.transform(lowered.code, module, &self.context)?,
            map: lowered.map,
        })
    }

    fn emit_script(
        &self,
        chunk_name: &str,
        modules: &[&Arc<Module>],
        targets: &HashMap<String, LinkTarget>,
        loader: &Loader,
    ) -> Result<Vec<Asset>> {
        let with_map = self.config.sourcemap && !self.config.minify;
        let linker = ModuleLinker::new(targets, &self.config.external);

        let mut externals: Vec<String> = Vec::new();
        let mut wrapped = Vec::with_capacity(modules.len());
        for module in modules {
            let transformed = self.transform_module(module)?;
            let linked = linker.link(&transformed.code, module)?;
            for external in &linked.externals {
                if !externals.contains(external) {
                    externals.push(external.clone());
                }
            }
            wrapped.push((module, linked.wrap(&module.id)?, transformed.map));
        }

        let mut code = String::new();
        for external in &externals {
            code.push_str(&format!(
                "import * as {} from {};\n",
                external_binding(external),
                serde_json::to_string(external)?
            ));
        }
        for import in &loader.imports {
            code.push_str(&format!("import {};\n", serde_json::to_string(import)?));
        }
        code.push_str(REGISTRY_PRELUDE);

        // sources are relative to the script's directory, which the hash does not change
        let script_path = self.hashed_path("js", chunk_name, "", "js");
        let mut maps = ConcatSourceMapBuilder::default();
        let mut line = code.matches('\n').count() as u32;

        for (module, module_code, map) in wrapped {
            if !self.config.minify {
                code.push_str(&format!("// {}\n", module.id));
                line += 1;
            }

            if let (true, Some(mut map)) = (with_map, map) {
                map.set_sources(vec![relative_source(&script_path, &module.id).as_str()]);
                // the factory header takes one line
                maps.add_sourcemap(&map, line + 1);
            }

            line += module_code.matches('\n').count() as u32;
            code.push_str(&module_code);
        }

        for entry in &loader.entries {
            code.push_str(&format!("__satchel.require({});\n", serde_json::to_string(entry)?));
        }

        let hash = content_hash(code.as_bytes());
        let file_name = self.hashed_path("js", chunk_name, &hash, "js");
        let mut assets = Vec::new();

        if with_map {
            let base_name = base_name(&file_name).to_string();
            let map_name = format!("{}.map", base_name);
            let mut map = maps.into_sourcemap();
            map.set_file(&base_name);

            code.push_str(&external_comment(&map_name));
            code.push('\n');

            assets.push(Asset {
                name: chunk_name.to_string(),
                file_name: format!("{}.map", file_name),
                hash: Some(hash.clone()),
                category: MediaCategory::Other,
                origin: AssetOrigin::SourceMap,
                bytes: map.to_json_string().into_bytes(),
            });
        }

        assets.insert(
            0,
            Asset {
                name: chunk_name.to_string(),
                file_name,
                hash: Some(hash),
                category: MediaCategory::Script,
                origin: AssetOrigin::Chunk(chunk_name.to_string()),
                bytes: code.into_bytes(),
            },
        );

        Ok(assets)
    }

    fn emit_style(&self, chunk_name: &str, modules: &[&Arc<Module>]) -> Result<Asset> {
        let mut parts = Vec::with_capacity(modules.len());

        for module in modules {
            let css = self.css.process(module.source()?, &module.path)?;
            if self.config.minify {
                parts.push(css);
            } else {
                parts.push(format!("/* {} */\n{}", module.id, css.trim_end()));
            }
        }

        let code = parts.join("\n");
        let hash = content_hash(code.as_bytes());

        Ok(Asset {
            name: chunk_name.to_string(),
            file_name: self.hashed_path("css", chunk_name, &hash, "css"),
            hash: Some(hash),
            category: MediaCategory::Style,
            origin: AssetOrigin::Chunk(chunk_name.to_string()),
            bytes: code.into_bytes(),
        })
    }

    fn emit_static(&self, module: &Module) -> Asset {
        let hash = content_hash(&module.content);

        Asset {
            file_name: self.static_file_name(module),
            name: module.file_stem().to_string(),
            hash: Some(hash),
            category: MediaCategory::Other,
            origin: AssetOrigin::Static(module.id.clone()),
            bytes: module.content.clone(),
        }
    }

    fn static_file_name(&self, module: &Module) -> String {
        let ext = module.extension();
        self.hashed_path(&ext, module.file_stem(), &content_hash(&module.content), &ext)
    }

    /// `<assetsDir>/<dir>/<name>-<hash>.<ext>`
    fn hashed_path(&self, dir: &str, name: &str, hash: &str, ext: &str) -> String {
        format!(
            "{}/{}/{}-{}.{}",
            self.config.assets_dir.trim_end_matches('/'),
            dir,
            sanitize_file_name(name),
            hash,
            ext
        )
    }
}

/// Keep `[A-Za-z0-9_.-]`, replace everything else with `_`
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "chunk".to_string()
    } else {
        sanitized
    }
}

/// A JSON module as an ES module with a default export
fn json_to_module(source: &str, module: &Module) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(source).map_err(|e| {
        let context = ErrorContext::new()
            .with_file(&module.path)
            .with_location(e.line(), e.column());
        SatchelError::transform(format!("invalid JSON: {}", e), context)
    })?;

    Ok(format!(
        "const data = {};\nexport default data;\n",
        serde_json::to_string(&value)?
    ))
}

fn base_name(file_name: &str) -> &str {
    file_name.rsplit('/').next().unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ChunkRule;
    use crate::infrastructure::processors::chunk_planner::ChunkPlanner;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_semantic::SemanticBuilder;
    use oxc_sourcemap::SourceMap;
    use oxc_span::SourceType;
    use std::collections::BTreeMap;

    fn module(id: &str, content: &str) -> Arc<Module> {
        Arc::new(Module::new(id, format!("/project/{}", id), content.as_bytes().to_vec()))
    }

    fn emitter(config: BuildConfig) -> BuildEmitter {
        BuildEmitter::new(Arc::new(config), Arc::new(StagePipeline::new()))
    }

    fn unminified() -> BuildConfig {
        BuildConfig {
            minify: false,
            ..Default::default()
        }
    }

    fn plan(modules: &[Arc<Module>]) -> ChunkPlan {
        ChunkPlanner::new(vec![ChunkRule::new("vue-vendor", &["vue"])], "index").plan(modules)
    }

    #[tokio::test]
    async fn test_filenames_routed_by_media_type() {
        let modules = vec![
            module("node_modules/vue/index.js", "export const vue = 1;\n"),
            module("src/main.js", "import { vue } from 'vue';\nexport default vue;\n"),
            module("src/app.css", ".app { color: red; }\n"),
            module("src/logo.svg", "<svg></svg>"),
        ];

        let out = emitter(unminified()).emit(&plan(&modules)).await.unwrap();
        let names: Vec<&str> = out.assets.iter().map(|a| a.file_name.as_str()).collect();

        assert_eq!(names.len(), 4);
        assert!(names[0].starts_with("assets/js/vue-vendor-") && names[0].ends_with(".js"));
        assert!(names[1].starts_with("assets/js/index-"));
        assert!(names[2].starts_with("assets/css/index-") && names[2].ends_with(".css"));
        assert!(names[3].starts_with("assets/svg/logo-") && names[3].ends_with(".svg"));
    }

    #[tokio::test]
    async fn test_unchanged_content_keeps_filename() {
        let modules = vec![module("src/main.js", "export const a = 1;\n")];
        let first = emitter(unminified()).emit(&plan(&modules)).await.unwrap();
        let second = emitter(unminified()).emit(&plan(&modules)).await.unwrap();
        assert_eq!(first.assets[0].file_name, second.assets[0].file_name);

        let changed = vec![module("src/main.js", "export const a = 2;\n")];
        let third = emitter(unminified()).emit(&plan(&changed)).await.unwrap();
        assert_ne!(first.assets[0].file_name, third.assets[0].file_name);
    }

    #[tokio::test]
    async fn test_transform_error_fails_emission() {
        let modules = vec![
            module("src/ok.js", "export const ok = 1;\n"),
            module("src/broken.ts", "export const = ;\n"),
        ];
        let result = emitter(unminified()).emit(&plan(&modules)).await;
        assert!(matches!(result, Err(SatchelError::Transform { .. })));
    }

    #[tokio::test]
    async fn test_source_map_written_for_unminified_scripts() {
        let config = BuildConfig {
            sourcemap: true,
            ..unminified()
        };
        let modules = vec![module("src/main.js", "export const a = 1;\nexport const b = 2;\n")];
        let out = emitter(config).emit(&plan(&modules)).await.unwrap();

        let script = &out.assets[0];
        let map = &out.assets[1];
        assert_eq!(map.file_name, format!("{}.map", script.file_name));
        assert_eq!(map.origin, AssetOrigin::SourceMap);

        let code = String::from_utf8(script.bytes.clone()).unwrap();
        assert!(code.contains("//# sourceMappingURL="));

        let parsed = SourceMap::from_json_string(std::str::from_utf8(&map.bytes).unwrap()).unwrap();
        let sources: Vec<&str> = parsed.get_sources().map(|s| s.as_ref()).collect();
        assert_eq!(sources, vec!["../../src/main.js"]);

        let line_of = |needle: &str| code.lines().position(|l| l.contains(needle)).unwrap() as u32;
        let source_line = |line: u32| {
            parsed
                .get_tokens()
                .find(|t| t.get_dst_line() == line)
                .map(|t| t.get_src_line())
        };
        assert_eq!(source_line(line_of("const a = 1;")), Some(0));
        assert_eq!(source_line(line_of("const b = 2;")), Some(1));
    }

    #[tokio::test]
    async fn test_source_map_line_after_removed_interface() {
        let config = BuildConfig {
            sourcemap: true,
            ..unminified()
        };
        let modules = vec![
            module("src/a.js", "export const first = 1;\n"),
            module(
                "src/tools/my-tool.ts",
                "interface ToolState {\n  count: number;\n}\n\nexport const useTool = (): ToolState => ({ count: 1 });\n",
            ),
        ];
        let out = emitter(config).emit(&plan(&modules)).await.unwrap();
        let code = String::from_utf8(out.assets[0].bytes.clone()).unwrap();
        let parsed = SourceMap::from_json_string(std::str::from_utf8(&out.assets[1].bytes).unwrap()).unwrap();

        assert!(!code.contains("interface"));
        let line = code.lines().position(|l| l.contains("useTool =")).unwrap() as u32;
        let tokens: Vec<_> = parsed.get_tokens().filter(|t| t.get_dst_line() == line).collect();
        assert!(!tokens.is_empty());
        for token in tokens {
            assert_eq!(token.get_src_line(), 4);
            let source = token.get_source_id().and_then(|id| parsed.get_source(id)).unwrap();
            assert_eq!(source.as_ref(), "../../src/tools/my-tool.ts");
        }
    }

    #[tokio::test]
    async fn test_chunk_modules_keep_their_own_scope() {
        let dependencies = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs.iter().map(|(s, id)| (s.to_string(), id.to_string())).collect()
        };
        let modules = vec![
            module("node_modules/vue/index.js", "export const createApp = (o) => o;\nconst helper = 0;\n"),
            module("src/tools.json", r#"{"tools": ["base64"]}"#),
            module("src/locales.json", r#"{"en": "English"}"#),
            Arc::new(
                Module::new(
                    "src/util.js",
                    "/project/src/util.js",
                    b"export const count = 1;\nconst helper = 2;\nexport default helper;\n".to_vec(),
                ),
            ),
            Arc::new(
                Module::new(
                    "src/main.js",
                    "/project/src/main.js",
                    b"import { createApp } from 'vue';\nimport tools from './tools.json';\nimport locales from './locales.json';\nimport util, { count } from './util';\nconst helper = 3;\nexport const app = createApp({ tools, locales, total: count + helper + util });\n".to_vec(),
                )
                .with_dependencies(dependencies(&[
                    ("vue", "node_modules/vue/index.js"),
                    ("./tools.json", "src/tools.json"),
                    ("./locales.json", "src/locales.json"),
                    ("./util", "src/util.js"),
                ]))
                .as_entry(),
            ),
        ];

        let out = emitter(unminified()).emit(&plan(&modules)).await.unwrap();
        let vendor = &out.assets[0];
        let index = &out.assets[1];
        assert!(vendor.file_name.starts_with("assets/js/vue-vendor-"));
        let code = String::from_utf8(index.bytes.clone()).unwrap();

        let vendor_import = format!("import \"./{}\";", base_name(&vendor.file_name));
        assert!(code.starts_with(&vendor_import), "{}", code);
        assert!(code.trim_end().ends_with("__satchel.require(\"src/main.js\");"));
        assert_eq!(code.matches("const data = ").count(), 2);
        assert!(code.contains("__satchel_require(\"node_modules/vue/index.js\")"));

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &code, SourceType::mjs()).parse();
        assert!(ret.errors.is_empty(), "{:?}", ret.errors);
        let semantic = SemanticBuilder::new().with_check_syntax_error(true).build(&ret.program);
        assert!(semantic.errors.is_empty(), "{:?}", semantic.errors);

        // the vendor chunk registers without running anything
        let vendor_code = String::from_utf8(vendor.bytes.clone()).unwrap();
        assert!(!vendor_code.contains("__satchel.require("));
        assert!(vendor_code.contains("__satchel.define(\"node_modules/vue/index.js\""));
    }

    #[tokio::test]
    async fn test_source_map_skipped_when_minifying() {
        let config = BuildConfig {
            sourcemap: true,
            ..Default::default()
        };
        let modules = vec![module("src/main.js", "export const a = 1;\n")];
        let out = emitter(config).emit(&plan(&modules)).await.unwrap();

        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_json_module_becomes_default_export() {
        let module = Module::new("src/data/tools.json", "/p/src/data/tools.json", br#"{"a": [1, 2]}"#.to_vec());
        let code = emitter(unminified()).transform_module(&module).unwrap().code;
        assert_eq!(code, "const data = {\"a\":[1,2]};\nexport default data;\n");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("vue-vendor"), "vue-vendor");
        assert_eq!(sanitize_file_name("@scope/pkg"), "_scope_pkg");
        assert_eq!(sanitize_file_name(""), "chunk");
    }
}
