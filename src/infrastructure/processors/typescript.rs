use super::common::{is_typescript_path, parse_program, source_type_for};
use crate::utils::{line_map, ErrorContext, Result, SatchelError};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_semantic::SemanticBuilder;
use oxc_sourcemap::SourceMap;
use oxc_transformer::{TransformOptions, Transformer};
use std::path::Path;

/// Lowered module code and, when enabled, its map back to the source
#[derive(Debug)]
pub struct Lowered {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// Lowers TypeScript modules to plain JavaScript before the stage chain runs.
/// JavaScript modules pass through untouched.
#[derive(Debug, Default, Clone)]
pub struct TypeScriptLowering {
    source_maps: bool,
}

impl TypeScriptLowering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    pub fn lower(&self, code: &str, path: &Path) -> Result<Lowered> {
        if !is_typescript_path(path) {
            let map = self
                .source_maps
                .then(|| line_map(&path.to_string_lossy(), code));
            return Ok(Lowered {
                code: code.to_string(),
                map,
            });
        }

        let allocator = Allocator::default();
        let mut program = parse_program(&allocator, code, path, source_type_for(path))?;

        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let ret = Transformer::new(&allocator, path, &TransformOptions::default())
            .build_with_scoping(scoping, &mut program);

        if !ret.errors.is_empty() {
            let message = ret
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SatchelError::transform(
                message,
                ErrorContext::new().with_file(path),
            ));
        }

        let options = CodegenOptions {
            source_map_path: self.source_maps.then(|| path.to_path_buf()),
            ..CodegenOptions::default()
        };
        let ret = Codegen::new().with_options(options).build(&program);

        Ok(Lowered {
            code: ret.code,
            map: ret.map,
        })
    }
}
