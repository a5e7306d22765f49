use super::common::{parse_program, source_type_for};
use crate::utils::Result;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use std::path::Path;

/// JavaScript minification using oxc
#[derive(Debug, Clone)]
pub struct OxcMinifier {
    mangle: bool,
    compress: bool,
}

impl OxcMinifier {
    pub fn new() -> Self {
        Self {
            mangle: true,
            compress: true,
        }
    }

    pub fn with_options(mangle: bool, compress: bool) -> Self {
        Self { mangle, compress }
    }

    /// Minify one module. Modules are minified separately and concatenated
    /// afterwards, so top-level bindings (module scope) are never renamed.
    pub fn minify(&self, source_code: &str, path: &Path) -> Result<String> {
        let allocator = Allocator::default();
        let mut program = parse_program(&allocator, source_code, path, source_type_for(path))?;

        let options = MinifierOptions {
            mangle: self.mangle.then(MangleOptions::default),
            compress: self.compress.then(CompressOptions::default),
        };

        let ret = Minifier::new(options).minify(&allocator, &mut program);

        let code = Codegen::new()
            .with_options(CodegenOptions::minify())
            .with_scoping(ret.scoping)
            .build(&program)
            .code;

        Ok(code)
    }
}

impl Default for OxcMinifier {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MinificationStats {
    pub original_size: usize,
    pub minified_size: usize,
}

impl MinificationStats {
    pub fn new(original: &str, minified: &str) -> Self {
        Self {
            original_size: original.len(),
            minified_size: minified.len(),
        }
    }

    pub fn reduction_percentage(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let saved = self.original_size.saturating_sub(self.minified_size);
        saved as f64 / self.original_size as f64 * 100.0
    }
}

impl std::fmt::Display for MinificationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}% reduction ({} → {} bytes)",
            self.reduction_percentage(),
            self.original_size,
            self.minified_size
        )
    }
}
