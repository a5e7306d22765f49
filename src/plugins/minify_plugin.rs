// Minify Plugin: compresses and mangles script modules with oxc

use crate::core::models::Module;
use crate::core::plugin::{Stage, StageContext};
use crate::infrastructure::processors::{MinificationStats, OxcMinifier};
use crate::utils::{Logger, Result};

#[derive(Default)]
pub struct MinifyPlugin {
    minifier: OxcMinifier,
}

impl MinifyPlugin {
    pub fn new(minifier: OxcMinifier) -> Self {
        Self { minifier }
    }
}

impl Stage for MinifyPlugin {
    fn name(&self) -> &str {
        "minify"
    }

    fn transform(&self, code: &str, module: &Module, _context: &StageContext) -> Result<Option<String>> {
        let minified = self.minifier.minify(code, &module.path)?;
        Logger::debug(&format!("{}: {}", module.id, MinificationStats::new(code, &minified)));
        Ok(Some(minified))
    }
}
