// Strip Plugin: removes console/debugger diagnostics from script modules

use crate::core::config::BuildConfig;
use crate::core::models::Module;
use crate::core::plugin::{Stage, StageContext};
use crate::infrastructure::processors::DiagnosticsStripper;
use crate::utils::{Logger, Result};

pub struct StripPlugin {
    stripper: DiagnosticsStripper,
}

impl StripPlugin {
    pub fn new(stripper: DiagnosticsStripper) -> Self {
        Self { stripper }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(DiagnosticsStripper::new(
            config.drop_console,
            config.drop_debugger,
            config.pure_funcs.clone(),
        ))
    }

    /// Nothing to strip with every option off
    pub fn is_noop(&self) -> bool {
        self.stripper.is_noop()
    }
}

impl Stage for StripPlugin {
    fn name(&self) -> &str {
        "strip-diagnostics"
    }

    fn transform(&self, code: &str, module: &Module, _context: &StageContext) -> Result<Option<String>> {
        let outcome = self.stripper.strip(code, &module.path)?;
        if outcome.removed == 0 {
            return Ok(None);
        }

        Logger::debug(&format!("🧹 {}: removed {} diagnostic calls", module.id, outcome.removed));
        Ok(Some(outcome.code))
    }
}
