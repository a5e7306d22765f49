// Alias Plugin: rewrites configured import prefixes to project directories

use crate::core::plugin::{Stage, StageContext};
use crate::utils::Result;
use std::path::{Path, PathBuf};

/// Resolves `@/components/x` to `<root>/src/components/x` for an `@` -> `./src` rule.
/// Rules are tried in configuration order.
pub struct AliasPlugin;

impl Stage for AliasPlugin {
    fn name(&self) -> &str {
        "alias"
    }

    fn resolve_id(
        &self,
        specifier: &str,
        _importer: &Path,
        context: &StageContext,
    ) -> Result<Option<PathBuf>> {
        for rule in &context.config.alias {
            let rest = if specifier == rule.find {
                ""
            } else if let Some(rest) = specifier.strip_prefix(&format!("{}/", rule.find)) {
                rest
            } else {
                continue;
            };

            let mut target = context.root().join(&rule.replacement);
            if !rest.is_empty() {
                target = target.join(rest);
            }
            return Ok(Some(target));
        }

        Ok(None)
    }
}
