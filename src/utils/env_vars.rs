use crate::core::config::BuildConfig;
use crate::infrastructure::node_resolver::PackageJson;
use crate::utils::{Logger, Result};
use std::path::Path;

/// Define key receiving the JSON-encoded package version
pub const PACKAGE_VERSION_DEFINE: &str = "import.meta.env.PACKAGE_VERSION";

/// Build inputs taken from the process environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvInputs {
    /// `BASE_URL`, overrides the configured base
    pub base_url: Option<String>,
    /// `npm_package_version`, or the `version` of the root `package.json`
    pub package_version: Option<String>,
}

impl EnvInputs {
    pub fn from_env(root: &Path) -> Self {
        Self::from_lookup(root, |key| std::env::var(key).ok())
    }

    /// Read inputs through `lookup` instead of the real environment
    pub fn from_lookup(root: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let package_version = non_empty("npm_package_version").or_else(|| {
            PackageJson::read(&root.join("package.json")).and_then(|pkg| pkg.version)
        });

        Self {
            base_url: non_empty("BASE_URL"),
            package_version,
        }
    }

    /// Apply to a merged configuration. Explicit `define` entries are kept.
    pub fn apply(&self, config: &mut BuildConfig) -> Result<()> {
        if let Some(base) = &self.base_url {
            Logger::debug(&format!("BASE_URL overrides base: {}", base));
            config.base = base.clone();
        }

        if let Some(version) = &self.package_version {
            config
                .define
                .entry(PACKAGE_VERSION_DEFINE.to_string())
                .or_insert(serde_json::to_string(version)?);
        }

        for (key, value) in builtin_defines(config)? {
            config.define.entry(key).or_insert(value);
        }

        Ok(())
    }
}

/// `import.meta.env` constants every production build sees
pub fn builtin_defines(config: &BuildConfig) -> Result<Vec<(String, String)>> {
    Ok(vec![
        ("import.meta.env.BASE_URL".to_string(), serde_json::to_string(&config.base)?),
        ("import.meta.env.MODE".to_string(), "\"production\"".to_string()),
        ("import.meta.env.PROD".to_string(), "true".to_string()),
        ("import.meta.env.DEV".to_string(), "false".to_string()),
        ("import.meta.env.SSR".to_string(), "false".to_string()),
    ])
}
