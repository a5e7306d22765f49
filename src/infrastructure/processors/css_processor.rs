use crate::utils::{ErrorContext, Logger, Result, SatchelError};
use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{ParserOptions as CssParserOptions, StyleSheet},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// `@import` of a file bundled into the same style asset
static LOCAL_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*@import\s+(?:url\()?\s*['"]([^'"]+)['"]\s*\)?[^;]*;[ \t]*\r?\n?"#)
        .expect("valid regex")
});

#[derive(Debug, Clone)]
pub struct LightningCssProcessor {
    minify: bool,
}

impl LightningCssProcessor {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    /// Parse and print one style module. Unparseable CSS is a transform error.
    pub fn process(&self, content: &str, path: &Path) -> Result<String> {
        Logger::processing_module(&path.display().to_string(), "css");

        let content = strip_local_imports(content);
        let filename = path.display().to_string();

        let stylesheet = StyleSheet::parse(
            &content,
            CssParserOptions {
                filename: filename.clone(),
                ..Default::default()
            },
        )
        .map_err(|e| {
            let context = match e.loc {
                Some(loc) => ErrorContext::new()
                    .with_file(path)
                    .with_location(loc.line as usize + 1, loc.column as usize),
                None => ErrorContext::new().with_file(path),
            };
            SatchelError::transform(e.kind.to_string(), context)
        })?;

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: self.minify,
                ..Default::default()
            })
            .map_err(|e| {
                SatchelError::transform(e.kind.to_string(), ErrorContext::new().with_file(path))
            })?;

        Ok(printed.code)
    }
}

impl Default for LightningCssProcessor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Drop `@import` rules of files that end up in the same chunk. Remote
/// stylesheets stay as they are.
pub fn strip_local_imports(content: &str) -> String {
    LOCAL_IMPORT
        .replace_all(content, |caps: &regex::Captures| {
            let target = &caps[1];
            if target.contains("://") || target.starts_with("//") {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}
