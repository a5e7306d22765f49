use std::path::PathBuf;
use thiserror::Error;

/// Error location inside a source module
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub code_snippet: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.code_snippet = Some(snippet);
        self
    }

    /// Build a context pointing at a byte offset of `source`, with the
    /// surrounding lines as snippet.
    pub fn at_offset(path: impl Into<PathBuf>, source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map(|l| l.chars().count() + 1).unwrap_or(1);

        let snippet = source
            .lines()
            .skip(line.saturating_sub(2))
            .take(3)
            .collect::<Vec<_>>()
            .join("\n");

        Self::new()
            .with_file(path)
            .with_location(line, column)
            .with_snippet(snippet)
    }
}

#[derive(Error, Debug)]
pub enum SatchelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Transform error: {message}")]
    Transform {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Build error: {0}")]
    Build(String),
}

impl SatchelError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            context: None,
        }
    }

    pub fn parse_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Parse {
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn transform(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Transform {
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest(message.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Format error with enhanced context display
    pub fn format_detailed(&self) -> String {
        match self {
            SatchelError::Parse { message, context } => {
                self.format_error_with_context("Parse Error", message, context)
            }
            SatchelError::Transform { message, context } => {
                self.format_error_with_context("Transform Error", message, context)
            }
            _ => format!("❌ {}", self),
        }
    }

    fn format_error_with_context(
        &self,
        error_type: &str,
        message: &str,
        context: &Option<ErrorContext>,
    ) -> String {
        let mut output = format!("❌ {}: {}", error_type, message);

        if let Some(ctx) = context {
            if let Some(ref file_path) = ctx.file_path {
                output.push_str(&format!("\n📁 File: {}", file_path.display()));
            }

            if let (Some(line), Some(column)) = (ctx.line, ctx.column) {
                output.push_str(&format!("\n📍 Location: line {}, column {}", line, column));
            }

            if let Some(ref snippet) = ctx.code_snippet {
                output.push_str(&format!(
                    "\n📝 Code:\n{}",
                    Self::format_code_snippet(snippet, ctx.line)
                ));
            }
        }

        output
    }

    fn format_code_snippet(snippet: &str, error_line: Option<usize>) -> String {
        // The snippet starts one line above the error line when possible.
        let first_line = error_line.map(|l| l.saturating_sub(1).max(1)).unwrap_or(1);
        let mut output = String::new();

        for (i, line) in snippet.lines().enumerate() {
            let line_num = first_line + i;
            if error_line == Some(line_num) {
                output.push_str(&format!("→ {:3} │ {}\n", line_num, line));
            } else {
                output.push_str(&format!("  {:3} │ {}\n", line_num, line));
            }
        }

        output
    }
}

pub type Result<T> = std::result::Result<T, SatchelError>;

impl From<regex::Error> for SatchelError {
    fn from(err: regex::Error) -> Self {
        SatchelError::parse(format!("Regex error: {}", err))
    }
}

impl From<serde_json::Error> for SatchelError {
    fn from(err: serde_json::Error) -> Self {
        SatchelError::build(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for SatchelError {
    fn from(err: anyhow::Error) -> Self {
        SatchelError::build(err.to_string())
    }
}
