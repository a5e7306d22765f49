/// Shared helpers for the oxc based script processors
use crate::utils::{ErrorContext, Result, SatchelError};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, Program};
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::path::Path;

/// Source type for a module path. JSON modules are already converted to ESM
/// when they reach a processor, so anything unknown parses as a module.
pub fn source_type_for(path: &Path) -> SourceType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts") | Some("mts") | Some("cts") => SourceType::ts(),
        Some("tsx") => SourceType::tsx(),
        Some("jsx") => SourceType::jsx(),
        Some("cjs") => SourceType::cjs(),
        _ => SourceType::mjs(),
    }
}

pub fn is_typescript_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts") | Some("mts") | Some("cts") | Some("tsx")
    )
}

/// Parse `code` and fail with a transform error pointing at the first
/// diagnostic when the parser reports any.
pub fn parse_program<'a>(
    allocator: &'a Allocator,
    code: &'a str,
    path: &Path,
    source_type: SourceType,
) -> Result<Program<'a>> {
    let ret = Parser::new(allocator, code, source_type).parse();

    if ret.panicked || !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        let message = if messages.is_empty() {
            "parser aborted".to_string()
        } else {
            messages.join("; ")
        };

        let offset = ret
            .errors
            .first()
            .and_then(|e| e.labels.as_ref())
            .and_then(|labels| labels.first())
            .map(|label| label.offset());

        let context = match offset {
            Some(offset) => ErrorContext::at_offset(path, code, offset),
            None => ErrorContext::new().with_file(path),
        };

        return Err(SatchelError::transform(message, context));
    }

    Ok(ret.program)
}

/// `a.b.c` for identifier/static member chains (`import.meta` included),
/// None for anything else
pub fn dotted_name(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(ident) => Some(ident.name.to_string()),
        Expression::MetaProperty(meta) => Some(format!("{}.{}", meta.meta.name, meta.property.name)),
        Expression::StaticMemberExpression(member) => {
            let object = dotted_name(&member.object)?;
            Some(format!("{}.{}", object, member.property.name))
        }
        _ => None,
    }
}

/// Replacement of a byte range of the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl Edit {
    pub fn new(start: u32, end: u32, replacement: impl Into<String>) -> Self {
        Self {
            start: start as usize,
            end: end as usize,
            replacement: replacement.into(),
        }
    }
}

/// Apply non-overlapping edits. A removed range that spanned lines is
/// followed by the same number of newlines, so later lines keep their
/// numbers; edits nested in an earlier one are skipped.
pub fn apply_edits(code: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.start);

    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;

    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&code[cursor..edit.start]);
        out.push_str(&edit.replacement);
        let removed = code[edit.start..edit.end].matches('\n').count();
        let added = edit.replacement.matches('\n').count();
        out.extend(std::iter::repeat('\n').take(removed.saturating_sub(added)));
        cursor = edit.end;
    }

    out.push_str(&code[cursor..]);
    out
}
