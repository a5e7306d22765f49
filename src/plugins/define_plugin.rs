// Define Plugin: replaces build-time constants with their expressions

use crate::core::models::Module;
use crate::core::plugin::{Stage, StageContext};
use crate::infrastructure::processors::common::{
    apply_edits, dotted_name, parse_program, source_type_for, Edit,
};
use crate::utils::{Logger, Result};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, ObjectProperty};
use oxc_ast_visit::{walk, Visit};
use oxc_span::GetSpan;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Replaces every `define` key (`__APP_VERSION__`, `import.meta.env.MODE`)
/// with its expression.
///
/// Keys match whole identifier or member chains in expression position, so
/// `import.meta.env.MODE_X`, `obj.__APP_VERSION__`, string literals and
/// comments are left alone.
pub struct DefinePlugin {
    expressions: HashMap<String, String>,
}

impl DefinePlugin {
    pub fn new(define: &BTreeMap<String, String>) -> Result<Self> {
        Ok(Self {
            expressions: define.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }

    /// Rewritten code, or None when no key occurs
    pub fn replace(&self, code: &str, path: &Path) -> Result<Option<String>> {
        if !self.expressions.keys().any(|key| code.contains(key.as_str())) {
            return Ok(None);
        }

        let allocator = Allocator::default();
        let program = parse_program(&allocator, code, path, source_type_for(path))?;

        let mut collector = Collector {
            expressions: &self.expressions,
            edits: Vec::new(),
        };
        collector.visit_program(&program);

        if collector.edits.is_empty() {
            return Ok(None);
        }
        Ok(Some(apply_edits(code, collector.edits)))
    }
}

struct Collector<'d> {
    expressions: &'d HashMap<String, String>,
    edits: Vec<Edit>,
}

impl<'d> Collector<'d> {
    fn replacement(&self, expr: &Expression) -> Option<String> {
        let expression = self.expressions.get(&dotted_name(expr)?)?;
        // an object literal at statement start would read as a block
        Some(if expression.trim_start().starts_with('{') {
            format!("({})", expression)
        } else {
            expression.clone()
        })
    }
}

impl<'a, 'd> Visit<'a> for Collector<'d> {
    fn visit_expression(&mut self, expr: &Expression<'a>) {
        if let Some(replacement) = self.replacement(expr) {
            let span = expr.span();
            self.edits.push(Edit::new(span.start, span.end, replacement));
            return;
        }
        walk::walk_expression(self, expr);
    }

    // `{ __APP_NAME__ }` needs its key spelled out
    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Some(replacement) = self.replacement(&prop.value) {
                let span = prop.span();
                let key = dotted_name(&prop.value).unwrap_or_default();
                self.edits
                    .push(Edit::new(span.start, span.end, format!("{}: {}", key, replacement)));
                return;
            }
        }
        walk::walk_object_property(self, prop);
    }
}

impl Stage for DefinePlugin {
    fn name(&self) -> &str {
        "define"
    }

    fn transform(&self, code: &str, module: &Module, _context: &StageContext) -> Result<Option<String>> {
        let replaced = self.replace(code, &module.path)?;
        if replaced.is_some() {
            Logger::processing_module(&module.id, "define");
        }
        Ok(replaced)
    }
}
