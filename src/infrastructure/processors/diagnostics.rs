use super::common::{apply_edits, dotted_name, parse_program, source_type_for, Edit};
use crate::utils::Result;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, CallExpression, DebuggerStatement, Expression, ExpressionStatement,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::GetSpan;
use std::path::Path;

/// Removes diagnostic calls (`console.*`, listed pure functions, `debugger`)
/// from a script module.
///
/// Edits are made on the original text rather than through codegen so that
/// untouched code keeps its exact formatting. Every removed range is replaced
/// by as many newlines as it spanned, keeping line numbers stable for source
/// maps.
#[derive(Debug, Clone)]
pub struct DiagnosticsStripper {
    drop_console: bool,
    drop_debugger: bool,
    pure_funcs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripOutcome {
    pub code: String,
    pub removed: usize,
}

impl DiagnosticsStripper {
    pub fn new(drop_console: bool, drop_debugger: bool, pure_funcs: Vec<String>) -> Self {
        Self {
            drop_console,
            drop_debugger,
            pure_funcs,
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.drop_console && !self.drop_debugger && self.pure_funcs.is_empty()
    }

    pub fn strip(&self, code: &str, path: &Path) -> Result<StripOutcome> {
        if self.is_noop() || !self.might_match(code) {
            return Ok(StripOutcome {
                code: code.to_string(),
                removed: 0,
            });
        }

        let allocator = Allocator::default();
        let program = parse_program(&allocator, code, path, source_type_for(path))?;

        let mut collector = Collector {
            stripper: self,
            edits: Vec::new(),
        };
        collector.visit_program(&program);

        let removed = collector.edits.len();
        Ok(StripOutcome {
            code: apply_edits(code, collector.edits),
            removed,
        })
    }

    /// Cheap text pre-check before parsing
    fn might_match(&self, code: &str) -> bool {
        (self.drop_console && code.contains("console"))
            || (self.drop_debugger && code.contains("debugger"))
            || self.pure_funcs.iter().any(|f| code.contains(f.as_str()))
    }

    fn matches_callee(&self, callee: &Expression) -> bool {
        let Some(name) = dotted_name(callee) else {
            return false;
        };

        if self.drop_console && name.starts_with("console.") {
            return true;
        }

        self.pure_funcs.iter().any(|f| *f == name)
    }
}

impl Default for DiagnosticsStripper {
    fn default() -> Self {
        Self::new(true, true, vec!["console.log".to_string()])
    }
}

struct Collector<'s> {
    stripper: &'s DiagnosticsStripper,
    edits: Vec<Edit>,
}

impl<'s> Collector<'s> {
    fn record(&mut self, start: u32, end: u32, replacement: &'static str) {
        self.edits.push(Edit::new(start, end, replacement));
    }
}

impl<'a, 's> Visit<'a> for Collector<'s> {
    fn visit_expression_statement(&mut self, stmt: &ExpressionStatement<'a>) {
        if let Expression::CallExpression(call) = &stmt.expression {
            if self.stripper.matches_callee(&call.callee) {
                let span = stmt.span();
                self.record(span.start, span.end, ";");
                return;
            }
        }
        walk::walk_expression_statement(self, stmt);
    }

    // `() => console.log(x)` keeps its body as an expression statement
    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        if let Some(Expression::CallExpression(call)) = arrow.get_expression() {
            if self.stripper.matches_callee(&call.callee) {
                let span = call.span();
                self.record(span.start, span.end, "void 0");
                return;
            }
        }
        walk::walk_arrow_function_expression(self, arrow);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if self.stripper.matches_callee(&call.callee) {
            let span = call.span();
            self.record(span.start, span.end, "void 0");
            return;
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_debugger_statement(&mut self, stmt: &DebuggerStatement) {
        if self.stripper.drop_debugger {
            let span = stmt.span();
            self.record(span.start, span.end, ";");
        }
    }
}
