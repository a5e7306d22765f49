use super::common::{apply_edits, parse_program, source_type_for, Edit};
use crate::core::models::Module;
use crate::infrastructure::node_resolver::NodeModuleResolver;
use crate::utils::Result;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Declaration, ExportAllDeclaration, ExportDefaultDeclaration, ExportDefaultDeclarationKind,
    ExportNamedDeclaration, Expression, IdentifierReference, ImportDeclaration,
    ImportDeclarationSpecifier, ImportExpression, ObjectProperty, Statement,
};
use oxc_ast_visit::{walk, Visit};
use oxc_semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc_span::GetSpan;
use std::collections::HashMap;

/// Parameter names of every module factory
pub const EXPORTS_PARAM: &str = "__satchel_exports";
pub const REQUIRE_PARAM: &str = "__satchel_require";

const DEFAULT_LOCAL: &str = "__satchel_default";

/// Module registry shared by every chunk of a build. Chunks register
/// factories with `define`; a module runs once, on its first `require`.
pub const REGISTRY_PRELUDE: &str = r#"var __satchel = globalThis.__satchel || (globalThis.__satchel = (() => {
  const factories = new Map();
  const loaded = new Map();
  const getter = (exports, key, get) => Object.defineProperty(exports, key, { enumerable: true, get });
  const require = (id) => {
    let exports = loaded.get(id);
    if (exports) return exports;
    const factory = factories.get(id);
    if (!factory) throw new Error(`satchel: module "${id}" is not loaded`);
    exports = Object.create(null);
    loaded.set(id, exports);
    factory(exports, require);
    return exports;
  };
  return {
    define: (id, factory) => { if (!factories.has(id)) factories.set(id, factory); },
    require,
    bind: (exports, getters) => { for (const key in getters) getter(exports, key, getters[key]); },
    star: (exports, source) => {
      for (const key in source) if (key !== 'default' && !(key in exports)) getter(exports, key, () => source[key]);
    },
  };
})());
"#;

/// What an import specifier loads once modules are emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Script module registered under its id
    Script,
    /// Stylesheet, already part of the chunk's CSS
    Style,
    /// Hashed file; importing it yields its public URL
    Static(String),
}

/// A script module rewritten to run inside a registry factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedModule {
    /// Module code without import or export syntax. Line count is unchanged.
    pub body: String,
    /// Exported name and the expression reading its live value
    pub exports: Vec<(String, String)>,
    /// Specifiers left to the browser, imported at the chunk top
    pub externals: Vec<String>,
}

impl LinkedModule {
    /// `__satchel.define(...)` wrapper. The factory header is a single line
    /// so source maps only shift by one.
    pub fn wrap(&self, id: &str) -> Result<String> {
        let getters = self
            .exports
            .iter()
            .map(|(name, expression)| Ok(format!("{}: () => {}", serde_json::to_string(name)?, expression)))
            .collect::<Result<Vec<_>>>()?;

        let mut code = format!(
            "__satchel.define({}, function ({}, {}) {{",
            serde_json::to_string(id)?,
            EXPORTS_PARAM,
            REQUIRE_PARAM
        );
        if !getters.is_empty() {
            code.push_str(&format!(" __satchel.bind({}, {{ {} }});", EXPORTS_PARAM, getters.join(", ")));
        }
        code.push('\n');
        code.push_str(self.body.trim_end_matches('\n'));
        code.push_str("\n});\n");
        Ok(code)
    }
}

/// Import binding of the chunk-level namespace of an external specifier
pub fn external_binding(specifier: &str) -> String {
    format!("__satchel_ext_{}", &blake3::hash(specifier.as_bytes()).to_hex()[..8])
}

enum Resolved<'t> {
    Module(&'t str, &'t LinkTarget),
    External,
    Unresolved,
}

/// Rewrites module syntax into registry calls: imports become `require`
/// lookups, exports become getters, references to imported bindings read
/// through the namespace so they stay live.
pub struct ModuleLinker<'l> {
    targets: &'l HashMap<String, LinkTarget>,
    external: &'l [String],
}

impl<'l> ModuleLinker<'l> {
    pub fn new(targets: &'l HashMap<String, LinkTarget>, external: &'l [String]) -> Self {
        Self { targets, external }
    }

    pub fn link(&self, code: &str, module: &Module) -> Result<LinkedModule> {
        let allocator = Allocator::default();
        let program = parse_program(&allocator, code, &module.path, source_type_for(&module.path))?;
        let semantic = SemanticBuilder::new().build(&program).semantic;

        let mut state = LinkState::default();
        for statement in &program.body {
            match statement {
                Statement::ImportDeclaration(decl) => self.link_import(decl, module, &mut state),
                Statement::ExportNamedDeclaration(decl) => self.link_named_export(decl, module, &mut state),
                Statement::ExportDefaultDeclaration(decl) => link_default_export(decl, &mut state),
                Statement::ExportAllDeclaration(decl) => self.link_star_export(decl, module, &mut state),
                _ => {}
            }
        }

        let mut references = ReferenceRewriter {
            linker: self,
            module,
            scoping: semantic.scoping(),
            bindings: &state.bindings,
            edits: Vec::new(),
        };
        references.visit_program(&program);
        state.edits.extend(references.edits);

        let exports = state
            .exported
            .iter()
            .map(|(name, local)| {
                let expression = state.binding_names.get(local).cloned().unwrap_or_else(|| local.clone());
                (name.clone(), expression)
            })
            .collect();

        Ok(LinkedModule {
            body: apply_edits(code, state.edits),
            exports,
            externals: state.externals,
        })
    }

    fn resolve<'m>(&'m self, specifier: &str, module: &'m Module) -> Resolved<'m> {
        if let Some(id) = module.dependencies.get(specifier) {
            if let Some(target) = self.targets.get(id) {
                return Resolved::Module(id, target);
            }
        }

        let (package, _) = NodeModuleResolver::split_specifier(specifier);
        if specifier.contains("://")
            || specifier.starts_with("data:")
            || self.external.iter().any(|e| e == specifier || *e == package) {
            Resolved::External
        } else {
            Resolved::Unresolved
        }
    }

    /// Namespace expression for a module-loading statement, plus the code
    /// that replaces the statement
    fn namespace(&self, specifier: &str, module: &Module, state: &mut LinkState) -> (String, String) {
        match self.resolve(specifier, module) {
            Resolved::Module(id, LinkTarget::Script) => {
                let name = state.next_namespace();
                let statement = format!("const {} = {}({});", name, REQUIRE_PARAM, json(id));
                (name, statement)
            }
            Resolved::External => {
                if !state.externals.iter().any(|e| e == specifier) {
                    state.externals.push(specifier.to_string());
                }
                (external_binding(specifier), String::new())
            }
            Resolved::Module(_, LinkTarget::Static(url)) => {
                let name = state.next_namespace();
                (name.clone(), format!("const {} = {{ default: {} }};", name, json(url)))
            }
            Resolved::Module(_, LinkTarget::Style) | Resolved::Unresolved => {
                let name = state.next_namespace();
                (name.clone(), format!("const {} = {{}};", name))
            }
        }
    }

    fn link_import(&self, decl: &ImportDeclaration, module: &Module, state: &mut LinkState) {
        let specifier = decl.source.value.as_str();
        let span = decl.span;

        let specifiers = match &decl.specifiers {
            Some(specifiers) if !specifiers.is_empty() && !decl.import_kind.is_type() => specifiers,
            _ => {
                // side effects only
                let replacement = match self.resolve(specifier, module) {
                    Resolved::Module(id, LinkTarget::Script) => format!("{}({});", REQUIRE_PARAM, json(id)),
                    Resolved::External if !decl.import_kind.is_type() => {
                        if !state.externals.iter().any(|e| e == specifier) {
                            state.externals.push(specifier.to_string());
                        }
                        String::new()
                    }
                    _ => String::new(),
                };
                state.edits.push(Edit::new(span.start, span.end, replacement));
                return;
            }
        };

        let (namespace, replacement) = self.namespace(specifier, module, state);
        state.edits.push(Edit::new(span.start, span.end, replacement));

        for specifier in specifiers {
            let (local, access) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    (&s.local, member(&namespace, s.imported.name().as_str()))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (&s.local, member(&namespace, "default"))
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => (&s.local, namespace.clone()),
            };
            if let Some(symbol) = local.symbol_id.get() {
                state.bindings.insert(symbol, access.clone());
            }
            state.binding_names.insert(local.name.to_string(), access);
        }
    }

    fn link_named_export(&self, decl: &ExportNamedDeclaration, module: &Module, state: &mut LinkState) {
        let span = decl.span;

        if decl.export_kind.is_type() {
            state.edits.push(Edit::new(span.start, span.end, ""));
            return;
        }

        if let Some(declaration) = &decl.declaration {
            state.edits.push(Edit::new(span.start, declaration.span().start, ""));
            for name in declared_names(declaration) {
                state.exported.push((name.clone(), name));
            }
            return;
        }

        match &decl.source {
            Some(source) => {
                let (namespace, replacement) = self.namespace(source.value.as_str(), module, state);
                state.edits.push(Edit::new(span.start, span.end, replacement));
                for specifier in &decl.specifiers {
                    let access = member(&namespace, specifier.local.name().as_str());
                    state.exported.push((specifier.exported.name().to_string(), access));
                }
            }
            None => {
                state.edits.push(Edit::new(span.start, span.end, ""));
                for specifier in &decl.specifiers {
                    state
                        .exported
                        .push((specifier.exported.name().to_string(), specifier.local.name().to_string()));
                }
            }
        }
    }

    fn link_star_export(&self, decl: &ExportAllDeclaration, module: &Module, state: &mut LinkState) {
        let span = decl.span;
        if decl.export_kind.is_type() {
            state.edits.push(Edit::new(span.start, span.end, ""));
            return;
        }

        let (namespace, mut replacement) = self.namespace(decl.source.value.as_str(), module, state);
        match &decl.exported {
            Some(exported) => state.exported.push((exported.name().to_string(), namespace)),
            None => replacement.push_str(&format!("__satchel.star({}, {});", EXPORTS_PARAM, namespace)),
        }
        state.edits.push(Edit::new(span.start, span.end, replacement));
    }
}

fn link_default_export(decl: &ExportDefaultDeclaration, state: &mut LinkState) {
    let span = decl.span;
    let named = match &decl.declaration {
        ExportDefaultDeclarationKind::FunctionDeclaration(f) => Some((f.span, f.id.as_ref())),
        ExportDefaultDeclarationKind::ClassDeclaration(c) => Some((c.span, c.id.as_ref())),
        ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
            state.edits.push(Edit::new(span.start, span.end, ""));
            return;
        }
        _ => None,
    };

    let value_span = match named {
        Some((decl_span, Some(id))) => {
            // `export default function name() {}` keeps a hoisted declaration
            state.edits.push(Edit::new(span.start, decl_span.start, ""));
            state.exported.push(("default".to_string(), id.name.to_string()));
            return;
        }
        Some((decl_span, None)) => decl_span,
        None => match decl.declaration.as_expression() {
            Some(expression) => expression.span(),
            None => return,
        },
    };

    state
        .edits
        .push(Edit::new(span.start, value_span.start, format!("const {} = ", DEFAULT_LOCAL)));
    state.edits.push(Edit::new(value_span.end, span.end, ";"));
    state.exported.push(("default".to_string(), DEFAULT_LOCAL.to_string()));
}

#[derive(Default)]
struct LinkState {
    edits: Vec<Edit>,
    /// Imported symbol -> expression reading it through its namespace
    bindings: HashMap<SymbolId, String>,
    binding_names: HashMap<String, String>,
    /// Exported name -> local name or namespace access
    exported: Vec<(String, String)>,
    externals: Vec<String>,
    namespaces: usize,
}

impl LinkState {
    fn next_namespace(&mut self) -> String {
        let name = format!("__satchel_m{}", self.namespaces);
        self.namespaces += 1;
        name
    }
}

struct ReferenceRewriter<'r, 'l> {
    linker: &'r ModuleLinker<'l>,
    module: &'r Module,
    scoping: &'r Scoping,
    bindings: &'r HashMap<SymbolId, String>,
    edits: Vec<Edit>,
}

impl<'r, 'l> ReferenceRewriter<'r, 'l> {
    fn access(&self, ident: &IdentifierReference) -> Option<&String> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.bindings.get(&symbol)
    }
}

impl<'a, 'r, 'l> Visit<'a> for ReferenceRewriter<'r, 'l> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if let Some(access) = self.access(ident) {
            self.edits.push(Edit::new(ident.span.start, ident.span.end, access.clone()));
        }
    }

    // `{ ref }` needs its key spelled out once `ref` is rewritten
    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                if let Some(access) = self.access(ident) {
                    let span = prop.span;
                    self.edits
                        .push(Edit::new(span.start, span.end, format!("{}: {}", ident.name, access)));
                    return;
                }
            }
        }
        walk::walk_object_property(self, prop);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(source) = &expr.source {
            if let Resolved::Module(id, LinkTarget::Script) = self.linker.resolve(source.value.as_str(), self.module) {
                let replacement = format!("Promise.resolve().then(() => {}({}))", REQUIRE_PARAM, json(id));
                self.edits.push(Edit::new(expr.span.start, expr.span.end, replacement));
                return;
            }
        }
        walk::walk_import_expression(self, expr);
    }

    // replaced wholesale by the linker
    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {}

    fn visit_export_all_declaration(&mut self, _decl: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &decl.declaration {
            self.visit_declaration(declaration);
        }
    }
}

fn declared_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => f.id.iter().map(|id| id.name.to_string()).collect(),
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// `ns.name`, or `ns["not-an-identifier"]`
fn member(object: &str, name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if is_identifier {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, json(name))
    }
}

fn json(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}
