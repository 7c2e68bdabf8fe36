//! Pass 1: declaration collection (`spec.md` §4.3 pass 1).
//!
//! Walks every parsed Python module once, recording every function/method
//! declaration into the call graph and, in the same walk, collecting the
//! raw material later passes need: unresolved call sites, per-file import
//! bindings, and local-variable/attribute constructor hints for the
//! type-inference pass. Grounded in the teacher's `taint/call_graph.rs`
//! `CallGraph::visit_stmt`/`visit_expr_for_calls` tree walk, restructured to
//! produce the richer `Function`/`CallSite` records instead of a bare
//! name graph.

use super::types::{CallGraph, CallSite, Function, Location, Parameter};
use crate::module_registry::ModuleRegistry;
use crate::source::SourceGraph;
use crate::utils::LineIndex;
use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::Ranged;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// `local_name → fully qualified target` bindings from a module's
/// `import`/`from ... import` statements.
pub type ImportMap = FxHashMap<String, String>;

/// A hint about what a local variable or `self` attribute was constructed
/// from, for the type-inference pass (pass 3) to consume.
#[derive(Debug, Clone)]
pub enum AssignHint {
    /// `x = ClassName(...)`: direct constructor call.
    Constructor(String),
    /// `x = some_call(...)`: assigned from another call's return value.
    Call(String),
}

/// Everything pass 1 collects beyond the `Function` declarations
/// themselves, threaded through passes 2-5.
#[derive(Debug, Default)]
pub struct BuildContext {
    /// Import bindings, per source file.
    pub imports: FxHashMap<PathBuf, ImportMap>,
    /// `(caller_fqn, var_name) → hint`, for bare local variables.
    pub var_hints: FxHashMap<(String, String), AssignHint>,
    /// `(class_fqn, attr_name) → constructed_class_name`, for `self.x = ...`
    /// assignments seen anywhere in the class body.
    pub class_attr_types: FxHashMap<(String, String), String>,
}

impl BuildContext {
    /// Expands an import alias prefix to its real module path, if one is
    /// known for `file` (e.g. `np.array` with `import numpy as np` becomes
    /// `numpy.array`). Used by passes 4 and 5, which both need to see past
    /// local aliasing before matching against the stdlib registry or the
    /// external-framework prefix list.
    #[must_use]
    pub fn qualify(&self, target: &str, file: Option<&Path>) -> String {
        let Some((prefix, rest)) = target.split_once('.') else {
            return target.to_owned();
        };
        let Some(file) = file else {
            return target.to_owned();
        };
        let Some(imports) = self.imports.get(file) else {
            return target.to_owned();
        };
        match imports.get(prefix) {
            Some(real) => format!("{real}.{rest}"),
            None => target.to_owned(),
        }
    }
}

/// Runs pass 1 over every parsed Python module in `source_graph`.
#[must_use]
pub fn run(
    source_graph: &SourceGraph,
    _module_registry: &ModuleRegistry,
) -> (CallGraph, BuildContext) {
    let mut graph = CallGraph::default();
    let mut ctx = BuildContext::default();

    for node in source_graph.python_modules() {
        let Some(module) = &node.module else { continue };
        let module_path =
            crate::module_registry::module_path_for(&source_graph.root, &node.file_path);

        let imports = collect_imports(&module.body);
        ctx.imports.insert(node.file_path.clone(), imports);

        let mut walker = ModuleWalker {
            graph: &mut graph,
            ctx: &mut ctx,
            file: &node.file_path,
            line_index: &node.line_index,
            module_path: &module_path,
            class_stack: Vec::new(),
        };
        walker.walk_body(&module.body, None);
    }

    (graph, ctx)
}

fn collect_imports(body: &[Stmt]) -> ImportMap {
    let mut imports = ImportMap::default();
    for stmt in body {
        match stmt {
            Stmt::Import(import) => {
                for alias in &import.names {
                    let target = alias.name.to_string();
                    let local = alias
                        .asname
                        .as_ref()
                        .map_or_else(|| target.clone(), ToString::to_string);
                    imports.insert(local, target);
                }
            }
            Stmt::ImportFrom(import_from) => {
                let module = import_from
                    .module
                    .as_ref()
                    .map_or_else(String::new, ToString::to_string);
                for alias in &import_from.names {
                    let name = alias.name.to_string();
                    let local = alias
                        .asname
                        .as_ref()
                        .map_or_else(|| name.clone(), ToString::to_string);
                    let target = if module.is_empty() {
                        name
                    } else {
                        format!("{module}.{name}")
                    };
                    imports.insert(local, target);
                }
            }
            _ => {}
        }
    }
    imports
}

struct ModuleWalker<'a> {
    graph: &'a mut CallGraph,
    ctx: &'a mut BuildContext,
    file: &'a Path,
    line_index: &'a LineIndex,
    module_path: &'a str,
    class_stack: Vec<String>,
}

impl ModuleWalker<'_> {
    fn walk_body(&mut self, body: &[Stmt], current_fn: Option<&str>) {
        for stmt in body {
            self.walk_stmt(stmt, current_fn);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt, current_fn: Option<&str>) {
        match stmt {
            Stmt::FunctionDef(func) => self.walk_function(func, current_fn),
            Stmt::ClassDef(class) => self.walk_class(class),
            Stmt::If(if_stmt) => {
                if let Some(caller) = current_fn {
                    self.collect_calls(&if_stmt.test, caller);
                }
                self.walk_body(&if_stmt.body, current_fn);
                for clause in &if_stmt.elif_else_clauses {
                    self.walk_body(&clause.body, current_fn);
                }
            }
            Stmt::For(for_stmt) => {
                if let Some(caller) = current_fn {
                    self.collect_calls(&for_stmt.iter, caller);
                }
                self.walk_body(&for_stmt.body, current_fn);
                self.walk_body(&for_stmt.orelse, current_fn);
            }
            Stmt::While(while_stmt) => {
                if let Some(caller) = current_fn {
                    self.collect_calls(&while_stmt.test, caller);
                }
                self.walk_body(&while_stmt.body, current_fn);
            }
            Stmt::With(with_stmt) => self.walk_body(&with_stmt.body, current_fn),
            Stmt::Try(try_stmt) => {
                self.walk_body(&try_stmt.body, current_fn);
                for handler in &try_stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    self.walk_body(&h.body, current_fn);
                }
                self.walk_body(&try_stmt.orelse, current_fn);
                self.walk_body(&try_stmt.finalbody, current_fn);
            }
            Stmt::Expr(expr_stmt) => {
                if let Some(caller) = current_fn {
                    self.collect_calls(&expr_stmt.value, caller);
                }
            }
            Stmt::Assign(assign) => {
                if let Some(caller) = current_fn {
                    self.collect_calls(&assign.value, caller);
                    self.record_assign_hint(caller, &assign.targets, &assign.value);
                }
            }
            Stmt::Return(ret) => {
                if let Some(caller) = current_fn {
                    if let Some(value) = &ret.value {
                        self.collect_calls(value, caller);
                    }
                }
            }
            _ => {}
        }
    }

    fn walk_class(&mut self, class: &ast::StmtClassDef) {
        self.class_stack.push(class.name.to_string());
        self.walk_body(&class.body, None);
        self.class_stack.pop();
    }

    fn walk_function(&mut self, func: &ast::StmtFunctionDef, _current_fn: Option<&str>) {
        let receiver_type = self.class_stack.last().map(|class_name| {
            format!("{}.{}", self.module_path, class_name)
        });
        let is_method = receiver_type.is_some();

        let fqn = if let Some(receiver) = &receiver_type {
            format!("{receiver}.{}", func.name)
        } else {
            format!("{}.{}", self.module_path, func.name)
        };

        let decorators: Vec<String> = func
            .decorator_list
            .iter()
            .filter_map(|d| decorator_name(&d.expression))
            .collect();
        let is_static = decorators.iter().any(|d| d == "staticmethod");

        let params = extract_params(&func.parameters);
        let return_type = func
            .returns
            .as_ref()
            .map(|r| expr_to_text(r));

        let location = self.location_of(func.range().start());

        self.graph.insert_function(Function {
            fqn: fqn.clone(),
            name: func.name.to_string(),
            module: self.module_path.to_owned(),
            params,
            return_type,
            is_method,
            receiver_type,
            is_static,
            decorators,
            location,
        });

        self.walk_body(&func.body, Some(&fqn));
    }

    fn collect_calls(&mut self, expr: &Expr, caller: &str) {
        match expr {
            Expr::Call(call) => {
                if let Some(target) = call_target_text(&call.func) {
                    let location = self.location_of(call.range().start());
                    self.graph
                        .push_call_site(CallSite::new(caller.to_owned(), target, location));
                }
                for arg in &call.arguments.args {
                    self.collect_calls(arg, caller);
                }
                for kw in &call.arguments.keywords {
                    self.collect_calls(&kw.value, caller);
                }
            }
            Expr::BinOp(binop) => {
                self.collect_calls(&binop.left, caller);
                self.collect_calls(&binop.right, caller);
            }
            Expr::BoolOp(boolop) => {
                for v in &boolop.values {
                    self.collect_calls(v, caller);
                }
            }
            Expr::If(ifexp) => {
                self.collect_calls(&ifexp.test, caller);
                self.collect_calls(&ifexp.body, caller);
                self.collect_calls(&ifexp.orelse, caller);
            }
            Expr::List(list) => {
                for elt in &list.elts {
                    self.collect_calls(elt, caller);
                }
            }
            Expr::Tuple(tuple) => {
                for elt in &tuple.elts {
                    self.collect_calls(elt, caller);
                }
            }
            Expr::Dict(dict) => {
                for item in &dict.items {
                    if let Some(key) = &item.key {
                        self.collect_calls(key, caller);
                    }
                    self.collect_calls(&item.value, caller);
                }
            }
            Expr::Attribute(attr) => self.collect_calls(&attr.value, caller),
            _ => {}
        }
    }

    fn record_assign_hint(&mut self, caller: &str, targets: &[Expr], value: &Expr) {
        let Expr::Call(call) = value else { return };
        let Some(callee_text) = call_target_text(&call.func) else {
            return;
        };

        for target in targets {
            match target {
                Expr::Name(name) => {
                    let hint = if is_likely_class_name(&callee_text) {
                        AssignHint::Constructor(callee_text.clone())
                    } else {
                        AssignHint::Call(callee_text.clone())
                    };
                    self.ctx
                        .var_hints
                        .insert((caller.to_owned(), name.id.to_string()), hint);
                }
                Expr::Attribute(attr) => {
                    if let Expr::Name(recv) = &*attr.value {
                        if recv.id.as_str() == "self" && is_likely_class_name(&callee_text) {
                            if let Some(class_fqn) = self.current_class_fqn() {
                                self.ctx.class_attr_types.insert(
                                    (class_fqn, attr.attr.to_string()),
                                    callee_text.clone(),
                                );
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn current_class_fqn(&self) -> Option<String> {
        self.class_stack
            .last()
            .map(|c| format!("{}.{c}", self.module_path))
    }

    fn location_of(&self, offset: ruff_text_size::TextSize) -> Location {
        Location {
            file: self.file.to_path_buf(),
            line: self.line_index.line_index(offset),
            column: 0,
        }
    }
}

fn is_likely_class_name(text: &str) -> bool {
    let last_segment = text.rsplit('.').next().unwrap_or(text);
    last_segment
        .chars()
        .next()
        .is_some_and(char::is_uppercase)
}

fn decorator_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(n) => Some(n.id.to_string()),
        Expr::Attribute(a) => Some(a.attr.to_string()),
        Expr::Call(c) => decorator_name(&c.func),
        _ => None,
    }
}

fn expr_to_text(expr: &Expr) -> String {
    match expr {
        Expr::Name(n) => n.id.to_string(),
        Expr::Attribute(a) => format!("{}.{}", expr_to_text(&a.value), a.attr),
        Expr::StringLiteral(s) => s.value.to_str().to_owned(),
        Expr::Subscript(s) => expr_to_text(&s.value),
        _ => "<expr>".to_owned(),
    }
}

/// Extracts the callee's textual form, extending the teacher's
/// `get_call_name` (`taint/call_graph.rs`) to the full attribute chain when
/// the chain's root is a bare name: `self.x.method()` becomes
/// `"self.x.method"` so pass 3 can walk it. Anything rooted in a call,
/// subscript, or other non-name expression collapses to `".attr"`, the
/// teacher's loose-match fallback.
fn call_target_text(func: &Expr) -> Option<String> {
    fn chain(expr: &Expr) -> Option<String> {
        match expr {
            Expr::Name(n) => Some(n.id.to_string()),
            Expr::Attribute(a) => chain(&a.value).map(|base| format!("{base}.{}", a.attr)),
            _ => None,
        }
    }

    match func {
        Expr::Name(n) => Some(n.id.to_string()),
        Expr::Attribute(a) => chain(&a.value)
            .map(|base| format!("{base}.{}", a.attr))
            .or_else(|| Some(format!(".{}", a.attr))),
        _ => None,
    }
}

fn extract_params(params: &ast::Parameters) -> Vec<Parameter> {
    let mut out = Vec::new();
    for p in &params.posonlyargs {
        out.push(Parameter {
            name: p.parameter.name.to_string(),
            declared_type: p.parameter.annotation.as_ref().map(|a| expr_to_text(a)),
            default: p.default.is_some(),
        });
    }
    for p in &params.args {
        out.push(Parameter {
            name: p.parameter.name.to_string(),
            declared_type: p.parameter.annotation.as_ref().map(|a| expr_to_text(a)),
            default: p.default.is_some(),
        });
    }
    if let Some(vararg) = &params.vararg {
        out.push(Parameter {
            name: format!("*{}", vararg.name),
            declared_type: vararg.annotation.as_ref().map(|a| expr_to_text(a)),
            default: false,
        });
    }
    for p in &params.kwonlyargs {
        out.push(Parameter {
            name: p.parameter.name.to_string(),
            declared_type: p.parameter.annotation.as_ref().map(|a| expr_to_text(a)),
            default: p.default.is_some(),
        });
    }
    if let Some(kwarg) = &params.kwarg {
        out.push(Parameter {
            name: format!("**{}", kwarg.name),
            declared_type: kwarg.annotation.as_ref().map(|a| expr_to_text(a)),
            default: false,
        });
    }
    out
}
