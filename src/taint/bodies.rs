//! Function-body index (`spec.md` §4.4).
//!
//! C3's declaration pass (`callgraph::declaration`) discards every AST
//! reference once it has recorded `Function`/`CallSite` records, so the
//! taint engine re-walks `SourceGraph` once, independently, to resolve an
//! FQN back to the statement body it needs to analyze. Grounded in the same
//! `class_stack` walk `callgraph::declaration::ModuleWalker` uses to compute
//! FQNs, kept separate so C3 and C4 stay decoupled.

use crate::source::SourceGraph;
use crate::utils::LineIndex;
use ruff_python_ast::{self as ast, Stmt};
use rustc_hash::FxHashMap;
use std::path::Path;

/// A function/method body located for taint analysis.
pub struct FunctionBody<'a> {
    pub file: &'a Path,
    pub line_index: &'a LineIndex,
    pub params: Vec<String>,
    pub body: &'a [Stmt],
}

/// Every project function body, keyed by FQN.
#[derive(Default)]
pub struct BodyIndex<'a> {
    bodies: FxHashMap<String, FunctionBody<'a>>,
}

impl<'a> BodyIndex<'a> {
    /// Builds the index by walking every parsed Python module once.
    #[must_use]
    pub fn build(source_graph: &'a SourceGraph) -> Self {
        let mut bodies = FxHashMap::default();
        for node in source_graph.python_modules() {
            let Some(module) = &node.module else { continue };
            let module_path =
                crate::module_registry::module_path_for(&source_graph.root, &node.file_path);
            let mut class_stack: Vec<String> = Vec::new();
            walk_body(
                &module.body,
                &module_path,
                &mut class_stack,
                &node.file_path,
                &node.line_index,
                &mut bodies,
            );
        }
        Self { bodies }
    }

    #[must_use]
    pub fn get(&self, fqn: &str) -> Option<&FunctionBody<'a>> {
        self.bodies.get(fqn)
    }
}

fn walk_body<'a>(
    stmts: &'a [Stmt],
    module_path: &str,
    class_stack: &mut Vec<String>,
    file: &'a Path,
    line_index: &'a LineIndex,
    out: &mut FxHashMap<String, FunctionBody<'a>>,
) {
    for stmt in stmts {
        match stmt {
            Stmt::FunctionDef(func) => {
                let receiver = class_stack.last().map(|c| format!("{module_path}.{c}"));
                let fqn = receiver.map_or_else(
                    || format!("{module_path}.{}", func.name),
                    |r| format!("{r}.{}", func.name),
                );
                out.insert(
                    fqn,
                    FunctionBody {
                        file,
                        line_index,
                        params: extract_param_names(&func.parameters),
                        body: &func.body,
                    },
                );
                walk_body(&func.body, module_path, class_stack, file, line_index, out);
            }
            Stmt::ClassDef(class) => {
                class_stack.push(class.name.to_string());
                walk_body(&class.body, module_path, class_stack, file, line_index, out);
                class_stack.pop();
            }
            _ => {}
        }
    }
}

fn extract_param_names(params: &ast::Parameters) -> Vec<String> {
    let mut out = Vec::new();
    for p in &params.posonlyargs {
        out.push(p.parameter.name.to_string());
    }
    for p in &params.args {
        out.push(p.parameter.name.to_string());
    }
    if let Some(vararg) = &params.vararg {
        out.push(vararg.name.to_string());
    }
    for p in &params.kwonlyargs {
        out.push(p.parameter.name.to_string());
    }
    if let Some(kwarg) = &params.kwarg {
        out.push(kwarg.name.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::build_source_graph;
    use tempfile::tempdir;

    #[test]
    fn indexes_module_function_and_method() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("app.py"),
            "class Greeter:\n    def greet(self):\n        return 1\n\ndef top():\n    return 2\n",
        )
        .unwrap();
        let graph = build_source_graph(temp.path(), &[], &[], false, |_| {}, || {});
        let index = BodyIndex::build(&graph);

        assert!(index.get("app.Greeter.greet").is_some());
        assert!(index.get("app.top").is_some());
        assert!(index.get("app.missing").is_none());
    }
}
