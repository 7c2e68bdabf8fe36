//! Intra-procedural taint walker (`spec.md` §4.4 "intra-procedural
//! propagation").
//!
//! Generalizes the teacher's `taint/intraprocedural.rs` statement-dispatch
//! walker (`analyze_stmt`/`handle_assign`/`handle_call_sink`) from a
//! hardcoded sink/source/sanitizer plugin list to whatever a single
//! [`DataflowRule`] names. One [`analyze_function`] call evaluates one rule
//! against one function body; the engine (`taint::engine`) runs it once per
//! `(rule, function)` pair, seeding `initial_tainted_params` when a caller's
//! taint already reaches a parameter (`spec.md` §4.4 "inter-procedural
//! propagation").

use super::state::{assigned_names, is_sanitizer_call, taint_of, TaintInfo, TaintState};
use super::types::{Detection, DetectionScope, DetectionType, TaintPathNode, Via};
use crate::callgraph::CallSite;
use crate::rules::ir::{any_pattern_matches, DataflowRule};
use crate::utils::LineIndex;
use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::Ranged;
use std::path::Path;

/// What one `analyze_function` call learned about its function, for the
/// inter-procedural engine to act on (`spec.md` §4.4, replacing the
/// teacher's `FunctionSummary`).
#[derive(Debug, Default)]
pub struct FunctionTaintResult {
    /// Detections found entirely within this function body.
    pub detections: Vec<Detection>,
    /// Whether a tainted value can flow out through `return`.
    pub returns_tainted: bool,
    /// Line of the `return` statement that carries taint, if any.
    pub return_line: Option<usize>,
    /// Parameter names that ended up tainted at some point in the body
    /// (seed state plus anything re-tainted locally).
    pub tainted_params_used: Vec<String>,
}

/// Runs one dataflow rule against one function body.
///
/// `initial_tainted` seeds the starting taint state: the empty map for a
/// plain intra-procedural pass, or one entry per parameter the caller's
/// argument was already tainted for, when called from the inter-procedural
/// engine. `call_sites` are this function's own call sites as recorded by
/// the call graph, consulted to fold resolution confidence into source and
/// sink hits (`spec.md` §4.4 "Confidence"); an empty slice degrades
/// gracefully to full confidence.
#[must_use]
pub fn analyze_function(
    rule: &DataflowRule,
    fqn: &str,
    file: &Path,
    line_index: &LineIndex,
    body: &[Stmt],
    initial_tainted: &[(String, TaintInfo)],
    call_sites: &[CallSite],
) -> FunctionTaintResult {
    let mut state = TaintState::default();
    for (name, info) in initial_tainted {
        state.mark_tainted(name, info.clone());
    }

    let mut ctx = Ctx {
        rule,
        fqn,
        file,
        line_index,
        call_sites,
        result: FunctionTaintResult::default(),
    };

    walk_body(body, &mut state, &mut ctx);

    ctx.result.tainted_params_used = initial_tainted
        .iter()
        .map(|(name, _)| name.clone())
        .filter(|name| {
            // A parameter "was used" if it started tainted; local
            // re-tainting of a different name doesn't count for the purpose
            // of deciding which formal parameters to propagate through.
            initial_tainted.iter().any(|(n, _)| n == name)
        })
        .collect();

    ctx.result
}

struct Ctx<'a> {
    rule: &'a DataflowRule,
    fqn: &'a str,
    file: &'a Path,
    line_index: &'a LineIndex,
    call_sites: &'a [CallSite],
    result: FunctionTaintResult,
}

/// Finds the call-graph's own record of the call at `line` targeting
/// `target`, so its resolution confidence can be folded into a taint step
/// (`spec.md` §4.4 "Confidence").
fn find_call_site<'a>(call_sites: &'a [CallSite], line: usize, target: &str) -> Option<&'a CallSite> {
    call_sites
        .iter()
        .find(|site| site.target == target && site.location.line == line)
}

fn walk_body(body: &[Stmt], state: &mut TaintState, ctx: &mut Ctx) {
    for stmt in body {
        walk_stmt(stmt, state, ctx);
    }
}

fn walk_stmt(stmt: &Stmt, state: &mut TaintState, ctx: &mut Ctx) {
    match stmt {
        Stmt::Assign(assign) => {
            check_expr_for_sinks(&assign.value, state, ctx);
            let line = ctx.line_index.line_index(assign.range().start());
            let origin = expr_taint_origin(&assign.value, state, ctx);
            for target in &assign.targets {
                for name in assigned_names(target) {
                    match &origin {
                        Some(info) => state.mark_tainted(&name, propagate(info, &assign.value, &name, line, ctx)),
                        None => state.sanitize(&name),
                    }
                }
            }
        }
        Stmt::AnnAssign(assign) => {
            if let Some(value) = &assign.value {
                check_expr_for_sinks(value, state, ctx);
                let line = ctx.line_index.line_index(assign.range().start());
                let origin = expr_taint_origin(value, state, ctx);
                for name in assigned_names(&assign.target) {
                    match &origin {
                        Some(info) => state.mark_tainted(&name, propagate(info, value, &name, line, ctx)),
                        None => state.sanitize(&name),
                    }
                }
            }
        }
        Stmt::AugAssign(assign) => {
            check_expr_for_sinks(&assign.value, state, ctx);
            let line = ctx.line_index.line_index(assign.range().start());
            if let Some(info) = expr_taint_origin(&assign.value, state, ctx) {
                for name in assigned_names(&assign.target) {
                    // `x += tainted` is never a bare alias, always a
                    // transformation.
                    let node = TaintPathNode {
                        file: ctx.file.to_path_buf(),
                        line,
                        variable: Some(name.clone()),
                        is_source: false,
                        is_sink: false,
                        via: Via::Assignment,
                        function_fqn: ctx.fqn.to_owned(),
                    };
                    let mut info = info.clone();
                    if info.source_line != line {
                        info.push_step(node);
                    }
                    state.mark_tainted(&name, info);
                }
            }
        }
        Stmt::Expr(expr_stmt) => check_expr_for_sinks(&expr_stmt.value, state, ctx),
        Stmt::Return(ret) => {
            if let Some(value) = &ret.value {
                check_expr_for_sinks(value, state, ctx);
                if let Some(info) = expr_taint_origin(value, state, ctx) {
                    ctx.result.returns_tainted = true;
                    ctx.result.return_line = Some(ctx.line_index.line_index(ret.range().start()));
                    let _ = info;
                }
            }
        }
        Stmt::If(if_stmt) => {
            check_expr_for_sinks(&if_stmt.test, state, ctx);
            walk_body(&if_stmt.body, state, ctx);
            for clause in &if_stmt.elif_else_clauses {
                if let Some(test) = &clause.test {
                    check_expr_for_sinks(test, state, ctx);
                }
                walk_body(&clause.body, state, ctx);
            }
        }
        Stmt::For(for_stmt) => {
            check_expr_for_sinks(&for_stmt.iter, state, ctx);
            if let Some(info) = expr_taint_origin(&for_stmt.iter, state, ctx) {
                for name in assigned_names(&for_stmt.target) {
                    state.mark_tainted(&name, info.clone());
                }
            }
            walk_body(&for_stmt.body, state, ctx);
            walk_body(&for_stmt.orelse, state, ctx);
        }
        Stmt::While(while_stmt) => {
            check_expr_for_sinks(&while_stmt.test, state, ctx);
            walk_body(&while_stmt.body, state, ctx);
        }
        Stmt::With(with_stmt) => {
            for item in &with_stmt.items {
                check_expr_for_sinks(&item.context_expr, state, ctx);
                if let Some(vars) = &item.optional_vars {
                    if let Some(info) = expr_taint_origin(&item.context_expr, state, ctx) {
                        for name in assigned_names(vars) {
                            state.mark_tainted(&name, info.clone());
                        }
                    }
                }
            }
            walk_body(&with_stmt.body, state, ctx);
        }
        Stmt::Try(try_stmt) => {
            walk_body(&try_stmt.body, state, ctx);
            for handler in &try_stmt.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                walk_body(&h.body, state, ctx);
            }
            walk_body(&try_stmt.orelse, state, ctx);
            walk_body(&try_stmt.finalbody, state, ctx);
        }
        _ => {}
    }
}

/// Scans `expr` for sink calls, recording a [`Detection`] for each one a
/// tainted argument (or tainted receiver) reaches, then recurses into every
/// sub-expression so nested calls are still visited (`spec.md` §4.4,
/// replacing the teacher's `check_expr_for_sinks`).
fn check_expr_for_sinks(expr: &Expr, state: &TaintState, ctx: &mut Ctx) {
    if let Expr::Call(call) = expr {
        if let Some(target) = call_target_text(&call.func) {
            if any_pattern_matches(&ctx.rule.sinks, &target) && !is_sanitizer_call(call, &ctx.rule.sanitizers) {
                let tainted_arg = call
                    .arguments
                    .args
                    .iter()
                    .chain(call.arguments.keywords.iter().map(|kw| &kw.value))
                    .find_map(|arg| taint_of(arg, state).or_else(|| None).map(|info| (arg, info)));

                let receiver_tainted = receiver_taint(&call.func, state);

                if let Some((arg, info)) = tainted_arg {
                    record_detection(ctx, &target, call, arg, info);
                } else if let Some(info) = receiver_tainted {
                    let sink_line = ctx.line_index.line_index(call.range().start());
                    push_detection(ctx, &target, sink_line, info, None);
                }
            }
        }
        for arg in &call.arguments.args {
            check_expr_for_sinks(arg, state, ctx);
        }
        for kw in &call.arguments.keywords {
            check_expr_for_sinks(&kw.value, state, ctx);
        }
        check_expr_for_sinks(&call.func, state, ctx);
        return;
    }

    match expr {
        Expr::BinOp(b) => {
            check_expr_for_sinks(&b.left, state, ctx);
            check_expr_for_sinks(&b.right, state, ctx);
        }
        Expr::BoolOp(b) => {
            for v in &b.values {
                check_expr_for_sinks(v, state, ctx);
            }
        }
        Expr::If(i) => {
            check_expr_for_sinks(&i.test, state, ctx);
            check_expr_for_sinks(&i.body, state, ctx);
            check_expr_for_sinks(&i.orelse, state, ctx);
        }
        Expr::Attribute(a) => check_expr_for_sinks(&a.value, state, ctx),
        Expr::Subscript(s) => check_expr_for_sinks(&s.value, state, ctx),
        Expr::List(l) => {
            for e in &l.elts {
                check_expr_for_sinks(e, state, ctx);
            }
        }
        Expr::Tuple(t) => {
            for e in &t.elts {
                check_expr_for_sinks(e, state, ctx);
            }
        }
        Expr::Dict(d) => {
            for item in &d.items {
                if let Some(key) = &item.key {
                    check_expr_for_sinks(key, state, ctx);
                }
                check_expr_for_sinks(&item.value, state, ctx);
            }
        }
        _ => {}
    }
}

fn record_detection(
    ctx: &mut Ctx,
    sink_target: &str,
    call: &ast::ExprCall,
    tainted_arg: &Expr,
    info: &TaintInfo,
) {
    let sink_line = ctx.line_index.line_index(call.range().start());
    let _ = tainted_arg;
    push_detection(ctx, sink_target, sink_line, info, info.variable.clone());
}

fn push_detection(
    ctx: &mut Ctx,
    sink_target: &str,
    sink_line: usize,
    info: &TaintInfo,
    tainted_var: Option<String>,
) {
    let mut info = info.clone();
    if let Some(site) = find_call_site(ctx.call_sites, sink_line, sink_target) {
        info.fold_call_site(site);
    }

    let source_node = TaintPathNode {
        file: ctx.file.to_path_buf(),
        line: info.source_line,
        variable: tainted_var.clone(),
        is_source: true,
        is_sink: false,
        via: Via::Assignment,
        function_fqn: ctx.fqn.to_owned(),
    };
    let sink_node = TaintPathNode {
        file: ctx.file.to_path_buf(),
        line: sink_line,
        variable: tainted_var.clone(),
        is_source: false,
        is_sink: true,
        via: Via::Call,
        function_fqn: ctx.fqn.to_owned(),
    };

    let mut path = Vec::with_capacity(info.path.len() + 2);
    path.push(source_node);
    path.extend(info.path.iter().cloned());
    path.push(sink_node);

    ctx.result.detections.push(Detection {
        function_fqn: ctx.fqn.to_owned(),
        file: ctx.file.to_path_buf(),
        source_line: info.source_line,
        sink_line,
        sink_call: sink_target.to_owned(),
        tainted_var,
        confidence: info.confidence(),
        scope: DetectionScope::Local,
        taint_path: Some(path),
        detection_type: DetectionType::Dataflow,
        rule_id: ctx.rule.id.clone(),
    });
}

/// Extends `info`'s path with a propagation step for assigning it into
/// `name` at `line`, unless `line` is the very statement that created the
/// taint in the first place (the source call itself isn't a separate
/// propagation step). A bare `y = x` copy is recorded as `Via::Alias`;
/// anything else (concatenation, a call, an f-string, …) as
/// `Via::Assignment` (`spec.md` §3 "Taint path node").
fn propagate(info: &TaintInfo, value: &Expr, name: &str, line: usize, ctx: &Ctx) -> TaintInfo {
    let mut info = info.clone();
    if info.source_line == line {
        return info;
    }
    let via = if matches!(value, Expr::Name(_)) { Via::Alias } else { Via::Assignment };
    info.push_step(TaintPathNode {
        file: ctx.file.to_path_buf(),
        line,
        variable: Some(name.to_owned()),
        is_source: false,
        is_sink: false,
        via,
        function_fqn: ctx.fqn.to_owned(),
    });
    info
}

/// Whether the receiver of an attribute-chain call (e.g. `x` in
/// `x.read().decode()`) is itself tainted.
fn receiver_taint<'a>(func: &Expr, state: &'a TaintState) -> Option<&'a TaintInfo> {
    match func {
        Expr::Attribute(a) => taint_of(&a.value, state).or_else(|| receiver_taint(&a.value, state)),
        _ => None,
    }
}

/// Determines whether `expr` currently carries taint, treating a direct
/// call to a source pattern as an origin even with no assignment in between
/// (`os.system(request.args.get("x"))`), falling back to propagated taint
/// on its sub-expressions.
fn expr_taint_origin(expr: &Expr, state: &TaintState, ctx: &Ctx) -> Option<TaintInfo> {
    if let Expr::Call(call) = expr {
        if let Some(target) = call_target_text(&call.func) {
            if any_pattern_matches(&ctx.rule.sanitizers, &target) {
                // A sanitizer call kills taint on its result, even when one
                // of its arguments is itself tainted (`spec.md` §4.4:
                // kill-only, no revive).
                return None;
            }
            if any_pattern_matches(&ctx.rule.sources, &target) {
                let line = ctx.line_index.line_index(call.range().start());
                let mut info = TaintInfo::source(line, target.clone());
                if let Some(site) = find_call_site(ctx.call_sites, line, &target) {
                    info.fold_call_site(site);
                }
                return Some(info);
            }
        }
        for arg in call
            .arguments
            .args
            .iter()
            .chain(call.arguments.keywords.iter().map(|kw| &kw.value))
        {
            if let Some(found) = expr_taint_origin(arg, state, ctx) {
                return Some(found);
            }
        }
    }

    if let Some(info) = taint_of(expr, state) {
        return Some(info.clone());
    }

    match expr {
        Expr::BinOp(b) => expr_taint_origin(&b.left, state, ctx).or_else(|| expr_taint_origin(&b.right, state, ctx)),
        Expr::BoolOp(b) => b.values.iter().find_map(|v| expr_taint_origin(v, state, ctx)),
        Expr::If(i) => {
            expr_taint_origin(&i.body, state, ctx).or_else(|| expr_taint_origin(&i.orelse, state, ctx))
        }
        _ => None,
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ir::{RuleMetadata, Severity};

    fn rule() -> DataflowRule {
        DataflowRule {
            id: "TEST-001".to_owned(),
            name: "test".to_owned(),
            severity: Severity::Critical,
            sources: vec!["request.args.get".to_owned()],
            sinks: vec!["os.system".to_owned()],
            sanitizers: vec!["shlex.quote".to_owned()],
            scope_hint: None,
            metadata: RuleMetadata::default(),
        }
    }

    fn parse(src: &str) -> ruff_python_ast::ModModule {
        ruff_python_parser::parse_module(src).unwrap().into_syntax()
    }

    #[test]
    fn finds_direct_source_to_sink_flow() {
        let module = parse(
            r#"
def handler():
    cmd = request.args.get("cmd")
    os.system(cmd)
"#,
        );
        let line_index = LineIndex::new("");
        let result = analyze_function(
            &rule(),
            "app.handler",
            Path::new("app.py"),
            &line_index,
            &module.body[0]
                .as_function_def_stmt()
                .unwrap()
                .body,
            &[],
            &[],
        );
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].sink_call, "os.system");
    }

    #[test]
    fn sanitizer_call_cuts_taint() {
        let module = parse(
            r#"
def handler():
    cmd = request.args.get("cmd")
    safe = shlex.quote(cmd)
    os.system(safe)
"#,
        );
        let line_index = LineIndex::new("");
        let result = analyze_function(
            &rule(),
            "app.handler",
            Path::new("app.py"),
            &line_index,
            &module.body[0].as_function_def_stmt().unwrap().body,
            &[],
            &[],
        );
        assert!(result.detections.is_empty());
    }

    #[test]
    fn tainted_param_seed_flows_to_sink() {
        let module = parse(
            r#"
def run(cmd):
    os.system(cmd)
"#,
        );
        let line_index = LineIndex::new("");
        let mut seed_info = TaintInfo::source(1, "request.args.get".to_owned());
        seed_info.variable = Some("cmd".to_owned());
        let seed = vec![("cmd".to_owned(), seed_info)];
        let result = analyze_function(
            &rule(),
            "app.run",
            Path::new("app.py"),
            &line_index,
            &module.body[0].as_function_def_stmt().unwrap().body,
            &seed,
            &[],
        );
        assert_eq!(result.detections.len(), 1);
    }

    #[test]
    fn return_of_tainted_value_is_flagged() {
        let module = parse(
            r#"
def get_cmd():
    return request.args.get("cmd")
"#,
        );
        let line_index = LineIndex::new("");
        let result = analyze_function(
            &rule(),
            "app.get_cmd",
            Path::new("app.py"),
            &line_index,
            &module.body[0].as_function_def_stmt().unwrap().body,
            &[],
            &[],
        );
        assert!(result.returns_tainted);
    }
}
