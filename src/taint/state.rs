//! Per-function taint state (`spec.md` §4.4).
//!
//! Generalizes the teacher's `taint/propagation.rs` `TaintState`/
//! `is_expr_tainted` to rule-supplied sanitizer patterns instead of a
//! hardcoded allowlist: sanitizing calls are now whatever a `DataflowRule`
//! names, matched through `rules::ir::any_pattern_matches`.

use super::types::{TaintPathNode, Via};
use crate::callgraph::{CallSite, ResolutionSource};
use crate::error::ResolveFailureReason;
use crate::rules::ir::any_pattern_matches;
use ruff_python_ast::Expr;
use rustc_hash::FxHashMap;

/// Extracts a call's callee as a dotted attribute chain (`"self.x.method"`),
/// duplicating `callgraph::declaration`'s private `call_target_text` since
/// that pass discards its walker state once C3 finishes; C4 re-derives it
/// independently while walking bodies for taint.
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

/// Why a variable is currently tainted: the line taint entered the function,
/// a human-readable description of the originating source callee, and the
/// intermediate propagation steps and resolution confidence accumulated so
/// far as the taint is carried through assignments and call edges
/// (`spec.md` §3 "Taint path node", §4.4 "Confidence").
#[derive(Debug, Clone)]
pub struct TaintInfo {
    pub source_line: usize,
    pub source_text: String,
    pub variable: Option<String>,
    /// Propagation steps recorded after the source itself, in order
    /// (`Via::Assignment`/`Via::Alias`), appended to as taint flows through
    /// further assignments or call edges.
    pub path: Vec<TaintPathNode>,
    /// Smallest per-step resolution confidence crossed so far.
    pub min_resolution_confidence: f32,
    /// Smallest direct/inferred/variable-method factor crossed so far
    /// (`spec.md` §4.4: 1.0 direct, 0.9 inferred receiver, 0.8
    /// variable-method).
    pub confidence_factor: f32,
}

impl TaintInfo {
    /// A freshly observed taint origin, with nothing propagated yet.
    #[must_use]
    pub fn source(source_line: usize, source_text: String) -> Self {
        Self {
            source_line,
            source_text,
            variable: None,
            path: Vec::new(),
            min_resolution_confidence: 1.0,
            confidence_factor: 1.0,
        }
    }

    /// Appends a propagation step as taint flows into a new variable or
    /// across a `return` (`spec.md` §3).
    pub fn push_step(&mut self, node: TaintPathNode) {
        self.path.push(node);
    }

    /// Folds in the resolution characteristics of a call site the taint
    /// just crossed (`spec.md` §4.4 "Confidence").
    pub fn fold_call_site(&mut self, site: &CallSite) {
        let (resolution, factor) = call_site_confidence(site);
        self.min_resolution_confidence = self.min_resolution_confidence.min(resolution);
        self.confidence_factor = self.confidence_factor.min(factor);
    }

    /// The `spec.md` §4.4 confidence formula applied to everything folded in
    /// so far: `min(resolution confidence along the path) * factor`.
    #[must_use]
    pub fn confidence(&self) -> f32 {
        (self.min_resolution_confidence * self.confidence_factor).clamp(0.0, 1.0)
    }
}

/// Confidence contribution of one crossed call site (`spec.md` §4.4): a
/// call that never resolved to anything the call graph has an opinion about
/// (a plain external source/sink match) doesn't narrow confidence at all; a
/// call resolved through flow-insensitive type inference narrows it to 0.9;
/// a call whose receiver type was inferred but whose method wasn't found on
/// it (`ResolveFailureReason::VariableMethod`) narrows it to 0.8 and has no
/// `type_confidence` of its own to report.
#[must_use]
fn call_site_confidence(site: &CallSite) -> (f32, f32) {
    if site.failure_reason == Some(ResolveFailureReason::VariableMethod) {
        return (1.0, 0.8);
    }
    if site.resolved && site.type_confidence > 0.0 {
        let factor = if site.resolution_source == Some(ResolutionSource::Inferred) { 0.9 } else { 1.0 };
        return (site.type_confidence, factor);
    }
    (1.0, 1.0)
}

/// The set of locally-tainted variables within one function's analysis.
#[derive(Debug, Default)]
pub struct TaintState {
    tainted: FxHashMap<String, TaintInfo>,
}

impl TaintState {
    pub fn mark_tainted(&mut self, name: &str, info: TaintInfo) {
        self.tainted.insert(name.to_owned(), info);
    }

    #[must_use]
    pub fn is_tainted(&self, name: &str) -> bool {
        self.tainted.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TaintInfo> {
        self.tainted.get(name)
    }

    pub fn sanitize(&mut self, name: &str) {
        self.tainted.remove(name);
    }
}

/// Whether `call`'s callee matches one of `sanitizers` (`spec.md` §4.4: a
/// sanitizer call kills taint on its first argument, matching the teacher's
/// kill-only `is_sanitizer_call`/parameterized-query special case).
#[must_use]
pub fn is_sanitizer_call(call: &ruff_python_ast::ExprCall, sanitizers: &[String]) -> bool {
    let Some(target) = call_target_text(&call.func) else {
        return false;
    };
    if any_pattern_matches(sanitizers, &target) {
        return true;
    }
    is_parameterized_query(call, &target)
}

/// A `.execute(query, params)`/`.executemany(query, params)` call with a
/// second positional argument is treated as parameterized, hence safe, even
/// when the rule did not name it as a sanitizer explicitly (`spec.md` §4.4,
/// preserving the teacher's `propagation::is_parameterized_query` special
/// case for SQL cursor calls).
#[must_use]
fn is_parameterized_query(call: &ruff_python_ast::ExprCall, target: &str) -> bool {
    (target.ends_with(".execute") || target.ends_with(".executemany"))
        && call.arguments.args.len() >= 2
}

/// Finds taint on `expr`, returning the first tainted leaf's info.
/// Generalizes the teacher's `propagation::is_expr_tainted`.
#[must_use]
pub fn taint_of<'a>(expr: &Expr, state: &'a TaintState) -> Option<&'a TaintInfo> {
    match expr {
        Expr::Name(n) => state.get(n.id.as_str()),
        Expr::BinOp(b) => taint_of(&b.left, state).or_else(|| taint_of(&b.right, state)),
        Expr::BoolOp(b) => b.values.iter().find_map(|v| taint_of(v, state)),
        Expr::FString(f) => f.value.iter().find_map(|part| match part {
            ruff_python_ast::FStringPart::FString(piece) => piece
                .elements
                .iter()
                .find_map(|el| match el {
                    ruff_python_ast::InterpolatedStringElement::Interpolation(interp) => {
                        taint_of(&interp.expression, state)
                    }
                    ruff_python_ast::InterpolatedStringElement::Literal(_) => None,
                }),
            ruff_python_ast::FStringPart::Literal(_) => None,
        }),
        Expr::Call(c) => taint_of(&c.func, state).or_else(|| {
            c.arguments
                .args
                .iter()
                .find_map(|a| taint_of(a, state))
                .or_else(|| c.arguments.keywords.iter().find_map(|kw| taint_of(&kw.value, state)))
        }),
        Expr::Attribute(a) => taint_of(&a.value, state),
        Expr::Subscript(s) => taint_of(&s.value, state),
        Expr::Tuple(t) => t.elts.iter().find_map(|e| taint_of(e, state)),
        Expr::List(l) => l.elts.iter().find_map(|e| taint_of(e, state)),
        Expr::Set(s) => s.elts.iter().find_map(|e| taint_of(e, state)),
        Expr::Dict(d) => d.items.iter().find_map(|item| {
            item.key
                .as_ref()
                .and_then(|k| taint_of(k, state))
                .or_else(|| taint_of(&item.value, state))
        }),
        Expr::If(i) => taint_of(&i.body, state).or_else(|| taint_of(&i.orelse, state)),
        Expr::Named(n) => taint_of(&n.value, state),
        Expr::Starred(s) => taint_of(&s.value, state),
        _ => None,
    }
}

/// Extracts the assigned name(s) from an assignment target, handling bare
/// names and tuple/list unpacking (`spec.md` §4.4, matching the teacher's
/// `propagation::get_assigned_name`).
pub fn assigned_names(target: &Expr) -> Vec<String> {
    match target {
        Expr::Name(n) => vec![n.id.to_string()],
        Expr::Tuple(t) => t.elts.iter().flat_map(assigned_names).collect(),
        Expr::List(l) => l.elts.iter().flat_map(assigned_names).collect(),
        Expr::Starred(s) => assigned_names(&s.value),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tainted_name_is_detected() {
        let mut state = TaintState::default();
        let mut info = TaintInfo::source(1, "request.args.get".to_owned());
        info.variable = Some("x".to_owned());
        state.mark_tainted("x", info);
        assert!(state.is_tainted("x"));
        state.sanitize("x");
        assert!(!state.is_tainted("x"));
    }

    #[test]
    fn assigned_names_handles_tuple_unpacking() {
        let src = "a, b = 1, 2";
        let parsed = ruff_python_parser::parse_module(src).unwrap();
        let ruff_python_ast::Stmt::Assign(assign) = &parsed.syntax().body[0] else {
            panic!("expected assignment")
        };
        let names: Vec<String> = assign.targets.iter().flat_map(assigned_names).collect();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    }
}
