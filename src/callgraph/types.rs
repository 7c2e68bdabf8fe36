//! Call-graph data model (`spec.md` §3, §4.3).

use crate::error::ResolveFailureReason;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Where a call site's file/line/column sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Absolute path to the source file.
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub column: usize,
}

/// One formal parameter of a function or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name (`*args`/`**kwargs` keep their sigil as a prefix).
    pub name: String,
    /// Type annotation text, if any.
    pub declared_type: Option<String>,
    /// Whether the parameter has a default value.
    pub default: bool,
}

/// A declared function or method (`spec.md` §3 `Function`).
///
/// Invariant: `fqn` is unique within one [`CallGraph`] (enforced by
/// [`CallGraph::insert_function`]; duplicate FQNs overwrite, matching the
/// teacher's `HashMap`-of-nodes approach in `taint/call_graph.rs`, but in
/// practice this can only happen for genuinely duplicate declarations since
/// module paths are injective, see `module_registry`).
#[derive(Debug, Clone)]
pub struct Function {
    /// Fully qualified name: `module.ClassName.method` or `module.func`.
    pub fqn: String,
    /// Unqualified name as written in source.
    pub name: String,
    /// Dotted module path this function is declared in.
    pub module: String,
    /// Formal parameters, in declaration order.
    pub params: Vec<Parameter>,
    /// Return type annotation text, if any.
    pub return_type: Option<String>,
    /// Whether this is a method of a class (as opposed to a module-level
    /// function).
    pub is_method: bool,
    /// Enclosing class's FQN, for methods.
    pub receiver_type: Option<String>,
    /// Whether decorated `@staticmethod`.
    pub is_static: bool,
    /// Decorator names, best-effort textual form.
    pub decorators: Vec<String>,
    /// Declaration site.
    pub location: Location,
}

/// How a call site's target was (or wasn't) resolved (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Resolved through an `import`/`from ... import` binding.
    Import,
    /// Resolved against another function in the same lexical/module scope.
    Lexical,
    /// Resolved using a parameter or variable's type annotation.
    Annotation,
    /// Resolved using the flow-insensitive type-inference pass.
    Inferred,
    /// Resolved as a call into a project-local symbol with no stronger
    /// evidence available (reserved for future passes).
    Builtin,
    /// Resolved as a standard-library call via an annotation.
    StdlibAnnotation,
    /// Resolved as a standard-library call via the builtin registry.
    StdlibBuiltin,
    /// Resolved via a loose textual heuristic (reserved for future passes).
    Heuristic,
}

/// A textual call expression within a function body (`spec.md` §3
/// `Call site`).
#[derive(Debug, Clone)]
pub struct CallSite {
    /// FQN of the function this call site appears in.
    pub caller_fqn: String,
    /// Textual form of the callee as written (`"self.helper"`, `"np.array"`).
    pub target: String,
    /// Resolved target FQN, if the callee is a known project function.
    /// `None` for calls resolved to an external symbol (stdlib, framework,
    /// unresolved import) as well as for genuinely unresolved calls.
    pub target_fqn: Option<String>,
    /// Call site location.
    pub location: Location,
    /// Whether resolution succeeded (project-local *or* recognized
    /// external, e.g. stdlib).
    pub resolved: bool,
    /// How resolution succeeded, if it did.
    pub resolution_source: Option<ResolutionSource>,
    /// Inferred type of the call's return value, if known.
    pub inferred_type: Option<String>,
    /// Confidence in `inferred_type`/resolution, in `[0, 1]`.
    pub type_confidence: f32,
    /// Why resolution failed, if it did.
    pub failure_reason: Option<ResolveFailureReason>,
}

impl CallSite {
    pub(crate) fn new(caller_fqn: String, target: String, location: Location) -> Self {
        Self {
            caller_fqn,
            target,
            target_fqn: None,
            location,
            resolved: false,
            resolution_source: None,
            inferred_type: None,
            type_confidence: 0.0,
            failure_reason: None,
        }
    }
}

/// The call graph produced by C3 (`spec.md` §3 `Call graph`).
///
/// Invariant (tested in `tests/callgraph_test.rs`): every edge's endpoints
/// are either a known [`Function`] or an external symbol marked
/// resolved-but-external; edges are only emitted for resolved intra-project
/// calls (`spec.md` §4.3).
#[derive(Debug, Default)]
pub struct CallGraph {
    /// Every declared function/method, keyed by FQN.
    pub functions: FxHashMap<String, Function>,
    /// Every call site, keyed by caller FQN.
    pub call_sites: FxHashMap<String, Vec<CallSite>>,
    /// Resolved intra-project edges, `(caller_fqn, callee_fqn)`.
    pub edges: Vec<(String, String)>,
}

impl CallGraph {
    pub(crate) fn insert_function(&mut self, function: Function) {
        self.functions.insert(function.fqn.clone(), function);
    }

    pub(crate) fn push_call_site(&mut self, site: CallSite) {
        self.call_sites
            .entry(site.caller_fqn.clone())
            .or_default()
            .push(site);
    }

    /// Recomputes `edges` from `call_sites`: one edge per resolved call site
    /// whose `target_fqn` names a known function.
    pub(crate) fn rebuild_edges(&mut self) {
        self.edges.clear();
        for sites in self.call_sites.values() {
            for site in sites {
                if let Some(target_fqn) = &site.target_fqn {
                    if self.functions.contains_key(target_fqn) {
                        self.edges
                            .push((site.caller_fqn.clone(), target_fqn.clone()));
                    }
                }
            }
        }
    }

    /// All functions reachable (transitively) from `fqn`, following `edges`.
    #[must_use]
    pub fn reachable_from(&self, fqn: &str) -> rustc_hash::FxHashSet<String> {
        let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for (caller, callee) in &self.edges {
            adjacency
                .entry(caller.as_str())
                .or_default()
                .push(callee.as_str());
        }

        let mut visited = rustc_hash::FxHashSet::default();
        let mut stack = vec![fqn.to_owned()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(callees) = adjacency.get(current.as_str()) {
                for callee in callees {
                    if !visited.contains(*callee) {
                        stack.push((*callee).to_owned());
                    }
                }
            }
        }
        visited
    }
}
