//! Pass orchestration (`spec.md` §4.3, §5: "Call-graph passes run strictly
//! in order 1→5").

use super::declaration;
use super::failure;
use super::local_resolution;
use super::stdlib;
use super::type_inference;
use super::types::CallGraph;
use crate::module_registry::ModuleRegistry;
use crate::source::SourceGraph;

/// Builds the call graph for `source_graph`, running all five resolution
/// passes in order and recomputing `edges` at the end.
#[must_use]
pub fn build_call_graph(source_graph: &SourceGraph, module_registry: &ModuleRegistry) -> CallGraph {
    let (mut graph, ctx) = declaration::run(source_graph, module_registry);
    local_resolution::run(&mut graph, &ctx, module_registry);
    type_inference::run(&mut graph, &ctx);
    stdlib::run(&mut graph, &ctx);
    failure::run(&mut graph, &ctx);
    graph.rebuild_edges();
    graph
}
