//! Pass 5: failure categorization (`spec.md` §4.3 pass 5).
//!
//! For every call site still unresolved after passes 1-4, assigns a
//! [`ResolveFailureReason`] using the ordered heuristics `spec.md` §4.3
//! specifies: external framework prefix, ORM query-builder shape, an
//! inferred-but-method-missing receiver, reflective dispatch, or — failing
//! all of those — an uncategorized unknown symbol.

use super::declaration::BuildContext;
use super::types::CallGraph;
use crate::constants::get_external_framework_prefixes;
use crate::error::ResolveFailureReason;

/// Runs pass 5 in place over `graph`.
pub fn run(graph: &mut CallGraph, ctx: &BuildContext) {
    for (caller_fqn, sites) in graph.call_sites.iter_mut() {
        let caller_file = graph
            .functions
            .get(caller_fqn)
            .map(|f| f.location.file.clone());

        for site in sites.iter_mut() {
            if site.resolved {
                continue;
            }

            let qualified = ctx.qualify(&site.target, caller_file.as_deref());

            site.failure_reason = Some(categorize(&qualified, caller_fqn, ctx));
        }
    }
}

fn categorize(qualified_target: &str, caller_fqn: &str, ctx: &BuildContext) -> ResolveFailureReason {
    if get_external_framework_prefixes()
        .iter()
        .any(|prefix| qualified_target.starts_with(prefix))
    {
        return ResolveFailureReason::ExternalFramework;
    }

    if qualified_target.contains(".objects.") || qualified_target.contains(".filter") {
        return ResolveFailureReason::OrmPattern;
    }

    if qualified_target.starts_with('.') {
        return ResolveFailureReason::DynamicDispatch;
    }

    if let Some((var, _method)) = qualified_target.split_once('.') {
        let has_inferred_receiver = ctx
            .var_hints
            .contains_key(&(caller_fqn.to_owned(), var.to_owned()))
            || ctx
                .class_attr_types
                .keys()
                .any(|(_, attr)| attr == var);
        if has_inferred_receiver {
            return ResolveFailureReason::VariableMethod;
        }
    }

    ResolveFailureReason::UnknownSymbol
}
