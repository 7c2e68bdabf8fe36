//! Pass 3: flow-insensitive type inference (`spec.md` §4.3 pass 3).
//!
//! Builds an implicit `var → TypeInfo` map per function from parameter
//! annotations and `x = ClassName(...)` constructor assignments (collected
//! during pass 1 into [`BuildContext`]), then resolves `var.method()` and
//! `self.attr.method()` call sites against it. Confidence follows
//! `spec.md` §4.3 exactly: 1.0 for an annotation, 0.9 for a direct
//! constructor, 0.7 for a `self`-attribute alias chain, 0.5 for
//! cross-function return-type inference.

use super::declaration::{AssignHint, BuildContext};
use super::types::{CallGraph, ResolutionSource};

/// Runs pass 3 in place over `graph`.
pub fn run(graph: &mut CallGraph, ctx: &BuildContext) {
    let return_types: std::collections::HashMap<String, Option<String>> = graph
        .functions
        .values()
        .map(|f| (f.fqn.clone(), f.return_type.clone()))
        .collect();

    let CallGraph {
        functions,
        call_sites,
        ..
    } = graph;

    let caller_fqns: Vec<String> = call_sites.keys().cloned().collect();

    for caller_fqn in caller_fqns {
        let Some(caller) = functions.get(&caller_fqn) else {
            continue;
        };
        let receiver_type = caller.receiver_type.clone();
        let params = caller.params.clone();

        let Some(sites) = call_sites.get_mut(&caller_fqn) else {
            continue;
        };

        for site in sites.iter_mut() {
            if site.resolved {
                continue;
            }

            let segments: Vec<&str> = site.target.split('.').collect();

            let resolved_class = match segments.as_slice() {
                [var, method] if *var != "self" => {
                    resolve_var(&caller_fqn, var, method, &params, ctx, &return_types)
                }
                ["self", attr, method] => receiver_type.as_ref().and_then(|class_fqn| {
                    ctx.class_attr_types
                        .get(&(class_fqn.clone(), (*attr).to_owned()))
                        .map(|class_name| {
                            (
                                format!("{class_name}.{method}"),
                                ResolutionSource::Inferred,
                                0.7,
                                Some(class_name.clone()),
                            )
                        })
                }),
                _ => None,
            };

            if let Some((candidate, source, confidence, inferred_type)) = resolved_class {
                if functions.contains_key(&candidate) {
                    site.target_fqn = Some(candidate);
                    site.resolution_source = Some(source);
                    site.type_confidence = confidence;
                    site.inferred_type = inferred_type;
                    site.resolved = true;
                }
            }
        }
    }
}

type VarResolution = (String, ResolutionSource, f32, Option<String>);

fn resolve_var(
    caller_fqn: &str,
    var: &str,
    method: &str,
    params: &[super::types::Parameter],
    ctx: &BuildContext,
    return_types: &std::collections::HashMap<String, Option<String>>,
) -> Option<VarResolution> {
    if let Some(param) = params.iter().find(|p| p.name == var) {
        if let Some(declared_type) = &param.declared_type {
            return Some((
                format!("{declared_type}.{method}"),
                ResolutionSource::Annotation,
                1.0,
                Some(declared_type.clone()),
            ));
        }
    }

    match ctx.var_hints.get(&(caller_fqn.to_owned(), var.to_owned())) {
        Some(AssignHint::Constructor(class_name)) => Some((
            format!("{class_name}.{method}"),
            ResolutionSource::Inferred,
            0.9,
            Some(class_name.clone()),
        )),
        Some(AssignHint::Call(callee_target)) => {
            let callee_fqn = format!(
                "{}.{}",
                caller_fqn.rsplit_once('.').map_or("", |(m, _)| m),
                callee_target
            );
            return_types
                .get(&callee_fqn)
                .and_then(|rt| rt.as_ref())
                .map(|return_type| {
                    (
                        format!("{return_type}.{method}"),
                        ResolutionSource::Inferred,
                        0.5,
                        Some(return_type.clone()),
                    )
                })
        }
        None => None,
    }
}
