//! Pass 2: local resolution (`spec.md` §4.3 pass 2).
//!
//! For each call site, attempts resolution against (a) the enclosing
//! function's own class (`self.method()`), (b) the module's import bindings,
//! and (c) other functions declared in the same module. Ambiguous bare
//! names (shared short name across modules) are resolved against the
//! closest-by-path module, per `spec.md` §4.3's tie-break rule; anything
//! still ambiguous is left unresolved for pass 5 to diagnose.

use super::declaration::BuildContext;
use super::types::{CallGraph, CallSite, ResolutionSource};
use crate::module_registry::ModuleRegistry;

/// Runs pass 2 in place over `graph`.
pub fn run(graph: &mut CallGraph, ctx: &BuildContext, module_registry: &ModuleRegistry) {
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
        let caller_module = caller.module.clone();
        let receiver_type = caller.receiver_type.clone();
        let file_imports = ctx.imports.get(&caller.location.file);

        let Some(sites) = call_sites.get_mut(&caller_fqn) else {
            continue;
        };

        for site in sites.iter_mut() {
            if site.resolved {
                continue;
            }

            if let Some((prefix, method)) = site.target.split_once('.') {
                // Direct `self.method()` calls resolve here; multi-segment
                // chains (`self.x.method()`, `np.linalg.norm()`) are left
                // for pass 3's attribute-chain walk.
                if prefix == "self" && !method.contains('.') {
                    if let Some(receiver) = &receiver_type {
                        let candidate = format!("{receiver}.{method}");
                        if functions.contains_key(&candidate) {
                            set_resolved(site, candidate, ResolutionSource::Lexical, 1.0);
                            continue;
                        }
                    }
                }

                if !method.contains('.') {
                    if let Some(imports) = file_imports {
                        if let Some(import_target) = imports.get(prefix) {
                            let candidate = format!("{import_target}.{method}");
                            if functions.contains_key(&candidate) {
                                set_resolved(site, candidate, ResolutionSource::Import, 1.0);
                                continue;
                            }
                            // The import names a real module, just not a
                            // project function; leave unresolved for the
                            // stdlib pass (4) or failure pass (5).
                        }
                    }
                }
                continue;
            }

            // Bare name: same-module function, then import binding, then
            // closest-by-path module sharing the short name.
            let same_module_candidate = format!("{caller_module}.{}", site.target);
            if functions.contains_key(&same_module_candidate) {
                set_resolved(site, same_module_candidate, ResolutionSource::Lexical, 1.0);
                continue;
            }

            if let Some(imports) = file_imports {
                if let Some(import_target) = imports.get(&site.target) {
                    if functions.contains_key(import_target) {
                        set_resolved(site, import_target.clone(), ResolutionSource::Import, 1.0);
                        continue;
                    }
                }
            }

            let candidates = module_registry.modules_with_short_name(&site.target);
            if candidates.is_empty() {
                continue;
            }
            if let Some(best) = closest_module(&caller_module, candidates) {
                let candidate = format!("{best}.{}", site.target);
                if functions.contains_key(&candidate) {
                    set_resolved(site, candidate, ResolutionSource::Lexical, 0.7);
                }
            }
        }
    }
}

fn set_resolved(site: &mut CallSite, candidate: String, source: ResolutionSource, confidence: f32) {
    site.target_fqn = Some(candidate);
    site.resolution_source = Some(source);
    site.type_confidence = confidence;
    site.resolved = true;
}

/// Picks the module whose dotted path shares the longest prefix with
/// `from_module`.
fn closest_module(from_module: &str, candidates: &[String]) -> Option<String> {
    let from_segments: Vec<&str> = from_module.split('.').collect();
    candidates
        .iter()
        .max_by_key(|candidate| {
            let candidate_segments: Vec<&str> = candidate.split('.').collect();
            from_segments
                .iter()
                .zip(candidate_segments.iter())
                .take_while(|(a, b)| a == b)
                .count()
        })
        .cloned()
}
