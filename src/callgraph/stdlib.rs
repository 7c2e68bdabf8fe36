//! Pass 4: standard-library enrichment (`spec.md` §4.3 pass 4).
//!
//! A read-only registry, keyed by module prefix, marking otherwise-external
//! calls as recognized standard-library calls instead of leaving them to
//! fall through to the failure-categorization pass. Attaches a return type
//! for constructors the registry knows about (e.g. `pathlib.Path(...)`).

use super::declaration::BuildContext;
use super::types::{CallGraph, ResolutionSource};

struct StdlibEntry {
    prefix: &'static str,
    /// Exact-match constructor calls whose return type is known.
    constructors: &'static [(&'static str, &'static str)],
}

const REGISTRY: &[StdlibEntry] = &[
    StdlibEntry {
        prefix: "os.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "os.path.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "sys.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "json.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "re.",
        constructors: &[("re.compile", "re.Pattern")],
    },
    StdlibEntry {
        prefix: "pathlib.",
        constructors: &[("pathlib.Path", "pathlib.Path")],
    },
    StdlibEntry {
        prefix: "datetime.",
        constructors: &[
            ("datetime.datetime", "datetime.datetime"),
            ("datetime.date", "datetime.date"),
        ],
    },
    StdlibEntry {
        prefix: "collections.",
        constructors: &[
            ("collections.OrderedDict", "collections.OrderedDict"),
            ("collections.defaultdict", "collections.defaultdict"),
        ],
    },
    StdlibEntry {
        prefix: "itertools.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "functools.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "logging.",
        constructors: &[("logging.getLogger", "logging.Logger")],
    },
    StdlibEntry {
        prefix: "subprocess.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "shutil.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "typing.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "hashlib.",
        constructors: &[],
    },
    StdlibEntry {
        prefix: "io.",
        constructors: &[],
    },
];

/// Runs pass 4 in place over `graph`.
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

            if let Some(entry) = REGISTRY.iter().find(|e| qualified.starts_with(e.prefix)) {
                site.resolved = true;
                if let Some((_, return_type)) =
                    entry.constructors.iter().find(|(name, _)| *name == qualified)
                {
                    site.resolution_source = Some(ResolutionSource::StdlibAnnotation);
                    site.inferred_type = Some((*return_type).to_owned());
                    site.type_confidence = 0.9;
                } else {
                    site.resolution_source = Some(ResolutionSource::StdlibBuiltin);
                    site.type_confidence = 0.6;
                }
            }
        }
    }
}
