//! CLI command handlers (`spec.md` §6 "CLI surface").
//!
//! Wires the nine analysis components together in the control-flow order
//! `spec.md` §2 describes: C1 → C2 → C3 → (C8 resolves remote rulesets,
//! then C5 loads the combined rule set) → C4 on the call graph **and** C6
//! on container graphs → merge detections → C7 → optional C9. [`scan`] and
//! [`ci`] share [`run_pipeline`]; they differ only in how a failed
//! diff-aware baseline is handled (`spec.md` §8 "Boundary behaviors").

mod options;
mod pipeline;

pub use options::ScanArgs;
pub use pipeline::{ci, diagnose, resolution_report, scan, serve, version};
