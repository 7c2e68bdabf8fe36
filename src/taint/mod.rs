//! Taint engine (C4, `spec.md` §4.4).
//!
//! Generalizes the teacher's `taint/` subtree (originally a single-pass,
//! hardcoded-pattern analyzer) into a rule-driven engine: [`types`] carries
//! the `spec.md` §3 data model (`Detection`, `TaintPathNode`), [`state`] and
//! [`walker`] implement one rule's intra-procedural analysis of one
//! function body, [`bodies`] re-indexes parsed function bodies by FQN for
//! that walker to consume, and [`engine`] drives the inter-procedural
//! fan-out across call-graph edges with cycle-safe memoization.

/// Function-body index keyed by FQN, consumed by [`walker`].
pub mod bodies;
/// Inter-procedural orchestration across the call graph.
pub mod engine;
/// Per-function taint state and sanitizer/expression helpers.
pub mod state;
/// Taint data model (`spec.md` §3).
pub mod types;
/// Intra-procedural statement walker: one rule, one function body.
pub mod walker;

pub use engine::run_rule;
pub use types::{Detection, DetectionScope, DetectionType, TaintPathNode, Via};
