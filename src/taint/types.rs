//! Taint data model (`spec.md` §3 "Taint path node", "Detection").

use std::path::PathBuf;

/// How taint reached a given path step (`spec.md` §3 `via`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// `x = source()` or `x = tainted_expr`.
    Assignment,
    /// A tainted value flowed out through a `return` statement.
    Return,
    /// A tainted argument began a callee parameter's life tainted.
    Param,
    /// The step is the sink call itself.
    Call,
    /// `y = x` copied taint from `x` to `y` with no transformation.
    Alias,
}

/// One step of a taint path (`spec.md` §3 `Taint path node`).
#[derive(Debug, Clone)]
pub struct TaintPathNode {
    /// Location of this step.
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: usize,
    /// Variable name carrying taint at this step, if any.
    pub variable: Option<String>,
    /// Whether this step is the path's source.
    pub is_source: bool,
    /// Whether this step is the path's sink.
    pub is_sink: bool,
    /// How taint reached this step.
    pub via: Via,
    /// FQN of the function this step occurs in.
    pub function_fqn: String,
}

/// Where a detection was produced (`spec.md` §3 `Detection.scope`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionScope {
    /// Source and sink in the same function body.
    Local,
    /// Taint crossed at least one call edge.
    InterProcedural,
    /// Produced by the container pattern matcher (C6), not the taint engine.
    Container,
}

/// What kind of rule produced a detection (`spec.md` §3
/// `Detection.detection_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionType {
    /// Dataflow (taint) rule.
    Dataflow,
    /// Container/pattern rule.
    Pattern,
}

/// A raw detection before enrichment (`spec.md` §3 `Detection`).
#[derive(Debug, Clone)]
pub struct Detection {
    /// FQN of the function the sink was reached in.
    pub function_fqn: String,
    /// File the sink was reached in (needed once detections cross files).
    pub file: PathBuf,
    /// Line the taint originated on.
    pub source_line: usize,
    /// Line the sink call occurs on.
    pub sink_line: usize,
    /// Textual form of the sink call.
    pub sink_call: String,
    /// Variable name carrying taint into the sink, if any.
    pub tainted_var: Option<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Local / inter-procedural / container.
    pub scope: DetectionScope,
    /// Full path from source to sink, if recorded.
    pub taint_path: Option<Vec<TaintPathNode>>,
    /// Dataflow or pattern.
    pub detection_type: DetectionType,
    /// ID of the rule that produced this detection. Not part of the
    /// `spec.md` §3 `Detection` record itself, but needed by C7 to look up
    /// rule metadata; callers that need the literal spec record can ignore
    /// this field.
    pub rule_id: String,
}

impl Detection {
    /// The `(function_fqn, sink_line, source_line)` key detections are
    /// deduplicated by (`spec.md` §4.4, property 4 on top of that adds
    /// `rule.id`/`rel_path` once enriched).
    #[must_use]
    pub fn dedup_key(&self) -> (String, usize, usize) {
        (self.function_fqn.clone(), self.sink_line, self.source_line)
    }
}
