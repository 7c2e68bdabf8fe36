//! Rule IR (`spec.md` §3 "Rule IR").
//!
//! The rule DSL's surface syntax is an external collaborator (`spec.md` §1);
//! this module defines the typed, language-neutral record every loaded rule
//! is reduced to before C4/C6 ever see it. The loader (`rules::loader`)
//! deserializes this shape from YAML; nothing downstream inspects source
//! syntax.

use serde::{Deserialize, Serialize};

/// Severity as carried on a rule (`spec.md` §3). Container rules may emit
/// upper-case spellings (`spec.md` §9); enrichment normalizes to lowercase,
/// so this type accepts both at deserialization time via
/// `#[serde(rename_all = "lowercase")]` plus a case-insensitive fallback in
/// [`Severity::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Immediate exploitation risk.
    Critical,
    /// Significant security risk.
    High,
    /// Potential security risk.
    Medium,
    /// Minor security concern.
    Low,
    /// Informational only.
    Info,
}

impl Severity {
    /// Parses a severity name case-insensitively (`spec.md` §9: container
    /// rules emit upper-case severities; enrichment must normalize).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// Rank used for output ordering (`spec.md` §4.7, §8 property 8):
    /// critical=0 … info=4.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::Info => 4,
        }
    }

    /// Lowercase spelling, as emitted by every output formatter.
    #[must_use]
    pub fn as_lowercase(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_lowercase())
    }
}

/// A textual callee/instruction pattern. Supports a leading or trailing `*`
/// wildcard (`request.*`, `*.execute`) and otherwise matches literally;
/// everything else in the rule DSL's pattern grammar is opaque to the core
/// (`spec.md` §1), so this is deliberately the simplest shape that can
/// express "prefix", "suffix", and "exact" source/sink/sanitizer callees.
pub type Pattern = String;

/// Checks `target` (a call site's textual callee, e.g. `"request.args.get"`)
/// against `pattern`.
#[must_use]
pub fn pattern_matches(pattern: &str, target: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        target.starts_with(prefix)
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        target.ends_with(suffix)
    } else {
        target == pattern
    }
}

/// Checks `target` against any pattern in `patterns`.
#[must_use]
pub fn any_pattern_matches(patterns: &[Pattern], target: &str) -> bool {
    patterns.iter().any(|p| pattern_matches(p, target))
}

/// A dataflow rule (`spec.md` §3 "Dataflow").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataflowRule {
    /// Stable rule ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Severity.
    pub severity: Severity,
    /// Callee patterns that introduce taint.
    pub sources: Vec<Pattern>,
    /// Callee patterns that consume tainted data dangerously.
    pub sinks: Vec<Pattern>,
    /// Callee patterns that cut taint (kill-only, `spec.md` §4.4).
    #[serde(default)]
    pub sanitizers: Vec<Pattern>,
    /// Free-form hint for scope biasing (e.g. `"web"`); not interpreted by
    /// the core, carried through to metadata.
    #[serde(default)]
    pub scope_hint: Option<String>,
    /// Rule metadata carried through to enrichment.
    #[serde(default)]
    pub metadata: RuleMetadata,
}

/// A container-configuration pattern rule (`spec.md` §3 "Pattern").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    /// Stable rule ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Severity.
    pub severity: Severity,
    /// Glob matched against a project-relative path to decide whether this
    /// rule applies to a given container file (`*Dockerfile*`,
    /// `docker-compose*.yml`).
    pub file_pattern: String,
    /// The matcher tree, evaluated recursively by `container::matcher`.
    pub matcher: Matcher,
    /// Rule metadata carried through to enrichment.
    #[serde(default)]
    pub metadata: RuleMetadata,
}

/// Metadata attached to both rule kinds, carried straight through to the
/// enriched detection's `rule` field (`spec.md` §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMetadata {
    /// Prose description of the issue.
    #[serde(default)]
    pub description: String,
    /// CWE identifiers (`"CWE-89"`, …).
    #[serde(default)]
    pub cwe: Vec<String>,
    /// OWASP category identifiers.
    #[serde(default)]
    pub owasp: Vec<String>,
    /// Reference URLs or doc titles.
    #[serde(default)]
    pub references: Vec<String>,
}

/// The container matcher sum type (`spec.md` §4.6), a closed tagged union
/// dispatched recursively; invalid/malformed shapes evaluate to "no match"
/// rather than raising (`spec.md` §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Matcher {
    /// Matches a Dockerfile instruction with optional field constraints.
    Instruction {
        /// Instruction kind, e.g. `"FROM"`, `"USER"`, `"RUN"`.
        kind: String,
        /// Exact `image:tag` match on a `FROM` instruction.
        #[serde(default)]
        image_tag: Option<String>,
        /// Exact match on a `USER` instruction's user name.
        #[serde(default)]
        user_name: Option<String>,
        /// Regex matched against an `ARG` instruction's name.
        #[serde(default)]
        arg_name_regex: Option<String>,
        /// Substring the instruction's raw text must contain.
        #[serde(default)]
        contains: Option<String>,
        /// Substring the instruction's raw text must NOT contain.
        #[serde(default)]
        not_contains: Option<String>,
        /// An `EXPOSE` port must be numerically less than this.
        #[serde(default)]
        port_less_than: Option<u32>,
        /// An `EXPOSE` port must be numerically greater than this.
        #[serde(default)]
        port_greater_than: Option<u32>,
        /// A `FROM` instruction's image reference carries no `@sha256:...`
        /// digest.
        #[serde(default)]
        missing_digest: Option<bool>,
        /// Exact match on a `FROM` instruction's base image (without tag).
        #[serde(default)]
        base_image: Option<String>,
    },
    /// Matches once, file-level, when no instruction of `kind` exists at
    /// all.
    MissingInstruction {
        /// Instruction kind that must be absent.
        kind: String,
    },
    /// Iterates compose services, matching each where `key` is present and,
    /// optionally, satisfies an equality/containment constraint.
    ServiceHas {
        /// Dotted key path within the service mapping.
        key: String,
        /// Exact value match.
        #[serde(default)]
        equals: Option<String>,
        /// Substring match against a scalar or sequence-joined value.
        #[serde(default)]
        contains: Option<String>,
        /// Matches if any of these substrings is contained.
        #[serde(default)]
        contains_any: Option<Vec<String>>,
    },
    /// Iterates compose services, matching each where `key` is absent.
    ServiceMissing {
        /// Dotted key path that must be absent.
        key: String,
    },
    /// Matches only when every child matcher matches; the reported line
    /// comes from the first child.
    AllOf {
        /// Child matchers, all of which must match.
        conditions: Vec<Matcher>,
    },
    /// The union of every child matcher's matches.
    AnyOf {
        /// Child matchers, any of which may match.
        conditions: Vec<Matcher>,
    },
    /// Each child match becomes a violation (i.e. this matcher's "source"
    /// condition normally should NOT match).
    NoneOf {
        /// Child matchers, each of whose matches becomes a violation.
        conditions: Vec<Matcher>,
    },
}

/// One loaded rule, discriminated by kind (`spec.md` §3 "Rule IR").
#[derive(Debug, Clone)]
pub enum RuleIr {
    /// A dataflow (taint) rule, executed by C4.
    Dataflow(DataflowRule),
    /// A container pattern rule, executed by C6.
    Pattern(PatternRule),
}

impl RuleIr {
    /// The rule's stable ID, regardless of kind.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Dataflow(r) => &r.id,
            Self::Pattern(r) => &r.id,
        }
    }

    /// The rule's human-readable name, regardless of kind.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Dataflow(r) => &r.name,
            Self::Pattern(r) => &r.name,
        }
    }

    /// The rule's severity, regardless of kind.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Dataflow(r) => r.severity,
            Self::Pattern(r) => r.severity,
        }
    }

    /// The rule's metadata, regardless of kind.
    #[must_use]
    pub fn metadata(&self) -> &RuleMetadata {
        match self {
            Self::Dataflow(r) => &r.metadata,
            Self::Pattern(r) => &r.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_prefix_suffix_and_exact() {
        assert!(pattern_matches("request.*", "request.args.get"));
        assert!(pattern_matches("*.execute", "cursor.execute"));
        assert!(pattern_matches("eval", "eval"));
        assert!(!pattern_matches("eval", "safe_eval"));
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("low"), Some(Severity::Low));
        assert_eq!(Severity::parse("nonsense"), None);
    }

    #[test]
    fn severity_rank_orders_critical_first() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::High.rank() < Severity::Medium.rank());
        assert!(Severity::Medium.rank() < Severity::Low.rank());
        assert!(Severity::Low.rank() < Severity::Info.rank());
    }
}
