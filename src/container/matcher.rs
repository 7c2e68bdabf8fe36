//! Container matcher evaluator (`spec.md` §4.6 "Matcher").
//!
//! Walks `rules::ir::Matcher`'s closed sum type recursively against one
//! [`DockerfileGraph`] and/or [`ComposeGraph`], producing a [`Match`] per hit
//! with the line it should be reported against. Grounded in the pack's own
//! container-rule matcher, `rsgbengi-valeris`'s `matches_matcher` dispatcher
//! in `src/detectors/dockerfile_scanner.rs`, adapted to this crate's richer
//! `Matcher` shape (which additionally covers Compose services, not just
//! Dockerfile instructions). Per `spec.md` §9, a matcher that references a
//! field irrelevant to its variant (e.g. `port_less_than` on a `USER`
//! instruction) simply never matches rather than erroring.

use crate::container::dockerfile::{DockerfileGraph, Instruction};
use crate::container::compose::ComposeGraph;
use crate::rules::ir::Matcher;
use regex::Regex;

/// One matcher hit: the 1-indexed line to report against, and (for compose
/// matchers) the service name involved.
#[derive(Debug, Clone)]
pub struct Match {
    /// Line the detection should be reported against.
    pub line: usize,
    /// Compose service name, when the match came from a service-level
    /// matcher; `None` for Dockerfile-instruction matchers.
    pub service: Option<String>,
}

/// Evaluates `matcher` against a Dockerfile graph, returning every hit.
#[must_use]
pub fn eval_dockerfile(matcher: &Matcher, graph: &DockerfileGraph) -> Vec<Match> {
    match matcher {
        Matcher::Instruction { kind, .. } => graph
            .instructions(kind)
            .into_iter()
            .filter(|instruction| instruction_matches(matcher, instruction))
            .map(|instruction| Match { line: instruction.line, service: None })
            .collect(),
        Matcher::MissingInstruction { kind } => {
            if graph.has(kind) {
                Vec::new()
            } else {
                vec![Match { line: graph.instructions.first().map_or(1, |i| i.line), service: None }]
            }
        }
        Matcher::AllOf { conditions } => {
            let per_condition: Vec<Vec<Match>> = conditions.iter().map(|c| eval_dockerfile(c, graph)).collect();
            if per_condition.iter().all(|matches| !matches.is_empty()) {
                per_condition.into_iter().next().unwrap_or_default()
            } else {
                Vec::new()
            }
        }
        Matcher::AnyOf { conditions } => conditions.iter().flat_map(|c| eval_dockerfile(c, graph)).collect(),
        Matcher::NoneOf { conditions } => conditions.iter().flat_map(|c| eval_dockerfile(c, graph)).collect(),
        // Compose-only matcher variants never match a Dockerfile graph.
        Matcher::ServiceHas { .. } | Matcher::ServiceMissing { .. } => Vec::new(),
    }
}

/// Evaluates `matcher` against a Compose graph, returning every hit.
#[must_use]
pub fn eval_compose(matcher: &Matcher, graph: &ComposeGraph) -> Vec<Match> {
    match matcher {
        Matcher::ServiceHas { key, equals, contains, contains_any } => graph
            .services
            .keys()
            .filter(|service| service_has_matches(graph, service, key, equals.as_deref(), contains.as_deref(), contains_any.as_deref()))
            .map(|service| Match {
                line: graph.service_line(service, Some(key)).unwrap_or(1) as usize,
                service: Some(service.clone()),
            })
            .collect(),
        Matcher::ServiceMissing { key } => graph
            .services
            .keys()
            .filter(|service| graph.service_missing(service, key))
            .map(|service| Match {
                line: graph.service_line(service, None).unwrap_or(1) as usize,
                service: Some(service.clone()),
            })
            .collect(),
        Matcher::AllOf { conditions } => {
            let per_condition: Vec<Vec<Match>> = conditions.iter().map(|c| eval_compose(c, graph)).collect();
            if per_condition.iter().all(|matches| !matches.is_empty()) {
                per_condition.into_iter().next().unwrap_or_default()
            } else {
                Vec::new()
            }
        }
        Matcher::AnyOf { conditions } => conditions.iter().flat_map(|c| eval_compose(c, graph)).collect(),
        Matcher::NoneOf { conditions } => conditions.iter().flat_map(|c| eval_compose(c, graph)).collect(),
        // Dockerfile-only matcher variants never match a Compose graph.
        Matcher::Instruction { .. } | Matcher::MissingInstruction { .. } => Vec::new(),
    }
}

fn service_has_matches(
    graph: &ComposeGraph,
    service: &str,
    key: &str,
    equals: Option<&str>,
    contains: Option<&str>,
    contains_any: Option<&[String]>,
) -> bool {
    if !graph.service_has(service, key, equals) {
        return false;
    }
    if let Some(needle) = contains {
        let Some(value) = graph.service_get(service, key) else { return false };
        if !value.contains(needle) {
            return false;
        }
    }
    if let Some(needles) = contains_any {
        let Some(value) = graph.service_get(service, key) else { return false };
        if !needles.iter().any(|n| value.contains(n.as_str())) {
            return false;
        }
    }
    true
}

#[allow(clippy::too_many_lines)]
fn instruction_matches(matcher: &Matcher, instruction: &Instruction) -> bool {
    let Matcher::Instruction {
        kind,
        image_tag,
        user_name,
        arg_name_regex,
        contains,
        not_contains,
        port_less_than,
        port_greater_than,
        missing_digest,
        base_image,
    } = matcher
    else {
        return false;
    };

    if !instruction.kind.eq_ignore_ascii_case(kind) {
        return false;
    }

    if let Some(expected) = image_tag {
        let actual = match (&instruction.fields.base_image, &instruction.fields.tag) {
            (Some(base), Some(tag)) => format!("{base}:{tag}"),
            (Some(base), None) => base.clone(),
            _ => return false,
        };
        if &actual != expected {
            return false;
        }
    }

    if let Some(expected) = base_image {
        if instruction.fields.base_image.as_deref() != Some(expected.as_str()) {
            return false;
        }
    }

    if let Some(expected) = user_name {
        if instruction.fields.user_name.as_deref() != Some(expected.as_str()) {
            return false;
        }
    }

    if let Some(pattern) = arg_name_regex {
        let Some(arg_name) = &instruction.fields.arg_name else { return false };
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(arg_name) {
                    return false;
                }
            }
            // An invalid regex in a malformed rule never matches, per
            // `spec.md` §9, rather than aborting the whole scan.
            Err(_) => return false,
        }
    }

    if let Some(needle) = contains {
        if !instruction.raw_text.contains(needle.as_str()) {
            return false;
        }
    }

    if let Some(needle) = not_contains {
        if instruction.raw_text.contains(needle.as_str()) {
            return false;
        }
    }

    if let Some(bound) = port_less_than {
        if !instruction.fields.ports.iter().any(|p| p < bound) {
            return false;
        }
    }

    if let Some(bound) = port_greater_than {
        if !instruction.fields.ports.iter().any(|p| p > bound) {
            return false;
        }
    }

    if let Some(true) = missing_digest {
        if instruction.fields.digest.is_some() {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::dockerfile::DockerfileGraph;
    use std::path::Path;

    #[test]
    fn missing_instruction_matches_when_absent() {
        let graph = DockerfileGraph::parse(Path::new("Dockerfile"), "FROM ubuntu:latest\n").unwrap();
        let matcher = Matcher::MissingInstruction { kind: "USER".to_owned() };
        let hits = eval_dockerfile(&matcher, &graph);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn all_of_requires_every_child_to_match() {
        let graph = DockerfileGraph::parse(Path::new("Dockerfile"), "FROM ubuntu:latest\n").unwrap();
        let matcher = Matcher::AllOf {
            conditions: vec![
                Matcher::Instruction {
                    kind: "FROM".to_owned(),
                    image_tag: Some("ubuntu:latest".to_owned()),
                    user_name: None,
                    arg_name_regex: None,
                    contains: None,
                    not_contains: None,
                    port_less_than: None,
                    port_greater_than: None,
                    missing_digest: None,
                    base_image: None,
                },
                Matcher::MissingInstruction { kind: "USER".to_owned() },
            ],
        };
        assert_eq!(eval_dockerfile(&matcher, &graph).len(), 1);
    }

    #[test]
    fn all_of_fails_when_one_child_fails() {
        let graph = DockerfileGraph::parse(
            Path::new("Dockerfile"),
            "FROM ubuntu:latest\nUSER appuser\n",
        )
        .unwrap();
        let matcher = Matcher::AllOf {
            conditions: vec![
                Matcher::Instruction {
                    kind: "FROM".to_owned(),
                    image_tag: Some("ubuntu:latest".to_owned()),
                    user_name: None,
                    arg_name_regex: None,
                    contains: None,
                    not_contains: None,
                    port_less_than: None,
                    port_greater_than: None,
                    missing_digest: None,
                    base_image: None,
                },
                Matcher::MissingInstruction { kind: "USER".to_owned() },
            ],
        };
        assert!(eval_dockerfile(&matcher, &graph).is_empty());
    }

    #[test]
    fn invalid_regex_never_matches() {
        let graph = DockerfileGraph::parse(Path::new("Dockerfile"), "FROM scratch\nARG token\n").unwrap();
        let matcher = Matcher::Instruction {
            kind: "ARG".to_owned(),
            image_tag: None,
            user_name: None,
            arg_name_regex: Some("(".to_owned()),
            contains: None,
            not_contains: None,
            port_less_than: None,
            port_greater_than: None,
            missing_digest: None,
            base_image: None,
        };
        assert!(eval_dockerfile(&matcher, &graph).is_empty());
    }

    #[test]
    fn service_has_privileged_true_matches() {
        let graph = ComposeGraph::parse(
            Path::new("docker-compose.yml"),
            "services:\n  web:\n    privileged: true\n",
        )
        .unwrap();
        let matcher = Matcher::ServiceHas {
            key: "privileged".to_owned(),
            equals: Some("true".to_owned()),
            contains: None,
            contains_any: None,
        };
        let hits = eval_compose(&matcher, &graph);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].service.as_deref(), Some("web"));
    }
}
