//! Compose YAML container graph (`spec.md` §4.6 "Compose graph").
//!
//! Grounded in `syncable-dev-syncable-cli`'s `analyzer/dclint/parser/{mod,
//! compose}.rs`: `yaml-rust2`'s `YamlLoader` gives a position-free document,
//! so line numbers are recovered separately with a textual indentation-aware
//! scan (`find_line_for_key`), carried over here essentially verbatim since
//! that teacher-adjacent code already solves exactly this problem.

use crate::error::PathfinderError;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use yaml_rust2::{Yaml, YamlLoader};

/// One service's raw mapping, kept as `Yaml` so `ServiceHas`/`ServiceMissing`
/// matchers can walk arbitrary dotted key paths without this module having
/// to model every Compose key up front (`spec.md` §4.6 is explicit that the
/// matcher, not the graph, owns interpretation of service keys).
#[derive(Debug, Clone)]
pub struct Service {
    /// The service's name.
    pub name: String,
    /// The service's mapping, as parsed YAML.
    pub body: Yaml,
}

/// The full Compose YAML graph (`spec.md` §3, §4.6).
#[derive(Debug, Clone)]
pub struct ComposeGraph {
    /// Path to the compose file this graph was built from.
    pub file: PathBuf,
    /// Raw source text, kept for line-number recovery.
    source: String,
    /// Every declared service, keyed by name.
    pub services: FxHashMap<String, Service>,
}

impl ComposeGraph {
    /// Parses `content` (a compose file's raw text) into a graph.
    ///
    /// # Errors
    ///
    /// Returns [`PathfinderError::Parse`] if the content is not valid YAML,
    /// or has no top-level `services` mapping.
    pub fn parse(file: &Path, content: &str) -> Result<Self, PathfinderError> {
        let docs = YamlLoader::load_from_str(content).map_err(|e| PathfinderError::Parse {
            path: file.to_path_buf(),
            message: e.to_string(),
        })?;
        let doc = docs.into_iter().next().ok_or_else(|| PathfinderError::Parse {
            path: file.to_path_buf(),
            message: "empty YAML document".to_owned(),
        })?;

        let services_yaml = doc["services"].clone();
        let Yaml::Hash(map) = &services_yaml else {
            return Err(PathfinderError::Parse {
                path: file.to_path_buf(),
                message: "no top-level `services` mapping".to_owned(),
            });
        };

        let mut services = FxHashMap::default();
        for (key, value) in map {
            let Some(name) = key.as_str() else { continue };
            services.insert(
                name.to_owned(),
                Service {
                    name: name.to_owned(),
                    body: value.clone(),
                },
            );
        }

        Ok(Self {
            file: file.to_path_buf(),
            source: content.to_owned(),
            services,
        })
    }

    /// Whether `service` declares `key` (optionally, equal to `equals`).
    #[must_use]
    pub fn service_has(&self, service: &str, key: &str, equals: Option<&str>) -> bool {
        let Some(svc) = self.services.get(service) else { return false };
        let Some(value) = lookup_dotted(&svc.body, key) else { return false };
        match equals {
            Some(expected) => scalar_text(value).as_deref() == Some(expected),
            None => !matches!(value, Yaml::BadValue | Yaml::Null),
        }
    }

    /// Whether `service` lacks `key` entirely.
    #[must_use]
    pub fn service_missing(&self, service: &str, key: &str) -> bool {
        !self.service_has(service, key, None)
    }

    /// Fetches `service`'s value at the dotted key path `key`, rendered as
    /// text for substring matching.
    #[must_use]
    pub fn service_get(&self, service: &str, key: &str) -> Option<String> {
        let svc = self.services.get(service)?;
        let value = lookup_dotted(&svc.body, key)?;
        render_text(value)
    }

    /// Finds the 1-indexed source line for `service`, or for `key` within
    /// it when given.
    #[must_use]
    pub fn service_line(&self, service: &str, key: Option<&str>) -> Option<u32> {
        match key {
            Some(key) => find_line_for_key(&self.source, &["services", service, key]),
            None => find_line_for_key(&self.source, &["services", service]),
        }
    }
}

/// Looks up a dot-separated key path (`"deploy.resources.limits.cpus"`)
/// within a YAML mapping.
fn lookup_dotted<'a>(root: &'a Yaml, path: &str) -> Option<&'a Yaml> {
    let mut current = root;
    for segment in path.split('.') {
        current = &current[segment];
        if matches!(current, Yaml::BadValue) {
            return None;
        }
    }
    Some(current)
}

fn scalar_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Boolean(b) => Some(b.to_string()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Real(r) => Some(r.clone()),
        _ => None,
    }
}

/// Renders a scalar or a sequence-of-scalars as joined text, for substring
/// matchers (`ServiceHas { contains }`) against list-valued keys like
/// `cap_add`.
fn render_text(value: &Yaml) -> Option<String> {
    if let Some(s) = scalar_text(value) {
        return Some(s);
    }
    if let Yaml::Array(items) = value {
        let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
        if parts.is_empty() {
            return None;
        }
        return Some(parts.join(","));
    }
    None
}

/// Textual indentation-aware line finder for a dotted YAML path, grounded
/// directly in the teacher-adjacent `dclint/parser/mod.rs::find_line_for_key`.
fn find_line_for_key(source: &str, path: &[&str]) -> Option<u32> {
    if path.is_empty() {
        return Some(1);
    }

    let lines: Vec<&str> = source.lines().collect();
    let mut current_indent = 0;
    let mut path_idx = 0;

    for (line_num, line) in lines.iter().enumerate() {
        if line.trim().is_empty() || line.trim().starts_with('#') {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim();

        let target_key = path[path_idx];
        let key_pattern = format!("{target_key}:");

        if trimmed.starts_with(&key_pattern) || trimmed == target_key {
            if path_idx == 0 || indent > current_indent {
                path_idx += 1;
                current_indent = indent;

                if path_idx == path.len() {
                    return Some((line_num + 1) as u32);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
    privileged: true
  db:
    image: postgres:16
    cap_add:
      - SYS_ADMIN
"#;

    #[test]
    fn parses_services_and_finds_line() {
        let graph = ComposeGraph::parse(Path::new("docker-compose.yml"), COMPOSE).unwrap();
        assert_eq!(graph.services.len(), 2);
        assert_eq!(graph.service_line("web", None), Some(3));
        assert_eq!(graph.service_line("db", Some("image")), Some(9));
    }

    #[test]
    fn service_has_detects_privileged_true() {
        let graph = ComposeGraph::parse(Path::new("docker-compose.yml"), COMPOSE).unwrap();
        assert!(graph.service_has("web", "privileged", Some("true")));
        assert!(!graph.service_has("db", "privileged", Some("true")));
    }

    #[test]
    fn service_missing_detects_absent_key() {
        let graph = ComposeGraph::parse(Path::new("docker-compose.yml"), COMPOSE).unwrap();
        assert!(graph.service_missing("db", "privileged"));
        assert!(!graph.service_missing("web", "privileged"));
    }

    #[test]
    fn service_get_renders_list_as_joined_text() {
        let graph = ComposeGraph::parse(Path::new("docker-compose.yml"), COMPOSE).unwrap();
        assert_eq!(graph.service_get("db", "cap_add").as_deref(), Some("SYS_ADMIN"));
    }

    #[test]
    fn missing_services_key_is_a_parse_error() {
        let result = ComposeGraph::parse(Path::new("docker-compose.yml"), "version: '3'\n");
        assert!(result.is_err());
    }
}
