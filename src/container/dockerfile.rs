//! Dockerfile container graph (`spec.md` §4.6 "Dockerfile graph").
//!
//! Grounded two ways: `dockerfile-parser` (already a teacher-adjacent
//! dependency choice, used the same way the pack's
//! `rsgbengi-valeris` Dockerfile scanner does — as a validity-checking AST
//! producer per `spec.md` §1's framing of grammars as external collaborators)
//! validates that the file is a well-formed Dockerfile before this module
//! walks it; the line-continuation-aware instruction splitter and
//! per-instruction field extraction is grounded in
//! `syncable-dev-syncable-cli`'s `analyzer/hadolint/parser/dockerfile.rs`,
//! adapted to this spec's typed per-kind field shape instead of that
//! teacher's own instruction enum.

use crate::error::PathfinderError;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// One instruction's kind-specific parsed fields (`spec.md` §4.6).
#[derive(Debug, Clone, Default)]
pub struct InstructionFields {
    /// `FROM`: base image name, without tag/digest.
    pub base_image: Option<String>,
    /// `FROM`: the `:tag` suffix, if any.
    pub tag: Option<String>,
    /// `FROM`: the `@sha256:...` digest, if any.
    pub digest: Option<String>,
    /// `FROM ... AS alias`: the stage alias.
    pub stage_alias: Option<String>,
    /// `USER`: the user name/uid.
    pub user_name: Option<String>,
    /// `USER user:group`: the group name/gid.
    pub group_name: Option<String>,
    /// `EXPOSE`: every port number listed.
    pub ports: Vec<u32>,
    /// `EXPOSE port/protocol`: the protocol, if not the default `tcp`.
    pub protocol: Option<String>,
    /// `ENV`/`LABEL`: key-value pairs declared on this instruction.
    pub env: FxHashMap<String, String>,
    /// `ARG`: the declared name.
    pub arg_name: Option<String>,
    /// `ARG name=default`: the default value, if any.
    pub arg_default: Option<String>,
    /// `COPY`/`ADD`: source paths.
    pub copy_sources: Vec<String>,
    /// `COPY`/`ADD`: destination path.
    pub copy_destination: Option<String>,
    /// `COPY --from=...`.
    pub copy_from: Option<String>,
    /// `COPY --chown=...`.
    pub copy_chown: Option<String>,
    /// `RUN`/`CMD`/`ENTRYPOINT`: shell form (`RUN cmd ...`) or exec form
    /// (`RUN ["cmd", "..."]`).
    pub command_form: Option<CommandForm>,
    /// `VOLUME`: declared mount points.
    pub volumes: Vec<String>,
    /// `LABEL`: declared labels (shares storage with `env` for simplicity,
    /// since both are key=value pairs; kept as a separate accessor name for
    /// callers matching on instruction kind).
    pub labels: FxHashMap<String, String>,
    /// `HEALTHCHECK`: parsed `--interval=`/`--timeout=`/`--retries=` flags
    /// plus the check command, if not `NONE`.
    pub healthcheck: Option<Healthcheck>,
    /// `STOPSIGNAL`.
    pub stop_signal: Option<String>,
    /// `ONBUILD`: the nested instruction's raw text.
    pub onbuild_instruction: Option<String>,
}

/// A command's invocation form (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandForm {
    /// `RUN apt-get update && apt-get install -y curl`.
    Shell,
    /// `RUN ["apt-get", "update"]`.
    Exec,
}

/// `HEALTHCHECK` sub-fields.
#[derive(Debug, Clone, Default)]
pub struct Healthcheck {
    /// `--interval=`.
    pub interval: Option<String>,
    /// `--timeout=`.
    pub timeout: Option<String>,
    /// `--retries=`.
    pub retries: Option<u32>,
    /// The check command, absent for `HEALTHCHECK NONE`.
    pub command: Option<String>,
}

/// One Dockerfile instruction (`spec.md` §3 "Container graph").
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Upper-cased instruction kind: `FROM`, `RUN`, `USER`, …
    pub kind: String,
    /// 1-indexed source line the instruction starts on.
    pub line: usize,
    /// Raw instruction text, continuation lines joined.
    pub raw_text: String,
    /// Parsed `--flag=value` pairs preceding the instruction's arguments.
    pub flags: FxHashMap<String, String>,
    /// Kind-specific parsed fields.
    pub fields: InstructionFields,
}

/// A build stage, split on `FROM` (`spec.md` §4.6 "Build stages").
#[derive(Debug, Clone)]
pub struct Stage {
    /// `FROM ... AS <alias>`, if present.
    pub alias: Option<String>,
    /// The stage's base image (without tag/digest).
    pub base_image: String,
    /// The base image's tag, if any.
    pub tag: Option<String>,
    /// 1-indexed line the stage's `FROM` instruction occupies.
    pub start_line: usize,
    /// 1-indexed line the stage's last instruction occupies.
    pub end_line: usize,
    /// Every instruction belonging to this stage, in source order.
    pub instructions: Vec<Instruction>,
}

/// The full Dockerfile instruction graph (`spec.md` §3, §4.6).
#[derive(Debug, Clone)]
pub struct DockerfileGraph {
    /// Path to the Dockerfile this graph was built from.
    pub file: PathBuf,
    /// Every instruction, in source order (`spec.md` §3 invariant:
    /// "instructions preserve source order").
    pub instructions: Vec<Instruction>,
    /// Index by instruction kind, for `has`/`instructions` queries.
    by_kind: FxHashMap<String, Vec<usize>>,
    /// Build stages inferred by splitting on `FROM`.
    pub stages: Vec<Stage>,
}

impl DockerfileGraph {
    /// Parses `content` (the Dockerfile's raw text) into a graph.
    ///
    /// # Errors
    ///
    /// Returns [`PathfinderError::Parse`] if `dockerfile_parser` rejects the
    /// file as malformed (`spec.md` §4.6 is otherwise tolerant of unknown
    /// instructions, folding them into a `Misc`-equivalent raw instruction).
    pub fn parse(file: &Path, content: &str) -> Result<Self, PathfinderError> {
        dockerfile_parser::Dockerfile::parse(content).map_err(|e| PathfinderError::Parse {
            path: file.to_path_buf(),
            message: format!("{e:?}"),
        })?;

        let instructions = split_instructions(content);
        let by_kind = index_by_kind(&instructions);
        let stages = split_stages(&instructions);

        Ok(Self {
            file: file.to_path_buf(),
            instructions,
            by_kind,
            stages,
        })
    }

    /// Whether any instruction of `kind` is present.
    #[must_use]
    pub fn has(&self, kind: &str) -> bool {
        self.by_kind.contains_key(&kind.to_ascii_uppercase())
    }

    /// Every instruction of `kind`, in source order.
    #[must_use]
    pub fn instructions(&self, kind: &str) -> Vec<&Instruction> {
        self.by_kind
            .get(&kind.to_ascii_uppercase())
            .into_iter()
            .flatten()
            .map(|&i| &self.instructions[i])
            .collect()
    }

    /// The last `USER` instruction's user name across the whole file, if
    /// any (the effective runtime user absent a later stage reset).
    #[must_use]
    pub fn final_user(&self) -> Option<&str> {
        self.instructions("USER")
            .last()
            .and_then(|i| i.fields.user_name.as_deref())
    }

    /// Whether the image runs as root: no `USER` instruction at all, or the
    /// last one names `root`/uid `0`.
    #[must_use]
    pub fn is_running_as_root(&self) -> bool {
        match self.final_user() {
            None => true,
            Some(user) => user == "root" || user == "0",
        }
    }

    /// Looks up a stage by its `AS <alias>` name.
    #[must_use]
    pub fn stage_by_alias(&self, alias: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.alias.as_deref() == Some(alias))
    }
}

fn index_by_kind(instructions: &[Instruction]) -> FxHashMap<String, Vec<usize>> {
    let mut map: FxHashMap<String, Vec<usize>> = FxHashMap::default();
    for (i, instruction) in instructions.iter().enumerate() {
        map.entry(instruction.kind.clone()).or_default().push(i);
    }
    map
}

fn split_stages(instructions: &[Instruction]) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut current: Option<Stage> = None;

    for instruction in instructions {
        if instruction.kind == "FROM" {
            if let Some(stage) = current.take() {
                stages.push(stage);
            }
            current = Some(Stage {
                alias: instruction.fields.stage_alias.clone(),
                base_image: instruction.fields.base_image.clone().unwrap_or_default(),
                tag: instruction.fields.tag.clone(),
                start_line: instruction.line,
                end_line: instruction.line,
                instructions: vec![instruction.clone()],
            });
        } else if let Some(stage) = current.as_mut() {
            stage.end_line = instruction.line;
            stage.instructions.push(instruction.clone());
        }
    }

    if let Some(stage) = current.take() {
        stages.push(stage);
    }

    stages
}

/// Splits raw Dockerfile content into instructions, merging `\`-terminated
/// continuation lines (grounded in the teacher's line-by-line continuation
/// merge in `hadolint/parser/dockerfile.rs::parse_dockerfile`).
fn split_instructions(content: &str) -> Vec<Instruction> {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let start_line = i + 1;
        let mut combined = String::new();
        let mut raw = String::new();

        loop {
            let line = lines.get(i).copied().unwrap_or("");
            if !raw.is_empty() {
                raw.push('\n');
            }
            raw.push_str(line);
            let trimmed = line.trim_end();
            i += 1;
            if let Some(stripped) = trimmed.strip_suffix('\\') {
                combined.push_str(stripped.trim_end());
                combined.push(' ');
                if i >= lines.len() {
                    break;
                }
            } else {
                combined.push_str(trimmed);
                break;
            }
        }

        let trimmed = combined.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(instruction) = parse_instruction(trimmed, start_line, raw.trim_end().to_owned()) {
            out.push(instruction);
        }
    }

    out
}

fn parse_instruction(text: &str, line: usize, raw_text: String) -> Option<Instruction> {
    let mut parts = text.splitn(2, char::is_whitespace);
    let kind = parts.next()?.to_ascii_uppercase();
    let rest = parts.next().unwrap_or("").trim();

    let (flags, rest) = extract_flags(rest);
    let fields = match kind.as_str() {
        "FROM" => parse_from(rest),
        "USER" => parse_user(rest),
        "EXPOSE" => parse_expose(rest),
        "ENV" => InstructionFields {
            env: parse_key_values(rest),
            ..Default::default()
        },
        "LABEL" => InstructionFields {
            labels: parse_key_values(rest),
            ..Default::default()
        },
        "ARG" => parse_arg(rest),
        "COPY" | "ADD" => parse_copy(rest, &flags),
        "RUN" | "CMD" | "ENTRYPOINT" => InstructionFields {
            command_form: Some(command_form(rest)),
            ..Default::default()
        },
        "VOLUME" => InstructionFields {
            volumes: split_list(rest),
            ..Default::default()
        },
        "HEALTHCHECK" => parse_healthcheck(rest, &flags),
        "STOPSIGNAL" => InstructionFields {
            stop_signal: Some(rest.to_owned()),
            ..Default::default()
        },
        "ONBUILD" => InstructionFields {
            onbuild_instruction: Some(rest.to_owned()),
            ..Default::default()
        },
        _ => InstructionFields::default(),
    };

    Some(Instruction {
        kind,
        line,
        raw_text,
        flags,
        fields,
    })
}

/// Splits leading `--flag=value` tokens off an instruction's argument text.
fn extract_flags(rest: &str) -> (FxHashMap<String, String>, &str) {
    let mut flags = FxHashMap::default();
    let mut remainder = rest;
    loop {
        let trimmed = remainder.trim_start();
        if !trimmed.starts_with("--") {
            remainder = trimmed;
            break;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (token, rest_of_line) = trimmed.split_at(end);
        let token = &token[2..];
        if let Some((k, v)) = token.split_once('=') {
            flags.insert(k.to_owned(), v.trim_matches('"').to_owned());
        } else {
            flags.insert(token.to_owned(), String::new());
        }
        remainder = rest_of_line;
    }
    (flags, remainder)
}

fn parse_from(rest: &str) -> InstructionFields {
    let mut tokens = rest.split_whitespace();
    let image_ref = tokens.next().unwrap_or_default();
    let mut stage_alias = None;
    if let Some(as_kw) = tokens.next() {
        if as_kw.eq_ignore_ascii_case("as") {
            stage_alias = tokens.next().map(str::to_owned);
        }
    }

    let (image_and_tag, digest) = match image_ref.split_once('@') {
        Some((base, digest)) => (base, Some(digest.to_owned())),
        None => (image_ref, None),
    };
    let (base_image, tag) = match image_and_tag.rsplit_once(':') {
        // A colon before the final `/` is a registry port, not a tag.
        Some((base, tag)) if !tag.contains('/') => (base.to_owned(), Some(tag.to_owned())),
        _ => (image_and_tag.to_owned(), None),
    };

    InstructionFields {
        base_image: Some(base_image),
        tag,
        digest,
        stage_alias,
        ..Default::default()
    }
}

fn parse_user(rest: &str) -> InstructionFields {
    let (user, group) = match rest.split_once(':') {
        Some((u, g)) => (u.to_owned(), Some(g.to_owned())),
        None => (rest.to_owned(), None),
    };
    InstructionFields {
        user_name: Some(user),
        group_name: group,
        ..Default::default()
    }
}

fn parse_expose(rest: &str) -> InstructionFields {
    let mut ports = Vec::new();
    let mut protocol = None;
    for token in rest.split_whitespace() {
        let (port_part, proto) = match token.split_once('/') {
            Some((p, proto)) => (p, Some(proto.to_owned())),
            None => (token, None),
        };
        if let Ok(port) = port_part.parse::<u32>() {
            ports.push(port);
        }
        if proto.is_some() {
            protocol = proto;
        }
    }
    InstructionFields {
        ports,
        protocol,
        ..Default::default()
    }
}

fn parse_arg(rest: &str) -> InstructionFields {
    match rest.split_once('=') {
        Some((name, default)) => InstructionFields {
            arg_name: Some(name.trim().to_owned()),
            arg_default: Some(default.trim().trim_matches('"').to_owned()),
            ..Default::default()
        },
        None => InstructionFields {
            arg_name: Some(rest.trim().to_owned()),
            ..Default::default()
        },
    }
}

fn parse_copy(rest: &str, flags: &FxHashMap<String, String>) -> InstructionFields {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let (sources, destination) = match tokens.split_last() {
        Some((dest, sources)) => (
            sources.iter().map(|s| (*s).to_owned()).collect(),
            Some((*dest).to_owned()),
        ),
        None => (Vec::new(), None),
    };
    InstructionFields {
        copy_sources: sources,
        copy_destination: destination,
        copy_from: flags.get("from").cloned(),
        copy_chown: flags.get("chown").cloned(),
        ..Default::default()
    }
}

fn parse_healthcheck(rest: &str, flags: &FxHashMap<String, String>) -> InstructionFields {
    if rest.trim().eq_ignore_ascii_case("NONE") {
        return InstructionFields {
            healthcheck: Some(Healthcheck::default()),
            ..Default::default()
        };
    }
    let command = rest.strip_prefix("CMD").map(|s| s.trim().to_owned());
    InstructionFields {
        healthcheck: Some(Healthcheck {
            interval: flags.get("interval").cloned(),
            timeout: flags.get("timeout").cloned(),
            retries: flags.get("retries").and_then(|r| r.parse().ok()),
            command: command.or_else(|| Some(rest.trim().to_owned())).filter(|s| !s.is_empty()),
        }),
        ..Default::default()
    }
}

fn command_form(rest: &str) -> CommandForm {
    if rest.trim_start().starts_with('[') {
        CommandForm::Exec
    } else {
        CommandForm::Shell
    }
}

fn parse_key_values(rest: &str) -> FxHashMap<String, String> {
    let mut out = FxHashMap::default();
    // Supports both `ENV k=v k2=v2` and the legacy `ENV k v` single-pair form.
    if !rest.contains('=') {
        if let Some((k, v)) = rest.split_once(char::is_whitespace) {
            out.insert(k.trim().to_owned(), v.trim().trim_matches('"').to_owned());
        }
        return out;
    }
    for token in split_key_value_tokens(rest) {
        if let Some((k, v)) = token.split_once('=') {
            out.insert(k.trim().to_owned(), v.trim().trim_matches('"').to_owned());
        }
    }
    out
}

/// Splits `k1=v1 k2="v with spaces" k3=v3` into individual `k=v` tokens,
/// respecting double-quoted values that may contain whitespace.
fn split_key_value_tokens(rest: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in rest.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn split_list(rest: &str) -> Vec<String> {
    rest.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_from_with_tag_and_alias() {
        let graph = DockerfileGraph::parse(Path::new("Dockerfile"), "FROM ubuntu:20.04 AS build\n").unwrap();
        let from = &graph.instructions("FROM")[0];
        assert_eq!(from.fields.base_image.as_deref(), Some("ubuntu"));
        assert_eq!(from.fields.tag.as_deref(), Some("20.04"));
        assert_eq!(from.fields.stage_alias.as_deref(), Some("build"));
    }

    #[test]
    fn missing_user_reports_running_as_root() {
        let graph = DockerfileGraph::parse(Path::new("Dockerfile"), "FROM ubuntu:latest\n").unwrap();
        assert!(!graph.has("USER"));
        assert!(graph.is_running_as_root());
    }

    #[test]
    fn explicit_non_root_user_detected() {
        let graph = DockerfileGraph::parse(
            Path::new("Dockerfile"),
            "FROM ubuntu:latest\nUSER appuser:appgroup\n",
        )
        .unwrap();
        assert!(!graph.is_running_as_root());
        assert_eq!(graph.final_user(), Some("appuser"));
    }

    #[test]
    fn stages_split_on_from() {
        let graph = DockerfileGraph::parse(
            Path::new("Dockerfile"),
            "FROM golang:1.22 AS build\nRUN go build\nFROM alpine\nCOPY --from=build /app /app\n",
        )
        .unwrap();
        assert_eq!(graph.stages.len(), 2);
        assert_eq!(graph.stages[0].alias.as_deref(), Some("build"));
        assert!(graph.stage_by_alias("build").is_some());
    }

    #[test]
    fn line_continuation_merges_into_one_instruction() {
        let graph =
            DockerfileGraph::parse(Path::new("Dockerfile"), "RUN apt-get update && \\\n    apt-get install -y curl\n")
                .unwrap();
        assert_eq!(graph.instructions.len(), 1);
        assert!(graph.instructions[0].raw_text.contains("apt-get install"));
    }

    #[test]
    fn expose_parses_port_and_protocol() {
        let graph = DockerfileGraph::parse(Path::new("Dockerfile"), "FROM scratch\nEXPOSE 8080/udp\n").unwrap();
        let expose = &graph.instructions("EXPOSE")[0];
        assert_eq!(expose.fields.ports, vec![8080]);
        assert_eq!(expose.fields.protocol.as_deref(), Some("udp"));
    }

    #[test]
    fn malformed_dockerfile_is_a_parse_error() {
        let result = DockerfileGraph::parse(Path::new("Dockerfile"), "");
        // An empty file has no FROM instruction, which `dockerfile_parser`
        // rejects; the graph build must surface that as a typed error, not
        // abort the whole scan (`spec.md` §7).
        assert!(result.is_err());
    }
}
