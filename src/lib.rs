//! Core library for `code-pathfinder`, a static-analysis engine for Python.
//!
//! Parses a project into an AST-backed source graph, resolves an
//! inter-procedural call graph, runs taint-propagation and container rules
//! against it, and enriches the results into ready-to-render findings. The
//! CLI binary (`src/main.rs`) is a thin wrapper: this crate never writes to
//! stdout or installs a `tracing` subscriber on its own, so it stays usable
//! as a library.

#![allow(
    clippy::type_complexity,
    clippy::too_many_arguments,
    clippy::ptr_arg,
    clippy::similar_names,
    clippy::format_push_string,
    clippy::map_unwrap_or,
    clippy::items_after_statements
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Typed error vocabulary shared across the scan pipeline.
pub mod error;

/// Source graph builder: walks the project and parses every recognized
/// file into an AST (C1).
pub mod source;

/// Maps source files to logical module paths for call-graph resolution
/// (C2).
pub mod module_registry;

/// Call-graph builder: five-pass resolution from declarations to edges
/// (C3).
pub mod callgraph;

/// Taint-propagation engine: intra- and inter-procedural dataflow from
/// sources to sinks (C4).
pub mod taint;

/// Rule IR, YAML loader, and rule executor (C5, dispatches to C4/C6).
pub mod rules;

/// Dockerfile/Compose container-configuration graph and pattern matcher
/// (C6).
pub mod container;

/// Enriches raw detections with source snippets, project-relative paths,
/// dedup, ordering, and diff filtering (C7).
pub mod enrich;

/// VCS change providers and GitHub PR comment managers (C9).
pub mod vcs;

/// Remote ruleset resolver: spec parsing, TTL cache, verified download,
/// materialization (C8).
pub mod remote;

/// Colored/JSON/SARIF/CSV output formatters.
pub mod output;

/// Configuration file loading (`.pathfinder.toml`, `pyproject.toml`
/// fallback).
pub mod config;

/// Shared constants and regex patterns (default exclusions, test/framework
/// file detection).
pub mod constants;

/// Shared path/line-index utilities.
pub mod utils;

/// CLI argument definitions (`clap`).
pub mod cli;

/// Command handlers wiring C1-C9 together for each subcommand.
pub mod commands;
