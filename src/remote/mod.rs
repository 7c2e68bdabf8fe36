//! Remote ruleset resolver (C8, `spec.md` §4.8).
//!
//! [`spec`] parses the `--ruleset` grammar, [`manifest`] fetches and
//! deserializes a category's manifest, [`cache`] implements the on-disk TTL
//! cache (`spec.md` §3 "Remote ruleset cache entry"), [`download`] performs
//! the retrying, checksum-verified, zip-slip-safe fetch-and-extract, and
//! [`resolver`] ties all four together: parsing specs, expanding
//! `category/all`, resolving individual rule IDs, and materializing every
//! resolved source into one combined directory for the rule loader (C5).

/// On-disk TTL cache for extracted bundles.
pub mod cache;
/// Retrying, verified, zip-slip-safe bundle download.
pub mod download;
/// Category manifest model and fetch.
pub mod manifest;
/// Orchestrates spec parsing, download, rule-ID lookup, materialization.
pub mod resolver;
/// `--ruleset` spec grammar.
pub mod spec;

pub use manifest::{BundleInfo, Manifest};
pub use resolver::{RulesetResolver, DEFAULT_RULESET_BASE_URL};
pub use spec::RulesetSpec;
