//! Ruleset spec grammar (`spec.md` §4.8): `category/bundle`, `category/all`,
//! or `language/RULE-ID`.

use regex::Regex;
use std::sync::OnceLock;

fn rule_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"^[A-Z]+(-[A-Z]+)?-\d+$").expect("invalid rule id regex pattern"))
}

/// A parsed `--ruleset` argument (`spec.md` §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesetSpec {
    /// `category/bundle`: one named bundle.
    Bundle { category: String, bundle: String },
    /// `category/all`: every bundle in the category.
    Category { category: String },
    /// `language/RULE-ID`: a single rule resolved by ID.
    RuleId { language: String, rule_id: String },
}

/// Parses a `--ruleset` argument.
///
/// # Errors
///
/// Returns [`crate::error::PathfinderError::Validation`] if `raw` doesn't
/// split into exactly two `/`-separated segments, or if the second segment
/// looks like neither `all` nor a valid rule ID but the combination can't be
/// treated as a plain bundle name either (it never can in practice: any
/// non-`all` second segment is accepted as a bundle name unless it matches
/// the `RULE-ID` grammar, in which case it's parsed as a rule lookup).
pub fn parse(raw: &str) -> Result<RulesetSpec, crate::error::PathfinderError> {
    let mut parts = raw.splitn(2, '/');
    let first = parts.next().filter(|s| !s.is_empty());
    let second = parts.next().filter(|s| !s.is_empty());

    match (first, second) {
        (Some(category_or_lang), Some("all")) => Ok(RulesetSpec::Category { category: category_or_lang.to_owned() }),
        (Some(category_or_lang), Some(second)) if rule_id_re().is_match(second) => Ok(RulesetSpec::RuleId {
            language: category_or_lang.to_owned(),
            rule_id: second.to_owned(),
        }),
        (Some(category), Some(bundle)) => Ok(RulesetSpec::Bundle { category: category.to_owned(), bundle: bundle.to_owned() }),
        _ => Err(crate::error::PathfinderError::Validation(format!(
            "invalid ruleset spec '{raw}': expected 'category/bundle', 'category/all', or 'language/RULE-ID'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bundle_spec() {
        assert_eq!(
            parse("python/sql-injection").unwrap(),
            RulesetSpec::Bundle { category: "python".to_owned(), bundle: "sql-injection".to_owned() }
        );
    }

    #[test]
    fn parses_category_all_spec() {
        assert_eq!(
            parse("python/all").unwrap(),
            RulesetSpec::Category { category: "python".to_owned() }
        );
    }

    #[test]
    fn parses_rule_id_spec() {
        assert_eq!(
            parse("python/CWE-89").unwrap(),
            RulesetSpec::RuleId { language: "python".to_owned(), rule_id: "CWE-89".to_owned() }
        );
        assert_eq!(
            parse("python/SQL-100").unwrap(),
            RulesetSpec::RuleId { language: "python".to_owned(), rule_id: "SQL-100".to_owned() }
        );
    }

    #[test]
    fn rejects_malformed_spec() {
        assert!(parse("nosuchslash").is_err());
        assert!(parse("python/").is_err());
        assert!(parse("/bundle").is_err());
    }
}
