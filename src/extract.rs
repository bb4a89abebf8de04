//! Field extraction: pattern rules that turn raw command output into
//! session facts.
//!
//! Rules are independent of the executor; a parsing problem never
//! disturbs command pacing. A rule that does not match contributes
//! nothing. Rules targeting the same fact are ordered by registration:
//! each matching rule writes, so the last matching rule wins. Register
//! the primary lookup first and fallback/refinement rules after it.

use regex::Regex;

use crate::error::{PlanError, Result};

/// Case normalization applied to an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalize {
    /// Keep the captured text as-is.
    #[default]
    None,
    /// Uppercase the captured text.
    Uppercase,
    /// Lowercase the captured text.
    Lowercase,
}

/// A single extraction rule: pattern, capture group, normalization, and
/// the fact name the value is written to.
#[derive(Debug, Clone)]
pub struct ExtractRule {
    fact: String,
    pattern: Regex,
    group: usize,
    normalize: Normalize,
}

impl ExtractRule {
    /// Create a rule writing capture group 1 of `pattern` to `fact`.
    ///
    /// A malformed pattern is a configuration error surfaced here, at
    /// registration, never at run time.
    pub fn new(fact: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            fact: fact.into(),
            pattern: Regex::new(pattern).map_err(PlanError::InvalidPattern)?,
            group: 1,
            normalize: Normalize::None,
        })
    }

    /// Use a different capture group as the value.
    pub fn capture_group(mut self, group: usize) -> Self {
        self.group = group;
        self
    }

    /// Apply case normalization to the extracted value.
    pub fn normalize(mut self, mode: Normalize) -> Self {
        self.normalize = mode;
        self
    }

    /// The fact name this rule writes.
    pub fn fact(&self) -> &str {
        &self.fact
    }

    /// Run the rule against command output.
    ///
    /// Returns the normalized value of the first match, or `None` when
    /// the pattern (or its capture group) does not match.
    pub fn extract(&self, output: &str) -> Option<String> {
        let captures = self.pattern.captures(output)?;
        let value = captures.get(self.group)?.as_str();
        Some(match self.normalize {
            Normalize::None => value.to_string(),
            Normalize::Uppercase => value.to_uppercase(),
            Normalize::Lowercase => value.to_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW_VERSION: &str = "Cisco IOS Software, C2960X Software (C2960X-UNIVERSALK9-M), \
                                Version 15.2(4)E1, RELEASE SOFTWARE (fc2)";

    #[test]
    fn version_is_extracted() {
        let rule = ExtractRule::new("ios_version", r"Cisco IOS Software.*Version ([^,\s]+)")
            .unwrap();
        assert_eq!(rule.extract(SHOW_VERSION).as_deref(), Some("15.2(4)E1"));
    }

    #[test]
    fn non_matching_rule_contributes_nothing() {
        let rule = ExtractRule::new("serial", r"System serial number\s*:\s*(\S+)").unwrap();
        assert_eq!(rule.extract(SHOW_VERSION), None);
    }

    #[test]
    fn capture_group_selects_value() {
        let rule = ExtractRule::new("port", r"(\d+)\s+([0-9a-f.]+)\s+DYNAMIC\s+(\S+)")
            .unwrap()
            .capture_group(3);
        let output = " 100    0011.2233.4455    DYNAMIC     Gi1/0/7";
        assert_eq!(rule.extract(output).as_deref(), Some("Gi1/0/7"));
    }

    #[test]
    fn normalization_applies() {
        let upper = ExtractRule::new("mac", r"([0-9a-fA-F.]{14})")
            .unwrap()
            .normalize(Normalize::Uppercase);
        assert_eq!(
            upper.extract("mac 0011.22aa.bbcc found").as_deref(),
            Some("0011.22AA.BBCC")
        );

        let lower = ExtractRule::new("hostname", r"hostname (\S+)")
            .unwrap()
            .normalize(Normalize::Lowercase);
        assert_eq!(
            lower.extract("hostname CORE-SW1").as_deref(),
            Some("core-sw1")
        );
    }

    #[test]
    fn malformed_pattern_fails_at_registration() {
        assert!(ExtractRule::new("broken", r"([unclosed").is_err());
    }

    #[test]
    fn missing_capture_group_contributes_nothing() {
        let rule = ExtractRule::new("x", r"no groups here").unwrap();
        assert_eq!(rule.extract("no groups here"), None);
    }
}
