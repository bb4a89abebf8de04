//! Prompt detection: deciding when accumulated output has settled at an
//! interactive prompt, and what privilege that prompt implies.
//!
//! There is no framing on the wire and no "done" signal; the only
//! evidence that a command finished is that the trailing line of the
//! capture looks like a prompt again. Rules are tried in registration
//! order and the first match wins. That tie-break is deliberate: prompt
//! shapes are ambiguous (a hostname may itself contain a terminator
//! character), so callers order rules from most to least specific.

use regex::Regex;

use crate::channel::PatternBuffer;
use crate::error::{PlanError, Result};

/// Privilege classification of a settled prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptClass {
    /// Unprivileged exec prompt (`>`-terminated).
    User,
    /// Privileged prompt (`#`-terminated), including config submodes.
    Privileged,
    /// The device is asking for a password.
    Password,
    /// No rule matched; the stream has not settled.
    Unknown,
}

/// One prompt shape rule: a pattern plus negative literals for
/// disambiguation.
#[derive(Debug, Clone)]
pub struct PromptRule {
    class: PromptClass,
    pattern: Regex,
    not_contains: Vec<String>,
}

impl PromptRule {
    /// Create a rule. The pattern is validated here, at registration.
    pub fn new(class: PromptClass, pattern: &str) -> Result<Self> {
        Ok(Self {
            class,
            pattern: Regex::new(pattern).map_err(PlanError::InvalidPattern)?,
            not_contains: Vec::new(),
        })
    }

    /// Add a literal that must NOT appear in the line for this rule to
    /// match.
    pub fn with_not_contains(mut self, literal: impl Into<String>) -> Self {
        self.not_contains.push(literal.into());
        self
    }

    /// The class this rule assigns.
    pub fn class(&self) -> PromptClass {
        self.class
    }

    /// Check the rule against a trimmed prompt line.
    pub fn matches(&self, line: &str) -> bool {
        if self.not_contains.iter().any(|nc| line.contains(nc)) {
            return false;
        }
        self.pattern.is_match(line)
    }
}

/// A settled prompt: its class and the line that matched.
#[derive(Debug, Clone)]
pub struct PromptMatch {
    /// Privilege classification.
    pub class: PromptClass,
    /// The trimmed prompt line.
    pub line: String,
}

/// Ordered prompt shape rules.
#[derive(Debug, Clone)]
pub struct PromptDetector {
    rules: Vec<PromptRule>,
}

impl PromptDetector {
    /// Build a detector from an ordered rule list.
    pub fn new(rules: Vec<PromptRule>) -> Self {
        Self { rules }
    }

    /// The rule set for IOS-style devices.
    ///
    /// Password markers are checked before the prompt terminators so a
    /// `Password:` challenge is never mistaken for output, and `#` before
    /// `>` so privileged wins when a line would satisfy both.
    pub fn ios_default() -> Self {
        let rules = vec![
            PromptRule::new(PromptClass::Password, r"[Pp]assword:$").unwrap(),
            PromptRule::new(PromptClass::Privileged, r"^[A-Za-z0-9][\w.()/-]*#$").unwrap(),
            PromptRule::new(PromptClass::User, r"^[A-Za-z0-9][\w.()/-]*>$").unwrap(),
        ];
        Self::new(rules)
    }

    /// Classify a trimmed prompt line. First matching rule wins;
    /// `Unknown` when nothing matches.
    pub fn classify_line(&self, line: &str) -> PromptClass {
        for rule in &self.rules {
            if rule.matches(line) {
                return rule.class;
            }
        }
        PromptClass::Unknown
    }

    /// Decide whether the buffer has settled at a recognizable prompt.
    ///
    /// Returns `None` while the stream is mid-output (trailing line empty
    /// or unrecognized), which drives the executor to keep polling.
    pub fn settle(&self, buffer: &PatternBuffer) -> Option<PromptMatch> {
        let line = buffer.trailing_line()?;
        match self.classify_line(&line) {
            PromptClass::Unknown => None,
            class => Some(PromptMatch { class, line }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(class: PromptClass, pattern: &str) -> PromptRule {
        PromptRule::new(class, pattern).unwrap()
    }

    #[test]
    fn privileged_marker_classifies_privileged() {
        let detector = PromptDetector::ios_default();
        assert_eq!(detector.classify_line("switch01#"), PromptClass::Privileged);
        assert_eq!(
            detector.classify_line("switch01(config)#"),
            PromptClass::Privileged
        );
    }

    #[test]
    fn user_marker_classifies_user() {
        let detector = PromptDetector::ios_default();
        assert_eq!(detector.classify_line("switch01>"), PromptClass::User);
    }

    #[test]
    fn password_marker_wins_over_terminators() {
        let detector = PromptDetector::ios_default();
        assert_eq!(detector.classify_line("Password:"), PromptClass::Password);
        assert_eq!(
            detector.classify_line("Enter password:"),
            PromptClass::Password
        );
    }

    #[test]
    fn unrecognized_line_is_unknown() {
        let detector = PromptDetector::ios_default();
        assert_eq!(
            detector.classify_line("Interface Vlan100 is up"),
            PromptClass::Unknown
        );
    }

    #[test]
    fn unknown_is_not_settled() {
        let detector = PromptDetector::ios_default();
        let mut buffer = PatternBuffer::new(1000);
        buffer.extend(b"some command output still flowing");
        assert!(detector.settle(&buffer).is_none());

        // Output that ends with a newline has not settled either, even if
        // an earlier line looked prompt-shaped.
        buffer.clear();
        buffer.extend(b"switch01#\r\n");
        assert!(detector.settle(&buffer).is_none());
    }

    #[test]
    fn settled_prompt_is_detected_with_class() {
        let detector = PromptDetector::ios_default();
        let mut buffer = PatternBuffer::new(1000);
        buffer.extend(b"show clock\r\n12:00:00 UTC\r\nswitch01# ");

        let settled = detector.settle(&buffer).expect("prompt should settle");
        assert_eq!(settled.class, PromptClass::Privileged);
        assert_eq!(settled.line, "switch01#");
    }

    #[test]
    fn not_contains_disambiguates() {
        let base = rule(PromptClass::Privileged, r"#$")
            .with_not_contains("(config)");
        assert!(base.matches("switch01#"));
        assert!(!base.matches("switch01(config)#"));
    }

    #[test]
    fn first_match_wins_across_rules() {
        // Two rules that both match a '#'-terminated line; the earlier
        // registration is the one that classifies.
        let detector = PromptDetector::new(vec![
            rule(PromptClass::Privileged, r"#$"),
            rule(PromptClass::User, r"#$"),
        ]);
        assert_eq!(detector.classify_line("switch01#"), PromptClass::Privileged);
    }
}
