//! Per-session fact table.

use indexmap::IndexMap;
use serde::Serialize;

/// Key/value store of values extracted from command output, scoped to a
/// single session and used to parameterize later commands.
///
/// Insertion order is preserved for stable reporting. Writing a key that
/// already exists overwrites it: this is what allows a fallback
/// extraction rule to supersede a tentative value (the
/// discovered-loopback-replaced-by-physical-interface case).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SessionFacts {
    values: IndexMap<String, String>,
}

impl SessionFacts {
    /// Create an empty fact table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact, returning the superseded value if one existed.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(name.into(), value.into())
    }

    /// Look up a fact.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether a fact exists.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of facts.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate facts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_superseded_value() {
        let mut facts = SessionFacts::new();
        assert_eq!(facts.insert("interface_name", "Loopback0"), None);
        assert_eq!(
            facts.insert("interface_name", "Vlan100").as_deref(),
            Some("Loopback0")
        );
        assert_eq!(facts.get("interface_name"), Some("Vlan100"));
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut facts = SessionFacts::new();
        facts.insert("host", "10.0.0.1");
        facts.insert("ios_version", "15.2(4)E1");
        facts.insert("interface_name", "Vlan100");

        let keys: Vec<&str> = facts.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["host", "ios_version", "interface_name"]);
    }
}
