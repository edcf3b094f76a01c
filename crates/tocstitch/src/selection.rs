use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Include flags keyed by slug. A slug that was never recorded is included.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeMap<String, bool>);

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_included(&self, slug: &str) -> bool {
        self.0.get(slug).copied().unwrap_or(true)
    }

    pub fn set(&mut self, slug: impl Into<String>, include: bool) {
        self.0.insert(slug.into(), include);
    }

    pub fn exclude(&mut self, slug: impl Into<String>) {
        self.set(slug, false);
    }

    pub fn include(&mut self, slug: impl Into<String>) {
        self.set(slug, true);
    }

    /// Slugs explicitly excluded, in slug order.
    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, include)| !**include)
            .map(|(slug, _)| slug.as_str())
    }
}

impl FromIterator<(String, bool)> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_slugs_default_to_included() {
        let mut set = SelectionSet::new();
        assert!(set.is_included("anything"));
        set.exclude("appendix");
        assert!(!set.is_included("appendix"));
        set.include("appendix");
        assert!(set.is_included("appendix"));
    }

    #[test]
    fn excluded_lists_only_false_flags() {
        let set: SelectionSet = [
            ("b".to_string(), false),
            ("a".to_string(), false),
            ("c".to_string(), true),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.excluded().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
