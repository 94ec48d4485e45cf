//! Cache invalidation when the glossary drifts.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use super::glossary::Glossary;
use super::placeholder::PlaceholderCodec;

/// Terms that are new, retranslated or removed compared to the glossary
/// recorded in `snapshot`.
pub fn compute_recheck_set(
    current: &BTreeMap<String, String>,
    snapshot: &BTreeMap<String, String>,
) -> BTreeSet<String> {
    let changed = current
        .iter()
        .filter(|(key, target)| snapshot.get(*key) != Some(*target))
        .map(|(key, _)| key.clone());
    let removed = snapshot
        .keys()
        .filter(|key| !current.contains_key(*key))
        .cloned();

    changed.chain(removed).collect()
}

/// Compiled set of words whose cached translations can no longer be trusted.
#[derive(Debug, Clone, Default)]
pub struct RecheckSet {
    words: Vec<(String, Regex)>,
}

impl RecheckSet {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|w| !w.is_empty())
            .collect();
        let words = unique
            .into_iter()
            .map(|w| {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&w))).unwrap();
                (w, re)
            })
            .collect();
        Self { words }
    }

    /// Forced words plus, when enabled, the glossary drift.
    pub fn build(
        forced: &[String],
        current: &Glossary,
        snapshot: &BTreeMap<String, String>,
        include_glossary_changes: bool,
    ) -> Self {
        let mut words: BTreeSet<String> = forced.iter().cloned().collect();
        if include_glossary_changes {
            words.extend(compute_recheck_set(&current.snapshot(), snapshot));
        }
        Self::new(words)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(|(w, _)| w.as_str())
    }

    /// The first recheck word found in the prose of `text`. Words that only
    /// occur inside tags or placeholders do not count.
    pub fn find_in<'a>(&'a self, text: &str, codec: &PlaceholderCodec) -> Option<&'a str> {
        if self.is_empty() {
            return None;
        }
        let prose = codec.strip_tags(text);
        self.words
            .iter()
            .find(|(_, re)| re.is_match(&prose))
            .map(|(w, _)| w.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(terms: &[(&str, &str)]) -> BTreeMap<String, String> {
        terms
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    fn glossary(terms: &[(&str, &str)]) -> Glossary {
        Glossary::from_terms(snapshot(terms))
    }

    #[test]
    fn test_changed_and_new_terms() {
        let current = snapshot(&[("sword", "lame"), ("shield", "bouclier")]);
        let recheck = compute_recheck_set(&current, &snapshot(&[("sword", "épée")]));
        assert_eq!(
            recheck,
            BTreeSet::from(["shield".to_string(), "sword".to_string()])
        );
    }

    #[test]
    fn test_removed_terms() {
        let recheck = compute_recheck_set(&BTreeMap::new(), &snapshot(&[("sword", "épée")]));
        assert_eq!(recheck, BTreeSet::from(["sword".to_string()]));
    }

    #[test]
    fn test_capitalized_variants_are_tracked() {
        let current = glossary(&[("sword", "lame")]).snapshot();
        let recheck = compute_recheck_set(&current, &snapshot(&[("sword", "lame")]));
        assert_eq!(recheck, BTreeSet::from(["Sword".to_string()]));
    }

    #[test]
    fn test_unchanged_glossary() {
        let current = glossary(&[("Sword", "Épée")]).snapshot();
        assert!(compute_recheck_set(&current, &current).is_empty());
    }

    #[test]
    fn test_recheck_ignores_tags() {
        let codec = PlaceholderCodec::new();
        let set = RecheckSet::new(["fireball"]);

        assert!(set.find_in("Cast a Fireball now", &codec).is_some());
        assert!(set.find_in("Cast {@spell Fireball}", &codec).is_none());
        assert!(set.find_in("Cast (%0%) now", &codec).is_none());
        assert!(set.find_in("Fireballs everywhere", &codec).is_none());
    }

    #[test]
    fn test_build_respects_flag() {
        let current = glossary(&[("Sword", "Lame")]);
        let forced = vec!["Orc".to_string()];

        let without = RecheckSet::build(&forced, &current, &BTreeMap::new(), false);
        assert_eq!(without.words().collect::<Vec<_>>(), vec!["Orc"]);

        let with = RecheckSet::build(&forced, &current, &BTreeMap::new(), true);
        assert_eq!(with.words().collect::<Vec<_>>(), vec!["Orc", "Sword"]);
    }
}
