//! Glossary support for consistent term translation
//!
//! A language glossary is a directory of flat JSON objects mapping English
//! terms to their fixed translation. Terms are kept longest first so that
//! "Orc Chieftain" always wins over "Orc".

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Keys holding game mechanic identifiers; never glossary substituted.
pub const PROTECTED_KEYS: &[&str] = &[
    "savingThrowForcedSpell",
    "savingThrowForced",
    "savingThrow",
    "damageInflict",
    "resist",
];

#[derive(Debug, Clone)]
pub struct GlossaryTerm {
    pub source: String,
    pub target: String,
    word: Regex,
    word_ci: Regex,
    // =X (filters) or |X (tag arguments)
    attribute: Regex,
    attribute_ci: Regex,
    // X| or X} (tag display text), often possessive or plural
    display: Regex,
    display_ci: Regex,
}

impl GlossaryTerm {
    fn new(source: String, target: String) -> Self {
        let key = regex::escape(&source);
        let word = format!(r"\b{}\b", key);
        let attribute = format!(r"([=|])({}'?s?)", key);
        let display = format!(r"({}'?s?)([|}}])", key);

        Self {
            word: Regex::new(&word).unwrap(),
            word_ci: Regex::new(&format!("(?i){}", word)).unwrap(),
            attribute: Regex::new(&attribute).unwrap(),
            attribute_ci: Regex::new(&format!("(?i){}", attribute)).unwrap(),
            display: Regex::new(&display).unwrap(),
            display_ci: Regex::new(&format!("(?i){}", display)).unwrap(),
            source,
            target,
        }
    }

    pub fn appears_in(&self, text: &str) -> bool {
        self.word.is_match(text)
    }

    pub fn appears_in_ignore_case(&self, text: &str) -> bool {
        self.word_ci.is_match(text)
    }

    /// Substitute this term where it sits in tag argument or tag display
    /// position, or where it makes up the whole string.
    fn apply_positional(&self, text: &str) -> String {
        let lower = self.target.to_lowercase();

        let mut out = self
            .attribute
            .replace_all(text, |c: &Captures| format!("{}{}", &c[1], self.target))
            .into_owned();
        out = self
            .attribute_ci
            .replace_all(&out, |c: &Captures| format!("{}{}", &c[1], lower))
            .into_owned();
        out = self
            .display
            .replace_all(&out, |c: &Captures| format!("{}{}", self.target, &c[2]))
            .into_owned();
        out = self
            .display_ci
            .replace_all(&out, |c: &Captures| format!("{}{}", lower, &c[2]))
            .into_owned();

        if out == self.source {
            out = self.target.clone();
        } else if out.to_lowercase() == self.source.to_lowercase() {
            out = lower;
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct Glossary {
    terms: Vec<GlossaryTerm>,
    lookup: HashMap<String, usize>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` fragment of a language directory.
    ///
    /// Fragments are read in file name order and the first definition of a
    /// term wins. A missing directory is an empty glossary.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::debug!("No glossary directory at {}", dir.display());
            return Ok(Self::new());
        }

        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        let files = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"));

        for entry in files {
            let path = entry.path();
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read glossary file: {}", path.display()))?;
            let fragment: BTreeMap<String, String> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid glossary file: {}", path.display()))?;

            for (source, target) in fragment {
                if merged.contains_key(&source) {
                    tracing::warn!(
                        "Glossary term '{}' redefined in {}, keeping first definition",
                        source,
                        path.display()
                    );
                    continue;
                }
                merged.insert(source, target);
            }
        }

        Ok(Self::from_terms(merged))
    }

    /// Build a glossary, adding a capitalized variant of every term that does
    /// not start uppercase (`lawful` also matches `Lawful`).
    pub fn from_terms<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let explicit: BTreeMap<String, String> = terms
            .into_iter()
            .filter(|(source, _)| !source.is_empty())
            .collect();

        let mut all = explicit.clone();
        for (source, target) in &explicit {
            if !source.chars().next().is_some_and(char::is_uppercase) {
                all.entry(capitalize(source))
                    .or_insert_with(|| capitalize(target));
            }
        }

        let mut sorted: Vec<(String, String)> = all.into_iter().collect();
        sorted.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });

        let terms: Vec<GlossaryTerm> = sorted
            .into_iter()
            .map(|(s, t)| GlossaryTerm::new(s, t))
            .collect();
        let lookup = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.source.clone(), i))
            .collect();

        Self { terms, lookup }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.lookup
            .get(source)
            .map(|&i| self.terms[i].target.as_str())
    }

    /// The glossary as stored in the "glossary used" caches.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.terms
            .iter()
            .map(|t| (t.source.clone(), t.target.clone()))
            .collect()
    }

    /// Terms worth sending along with `text` to the translation service,
    /// longest first.
    pub fn select_applicable(&self, text: &str) -> Vec<(String, String)> {
        self.terms
            .iter()
            .filter(|t| t.appears_in(text))
            .map(|t| (t.source.clone(), t.target.clone()))
            .collect()
    }

    /// Free-text whole word substitution, longest term first.
    pub fn substitute(&self, text: &str) -> String {
        let mut result = text.to_string();
        for term in &self.terms {
            if term.appears_in(&result) {
                result = term
                    .word
                    .replace_all(&result, regex::NoExpand(&term.target))
                    .into_owned();
            }
        }
        result
    }

    /// Apply positional substitution to one string.
    pub fn apply_to_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for term in &self.terms {
            if term.appears_in_ignore_case(&result) {
                result = term.apply_positional(&result);
            }
        }
        result
    }

    /// Walk translated JSON data and fix up glossary terms left in tag
    /// arguments and tag display texts.
    pub fn apply_to_structured(&self, data: &mut Value) {
        match data {
            Value::Array(items) => {
                for item in items {
                    self.apply_to_structured(item);
                }
            }
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    if PROTECTED_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    self.apply_to_structured(value);
                }
            }
            Value::String(s) => {
                let replaced = self.apply_to_text(s);
                if replaced != *s {
                    *s = replaced;
                }
            }
            _ => {}
        }
    }
}

/// First character uppercase, the rest lowercase.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn glossary(terms: &[(&str, &str)]) -> Glossary {
        Glossary::from_terms(terms.iter().map(|(s, t)| (s.to_string(), t.to_string())))
    }

    #[test]
    fn test_sorted_longest_first() {
        let g = glossary(&[("Orc", "X"), ("Orc Chieftain", "Y"), ("Axe", "Z")]);
        let order: Vec<String> = g
            .select_applicable("Orc, Axe and Orc Chieftain")
            .into_iter()
            .map(|(source, _)| source)
            .collect();
        assert_eq!(order, vec!["Orc Chieftain", "Axe", "Orc"]);
    }

    #[test]
    fn test_substitute_prefers_longer_terms() {
        let g = glossary(&[("Orc", "X"), ("Orc Chieftain", "Y")]);
        assert_eq!(g.substitute("the Orc Chieftain attacks"), "the Y attacks");
        assert_eq!(g.substitute("the Orc attacks"), "the X attacks");
    }

    #[test]
    fn test_capitalized_variant() {
        let g = glossary(&[("lawful good", "loyal bon")]);
        assert_eq!(g.len(), 2);
        assert_eq!(g.get("Lawful good"), Some("Loyal bon"));
        assert_eq!(g.get("lawful good"), Some("loyal bon"));
    }

    #[test]
    fn test_explicit_entry_beats_variant() {
        let g = glossary(&[("alarm", "alarme"), ("Alarm", "Alarme (sort)")]);
        assert_eq!(g.len(), 2);
        assert_eq!(g.get("Alarm"), Some("Alarme (sort)"));
    }

    #[test]
    fn test_select_applicable_whole_words() {
        let g = glossary(&[("Orc", "X"), ("Sword", "Epee")]);
        let selected = g.select_applicable("An Orc draws its Swordfish");
        assert_eq!(selected, vec![("Orc".to_string(), "X".to_string())]);
    }

    #[test]
    fn test_apply_attribute_position() {
        let g = glossary(&[("Fireball", "Boule de feu")]);
        assert_eq!(
            g.apply_to_text("{@spell Boule|PHB|Fireball}"),
            "{@spell Boule|PHB|Boule de feu}"
        );
        assert_eq!(
            g.apply_to_text("{@filter x|spells|name=fireball}"),
            "{@filter x|spells|name=boule de feu}"
        );
    }

    #[test]
    fn test_apply_display_position_with_possessive() {
        let g = glossary(&[("Goblin", "Gobelin")]);
        assert_eq!(
            g.apply_to_text("Le sac du {@creature Goblin's} chef"),
            "Le sac du {@creature Gobelin} chef"
        );
        assert_eq!(
            g.apply_to_text("{@creature goblin|MM|goblins} et un goblin"),
            "{@creature gobelin|MM|gobelin} et un goblin"
        );
    }

    #[test]
    fn test_apply_leaves_prose_alone() {
        let g = glossary(&[("Goblin", "Gobelin")]);
        assert_eq!(g.apply_to_text("A Goblin appears"), "A Goblin appears");
    }

    #[test]
    fn test_apply_whole_string() {
        let g = glossary(&[("Goblin", "Gobelin")]);
        assert_eq!(g.apply_to_text("Goblin"), "Gobelin");
        assert_eq!(g.apply_to_text("GOBLIN"), "gobelin");
    }

    #[test]
    fn test_apply_structured_skips_protected_keys() {
        let g = glossary(&[("Dexterity", "Dexterite")]);
        let mut data = json!({
            "savingThrow": ["Dexterity"],
            "entries": ["Dexterity", {"name": "{@skill Dexterity}"}],
        });
        g.apply_to_structured(&mut data);
        assert_eq!(data["savingThrow"][0], "Dexterity");
        assert_eq!(data["entries"][0], "Dexterite");
        assert_eq!(data["entries"][1]["name"], "{@skill Dexterite}");
    }

    #[test]
    fn test_load_first_file_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"Orc": "Orque", "Elf": "Elfe"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("b.json"), r#"{"Orc": "Ork"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let g = Glossary::load(dir.path()).unwrap();
        assert_eq!(g.get("Orc"), Some("Orque"));
        assert_eq!(g.get("Elf"), Some("Elfe"));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let g = Glossary::load(dir.path().join("nope")).unwrap();
        assert!(g.is_empty());
    }
}
