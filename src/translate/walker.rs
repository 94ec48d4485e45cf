//! Walks a rules data file and hands every translatable string to a
//! [`FieldTranslator`].
//!
//! Only keys listed here are ever translated. Everything else (ids, sources,
//! enumerations, numbers) is passed through as is.

use serde_json::{Map, Value};

/// String-valued keys translated with the per-file cache.
pub const FILE_KEYS: &[&str] = &["entry", "effect", "text", "m", "capCrewNote"];

/// String-valued entity names, translated with the cross-file cache unless the
/// record has a `source` (such records are referenced by name from tags).
pub const SHARED_KEYS: &[&str] = &["name", "names", "replace"];

/// List-valued keys translated element by element.
pub const LIST_KEYS: &[&str] = &[
    "entries",
    "items",
    "rows",
    "headerEntries",
    "reasons",
    "other",
    "lifeTrinket",
    "row",
    "headers",
    "names",
];

/// List keys whose strings go to the cross-file cache.
const SHARED_LIST_KEYS: &[&str] = &["headers", "names"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    File,
    Shared,
}

pub trait FieldTranslator {
    type Error;

    fn translate_field(&mut self, text: &str, tier: CacheTier) -> Result<String, Self::Error>;
}

pub fn walk<T: FieldTranslator>(node: &mut Value, translator: &mut T) -> Result<(), T::Error> {
    match node {
        Value::Array(items) => {
            for item in items {
                walk(item, translator)?;
            }
            Ok(())
        }
        Value::Object(map) => walk_object(map, translator),
        _ => Ok(()),
    }
}

fn walk_object<T: FieldTranslator>(
    map: &mut Map<String, Value>,
    translator: &mut T,
) -> Result<(), T::Error> {
    let has_source = match map.get("source") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    // `items` outside of `list` entries hold item references
    let is_list = map.get("type").and_then(Value::as_str) == Some("list");

    for (key, value) in map.iter_mut() {
        let key = key.as_str();
        match value {
            Value::String(s) if FILE_KEYS.contains(&key) => {
                *s = translator.translate_field(s, CacheTier::File)?;
            }
            Value::String(s) if SHARED_KEYS.contains(&key) && !has_source => {
                *s = translator.translate_field(s, CacheTier::Shared)?;
            }
            Value::Object(sections) if key == "other" => {
                for items in sections.values_mut() {
                    translate_strings(items, translator, CacheTier::File)?;
                }
            }
            Value::Array(entries) if LIST_KEYS.contains(&key) && (key != "items" || is_list) => {
                let tier = if SHARED_LIST_KEYS.contains(&key) {
                    CacheTier::Shared
                } else {
                    CacheTier::File
                };
                translate_list(entries, translator, tier)?;
            }
            _ => walk(value, translator)?,
        }
    }

    Ok(())
}

fn translate_list<T: FieldTranslator>(
    entries: &mut [Value],
    translator: &mut T,
    tier: CacheTier,
) -> Result<(), T::Error> {
    for entry in entries {
        match entry {
            Value::String(s) => *s = translator.translate_field(s, tier)?,
            // Table rows: short cells are usually dice or numbers
            Value::Array(cells) => {
                for cell in cells.iter_mut() {
                    if let Value::String(s) = cell {
                        if s.chars().count() > 2 {
                            *s = translator.translate_field(s, tier)?;
                        }
                    }
                }
                walk(entry, translator)?;
            }
            _ => walk(entry, translator)?,
        }
    }
    Ok(())
}

fn translate_strings<T: FieldTranslator>(
    node: &mut Value,
    translator: &mut T,
    tier: CacheTier,
) -> Result<(), T::Error> {
    if let Value::Array(items) = node {
        for item in items.iter_mut() {
            if let Value::String(s) = item {
                *s = translator.translate_field(s, tier)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;

    /// Upper-cases what it translates and records the cache tier.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, CacheTier)>,
    }

    impl FieldTranslator for Recorder {
        type Error = Infallible;

        fn translate_field(&mut self, text: &str, tier: CacheTier) -> Result<String, Infallible> {
            self.calls.push((text.to_string(), tier));
            Ok(text.to_uppercase())
        }
    }

    fn run(mut data: Value) -> (Value, Vec<(String, CacheTier)>) {
        let mut recorder = Recorder::default();
        walk(&mut data, &mut recorder).unwrap();
        (data, recorder.calls)
    }

    #[test]
    fn test_name_with_source_is_kept() {
        let (data, calls) = run(json!({
            "name": "Goblin",
            "source": "MM",
            "entries": ["Hits for {@damage 1d6}"],
        }));

        assert_eq!(data["name"], "Goblin");
        assert_eq!(
            calls,
            vec![("Hits for {@damage 1d6}".to_string(), CacheTier::File)]
        );
    }

    #[test]
    fn test_name_without_source_uses_shared_cache() {
        let (data, calls) = run(json!({"name": "Combat", "entries": []}));
        assert_eq!(data["name"], "COMBAT");
        assert_eq!(calls, vec![("Combat".to_string(), CacheTier::Shared)]);
    }

    #[test]
    fn test_unlisted_keys_untouched() {
        let (data, calls) = run(json!({
            "id": "abc",
            "type": "entries",
            "page": 12,
            "source": "PHB",
            "ability": {"str": "high"},
        }));
        assert!(calls.is_empty());
        assert_eq!(data["id"], "abc");
    }

    #[test]
    fn test_nested_entries() {
        let (data, _) = run(json!({
            "data": [{"entries": ["one", {"type": "entries", "entries": ["two"]}]}],
        }));
        assert_eq!(data["data"][0]["entries"][0], "ONE");
        assert_eq!(data["data"][0]["entries"][1]["entries"][0], "TWO");
        assert_eq!(data["data"][0]["entries"][1]["type"], "entries");
    }

    #[test]
    fn test_items_only_in_lists() {
        let (data, _) = run(json!({
            "shop": {"items": ["Longsword"]},
            "list": {"type": "list", "items": ["Buy a sword"]},
        }));
        assert_eq!(data["shop"]["items"][0], "Longsword");
        assert_eq!(data["list"]["items"][0], "BUY A SWORD");
    }

    #[test]
    fn test_table_rows_skip_short_cells() {
        let (data, calls) = run(json!({
            "type": "table",
            "colLabels": ["d6", "Effect"],
            "rows": [["1", "Nothing happens"], ["10", "You fall"]],
        }));
        assert_eq!(data["rows"][0][0], "1");
        assert_eq!(data["rows"][0][1], "NOTHING HAPPENS");
        assert_eq!(data["rows"][1][0], "10");
        assert_eq!(data["colLabels"][1], "Effect");
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_headers_use_shared_cache() {
        let (_, calls) = run(json!({"headers": ["Level", "Feature"]}));
        assert!(calls.iter().all(|(_, tier)| *tier == CacheTier::Shared));
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_other_sections() {
        let (data, _) = run(json!({
            "other": {"childhood": ["You grew up poor", "You grew up rich"]},
        }));
        assert_eq!(data["other"]["childhood"][1], "YOU GREW UP RICH");
    }

    #[test]
    fn test_string_keys() {
        let (data, calls) = run(json!({
            "entry": "An entry",
            "effect": "An effect",
            "text": "Some text",
            "replace": "Replaced",
            "other": ["An other"],
        }));
        assert_eq!(data["entry"], "AN ENTRY");
        assert_eq!(data["replace"], "REPLACED");
        assert_eq!(data["other"][0], "AN OTHER");
        assert_eq!(calls.len(), 5);
    }
}
