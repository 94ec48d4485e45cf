//! End-to-end runs of the translate, replace and migrate commands on a
//! scratch data tree. Every translation is served from a pre-seeded cache,
//! so no translation service is contacted.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read_json(root: &Path, rel: &str) -> serde_json::Value {
    let content = fs::read_to_string(root.join(rel)).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn run(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rulebook-tl"))
        .current_dir(root)
        .env("XDG_CONFIG_HOME", root.join("config"))
        .env_remove("DEEPL_API_KEY")
        .args(args)
        .output()
        .expect("Failed to run rulebook-tl")
}

const SPELLS_FILE: &str = "data/spells/spells-phb.json";
const SPELLS_CACHE: &str = "translation/cache/fr/spells/spells-phb.json";
const BESTIARY_FILE: &str = "data/bestiary/bestiary-mm.json";

const SPELLS: &str = r#"{
    "spell": [
        {
            "name": "Fireball",
            "source": "PHB",
            "level": 3,
            "entries": [
                "The {@spell Fireball} deals {@damage 8d6} fire damage.",
                "{@dice 1d6}"
            ]
        }
    ]
}"#;

#[test]
fn test_translate_from_cache() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, SPELLS_FILE, SPELLS);
    write(
        root,
        SPELLS_CACHE,
        r#"{"The (%0%) deals (%1%) fire damage.": "La (%0%) inflige (%1%) dégâts de feu."}"#,
    );

    let output = run(
        root,
        &["translate", "--language", "fr", "--write", SPELLS_FILE],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let translated = read_json(root, "data.fr/spells/spells-phb.json");
    let spell = &translated["spell"][0];
    assert_eq!(spell["name"], "Fireball");
    assert_eq!(spell["level"], 3);
    assert_eq!(
        spell["entries"][0],
        "La {@spell Fireball} inflige {@damage 8d6} dégâts de feu."
    );
    assert_eq!(spell["entries"][1], "{@dice 1d6}");

    // Cache untouched, completed file leaves no resume state
    let cache = read_json(root, SPELLS_CACHE);
    assert_eq!(cache.as_object().unwrap().len(), 1);
    let resume_state =
        root.join("translation/cache/fr/glossary_used/spells/spells-phb_per_string.json");
    assert!(!resume_state.exists());
}

#[test]
fn test_translate_without_write_leaves_no_output() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, SPELLS_FILE, SPELLS);
    write(
        root,
        "translation/cache/de/spells/spells-phb.json",
        r#"{"The (%0%) deals (%1%) fire damage.": "Der (%0%) verursacht (%1%) Feuerschaden."}"#,
    );

    let output = run(root, &["translate", "--language", "de", "data/spells"]);
    assert!(output.status.success());
    assert!(!root.join("data.de").exists());
}

#[test]
fn test_translate_skips_generated_data() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "data/generated/gendata-spells.json", SPELLS);

    let output = run(root, &["translate", "--language", "fr", "--write", "data"]);
    assert!(output.status.success());
    assert!(!root.join("data.fr").exists());
}

#[test]
fn test_cache_miss_without_translator_stops_run() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, SPELLS_FILE, SPELLS);

    let output = run(
        root,
        &["translate", "--language", "fr", "--write", SPELLS_FILE],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("DeepL API key required"),
        "stderr: {}",
        stderr
    );
    assert!(!root.join("data.fr/spells/spells-phb.json").exists());
}

#[test]
fn test_corrupt_cache_fails_file() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, SPELLS_FILE, SPELLS);
    write(root, SPELLS_CACHE, "{broken");

    let output = run(root, &["translate", "--language", "fr", SPELLS_FILE]);

    assert!(!output.status.success());
    assert_eq!(
        fs::read_to_string(root.join(SPELLS_CACHE)).unwrap(),
        "{broken"
    );
}

#[test]
fn test_replace_updates_translated_files() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, BESTIARY_FILE, r#"{"monster": []}"#);
    write(
        root,
        "translation/glossary/fr/creatures.json",
        r#"{"Goblin": "Gobelin"}"#,
    );
    write(
        root,
        "data.fr/bestiary/bestiary-mm.json",
        r#"{"monster": [{"name": "Goblin", "source": "MM", "entries": ["Voir {@creature Goblin|MM}."]}]}"#,
    );

    let output = run(root, &["replace", "--language", "fr", BESTIARY_FILE]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let translated = read_json(root, "data.fr/bestiary/bestiary-mm.json");
    assert_eq!(
        translated["monster"][0]["entries"][0],
        "Voir {@creature Gobelin|MM}."
    );
    assert_eq!(translated["monster"][0]["source"], "MM");
}

#[test]
fn test_migrate_rewrites_cache_keys() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, SPELLS_FILE, SPELLS);
    write(
        root,
        SPELLS_CACHE,
        r#"{"The {@spell Fireball} deals {@damage 8d6} fire damage.": "La {@spell Fireball} inflige {@damage 8d6} dégâts de feu."}"#,
    );

    let output = run(root, &["migrate", "--language", "fr", SPELLS_FILE]);
    assert!(output.status.success());

    let cache = read_json(root, SPELLS_CACHE);
    assert_eq!(
        cache["The (%0%) deals (%1%) fire damage."],
        "La (%0%) inflige (%1%) dégâts de feu."
    );

    // The migrated cache serves the next run
    let output = run(
        root,
        &["translate", "--language", "fr", "--write", SPELLS_FILE],
    );
    assert!(output.status.success());
    let translated = read_json(root, "data.fr/spells/spells-phb.json");
    assert_eq!(
        translated["spell"][0]["entries"][0],
        "La {@spell Fireball} inflige {@damage 8d6} dégâts de feu."
    );
}

#[test]
fn test_migrate_skips_unreadable_cache() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, SPELLS_FILE, SPELLS);
    write(root, SPELLS_CACHE, "not json");

    let output = run(root, &["migrate", "--language", "fr", "data/spells"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[SKIP]"), "stderr: {}", stderr);
}

#[test]
fn test_malformed_config_stops_commands() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, SPELLS_FILE, SPELLS);
    write(
        root,
        "config/rulebook-tl/config.toml",
        "[paths\ncache_dir = 1",
    );

    for command in ["translate", "replace", "migrate"] {
        let output = run(root, &[command, "--language", "fr", SPELLS_FILE]);
        assert!(!output.status.success(), "{} succeeded", command);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("Failed to parse config file"),
            "stderr: {}",
            stderr
        );
    }
    assert!(!root.join("translation").exists());
}
