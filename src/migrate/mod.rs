//! Rewrite file caches written before tags were cached as placeholders.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cli::MigrateArgs;
use crate::config::Config;
use crate::translate::cache::CacheStore;
use crate::translate::pipeline::CachePaths;
use crate::translate::placeholder::PlaceholderCodec;
use crate::utils::{collect_data_files, relative_to_data, resolve_language};

pub fn run(args: MigrateArgs) -> Result<()> {
    let cfg = Config::load()?;
    let lang = resolve_language(args.language.as_deref(), &cfg)?;
    let files = collect_data_files(&args.files, &cfg.paths)?;
    let codec = PlaceholderCodec::new();

    let mut migrated = 0;
    for file in &files {
        let rel = relative_to_data(file, &cfg.paths.data_dir);
        let cache_path = CachePaths::new(&cfg.paths.cache_dir, &lang, &rel).file;

        match migrate_cache(&codec, &cache_path) {
            Ok(0) => tracing::debug!("Nothing cached for {}", file.display()),
            Ok(count) => {
                migrated += 1;
                println!(
                    "  {} {} ({} entries)",
                    "migrated".green(),
                    cache_path.display(),
                    count
                );
            }
            Err(e) => eprintln!(
                "{}",
                format!("[SKIP] {}: {:#}", cache_path.display(), e).yellow()
            ),
        }
    }

    println!(
        "{}",
        format!("[Migrate] {} cache file(s) migrated", migrated).green()
    );
    Ok(())
}

/// Replace tags with placeholders in both keys and values. Returns the
/// number of entries written.
fn migrate_cache(codec: &PlaceholderCodec, path: &Path) -> Result<usize> {
    let mut cache: CacheStore<String> = CacheStore::open(path)?;
    if cache.is_empty() {
        return Ok(0);
    }

    let migrated: BTreeMap<String, String> = cache
        .entries()
        .iter()
        .map(|(source, translated)| (codec.extract(source).0, codec.extract(translated).0))
        .collect();
    cache.replace_all(migrated);
    let count = cache.len();

    cache
        .sync()
        .with_context(|| format!("Failed to save {}", path.display()))?;
    Ok(count)
}
