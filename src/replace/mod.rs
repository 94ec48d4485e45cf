//! Glossary pass over already translated output files.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::cli::ReplaceArgs;
use crate::config::Config;
use crate::translate::cache::to_json_pretty;
use crate::translate::glossary::Glossary;
use crate::utils::{collect_data_files, relative_to_data, resolve_language};

pub fn run(args: ReplaceArgs) -> Result<()> {
    let cfg = Config::load()?;
    let lang = resolve_language(args.language.as_deref(), &cfg)?;

    let glossary = Glossary::load(cfg.paths.glossary_dir.join(&lang))?;
    if glossary.is_empty() {
        println!(
            "{}",
            format!("[WARN] No glossary terms for {}", lang).yellow()
        );
        return Ok(());
    }

    let files = collect_data_files(&args.files, &cfg.paths)?;
    let output_dir = cfg.paths.output_dir(&lang);
    let mut updated = 0;

    for file in &files {
        let rel = relative_to_data(file, &cfg.paths.data_dir);
        let target = output_dir.join(&rel);
        if !target.is_file() {
            println!(
                "{}",
                format!("[SKIP] Not translated yet: {}", target.display()).yellow()
            );
            continue;
        }

        match replace_file(&glossary, &target) {
            Ok(true) => {
                updated += 1;
                println!("  {} {}", "updated".green(), target.display());
            }
            Ok(false) => tracing::debug!("Unchanged: {}", target.display()),
            Err(e) => eprintln!("{}", format!("[ERROR] {:#}", e).red()),
        }
    }

    println!(
        "{}",
        format!("[Replace] {} of {} file(s) updated", updated, files.len()).green()
    );
    Ok(())
}

/// Rewrite `path` in place; `false` when no term applied.
fn replace_file(glossary: &Glossary, path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut data: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let before = data.clone();
    glossary.apply_to_structured(&mut data);
    if data == before {
        return Ok(false);
    }

    fs::write(path, to_json_pretty(&data)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
