//! Config command handlers

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use super::Config;
use crate::cli::{ConfigAction, ConfigArgs};
use crate::utils::validate_language;

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => show_config(),
        ConfigAction::Init { force } => init_config(force),
        ConfigAction::Set { key, value } => set_config(&key, &value),
        ConfigAction::Get { key } => get_config(&key),
        ConfigAction::Path => show_path(),
    }
}

fn show_config() -> Result<()> {
    let mut config = Config::load()?;
    config.api.deepl_api_key = config.api.deepl_api_key.map(|k| mask_key(&k));
    let content = toml::to_string_pretty(&config)?;

    println!("{}", "[Config]".green());
    println!("{}", content);

    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;

    if path.exists() && !force {
        println!(
            "{}",
            format!("Config file already exists: {}", path.display()).yellow()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = Config::default();
    let saved_path = config.save()?;

    println!("{}", "[Config] Initialized".green());
    println!("  Created: {}", saved_path.display());
    println!();
    println!("Set your DeepL API key with:");
    println!("  rulebook-tl config set api.deepl_api_key <key>");

    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    // Parse key path (e.g., "api.deepl_api_key")
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["paths", "data_dir"] => config.paths.data_dir = PathBuf::from(value),
        ["paths", "cache_dir"] => config.paths.cache_dir = PathBuf::from(value),
        ["paths", "glossary_dir"] => config.paths.glossary_dir = PathBuf::from(value),
        ["paths", "output_prefix"] => config.paths.output_prefix = value.to_string(),
        ["paths", "skip_prefixes"] => {
            config.paths.skip_prefixes = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        ["api", "provider"] => config.api.provider = value.to_string(),
        ["api", "deepl_api_key"] => config.api.deepl_api_key = optional(value),
        ["api", "deepl_api_base"] => config.api.deepl_api_base = optional(value),
        ["api", "max_retries"] => {
            config.api.max_retries = value
                .parse()
                .with_context(|| format!("Invalid number: {}", value))?;
        }
        ["api", "glossary_capacity"] => {
            config.api.glossary_capacity = value
                .parse()
                .with_context(|| format!("Invalid number: {}", value))?;
        }
        ["translation", "default_language"] => {
            validate_language(value)?;
            config.translation.default_language = value.to_string();
        }
        ["translation", "max_runtime_secs"] => {
            config.translation.max_runtime_secs = value
                .parse()
                .with_context(|| format!("Invalid number: {}", value))?;
        }
        _ => {
            anyhow::bail!("Unknown config key: {}", key);
        }
    }

    config.save()?;
    println!("{}", format!("[Config] Set {} = {}", key, value).green());

    Ok(())
}

fn get_config(key: &str) -> Result<()> {
    let config = Config::load()?;
    let parts: Vec<&str> = key.split('.').collect();

    let value: Option<String> = match parts.as_slice() {
        ["paths", "data_dir"] => Some(config.paths.data_dir.display().to_string()),
        ["paths", "cache_dir"] => Some(config.paths.cache_dir.display().to_string()),
        ["paths", "glossary_dir"] => Some(config.paths.glossary_dir.display().to_string()),
        ["paths", "output_prefix"] => Some(config.paths.output_prefix),
        ["paths", "skip_prefixes"] => Some(config.paths.skip_prefixes.join(",")),
        ["api", "provider"] => Some(config.api.provider),
        ["api", "deepl_api_key"] => config.api.deepl_api_key.map(|k| mask_key(&k)),
        ["api", "deepl_api_base"] => config.api.deepl_api_base,
        ["api", "max_retries"] => Some(config.api.max_retries.to_string()),
        ["api", "glossary_capacity"] => Some(config.api.glossary_capacity.to_string()),
        ["translation", "default_language"] => Some(config.translation.default_language),
        ["translation", "max_runtime_secs"] => {
            Some(config.translation.max_runtime_secs.to_string())
        }
        _ => {
            anyhow::bail!("Unknown config key: {}", key);
        }
    };

    match value {
        Some(v) => println!("{} = {}", key, v),
        None => println!("{} = (not set)", key),
    }

    Ok(())
}

fn show_path() -> Result<()> {
    match Config::config_path() {
        Some(path) => {
            println!("{}", path.display());
            if path.exists() {
                println!("{}", "(exists)".green());
            } else {
                println!("{}", "(not created)".yellow());
            }
        }
        None => {
            println!("{}", "Could not determine config path".red());
        }
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("abcd-1234-5678:fx"), "abcd...8:fx");
    }
}
