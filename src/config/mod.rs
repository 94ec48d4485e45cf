//! Configuration management

pub mod commands;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::translate::machine_translate::{DEFAULT_GLOSSARY_CAPACITY, DEFAULT_MAX_RETRIES};

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "rulebook-tl";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub translation: TranslationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the source data files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root of the per-language translation caches
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Root of the per-language glossary fragments
    #[serde(default = "default_glossary_dir")]
    pub glossary_dir: PathBuf,

    /// Translated files go to `<output_prefix>.<lang>/`
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Data sub-paths that are never translated
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("translation/cache")
}

fn default_glossary_dir() -> PathBuf {
    PathBuf::from("translation/glossary")
}

fn default_output_prefix() -> String {
    "data".to_string()
}

fn default_skip_prefixes() -> Vec<String> {
    vec!["generated".to_string()]
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
            glossary_dir: default_glossary_dir(),
            output_prefix: default_output_prefix(),
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl PathsConfig {
    /// Directory the translated files of `lang` are written to.
    pub fn output_dir(&self, lang: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.output_prefix, lang))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Default API provider (deepl, google)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// DeepL API key (free or pro)
    #[serde(default)]
    pub deepl_api_key: Option<String>,

    /// DeepL API base URL
    #[serde(default)]
    pub deepl_api_base: Option<String>,

    /// Attempts per text before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Most glossary terms sent along with one text
    #[serde(default = "default_glossary_capacity")]
    pub glossary_capacity: usize,
}

fn default_provider() -> String {
    "deepl".to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_glossary_capacity() -> usize {
    DEFAULT_GLOSSARY_CAPACITY
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            deepl_api_key: None,
            deepl_api_base: None,
            max_retries: default_max_retries(),
            glossary_capacity: default_glossary_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Default target language
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Wall-clock budget of a translate run, 0 for none
    #[serde(default)]
    pub max_runtime_secs: u64,
}

fn default_language() -> String {
    "fr".to_string()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            max_runtime_secs: 0,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE_NAME))
    }

    /// Load config from default location
    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config path")?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to default location
    pub fn save(&self) -> Result<PathBuf> {
        let dir = Self::config_dir().context("Could not determine config directory")?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content).context("Failed to write config file")?;

        Ok(path)
    }

    /// Get API key for the specified provider
    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        match provider.to_lowercase().as_str() {
            "deepl" => self
                .api
                .deepl_api_key
                .clone()
                .or_else(|| std::env::var("DEEPL_API_KEY").ok()),
            _ => None,
        }
    }
}
