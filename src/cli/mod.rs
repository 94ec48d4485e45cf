use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rulebook-tl")]
#[command(author, version, about = "Cached, glossary-aware translation of tabletop rules data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate rules data files through the cache and translation service
    Translate(TranslateArgs),

    /// Apply the glossary to already translated output files
    Replace(ReplaceArgs),

    /// Re-key file caches to placeholder form
    Migrate(MigrateArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., api.deepl_api_key)
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show config file path
    Path,
}

#[derive(Parser, Debug)]
pub struct TranslateArgs {
    /// Data files or directories of data files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Target language (es, de, it, ru, zh, pl, sv, fr, nl)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Write translated files to the output directory
    #[arg(short, long, default_value_t = false)]
    pub write: bool,

    /// Stop after this many seconds (0 = no limit)
    #[arg(long)]
    pub maxrun: Option<u64>,

    /// Retranslate cached strings containing these words
    #[arg(long, num_args = 1..)]
    pub recheck_words: Vec<String>,

    /// Retranslate cached strings using glossary terms changed since last run
    #[arg(long, default_value_t = false)]
    pub retranslate_glossary_modified: bool,

    /// Convert imperial units to metric before translating
    #[arg(long, default_value_t = false)]
    pub convert_to_metric_system: bool,

    /// Translate display text inside markup tags
    #[arg(long, default_value_t = false)]
    pub translate_tags: bool,

    /// API provider (deepl, google)
    #[arg(long)]
    pub api: Option<String>,

    /// API key (can also be set via environment variable)
    #[arg(long)]
    pub api_key: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ReplaceArgs {
    /// Source data files or directories; their translated copies are updated
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Target language
    #[arg(short, long)]
    pub language: Option<String>,
}

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Source data files or directories whose caches are migrated
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Target language
    #[arg(short, long)]
    pub language: Option<String>,
}
