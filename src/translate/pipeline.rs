//! Per-file translation session: cache tiers, glossary, recheck and the
//! external translator wired together.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::cache::{CacheError, CacheStore};
use super::context::RunContext;
use super::glossary::Glossary;
use super::machine_translate::MachineTranslator;
use super::metric::UnitConverter;
use super::placeholder::PlaceholderCodec;
use super::recheck::RecheckSet;
use super::tags::Tag;
use super::walker::{CacheTier, FieldTranslator};

const TRANSLATOR_INIT_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("maximum runtime exceeded ({elapsed_secs}s > {limit_secs}s) - aborting")]
    MaxRuntimeExceeded { elapsed_secs: u64, limit_secs: u64 },

    #[error("interrupted")]
    Interrupted,

    #[error("translator unavailable: {0}")]
    TranslatorUnavailable(String),
}

impl PipelineError {
    /// Errors that end the whole run rather than the current file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MaxRuntimeExceeded { .. } | Self::Interrupted | Self::TranslatorUnavailable(_)
        )
    }
}

/// Opens a translator session on first use.
pub type Connector<'a> = dyn FnMut() -> anyhow::Result<Box<dyn MachineTranslator>> + 'a;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub forced_recheck: Vec<String>,
    pub retranslate_glossary_modified: bool,
    pub convert_to_metric: bool,
    pub translate_tags: bool,
}

/// Backing files of the five cache tiers of one data file.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePaths {
    pub file: PathBuf,
    pub file_glossary: PathBuf,
    pub per_string_glossary: PathBuf,
    pub shared: PathBuf,
    pub shared_glossary: PathBuf,
}

impl CachePaths {
    /// `rel` is the data file path relative to the data directory.
    pub fn new(cache_root: &Path, lang: &str, rel: &Path) -> Self {
        let lang_root = cache_root.join(lang);
        let glossary_used = lang_root.join("glossary_used").join(rel);
        let stem = rel
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file: lang_root.join(rel),
            per_string_glossary: glossary_used.with_file_name(format!("{}_per_string.json", stem)),
            file_glossary: glossary_used,
            shared: lang_root.join("shared_cache.json"),
            shared_glossary: lang_root.join("shared_cache_glossary_used.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FileStats {
    pub chars_translated: usize,
    pub chars_cached: usize,
    pub failures: usize,
}

pub struct TranslationSession<'a> {
    glossary: &'a Glossary,
    glossary_snapshot: BTreeMap<String, String>,
    options: &'a SessionOptions,
    ctx: &'a mut RunContext,
    converter: Option<&'a dyn UnitConverter>,
    connect: &'a mut Connector<'a>,
    translator: Option<Box<dyn MachineTranslator>>,
    codec: PlaceholderCodec,

    file_cache: CacheStore<String>,
    file_glossary_cache: CacheStore<String>,
    per_string_glossary_cache: CacheStore<BTreeMap<String, String>>,
    shared_cache: CacheStore<String>,
    shared_glossary_cache: CacheStore<String>,

    recheck: RecheckSet,
    shared_recheck: RecheckSet,
    // Strings already re-translated in this session
    refreshed: HashSet<(CacheTier, String)>,
    // A per-string snapshot on disk means the previous run stopped mid-file
    resuming: bool,
    // Glossary snapshot `recheck` was last built against while resuming
    recheck_snapshot: Option<BTreeMap<String, String>>,
    stats: FileStats,
    closed: bool,
}

impl<'a> TranslationSession<'a> {
    pub fn open(
        paths: &CachePaths,
        glossary: &'a Glossary,
        options: &'a SessionOptions,
        ctx: &'a mut RunContext,
        converter: Option<&'a dyn UnitConverter>,
        connect: &'a mut Connector<'a>,
    ) -> Result<Self, PipelineError> {
        let file_cache = CacheStore::open(&paths.file)?;
        let file_glossary_cache: CacheStore<String> = CacheStore::open(&paths.file_glossary)?;
        let per_string_glossary_cache: CacheStore<BTreeMap<String, String>> =
            CacheStore::open(&paths.per_string_glossary)?;
        let shared_cache = CacheStore::open(&paths.shared)?;
        let shared_glossary_cache: CacheStore<String> = CacheStore::open(&paths.shared_glossary)?;

        let resuming = !per_string_glossary_cache.is_empty();
        let recheck = if resuming {
            tracing::info!(
                "Resuming interrupted translation of {}",
                paths.file.display()
            );
            RecheckSet::new(options.forced_recheck.iter().cloned())
        } else {
            RecheckSet::build(
                &options.forced_recheck,
                glossary,
                file_glossary_cache.entries(),
                options.retranslate_glossary_modified,
            )
        };
        let shared_recheck =
            RecheckSet::build(&[], glossary, shared_glossary_cache.entries(), true);

        if !recheck.is_empty() {
            tracing::debug!(
                "Recheck words: {}",
                recheck.words().collect::<Vec<_>>().join(", ")
            );
        }
        tracing::debug!(
            "{} recheck word(s) for the shared cache",
            shared_recheck.len()
        );

        Ok(Self {
            glossary,
            glossary_snapshot: glossary.snapshot(),
            options,
            ctx,
            converter,
            connect,
            translator: None,
            codec: PlaceholderCodec::new(),
            file_cache,
            file_glossary_cache,
            per_string_glossary_cache,
            shared_cache,
            shared_glossary_cache,
            recheck,
            shared_recheck,
            refreshed: HashSet::new(),
            resuming,
            recheck_snapshot: None,
            stats: FileStats::default(),
            closed: false,
        })
    }

    pub fn some_translation_failed(&self) -> bool {
        self.stats.failures > 0
    }

    /// Translate one string through cache, glossary and translator.
    ///
    /// A failed external translation returns `text` unchanged and is counted
    /// in [`FileStats::failures`].
    pub fn translate(&mut self, text: &str, tier: CacheTier) -> Result<String, PipelineError> {
        let (mut key, mut tags) = self.codec.extract(text);

        // After placeholders, so item names like "rope (50 feet)" in tags
        // are left alone
        if self.options.convert_to_metric {
            if let Some(converter) = self.converter {
                key = converter.convert(&key);
            }
        }

        if self.options.translate_tags {
            for tag in tags.iter_mut() {
                *tag = self.translate_tag(tag)?;
            }
        }

        if !has_words(&self.codec.strip(&key)) {
            return Ok(self.codec.restore(&key, &tags));
        }

        if self.resuming {
            self.update_recheck_for(&key);
        }

        if let Some(cached) = self.cached(&key, tier)? {
            self.stats.chars_cached += text.chars().count();
            self.ctx.chars_cached += text.chars().count();
            return Ok(self.codec.restore(&cached, &tags));
        }

        let from_glossary = self
            .glossary
            .get(&key)
            .or_else(|| self.glossary.get(&key.to_lowercase()))
            .map(str::to_string);
        if let Some(translated) = from_glossary {
            self.save(&key, &translated, tier);
            return Ok(self.codec.restore(&translated, &tags));
        }

        self.ctx.check_budget()?;
        self.stats.chars_translated += text.chars().count();
        self.ctx.chars_translated += text.chars().count();

        let applicable = self.glossary.select_applicable(&key);
        let translator = self.translator()?;
        let translated = translator.translate(&key, &applicable);

        if translated.chars().count() > 1 {
            tracing::info!("Translated: {} => {}", key, translated);
            self.save(&key, &translated, tier);
            Ok(self.codec.restore(&translated, &tags))
        } else if self.ctx.is_interrupted() {
            Err(PipelineError::Interrupted)
        } else {
            tracing::warn!("Translation failed, keeping source text: {}", text);
            self.stats.failures += 1;
            Ok(text.to_string())
        }
    }

    /// Translate the display segments of a tag, leaving references alone.
    fn translate_tag(&mut self, tag: &str) -> Result<String, PipelineError> {
        let mut parsed = Tag::parse(tag);
        let segments: Vec<usize> = parsed.translatable_segments().collect();
        for idx in segments {
            parsed.content[idx] = self.translate(&parsed.content[idx], CacheTier::File)?;
        }
        Ok(parsed.unparse())
    }

    /// Cached translation for `key`, evicting it first when a recheck word
    /// appears in it.
    fn cached(&mut self, key: &str, tier: CacheTier) -> Result<Option<String>, PipelineError> {
        let (cache, recheck) = match tier {
            CacheTier::File => (&mut self.file_cache, &self.recheck),
            CacheTier::Shared => (&mut self.shared_cache, &self.shared_recheck),
        };

        let Some(cached) = cache.get(key).filter(|c| !c.is_empty()).cloned() else {
            return Ok(None);
        };
        let refreshed = self.refreshed.contains(&(tier, key.to_string()));
        if let Some(word) = recheck.find_in(key, &self.codec).filter(|_| !refreshed) {
            tracing::info!("'{}' needs recheck in: {}", word, key);
            cache.delete(key)?;
            return Ok(None);
        }

        tracing::debug!("Cache hit: {}", key);
        Ok(Some(cached))
    }

    /// On resume, compare against the glossary this exact string was last
    /// translated with, falling back to the file level snapshot.
    fn update_recheck_for(&mut self, key: &str) {
        if !self.options.retranslate_glossary_modified {
            return;
        }
        let snapshot = match self.per_string_glossary_cache.get(key) {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => self.file_glossary_cache.entries(),
        };
        if self.recheck_snapshot.as_ref() == Some(snapshot) {
            return;
        }

        self.recheck =
            RecheckSet::build(&self.options.forced_recheck, self.glossary, snapshot, true);
        self.recheck_snapshot = Some(snapshot.clone());
    }

    fn save(&mut self, key: &str, translated: &str, tier: CacheTier) {
        self.refreshed.insert((tier, key.to_string()));
        match tier {
            CacheTier::Shared => self.shared_cache.set(key, translated.to_string()),
            CacheTier::File => {
                self.file_cache.set(key, translated.to_string());
                self.per_string_glossary_cache
                    .set(key, self.glossary_snapshot.clone());
            }
        }
    }

    fn translator(&mut self) -> Result<&mut Box<dyn MachineTranslator>, PipelineError> {
        if self.translator.is_none() {
            let mut last_error = String::new();
            for attempt in 1..=TRANSLATOR_INIT_ATTEMPTS {
                match (self.connect)() {
                    Ok(translator) => {
                        self.translator = Some(translator);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Translator init failed, try {}/{}: {:#}",
                            attempt,
                            TRANSLATOR_INIT_ATTEMPTS,
                            e
                        );
                        last_error = format!("{:#}", e);
                    }
                }
            }
            if self.translator.is_none() {
                return Err(PipelineError::TranslatorUnavailable(last_error));
            }
        }

        self.translator
            .as_mut()
            .ok_or_else(|| PipelineError::TranslatorUnavailable("no session".to_string()))
    }

    /// Every string of the file went through: record the glossary in use
    /// and, if nothing failed, drop the resume state.
    pub fn mark_complete(&mut self) {
        self.file_glossary_cache
            .replace_all(self.glossary_snapshot.clone());
        self.shared_glossary_cache
            .replace_all(self.glossary_snapshot.clone());

        if self.some_translation_failed() {
            tracing::warn!(
                "{} string(s) failed, keeping resume state",
                self.stats.failures
            );
        } else {
            self.per_string_glossary_cache.replace_all(BTreeMap::new());
        }
    }

    /// Flush all cache tiers and release the translator.
    pub fn close(mut self) -> Result<FileStats, PipelineError> {
        self.closed = true;
        self.teardown()?;
        Ok(self.stats)
    }

    fn teardown(&mut self) -> Result<(), PipelineError> {
        if let Some(mut translator) = self.translator.take() {
            translator.quit();
        }

        // Flush every tier even if one fails
        let results = [
            self.file_cache.sync(),
            self.per_string_glossary_cache.sync(),
            self.file_glossary_cache.sync(),
            self.shared_cache.sync(),
            self.shared_glossary_cache.sync(),
        ];
        for result in results {
            result?;
        }
        Ok(())
    }
}

impl Drop for TranslationSession<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.teardown() {
                tracing::error!("Failed to flush translation caches: {}", e);
            }
        }
    }
}

impl FieldTranslator for TranslationSession<'_> {
    type Error = PipelineError;

    fn translate_field(&mut self, text: &str, tier: CacheTier) -> Result<String, Self::Error> {
        self.translate(text, tier)
    }
}

/// At least one run of two ASCII letters once placeholders are gone; bare
/// numbers, dice and punctuation are left as is.
fn has_words(text: &str) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            run += 1;
            if run >= 2 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}
