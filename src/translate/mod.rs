pub mod cache;
pub mod context;
pub mod glossary;
pub mod machine_translate;
pub mod metric;
pub mod pipeline;
pub mod placeholder;
pub mod recheck;
pub mod tags;
pub mod walker;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cli::TranslateArgs;
use crate::config::Config;
use crate::utils::{collect_data_files, relative_to_data, resolve_language, truncate_display};
use cache::to_json_pretty;
use context::RunContext;
use glossary::Glossary;
use machine_translate::{
    MachineTranslateClient, MachineTranslateConfig, MachineTranslateProvider, MachineTranslator,
};
use metric::{MetricConverter, UnitConverter};
use pipeline::{CachePaths, Connector, FileStats, PipelineError, SessionOptions, TranslationSession};

/// Everything a file needs that stays the same for the whole run.
struct RunSettings<'a> {
    cfg: &'a Config,
    lang: &'a str,
    glossary: &'a Glossary,
    options: &'a SessionOptions,
    converter: &'a MetricConverter,
    write: bool,
}

pub fn run(args: TranslateArgs) -> Result<()> {
    // Load config
    let cfg = Config::load()?;

    // Determine language and provider (CLI arg > config)
    let lang = resolve_language(args.language.as_deref(), &cfg)?;
    let provider_str = args
        .api
        .clone()
        .unwrap_or_else(|| cfg.api.provider.clone());
    let provider = MachineTranslateProvider::from_str(&provider_str)
        .with_context(|| format!("Unknown API provider: {}", provider_str))?;
    let api_key = args
        .api_key
        .clone()
        .or_else(|| cfg.get_api_key(&provider_str));

    let files = collect_data_files(&args.files, &cfg.paths)?;
    if files.is_empty() {
        println!("{}", "[WARN] No data files to translate".yellow());
        return Ok(());
    }

    let glossary = Glossary::load(cfg.paths.glossary_dir.join(&lang))?;
    println!(
        "{}",
        format!(
            "[Translate] {} file(s) to {} with {} glossary term(s)",
            files.len(),
            lang,
            glossary.len()
        )
        .green()
    );

    let options = SessionOptions {
        forced_recheck: args.recheck_words.clone(),
        retranslate_glossary_modified: args.retranslate_glossary_modified,
        convert_to_metric: args.convert_to_metric_system,
        translate_tags: args.translate_tags,
    };
    let converter = MetricConverter::new();
    let settings = RunSettings {
        cfg: &cfg,
        lang: &lang,
        glossary: &glossary,
        options: &options,
        converter: &converter,
        write: args.write,
    };

    let mut ctx = RunContext::new(args.maxrun.unwrap_or(cfg.translation.max_runtime_secs));
    let interrupt = ctx.interrupt_flag();
    let _signals = listen_for_interrupt(Arc::clone(&interrupt))?;

    // Only contacted on the first cache miss
    let mut connect = || -> Result<Box<dyn MachineTranslator>> {
        let config = match provider {
            MachineTranslateProvider::Google => MachineTranslateConfig::google(&lang),
            MachineTranslateProvider::DeepL => {
                let key = api_key.clone().context(
                    "DeepL API key required. Set via --api-key, config, or DEEPL_API_KEY",
                )?;
                MachineTranslateConfig::deepl(&lang, key)
                    .with_api_base(cfg.api.deepl_api_base.clone())
            }
        }
        .with_max_retries(cfg.api.max_retries)
        .with_glossary_capacity(cfg.api.glossary_capacity)
        .with_interrupt(Arc::clone(&interrupt));

        let client = MachineTranslateClient::new(config)?;
        tracing::info!("Connected to {}", client.provider_name());
        Ok(Box::new(client))
    };

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut failed_files = 0;
    let mut partial_files = 0;

    for file in &files {
        pb.set_message(truncate_display(&file.display().to_string(), 40));

        match translate_file(&settings, file, &mut ctx, &mut connect) {
            Ok(stats) => {
                if stats.failures > 0 {
                    partial_files += 1;
                }
                pb.suspend(|| {
                    println!(
                        "  {} {} cached, {} translated{}",
                        file.display(),
                        stats.chars_cached,
                        stats.chars_translated,
                        if stats.failures > 0 {
                            format!(", {} failed", stats.failures).yellow().to_string()
                        } else {
                            String::new()
                        }
                    );
                });
            }
            Err(e) => {
                let fatal = e
                    .downcast_ref::<PipelineError>()
                    .map(PipelineError::is_fatal)
                    .unwrap_or(false);
                if fatal {
                    pb.abandon();
                    print_totals(&ctx);
                    return Err(e.context(format!("Stopped while translating {}", file.display())));
                }

                failed_files += 1;
                pb.suspend(|| {
                    eprintln!(
                        "{}",
                        format!("[ERROR] Failed to translate {}: {:#}", file.display(), e).red()
                    );
                });
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    print_totals(&ctx);

    if partial_files > 0 {
        println!(
            "{}",
            format!(
                "[WARN] {} file(s) have untranslated strings, rerun to resume",
                partial_files
            )
            .yellow()
        );
    }
    if failed_files > 0 {
        anyhow::bail!("{} file(s) failed", failed_files);
    }

    println!("{}", "[OK] Translation finished".green());
    Ok(())
}

fn translate_file(
    settings: &RunSettings<'_>,
    file: &Path,
    ctx: &mut RunContext,
    connect: &mut Connector<'_>,
) -> Result<FileStats> {
    let rel = relative_to_data(file, &settings.cfg.paths.data_dir);
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read data file: {}", file.display()))?;
    let mut data: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", file.display()))?;

    let paths = CachePaths::new(&settings.cfg.paths.cache_dir, settings.lang, &rel);
    let converter: &dyn UnitConverter = settings.converter;
    let mut session = TranslationSession::open(
        &paths,
        settings.glossary,
        settings.options,
        ctx,
        Some(converter),
        connect,
    )?;

    // On error the session flushes its caches when dropped
    walker::walk(&mut data, &mut session)?;
    session.mark_complete();
    let stats = session.close()?;

    if settings.write {
        let output = settings.cfg.paths.output_dir(settings.lang).join(&rel);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&output, to_json_pretty(&data)?)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        tracing::info!("Wrote {}", output.display());
    }

    Ok(stats)
}

fn print_totals(ctx: &RunContext) {
    println!(
        "{}",
        format!(
            "[Translate] {} chars from cache, {} chars translated in {}s",
            ctx.chars_cached,
            ctx.chars_translated,
            ctx.elapsed().as_secs()
        )
        .cyan()
    );
}

/// Raise `flag` on Ctrl-C. The translator gives up its retries and the
/// pipeline stops before the next call, flushing the caches on the way out.
fn listen_for_interrupt(flag: Arc<AtomicBool>) -> Result<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to start signal listener")?;

    runtime.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if flag.swap(true, Ordering::SeqCst) {
                tracing::warn!("Already stopping, waiting for the caches to be saved");
            } else {
                tracing::warn!("Interrupted, finishing current string and saving caches");
            }
        }
    });

    Ok(runtime)
}
