use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use imagegen_core::api::{
    AppConfig, CliError, Deck, DrainSummary, GenerationEvent, ImageGenerationManager,
    InMemorySlideStore, SettingsPatch,
};
use imagegen_plugins::factory::build_generator;

use super::cli::RunArgs;

pub async fn run(args: RunArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let deck = read_deck(&args.deck).await?;
    let store = Arc::new(InMemorySlideStore::new(deck));
    let generator = build_generator(&cfg)?;

    let mut collect = cfg.collect;
    if args.regenerate_filled {
        collect.skip_filled_interactive = false;
    }

    let manager = ImageGenerationManager::builder(generator, store.clone())
        .settings(cfg.generation.clone())
        .collect_options(collect)
        .router_config(cfg.router)
        .model(cfg.client.model.clone())
        .build()?;
    manager.update_settings(&settings_patch(&args))?;

    let show_bar = !args.quiet && atty::is(atty::Stream::Stderr);
    let (bar, listener) = spawn_progress(manager.subscribe(), show_bar);

    let outcome = match args.slide.as_deref() {
        Some(slide_id) => manager.process_slide_images(slide_id).await,
        None => Ok(manager.process_document().await),
    };

    match &outcome {
        Ok(Some(_)) => {
            let _ = listener.await;
        }
        _ => listener.abort(),
    }
    bar.finish_and_clear();
    let summary = outcome?;

    let output = args.output.as_deref().unwrap_or(&args.deck);
    write_deck(output, &store.snapshot()).await?;

    let Some(summary) = summary else {
        println!("no images to generate");
        return Ok(0);
    };
    println!("{}", render_summary(&summary));
    tracing::info!(
        target: "imagegen.cli",
        stage = "cli.run.end",
        success = summary.success,
        failed = summary.failed,
        output = %output,
    );

    if summary.failed > 0 {
        return Err(CliError::Generation {
            failed: summary.failed,
            total: summary.success + summary.failed,
        });
    }
    Ok(0)
}

fn settings_patch(args: &RunArgs) -> SettingsPatch {
    SettingsPatch {
        concurrency: args.concurrency,
        max_retries: args.max_retries,
        enable_cache: args.no_cache.then_some(false),
        ..SettingsPatch::default()
    }
}

async fn read_deck(path: &str) -> Result<Deck, CliError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn write_deck(path: &str, deck: &Deck) -> Result<(), CliError> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(deck)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

/// Feeds the progress bar from manager events until the drain finishes.
fn spawn_progress(
    mut rx: broadcast::Receiver<GenerationEvent>,
    visible: bool,
) -> (ProgressBar, JoinHandle<()>) {
    let bar = if visible {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} images {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let handle = {
        let bar = bar.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(GenerationEvent::EpochStarted { total, .. }) => bar.inc_length(total as u64),
                    Ok(GenerationEvent::TaskCompleted { success, .. }) => {
                        bar.inc(1);
                        if !success {
                            bar.set_message("(with failures)");
                        }
                    }
                    Ok(GenerationEvent::TaskRetryScheduled { attempt, .. }) => {
                        bar.set_message(format!("retrying (attempt {attempt})"));
                    }
                    Ok(GenerationEvent::DrainFinished { .. }) => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };
    (bar, handle)
}

fn render_summary(summary: &DrainSummary) -> String {
    format!(
        "generated {} image(s), {} failed, {} retried, {} from cache ({} batch(es), {} ms)",
        summary.success,
        summary.failed,
        summary.retried,
        summary.cache_hits,
        summary.batches,
        summary.duration_ms
    )
}
