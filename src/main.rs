mod app;
mod state;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;

use audiogram_annotator::annotation::AnnotationLog;
use audiogram_annotator::cache::CacheManager;
use audiogram_annotator::config::Config;
use audiogram_annotator::data::loader;

use app::AnnotatorApp;
use state::AppState;

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::parse();

    let table = loader::load_archive(&config.archive)
        .with_context(|| format!("Failed to load archive {}", config.archive.display()))?;
    let cache = CacheManager::new(Arc::new(table), &config.cache_dir);
    let log = AnnotationLog::new(&config.annotation_dir);

    if !config.keep_cache {
        cache.clear().context("Failed to clear cache directory")?;
        log.clear().context("Failed to clear annotation directory")?;
    }

    if config.cache_all {
        cache.cache_all().context("Failed to populate cache")?;
        let stats = cache.stats();
        log::info!(
            "Cache populated: {} summaries, {} charts generated",
            stats.summaries_generated,
            stats.plots_generated
        );
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    let state = AppState::new(cache, log, config.reviewer_names());
    eframe::run_native(
        "Audiogram Annotator",
        options,
        Box::new(|cc| {
            // Install image loaders so egui can decode the PNG charts.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(AnnotatorApp::new(state)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}
