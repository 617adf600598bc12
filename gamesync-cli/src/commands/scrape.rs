use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamesync_core::paths;
use gamesync_scraper::{
    ReqwestTransport, RunSummary, ScrapeContext, ScrapeFilter, ThreadedScraper, build_search_queue,
    scraper_by_name,
};

use crate::cli_types::SystemFilterArgs;
use crate::commands::update::write_gamelists;
use crate::commands::{Paths, load_systems};
use crate::error::CliError;
use crate::progress::SpinnerSink;

const PUMP_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) struct ScrapeOptions {
    pub missing_only: bool,
    pub no_write: bool,
    pub game: Option<PathBuf>,
    pub name: Option<String>,
    pub quiet: bool,
}

pub(crate) fn run_scrape(paths: &Paths, filter: &SystemFilterArgs, options: ScrapeOptions) -> Result<(), CliError> {
    let settings = paths.load_settings()?;
    let scraper = scraper_by_name(&settings.scraper, &settings.scrape)?;
    let mut registry = load_systems(paths.load_registry(filter)?, &settings);

    let scrape_filter = if options.missing_only {
        ScrapeFilter::MissingMedia
    } else {
        ScrapeFilter::All
    };
    let mut queue = build_search_queue(&registry, scraper.as_ref(), scrape_filter, &settings.scrape);

    if let Some(game) = &options.game {
        let wanted = match std::path::absolute(game) {
            Ok(path) => paths::normalize(&path),
            Err(_) => paths::normalize(game),
        };
        queue.retain(|p| p.path == wanted);
        if queue.is_empty() {
            return Err(CliError::config(format!(
                "{} is not a scrapable game of the selected systems",
                game.display()
            )));
        }
        for params in queue.iter_mut() {
            params.name_override = options.name.clone();
        }
    }

    if queue.is_empty() {
        log::info!("Nothing to scrape.");
        return Ok(());
    }

    log::info!(
        "Scraping {} game(s) with {} ({} at a time)",
        queue.len(),
        scraper.name().if_supports_color(Stdout, |t| t.cyan()),
        scraper.thread_count()
    );
    if options.no_write {
        log::info!(
            "  {}",
            "Results stay in the recovery journal".if_supports_color(Stdout, |t| t.dimmed())
        );
    }

    let transport = Arc::new(ReqwestTransport::new()?);
    let context = ScrapeContext::new(transport, settings.scrape.clone());
    let Some(run) = ThreadedScraper::start(queue, scraper, context) else {
        return Err(CliError::config("could not start the scrape run"));
    };

    let mut sink = SpinnerSink::new(options.quiet);
    let summary = run.join(&mut registry, &settings, &mut sink, PUMP_INTERVAL);
    sink.finish();
    print_summary(&summary);

    if !options.no_write {
        let failed = write_gamelists(&mut registry, &settings);
        if failed > 0 {
            return Err(CliError::config(format!("{failed} gamelist(s) could not be written")));
        }
    }

    match summary.fatal {
        Some(fatal) => Err(CliError::config(format!("scraping stopped: {fatal}"))),
        None => Ok(()),
    }
}

fn print_summary(summary: &RunSummary) {
    log::info!("");
    log::info!("{}", "Summary:".if_supports_color(Stdout, |t| t.bold()));
    log::info!(
        "  {} {} scraped",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        summary.accepted
    );
    if summary.not_found > 0 {
        log::info!(
            "  {} {} not found",
            "?".if_supports_color(Stdout, |t| t.yellow()),
            summary.not_found
        );
    }
    if summary.failed > 0 {
        log::info!(
            "  {} {} failed",
            "\u{2718}".if_supports_color(Stdout, |t| t.red()),
            summary.failed
        );
        for error in &summary.errors {
            log::warn!("    {}", error);
        }
    }
    if summary.cancelled {
        log::info!(
            "  {} cancelled after {} of {}",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            summary.accepted + summary.not_found + summary.failed,
            summary.total
        );
    }
}
