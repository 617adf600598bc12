//! gamesync CLI
//!
//! Command-line front end for gamelist maintenance and scraping.

mod cli_types;
mod commands;
mod error;
mod progress;

use std::io::Write;

use clap::Parser;
use log::LevelFilter;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use cli_types::{Cli, Commands, ConfigAction, RecoveryAction};
use commands::Paths;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let paths = Paths::resolve(cli.settings, cli.systems);
    let result = match cli.command {
        Commands::Systems { filter } => commands::systems::run_systems(&paths, &filter),
        Commands::Update { filter } => commands::update::run_update(&paths, &filter),
        Commands::Cleanup { filter } => commands::cleanup::run_cleanup(&paths, &filter),
        Commands::Scrape {
            filter,
            missing_only,
            no_write,
            game,
            name,
        } => commands::scrape::run_scrape(
            &paths,
            &filter,
            commands::scrape::ScrapeOptions {
                missing_only,
                no_write,
                game,
                name,
                quiet: cli.quiet,
            },
        ),
        Commands::Recovery { action } => match action {
            RecoveryAction::Status { filter } => commands::recovery::run_recovery_status(&paths, &filter),
            RecoveryAction::Clear { filter } => commands::recovery::run_recovery_clear(&paths, &filter),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(&paths),
            ConfigAction::Path => commands::config::run_config_path(&paths),
        },
    };

    if let Err(e) = result {
        log::error!("{} {}", "\u{2718}".if_supports_color(Stdout, |t| t.red()), e);
        std::process::exit(1);
    }
}

/// Plain messages at the default level, since info lines are the command's
/// output. `RUST_LOG` still overrides the level.
fn init_logging(quiet: bool, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stdout);
    if verbose {
        builder.format_timestamp_millis();
    } else {
        builder.format(|buf, record| match record.level() {
            log::Level::Info | log::Level::Debug | log::Level::Trace => {
                writeln!(buf, "{}", record.args())
            }
            level => writeln!(buf, "{}: {}", level, record.args()),
        });
    }
    builder.init();
}
