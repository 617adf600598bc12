use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamesync_core::EntityFilter;
use gamesync_gamelist::recovery_fragments;

use crate::cli_types::SystemFilterArgs;
use crate::commands::{Paths, load_systems};
use crate::error::CliError;

pub(crate) fn run_systems(paths: &Paths, filter: &SystemFilterArgs) -> Result<(), CliError> {
    let settings = paths.load_settings()?;
    let configured = paths.load_registry(filter)?;
    if configured.is_empty() {
        log::info!("No systems configured in {}", paths.systems.display());
        return Ok(());
    }
    let registry = load_systems(configured, &settings);

    log::info!("Systems:");
    log::info!("");
    for system in registry.systems() {
        let tree = system.tree();
        let dirty = tree
            .files_recursive(tree.root(), EntityFilter::All)
            .into_iter()
            .filter(|id| tree.get(*id).is_some_and(|e| e.metadata.is_dirty()))
            .count();
        let journaled = recovery_fragments(&settings, system).len();

        log::info!(
            "  {} [{}]{}",
            system.name().if_supports_color(Stdout, |t| t.bold()),
            system.full_name().if_supports_color(Stdout, |t| t.cyan()),
            if system.is_collection() {
                format!(" {}", "(collection)".if_supports_color(Stdout, |t| t.dimmed()))
            } else {
                String::new()
            },
        );
        log::info!("    Path: {}", system.start_path().display());
        log::info!("    Games: {}", system.games().len());
        if !system.config().platforms.is_empty() {
            log::info!("    Platforms: {}", system.config().platforms.join(", "));
        }
        if dirty > 0 || journaled > 0 {
            log::info!(
                "    {} {} pending change(s), {} journal fragment(s)",
                "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                dirty,
                journaled
            );
        }
    }
    Ok(())
}
