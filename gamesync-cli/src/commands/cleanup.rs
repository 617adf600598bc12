use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamesync_gamelist::cleanup_gamelist;

use crate::cli_types::SystemFilterArgs;
use crate::commands::{Paths, load_systems};
use crate::error::CliError;

pub(crate) fn run_cleanup(paths: &Paths, filter: &SystemFilterArgs) -> Result<(), CliError> {
    let settings = paths.load_settings()?;
    let mut registry = load_systems(paths.load_registry(filter)?, &settings);

    let mut failed = 0;
    for system in registry.systems_mut() {
        let outcome = match cleanup_gamelist(system, &settings) {
            Ok(outcome) => outcome,
            Err(e) => {
                failed += 1;
                log::error!(
                    "{} {}: {}",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    system.name(),
                    e
                );
                continue;
            }
        };
        if outcome.skipped {
            continue;
        }
        if !outcome.changed() && outcome.deleted_files.is_empty() {
            log::info!(
                "  {} {}",
                system.name().if_supports_color(Stdout, |t| t.bold()),
                "clean".if_supports_color(Stdout, |t| t.dimmed()),
            );
            continue;
        }

        log::info!(
            "{} {}",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            system.name().if_supports_color(Stdout, |t| t.bold()),
        );
        log::info!("    Removed entries: {}", outcome.removed_nodes);
        log::info!("    Added entries:   {}", outcome.added_nodes);
        log::info!("    Media linked:    {}", outcome.media_linked);
        log::info!("    Media unlinked:  {}", outcome.media_removed);
        if !outcome.deleted_files.is_empty() {
            log::info!("    Deleted orphaned media:");
            for path in &outcome.deleted_files {
                log::info!("      {}", path.display().if_supports_color(Stdout, |t| t.dimmed()));
            }
        }
    }

    if failed > 0 {
        return Err(CliError::config(format!("{failed} gamelist(s) could not be cleaned")));
    }
    Ok(())
}
