use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamesync_core::{Settings, SystemRegistry};
use gamesync_gamelist::update_gamelist;

use crate::cli_types::SystemFilterArgs;
use crate::commands::{Paths, load_systems};
use crate::error::CliError;

pub(crate) fn run_update(paths: &Paths, filter: &SystemFilterArgs) -> Result<(), CliError> {
    let settings = paths.load_settings()?;
    let mut registry = load_systems(paths.load_registry(filter)?, &settings);
    let failed = write_gamelists(&mut registry, &settings);
    if failed > 0 {
        return Err(CliError::config(format!("{failed} gamelist(s) could not be written")));
    }
    Ok(())
}

/// Fold pending changes of every system into its gamelist. Returns the number
/// of systems that failed.
pub(crate) fn write_gamelists(registry: &mut SystemRegistry, settings: &Settings) -> usize {
    let mut failed = 0;
    for system in registry.systems_mut() {
        match update_gamelist(system, settings) {
            Ok(outcome) if outcome.skipped => {
                log::debug!("[{}] skipped", system.name());
            }
            Ok(outcome) if outcome.written => {
                log::info!(
                    "{} {} {} entr{} written to {}",
                    "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                    system.name().if_supports_color(Stdout, |t| t.bold()),
                    outcome.updated,
                    if outcome.updated == 1 { "y" } else { "ies" },
                    system.gamelist_path().display(),
                );
            }
            Ok(_) => {
                log::info!(
                    "  {} {}",
                    system.name().if_supports_color(Stdout, |t| t.bold()),
                    "up to date".if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
            Err(e) => {
                failed += 1;
                log::error!(
                    "{} {}: {}",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    system.name(),
                    e
                );
            }
        }
    }
    failed
}
