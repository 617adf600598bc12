use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamesync_gamelist::{clear_gamelist_recovery, recovery_fragments, recovery_path};

use crate::cli_types::SystemFilterArgs;
use crate::commands::Paths;
use crate::error::CliError;

pub(crate) fn run_recovery_status(paths: &Paths, filter: &SystemFilterArgs) -> Result<(), CliError> {
    let settings = paths.load_settings()?;
    let registry = paths.load_registry(filter)?;

    log::info!(
        "Recovery journal: {}",
        settings.recovery_root().display().if_supports_color(Stdout, |t| t.cyan())
    );
    let mut total = 0;
    for system in registry.systems() {
        let fragments = recovery_fragments(&settings, system);
        total += fragments.len();
        if fragments.is_empty() {
            continue;
        }
        log::info!(
            "  {} {} fragment(s)",
            system.name().if_supports_color(Stdout, |t| t.bold()),
            fragments.len()
        );
        let base = recovery_path(&settings, system);
        for fragment in &fragments {
            let shown = fragment.strip_prefix(&base).unwrap_or(fragment);
            log::debug!("    {}", shown.display());
        }
    }
    if total == 0 {
        log::info!("  {}", "empty".if_supports_color(Stdout, |t| t.dimmed()));
    } else {
        log::info!("");
        log::info!("Run 'gamesync update' to apply, or 'gamesync recovery clear' to discard.");
    }
    Ok(())
}

pub(crate) fn run_recovery_clear(paths: &Paths, filter: &SystemFilterArgs) -> Result<(), CliError> {
    let settings = paths.load_settings()?;
    let registry = paths.load_registry(filter)?;

    let mut removed = 0;
    for system in registry.systems() {
        removed += clear_gamelist_recovery(system, &settings)?;
    }
    log::info!(
        "{} Removed {} journal fragment(s)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        removed
    );
    Ok(())
}
