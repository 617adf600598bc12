use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use crate::commands::Paths;
use crate::error::CliError;

fn describe(path: &std::path::Path) -> String {
    let state = if path.exists() {
        "(exists)".if_supports_color(Stdout, |t| t.green()).to_string()
    } else {
        "(not found)".if_supports_color(Stdout, |t| t.dimmed()).to_string()
    };
    format!("{} {}", path.display().if_supports_color(Stdout, |t| t.cyan()), state)
}

/// Show the effective settings.
pub(crate) fn run_config_show(paths: &Paths) -> Result<(), CliError> {
    let settings = paths.load_settings()?;

    log::info!("{}", "gamesync Configuration".if_supports_color(Stdout, |t| t.bold()));
    log::info!("");
    log::info!("  Settings file: {}", describe(&paths.settings));
    log::info!("  Systems file:  {}", describe(&paths.systems));
    log::info!("  Recovery dir:  {}", settings.recovery_root().display());
    log::info!("");

    let rendered = toml::to_string_pretty(&settings)
        .map_err(|e| CliError::config(format!("could not render settings: {e}")))?;
    for line in rendered.lines() {
        log::info!("  {}", line);
    }
    Ok(())
}

/// Print the config file paths.
pub(crate) fn run_config_path(paths: &Paths) -> Result<(), CliError> {
    println!("{}", paths.settings.display());
    println!("{}", paths.systems.display());
    Ok(())
}
