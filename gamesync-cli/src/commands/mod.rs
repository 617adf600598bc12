pub(crate) mod cleanup;
pub(crate) mod config;
pub(crate) mod recovery;
pub(crate) mod scrape;
pub(crate) mod systems;
pub(crate) mod update;

use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamesync_core::settings;
use gamesync_core::{Settings, SystemRegistry};
use gamesync_gamelist::parse_gamelist;

use crate::cli_types::SystemFilterArgs;
use crate::error::CliError;

/// Where the settings and the system registry are read from.
pub(crate) struct Paths {
    pub settings: PathBuf,
    pub systems: PathBuf,
}

impl Paths {
    pub(crate) fn resolve(settings: Option<PathBuf>, systems: Option<PathBuf>) -> Self {
        let settings = settings.unwrap_or_else(settings::settings_path);
        let systems = systems.unwrap_or_else(|| match settings.parent() {
            Some(dir) => dir.join("systems.toml"),
            None => settings::systems_path(),
        });
        Self { settings, systems }
    }

    pub(crate) fn load_settings(&self) -> Result<Settings, CliError> {
        Ok(Settings::load(&self.settings)?)
    }

    /// The registry restricted to the systems named in `filter`.
    pub(crate) fn load_registry(&self, filter: &SystemFilterArgs) -> Result<SystemRegistry, CliError> {
        if !self.systems.exists() {
            return Err(CliError::config(format!(
                "no system registry at {}",
                self.systems.display()
            )));
        }
        let all = SystemRegistry::load(&self.systems)?;
        let Some(names) = &filter.systems else {
            return Ok(all);
        };

        let mut selected = SystemRegistry::default();
        for name in names {
            let system = all
                .systems()
                .iter()
                .find(|s| s.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| CliError::unknown_system(name.as_str()))?;
            selected.push(system.clone());
        }
        Ok(selected)
    }
}

/// Scan every system and load its gamelist plus journal. Systems whose ROM
/// folder cannot be scanned are dropped with a warning.
pub(crate) fn load_systems(registry: SystemRegistry, settings: &Settings) -> SystemRegistry {
    let mut loaded = SystemRegistry::default();
    for mut system in registry.systems().iter().cloned() {
        if let Err(e) = system.populate() {
            log::warn!(
                "{} Skipping {}: {}",
                "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                system.name().if_supports_color(Stdout, |t| t.bold()),
                e
            );
            continue;
        }
        parse_gamelist(&mut system, settings);
        loaded.push(system);
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEMS: &str = r#"
[[system]]
name = "mame"
path = "/roms/mame"
extensions = ["zip"]
platforms = ["arcade"]

[[system]]
name = "snes"
path = "/roms/snes"
extensions = ["sfc", "smc"]
"#;

    #[test]
    fn test_systems_file_defaults_next_to_settings() {
        let paths = Paths::resolve(Some(PathBuf::from("/etc/gamesync/settings.toml")), None);
        assert_eq!(paths.systems, PathBuf::from("/etc/gamesync/systems.toml"));

        let paths = Paths::resolve(None, Some(PathBuf::from("my-systems.toml")));
        assert_eq!(paths.systems, PathBuf::from("my-systems.toml"));
    }

    #[test]
    fn test_registry_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let systems = tmp.path().join("systems.toml");
        std::fs::write(&systems, SYSTEMS).unwrap();
        let paths = Paths::resolve(Some(tmp.path().join("settings.toml")), None);

        let all = paths.load_registry(&SystemFilterArgs::default()).unwrap();
        assert_eq!(all.len(), 2);

        let only = paths
            .load_registry(&SystemFilterArgs {
                systems: Some(vec!["SNES".to_string()]),
            })
            .unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only.systems()[0].name(), "snes");

        let unknown = paths.load_registry(&SystemFilterArgs {
            systems: Some(vec!["n64".to_string()]),
        });
        assert!(matches!(unknown, Err(CliError::UnknownSystem(name)) if name == "n64"));
    }

    #[test]
    fn test_missing_registry_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::resolve(Some(tmp.path().join("settings.toml")), None);
        assert!(matches!(
            paths.load_registry(&SystemFilterArgs::default()),
            Err(CliError::Config(_))
        ));
    }
}
