//! Application settings (`settings.toml`) and their on-disk location.
//!
//! Both the settings file and the default `systems.toml` live under
//! `~/.config/gamesync/`. Saving merges into the existing document so keys
//! written by other tools survive.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Directory holding `settings.toml` and `systems.toml`.
pub fn app_config_dir() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("gamesync")
}

/// Canonical path to the settings file: `~/.config/gamesync/settings.toml`.
pub fn settings_path() -> PathBuf {
    app_config_dir().join("settings.toml")
}

/// Default system registry path: `~/.config/gamesync/systems.toml`.
pub fn systems_path() -> PathBuf {
    app_config_dir().join("systems.toml")
}

fn default_scraper() -> String {
    "ArcadeDB".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Front-end config directory; the recovery journal lives beneath it.
    pub config_dir: PathBuf,
    /// Never read or write gamelist files.
    pub ignore_gamelist: bool,
    /// Trust gamelist paths without checking that the files exist.
    pub parse_gamelist_only: bool,
    #[serde(default = "default_scraper")]
    pub scraper: String,
    pub scrape: ScrapeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: app_config_dir(),
            ignore_gamelist: false,
            parse_gamelist_only: false,
            scraper: default_scraper(),
            scrape: ScrapeSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub threads: usize,
    /// Maximum image width after download; 0 keeps the aspect ratio.
    pub resize_width: u32,
    /// Maximum image height after download; 0 keeps the aspect ratio.
    pub resize_height: u32,
    pub overwrite_medias: bool,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub fetch_video: bool,
    pub fetch_marquee: bool,
    pub fetch_thumbnail: bool,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            threads: 1,
            resize_width: 640,
            resize_height: 0,
            overwrite_medias: true,
            retry_count: 4,
            retry_delay_ms: 5000,
            fetch_video: true,
            fetch_marquee: true,
            fetch_thumbnail: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Directory holding recovery fragments for every system.
    pub fn recovery_root(&self) -> PathBuf {
        self.config_dir.join("recovery")
    }

    /// Save to `path`, keeping any keys this struct does not know about.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let mut doc: toml::Value = match std::fs::read_to_string(path) {
            Ok(contents) => contents
                .parse()
                .unwrap_or_else(|_| toml::Value::Table(Default::default())),
            Err(_) => toml::Value::Table(Default::default()),
        };

        let ours = toml::Value::try_from(self)?;
        merge(&mut doc, ours);

        // Write atomically
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(&doc)?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn merge(into: &mut toml::Value, from: toml::Value) {
    match (into, from) {
        (toml::Value::Table(dst), toml::Value::Table(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) if existing.is_table() && value.is_table() => {
                        merge(existing, value)
                    }
                    _ => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Pretty-printed settings file for display, if present.
pub fn load_settings_string(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let doc: toml::Value = contents.parse().ok()?;
    toml::to_string_pretty(&doc).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(settings.scraper, "ArcadeDB");
        assert_eq!(settings.scrape.threads, 1);
        assert_eq!(settings.scrape.resize_width, 640);
        assert_eq!(settings.scrape.retry_count, 4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(
            &path,
            "config_dir = \"/userdata/system\"\n[scrape]\nthreads = 3\n",
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.config_dir, PathBuf::from("/userdata/system"));
        assert_eq!(settings.scrape.threads, 3);
        assert!(settings.scrape.overwrite_medias);
        assert_eq!(
            settings.recovery_root(),
            PathBuf::from("/userdata/system/recovery")
        );
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "theme = \"dark\"\n[scrape]\nextra = 1\n").unwrap();

        let mut settings = Settings::load(&path).unwrap();
        settings.scrape.threads = 4;
        settings.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let doc: toml::Value = text.parse().unwrap();
        assert_eq!(doc["theme"].as_str(), Some("dark"));
        assert_eq!(doc["scrape"]["extra"].as_integer(), Some(1));
        assert_eq!(doc["scrape"]["threads"].as_integer(), Some(4));
        assert!(!path.with_extension("toml.tmp").exists());

        assert_eq!(Settings::load(&path).unwrap().scrape.threads, 4);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "scrape = [").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(CoreError::TomlParse(_))
        ));
    }
}
