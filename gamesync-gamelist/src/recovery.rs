//! Recovery journal: one XML fragment per changed entity, written between
//! full gamelist write-backs.
//!
//! Fragments live under `<config_dir>/recovery/<system>/`, mirroring the
//! entity's location below the system folder (`sub/Game.zip` is journaled as
//! `sub/Game.zip.xml`). Each fragment records the base gamelist size it was
//! taken against in its root `parentHash` attribute.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gamesync_core::paths;
use gamesync_core::{EntityId, Settings, SystemData};

use crate::error::GamelistError;
use crate::store;

pub fn recovery_path(settings: &Settings, system: &SystemData) -> PathBuf {
    settings.recovery_root().join(system.name())
}

/// Fragment location for one entity, or `None` if the entity is not inside
/// the system folder.
pub fn fragment_path(settings: &Settings, system: &SystemData, id: EntityId) -> Option<PathBuf> {
    let path = system.entity_path(id)?;
    let relative = paths::relative_to(path, system.start_path())?;
    let file_name = relative.file_name()?.to_string_lossy().into_owned();
    Some(recovery_path(settings, system).join(relative.with_file_name(format!("{file_name}.xml"))))
}

/// Journal the entity's current metadata. Returns `false` when the entity
/// has nothing worth saving; any older fragment for it is removed in that
/// case so it cannot be replayed.
pub fn save_to_gamelist_recovery(
    system: &SystemData,
    settings: &Settings,
    id: EntityId,
) -> Result<bool, GamelistError> {
    let Some(fragment) = fragment_path(settings, system, id) else {
        return Ok(false);
    };
    match store::save_to_xml(system, id, &fragment, false) {
        Ok(()) => {
            log::debug!("Journaled {}", fragment.display());
            Ok(true)
        }
        Err(GamelistError::NothingToSave(_)) => {
            remove_file_if_exists(&fragment)?;
            Ok(false)
        }
        Err(e) => {
            log::error!("Error saving recovery file \"{}\": {}", fragment.display(), e);
            Err(e)
        }
    }
}

/// Delete one entity's fragment and any directories it leaves empty.
pub fn remove_from_gamelist_recovery(
    system: &SystemData,
    settings: &Settings,
    id: EntityId,
) -> Result<bool, GamelistError> {
    let Some(fragment) = fragment_path(settings, system, id) else {
        return Ok(false);
    };
    let removed = remove_file_if_exists(&fragment)?;

    let base = recovery_path(settings, system);
    let mut dir = fragment.parent().map(Path::to_path_buf);
    while let Some(d) = dir {
        if !d.starts_with(&base) || fs::remove_dir(&d).is_err() {
            break;
        }
        dir = d.parent().map(Path::to_path_buf);
    }
    Ok(removed)
}

/// Remove every fragment of a system: files first, then directories
/// deepest-first, then the system directory. Returns the number of files
/// deleted. Directory removal failures are logged, not returned.
pub fn clear_gamelist_recovery(system: &SystemData, settings: &Settings) -> Result<usize, GamelistError> {
    let base = recovery_path(settings, system);
    if !base.exists() {
        return Ok(0);
    }

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    walk(&base, &mut files, &mut dirs)?;

    for file in &files {
        fs::remove_file(file)?;
    }
    for dir in dirs.iter().rev().chain(std::iter::once(&base)) {
        if let Err(e) = fs::remove_dir(dir) {
            log::warn!("Could not remove recovery folder \"{}\": {}", dir.display(), e);
        }
    }
    if !files.is_empty() {
        log::debug!("[{}] cleared {} recovery fragments", system.name(), files.len());
    }
    Ok(files.len())
}

/// All fragment files of a system, sorted. Missing directories yield none.
pub fn recovery_fragments(settings: &Settings, system: &SystemData) -> Vec<PathBuf> {
    let base = recovery_path(settings, system);
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    if base.is_dir() {
        if let Err(e) = walk(&base, &mut files, &mut dirs) {
            log::warn!("Could not list recovery folder \"{}\": {}", base.display(), e);
        }
    }
    files.retain(|f| f.extension().is_some_and(|e| e == "xml"));
    files.sort();
    files
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>, dirs: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)?.flatten().collect();
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path.clone());
            walk(&path, files, dirs)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamesync_core::{EntityKind, MetaDataId, SystemConfig};

    fn setup() -> (tempfile::TempDir, SystemData, Settings, EntityId) {
        let tmp = tempfile::tempdir().unwrap();
        let roms = tmp.path().join("roms/snes");
        let mut system = SystemData::new(SystemConfig::new("snes", &roms, &["sfc"]));
        let root = system.root();
        let sub = system
            .insert_entity(root, EntityKind::Folder, &roms.join("sub"))
            .unwrap();
        let game = system
            .insert_entity(sub, EntityKind::Game, &roms.join("sub/Game.sfc"))
            .unwrap();
        let settings = Settings {
            config_dir: tmp.path().join("config"),
            ..Settings::default()
        };
        (tmp, system, settings, game)
    }

    #[test]
    fn test_fragment_path_keeps_full_file_name() {
        let (tmp, system, settings, game) = setup();
        assert_eq!(
            fragment_path(&settings, &system, game).unwrap(),
            tmp.path().join("config/recovery/snes/sub/Game.sfc.xml")
        );
    }

    #[test]
    fn test_trivial_entity_is_not_journaled() {
        let (_tmp, system, settings, game) = setup();
        assert!(!save_to_gamelist_recovery(&system, &settings, game).unwrap());
        assert!(recovery_fragments(&settings, &system).is_empty());
    }

    #[test]
    fn test_save_remove_and_clear() {
        let (tmp, mut system, settings, game) = setup();
        system.set_gamelist_hash(Some(123));
        system
            .tree_mut()
            .get_mut(game)
            .unwrap()
            .metadata
            .set(MetaDataId::Developer, "Nintendo");

        assert!(save_to_gamelist_recovery(&system, &settings, game).unwrap());
        let fragments = recovery_fragments(&settings, &system);
        assert_eq!(fragments.len(), 1);
        let text = fs::read_to_string(&fragments[0]).unwrap();
        assert!(text.contains("parentHash=\"123\""));
        assert!(text.contains("<path>./sub/Game.sfc</path>"));

        assert!(remove_from_gamelist_recovery(&system, &settings, game).unwrap());
        assert!(!tmp.path().join("config/recovery/snes/sub").exists());
        assert!(!remove_from_gamelist_recovery(&system, &settings, game).unwrap());

        assert!(save_to_gamelist_recovery(&system, &settings, game).unwrap());
        assert_eq!(clear_gamelist_recovery(&system, &settings).unwrap(), 1);
        assert!(!recovery_path(&settings, &system).exists());
        // Clearing again is a no-op
        assert_eq!(clear_gamelist_recovery(&system, &settings).unwrap(), 0);
    }
}
