//! Write-back of changed entities into `gamelist.xml`.
//!
//! The existing file is re-read and only the nodes of dirty entities are
//! replaced, so anything in the file this process did not load (unknown
//! tags, entries for files that are temporarily missing) survives.

use std::collections::HashSet;
use std::path::PathBuf;

use gamesync_core::paths;
use gamesync_core::{EntityFilter, EntityId, EntityKind, Settings, SystemData};

use crate::error::GamelistError;
use crate::recovery;
use crate::store;
use crate::xml::{self, XmlElement};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The system was not eligible (hidden, not a game system, or gamelists
    /// are ignored).
    pub skipped: bool,
    /// Entities whose node was added, replaced or removed.
    pub updated: usize,
    /// Whether `gamelist.xml` was rewritten.
    pub written: bool,
}

/// Whether any game or folder of the system has unsaved changes.
pub fn has_dirty_file(system: &SystemData) -> bool {
    dirty_entities(system).next().is_some()
}

fn dirty_entities(system: &SystemData) -> impl Iterator<Item = EntityId> + '_ {
    system
        .tree()
        .files_recursive(system.root(), EntityFilter::All)
        .into_iter()
        .filter(|id| {
            system
                .tree()
                .get(*id)
                .is_some_and(|e| e.metadata.is_dirty())
        })
}

/// Read the system's gamelist, or start an empty `<gameList>` when there is
/// none.
pub(crate) fn read_or_create_root(system: &SystemData) -> Result<XmlElement, GamelistError> {
    let xml_path = system.gamelist_path();
    if !xml_path.exists() {
        return Ok(XmlElement::new("gameList"));
    }
    let root = xml::read_file(&xml_path).inspect_err(|e| {
        log::error!("Error parsing XML file \"{}\": {}", xml_path.display(), e);
    })?;
    if root.name != "gameList" {
        log::error!(
            "Could not find <gameList> node in gamelist \"{}\"",
            xml_path.display()
        );
        return Err(GamelistError::missing_root(xml_path));
    }
    Ok(root)
}

/// Canonical path a gamelist node refers to, if it has one.
pub(crate) fn node_path(node: &XmlElement, system: &SystemData) -> Option<PathBuf> {
    let text = node.child_text("path")?;
    if text.trim().is_empty() {
        return None;
    }
    Some(paths::resolve_relative_path(&text, system.start_path()))
}

/// Write the file, then record its new size as the system's parentHash.
pub(crate) fn write_back(system: &mut SystemData, root: &XmlElement) -> Result<(), GamelistError> {
    let xml_path = system.gamelist_path();
    xml::write_file(&xml_path, root).inspect_err(|e| {
        log::error!(
            "Error saving gamelist.xml to \"{}\" (for system {}): {}",
            xml_path.display(),
            system.name(),
            e
        );
    })?;
    let size = std::fs::metadata(&xml_path).map(|m| m.len()).unwrap_or(0);
    system.set_gamelist_hash(Some(size));
    Ok(())
}

/// Persist every dirty entity of `system` into its `gamelist.xml`.
///
/// When nothing is dirty, only the recovery journal is cleared. Parse and
/// write errors leave the base file and the journal untouched.
pub fn update_gamelist(system: &mut SystemData, settings: &Settings) -> Result<UpdateOutcome, GamelistError> {
    if settings.ignore_gamelist || !system.is_game_system() || !system.is_visible() {
        return Ok(UpdateOutcome {
            skipped: true,
            ..Default::default()
        });
    }

    let dirty: Vec<EntityId> = dirty_entities(system).collect();
    if dirty.is_empty() {
        recovery::clear_gamelist_recovery(system, settings)?;
        return Ok(UpdateOutcome::default());
    }

    let mut root = read_or_create_root(system)?;

    let targets: HashSet<(EntityKind, PathBuf)> = dirty
        .iter()
        .filter_map(|id| system.tree().get(*id))
        .map(|e| (e.kind(), e.path().to_path_buf()))
        .collect();

    let mut removed: HashSet<(EntityKind, PathBuf)> = HashSet::new();
    root.retain_elements(|node| {
        let Some(kind) = EntityKind::from_tag(&node.name) else {
            return true;
        };
        let Some(path) = node_path(node, system) else {
            log::warn!("<{}> node contains no <path> child", node.name);
            return true;
        };
        let key = (kind, path);
        if targets.contains(&key) {
            removed.insert(key);
            false
        } else {
            true
        }
    });

    let mut updated = 0;
    for id in &dirty {
        let Some(entity) = system.tree().get(*id) else {
            continue;
        };
        let key = (entity.kind(), entity.path().to_path_buf());
        if store::add_file_data_node(system, *id, &mut root) || removed.contains(&key) {
            updated += 1;
        }
    }

    let mut outcome = UpdateOutcome {
        updated,
        ..Default::default()
    };
    if updated > 0 {
        write_back(system, &root)?;
        log::info!(
            "Added/Updated {} entities in '{}'",
            updated,
            system.gamelist_path().display()
        );
        outcome.written = true;
    }

    for id in &dirty {
        if let Some(entity) = system.tree_mut().get_mut(*id) {
            entity.metadata.reset_dirty();
        }
    }
    recovery::clear_gamelist_recovery(system, settings)?;
    Ok(outcome)
}
