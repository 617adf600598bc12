//! Loading `gamelist.xml` into a system's entity tree and serializing
//! entities back into XML nodes.

use std::path::{Component, Path, PathBuf};

use gamesync_core::genres;
use gamesync_core::paths;
use gamesync_core::{
    EntityId, EntityKind, MetaDataId, MetaDataType, MetadataRecord, Settings, SystemData,
};

use crate::error::GamelistError;
use crate::recovery;
use crate::xml::{self, XmlElement};

/// Counters reported by a gamelist or fragment load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    /// Nodes merged into the tree.
    pub merged: usize,
    /// Nodes rejected (missing file, outside the system, unknown extension).
    pub skipped: usize,
    /// Fragments discarded because their parentHash did not match.
    pub stale: usize,
    /// Files that could not be parsed.
    pub failed: usize,
}

impl LoadStats {
    fn add(&mut self, other: &LoadStats) {
        self.merged += other.merged;
        self.skipped += other.skipped;
        self.stale += other.stale;
        self.failed += other.failed;
    }
}

/// Read a metadata record out of a `<game>`/`<folder>` node. Path-typed
/// values are resolved against `relative_to`.
pub fn metadata_from_xml(kind: EntityKind, node: &XmlElement, relative_to: &Path) -> MetadataRecord {
    let mut md = MetadataRecord::new(kind.metadata_kind());
    for decl in md.schema() {
        let Some(value) = node.child_text(decl.key()) else {
            continue;
        };
        let value = if decl.kind == MetaDataType::Path {
            paths::resolve_relative_path(&value, relative_to)
                .to_string_lossy()
                .into_owned()
        } else {
            value
        };
        md.set(decl.id, value);
    }
    md.reset_dirty();
    md
}

/// Append one child element per metadata value. With `ignore_defaults`,
/// values equal to the schema default are left out. Path values are written
/// relative to `relative_to` when given.
pub fn append_metadata_to_xml(
    record: &MetadataRecord,
    node: &mut XmlElement,
    ignore_defaults: bool,
    relative_to: Option<&Path>,
) {
    for (decl, value) in record.iter() {
        if ignore_defaults && value == decl.default {
            continue;
        }
        let value = match (decl.kind, relative_to) {
            (MetaDataType::Path, Some(base)) if !value.is_empty() => {
                paths::create_relative_path(Path::new(value), base)
            }
            _ => value.to_string(),
        };
        node.push(XmlElement::with_text(decl.key(), value));
    }
}

/// A node whose only content is the entity's default display name.
pub fn is_default_name_only(node: &XmlElement, display_name: &str) -> bool {
    let mut elements = node.elements();
    match (elements.next(), elements.next()) {
        (Some(first), None) => first.name == "name" && first.text() == display_name,
        _ => false,
    }
}

/// Serialize one entity into a `<game>`/`<folder>` node with its `<path>`
/// first. Returns `None` when the node would only carry the default name.
pub fn entity_node(system: &SystemData, id: EntityId, full_paths: bool) -> Option<XmlElement> {
    let entity = system.tree().get(id)?;
    let start = system.start_path();
    let relative_to = if full_paths { None } else { Some(start) };

    let mut node = XmlElement::new(entity.kind().tag());
    append_metadata_to_xml(&entity.metadata, &mut node, true, relative_to);
    if is_default_name_only(&node, &entity.display_name()) || node.children.is_empty() {
        return None;
    }

    let path = if full_paths {
        entity.path().to_string_lossy().into_owned()
    } else {
        paths::create_relative_path(entity.path(), start)
    };
    node.prepend(XmlElement::with_text("path", path));
    Some(node)
}

/// Append the node for `id` under `parent`. Returns `false` when there was
/// nothing worth writing.
pub fn add_file_data_node(system: &SystemData, id: EntityId, parent: &mut XmlElement) -> bool {
    match entity_node(system, id, false) {
        Some(node) => {
            parent.push(node);
            true
        }
        None => false,
    }
}

/// Find the entity for `path`, creating it (and any folders leading to it)
/// when it is a game.
///
/// Folder nodes never create entities: a folder must already exist from the
/// directory scan. Paths outside the system and games with an unknown
/// extension are rejected with a warning.
pub fn find_or_create_file(system: &mut SystemData, path: &Path, kind: EntityKind) -> Option<EntityId> {
    let path = paths::normalize(path);
    let Some(relative) = paths::relative_to(&path, system.start_path()) else {
        log::warn!(
            "File path \"{}\" is outside system path \"{}\"",
            path.display(),
            system.start_path().display()
        );
        return None;
    };
    if relative.as_os_str().is_empty() {
        log::warn!("Gamelist entry points at the system folder itself, skipping");
        return None;
    }

    if let Some(id) = system.lookup(&path) {
        return Some(id);
    }

    let parts: Vec<&std::ffi::OsStr> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p),
            _ => None,
        })
        .collect();

    let mut tree_node = system.root();
    let mut current = system.start_path().to_path_buf();
    for (i, part) in parts.iter().enumerate() {
        current.push(part);
        let existing = system.lookup(&current);
        if let Some(item) = existing {
            match system.tree().get(item).map(|e| e.kind()) {
                Some(EntityKind::Folder) => tree_node = item,
                _ => return Some(item),
            }
        }

        let is_last = i + 1 == parts.len();
        if is_last {
            if kind == EntityKind::Folder {
                log::warn!(
                    "Folder \"{}\" doesn't already exist, won't create",
                    path.display()
                );
                return None;
            }
            if !system.is_valid_extension(&paths::extension(&path)) {
                log::warn!(
                    "File extension of \"{}\" is not known by system '{}'",
                    path.display(),
                    system.name()
                );
                return None;
            }
            return system.insert_entity(tree_node, EntityKind::Game, &path);
        }

        if existing.is_none() {
            if kind == EntityKind::Folder {
                log::warn!(
                    "Folder \"{}\" doesn't already exist, won't create",
                    path.display()
                );
                return None;
            }
            tree_node = system.insert_entity(tree_node, EntityKind::Folder, &current)?;
        }
    }
    None
}

/// Merge every `<game>`/`<folder>` node of one XML file into the tree.
///
/// With `check_size` set (recovery replay), the file is only merged when its
/// root `parentHash` equals that value, and merged entities are marked dirty
/// so the next write-back persists them. With `trust_gamelist`, paths are
/// accepted without checking that the file exists.
pub fn load_gamelist_file(
    system: &mut SystemData,
    xml_path: &Path,
    check_size: Option<u64>,
    trust_gamelist: bool,
) -> Result<LoadStats, GamelistError> {
    log::debug!("Parsing XML file \"{}\"", xml_path.display());
    let root = xml::read_file(xml_path)?;
    if root.name != "gameList" {
        return Err(GamelistError::missing_root(xml_path));
    }

    let mut stats = LoadStats::default();
    if let Some(expected) = check_size {
        let parent = root
            .attr("parentHash")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        if parent != expected {
            log::debug!(
                "Discarding stale fragment \"{}\" (parentHash {} != {})",
                xml_path.display(),
                parent,
                expected
            );
            stats.stale = 1;
            return Ok(stats);
        }
    }

    let start = system.start_path().to_path_buf();
    for node in root.elements() {
        let Some(kind) = EntityKind::from_tag(&node.name) else {
            continue;
        };
        let path_text = node.child_text("path").unwrap_or_default();
        if path_text.trim().is_empty() {
            log::warn!("<{}> node contains no <path> child", node.name);
            stats.skipped += 1;
            continue;
        }

        let path = paths::resolve_relative_path(&path_text, &start);
        if !trust_gamelist && !path.exists() {
            log::warn!("File \"{}\" does not exist! Ignoring.", path.display());
            stats.skipped += 1;
            continue;
        }

        let Some(id) = find_or_create_file(system, &path, kind) else {
            stats.skipped += 1;
            continue;
        };
        let Some(entity) = system.tree_mut().get_mut(id) else {
            continue;
        };

        let default_name = entity.display_name();
        let mut md = metadata_from_xml(entity.kind(), node, &start);
        if md.name().is_empty() {
            md.set(MetaDataId::Name, default_name);
        }
        if !md.get_bool(MetaDataId::Hidden) && paths::is_hidden(&path) {
            md.set(MetaDataId::Hidden, "true");
        }
        if md.is_default(MetaDataId::GenreIds) {
            genres::convert_genre_to_ids(&mut md);
        }
        if check_size.is_some() {
            md.set_dirty();
        } else {
            md.reset_dirty();
        }
        entity.metadata = md;
        stats.merged += 1;
    }

    Ok(stats)
}

/// Load a system's `gamelist.xml`, then replay its recovery fragments.
///
/// Parse failures are logged and counted; a broken base file does not stop
/// fragment replay.
pub fn parse_gamelist(system: &mut SystemData, settings: &Settings) -> LoadStats {
    let mut stats = LoadStats::default();
    if settings.ignore_gamelist {
        return stats;
    }

    let xml_path = system.gamelist_path();
    let size = std::fs::metadata(&xml_path).map(|m| m.len()).unwrap_or(0);
    if size != 0 {
        match load_gamelist_file(system, &xml_path, None, settings.parse_gamelist_only) {
            Ok(s) => stats.add(&s),
            Err(e) => {
                log::error!("Error parsing XML file \"{}\": {}", xml_path.display(), e);
                stats.failed += 1;
            }
        }
    }

    for fragment in recovery::recovery_fragments(settings, system) {
        match load_gamelist_file(system, &fragment, Some(size), settings.parse_gamelist_only) {
            Ok(s) => stats.add(&s),
            Err(e) => {
                log::error!("Error parsing recovery file \"{}\": {}", fragment.display(), e);
                stats.failed += 1;
            }
        }
    }

    system.set_gamelist_hash(Some(size));
    log::info!(
        "[{}] loaded {} entries ({} skipped, {} stale)",
        system.name(),
        stats.merged,
        stats.skipped,
        stats.stale
    );
    stats
}

/// Write one entity as a standalone gamelist document at `path`, tagged with
/// the system's current parentHash.
pub fn save_to_xml(
    system: &SystemData,
    id: EntityId,
    path: &Path,
    full_paths: bool,
) -> Result<(), GamelistError> {
    let node = entity_node(system, id, full_paths)
        .ok_or_else(|| GamelistError::NothingToSave(PathBuf::from(path)))?;
    let mut root = XmlElement::new("gameList");
    root.set_attr("parentHash", system.gamelist_hash().unwrap_or(0).to_string());
    root.push(node);
    xml::write_file(path, &root)
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
