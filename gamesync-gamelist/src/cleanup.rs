//! Full repair pass over a system's `gamelist.xml`.
//!
//! Unlike [`update_gamelist`](crate::reconcile::update_gamelist) this ignores
//! dirty flags: it walks every node, drops entries for files that are gone,
//! re-links media by file-name convention, adds nodes for entities the file
//! does not know about and deletes orphaned media files.
//!
//! Media re-linking is a heuristic. Candidates are probed in the fixed order
//! of [`MEDIA_PROBES`] and the first existing file wins, which can pick the
//! wrong file when several candidates exist.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use gamesync_core::paths;
use gamesync_core::{EntityFilter, EntityId, EntityKind, MetaDataId, MetaDataType, Settings, SystemData};

use crate::error::GamelistError;
use crate::reconcile::{has_dirty_file, node_path, read_or_create_root, write_back};
use crate::recovery;
use crate::store;
use crate::xml::{XmlElement, XmlNode};

/// One file-name convention for a media kind: `<dir>/<stem><suffix><ext>`.
pub struct MediaProbe {
    pub id: MetaDataId,
    pub dir: &'static str,
    pub suffix: &'static str,
    pub exts: &'static [&'static str],
}

const IMG: &[&str] = &[".jpg", ".png"];

const fn probe(id: MetaDataId, dir: &'static str, suffix: &'static str, exts: &'static [&'static str]) -> MediaProbe {
    MediaProbe { id, dir, suffix, exts }
}

pub static MEDIA_PROBES: &[MediaProbe] = &[
    probe(MetaDataId::Image, "images", "-image", IMG),
    probe(MetaDataId::Image, "images", "", IMG),
    probe(MetaDataId::Thumbnail, "images", "-thumb", IMG),
    probe(MetaDataId::Marquee, "images", "-marquee", IMG),
    probe(MetaDataId::FanArt, "images", "-fanart", IMG),
    probe(MetaDataId::TitleShot, "images", "-titleshot", IMG),
    probe(MetaDataId::BoxArt, "images", "-box", IMG),
    probe(MetaDataId::BoxBack, "images", "-boxback", IMG),
    probe(MetaDataId::Wheel, "images", "-wheel", IMG),
    probe(MetaDataId::Cartridge, "images", "-cartridge", IMG),
    probe(MetaDataId::Map, "images", "-map", IMG),
    probe(MetaDataId::Video, "videos", "-video", &[".mp4"]),
    probe(MetaDataId::Manual, "manuals", "-manual", &[".pdf"]),
    probe(MetaDataId::Magazine, "magazines", "-magazine", &[".pdf", ".cbz"]),
];

/// Folders scanned for orphaned media, directly under the system folder and
/// under `media/`.
const CLEANUP_DIRS: &[&str] = &[
    "images",
    "videos",
    "manuals",
    "downloaded_images",
    "downloaded_videos",
];

const KEEP_EXTENSIONS: &[&str] = &[".txt", ".xml", ".old"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub skipped: bool,
    /// Nodes dropped because they had no path or their file is gone.
    pub removed_nodes: usize,
    /// Nodes appended for entities missing from the file.
    pub added_nodes: usize,
    /// Media references filled in by probing.
    pub media_linked: usize,
    /// Media references stripped because the file does not exist.
    pub media_removed: usize,
    /// Orphaned media files deleted from disk.
    pub deleted_files: Vec<PathBuf>,
    /// Whether `gamelist.xml` was rewritten.
    pub written: bool,
}

impl CleanupOutcome {
    /// Whether the gamelist content changed. Deleted media files alone do not
    /// count.
    pub fn changed(&self) -> bool {
        self.removed_nodes + self.added_nodes + self.media_linked + self.media_removed > 0
    }
}

/// First existing file for `id` following [`MEDIA_PROBES`]; each convention
/// is tried under `<start>/<dir>` then `<start>/media/<dir>`.
pub fn probe_media(start: &Path, stem: &str, id: MetaDataId) -> Option<PathBuf> {
    for p in MEDIA_PROBES.iter().filter(|p| p.id == id) {
        for base in [start.join(p.dir), start.join("media").join(p.dir)] {
            for ext in p.exts {
                let candidate = base.join(format!("{stem}{}{ext}", p.suffix));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

/// Verify or fill in every media reference of one node. Returns
/// `(linked, removed)`.
fn repair_media(
    system: &mut SystemData,
    id: EntityId,
    node: &mut XmlElement,
    referenced: &mut HashSet<PathBuf>,
) -> (usize, usize) {
    let start = system.start_path().to_path_buf();
    let Some(entity) = system.tree_mut().get_mut(id) else {
        return (0, 0);
    };
    let stem = match entity.kind() {
        EntityKind::Game => paths::stem(entity.path()),
        EntityKind::Folder => entity.display_name(),
    };

    let mut linked = 0;
    let mut removed = 0;
    let schema = entity.metadata.schema();
    for decl in schema.iter().filter(|d| d.kind == MetaDataType::Path) {
        let key = decl.key();
        let declared = node
            .child_text(key)
            .filter(|v| !v.trim().is_empty())
            .map(|v| paths::resolve_relative_path(&v, &start));

        if let Some(path) = &declared {
            if path.exists() {
                referenced.insert(path.clone());
                continue;
            }
        }

        match probe_media(&start, &stem, decl.id) {
            Some(found) => {
                node.set_child_text(key, paths::create_relative_path(&found, &start));
                entity.metadata.set(decl.id, found.to_string_lossy());
                referenced.insert(found);
                linked += 1;
            }
            None if declared.is_some() => {
                node.remove_child(key);
                entity.metadata.set(decl.id, "");
                removed += 1;
            }
            None => {}
        }
    }
    (linked, removed)
}

/// Repair a system's `gamelist.xml` against the live tree and the media
/// folders. Running it twice without filesystem changes in between makes no
/// further changes.
pub fn cleanup_gamelist(system: &mut SystemData, settings: &Settings) -> Result<CleanupOutcome, GamelistError> {
    if settings.ignore_gamelist
        || system.is_collection()
        || !system.is_game_system()
        || !system.is_visible()
    {
        return Ok(CleanupOutcome {
            skipped: true,
            ..Default::default()
        });
    }

    let live: HashMap<PathBuf, EntityId> = system
        .tree()
        .files_recursive(system.root(), EntityFilter::All)
        .into_iter()
        .filter_map(|id| system.tree().get(id).map(|e| (e.path().to_path_buf(), id)))
        .collect();
    let was_dirty: HashSet<EntityId> = live
        .values()
        .copied()
        .filter(|id| system.tree().get(*id).is_some_and(|e| e.metadata.is_dirty()))
        .collect();

    let mut root = read_or_create_root(system)?;
    let mut outcome = CleanupOutcome::default();
    let mut referenced: HashSet<PathBuf> = HashSet::new();
    let mut represented: HashSet<EntityId> = HashSet::new();

    let old_children = std::mem::take(&mut root.children);
    for child in old_children {
        let mut node = match child {
            XmlNode::Element(node) => node,
            text => {
                root.children.push(text);
                continue;
            }
        };
        if EntityKind::from_tag(&node.name).is_none() {
            root.push(node);
            continue;
        }
        let Some(id) = node_path(&node, system).and_then(|p| live.get(&p).copied()) else {
            outcome.removed_nodes += 1;
            continue;
        };
        if !represented.insert(id) {
            // Second node for the same file
            outcome.removed_nodes += 1;
            continue;
        }
        let (linked, removed) = repair_media(system, id, &mut node, &mut referenced);
        outcome.media_linked += linked;
        outcome.media_removed += removed;
        root.push(node);
    }

    let mut missing: Vec<EntityId> = live
        .values()
        .copied()
        .filter(|id| !represented.contains(id))
        .collect();
    missing.sort();
    for id in missing {
        let mut scratch = XmlElement::new("scratch");
        let (linked, _) = repair_media(system, id, &mut scratch, &mut referenced);
        if store::add_file_data_node(system, id, &mut root) {
            outcome.added_nodes += 1;
            outcome.media_linked += linked;
        }
    }

    // Media set on entities but not yet written must not be treated as orphaned
    for id in live.values() {
        if let Some(entity) = system.tree().get(*id) {
            for (decl, value) in entity.metadata.iter() {
                if decl.kind == MetaDataType::Path && !value.is_empty() {
                    referenced.insert(paths::normalize(Path::new(value)));
                }
            }
        }
    }
    outcome.deleted_files = delete_orphaned_media(system, &referenced, &live);

    if outcome.changed() {
        let xml_path = system.gamelist_path();
        if xml_path.exists() {
            let backup = xml_path.with_extension("xml.old");
            if let Err(e) = fs::copy(&xml_path, &backup) {
                log::warn!("Could not back up \"{}\": {}", xml_path.display(), e);
            }
        }
        write_back(system, &root)?;
        outcome.written = true;
        for id in live.values() {
            if was_dirty.contains(id) {
                continue;
            }
            if let Some(entity) = system.tree_mut().get_mut(*id) {
                entity.metadata.reset_dirty();
            }
        }
        // Entities still waiting for write-back keep their fragments, taken
        // again against the rewritten base so they replay after a restart
        if has_dirty_file(system) {
            let mut pending: Vec<EntityId> = was_dirty.iter().copied().collect();
            pending.sort();
            for id in pending {
                recovery::save_to_gamelist_recovery(system, settings, id)?;
            }
        } else {
            recovery::clear_gamelist_recovery(system, settings)?;
        }
        log::info!(
            "[{}] cleanup: {} removed, {} added, {} media linked, {} media dropped",
            system.name(),
            outcome.removed_nodes,
            outcome.added_nodes,
            outcome.media_linked,
            outcome.media_removed
        );
    }

    Ok(outcome)
}

fn delete_orphaned_media(
    system: &SystemData,
    referenced: &HashSet<PathBuf>,
    live: &HashMap<PathBuf, EntityId>,
) -> Vec<PathBuf> {
    let start = system.start_path();
    let mut deleted = Vec::new();
    for name in CLEANUP_DIRS {
        for dir in [start.join(name), start.join("media").join(name)] {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            let mut files: Vec<PathBuf> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            files.sort();

            for file in files {
                let file = paths::normalize(&file);
                if KEEP_EXTENSIONS.contains(&paths::extension(&file).as_str())
                    || referenced.contains(&file)
                    || live.contains_key(&file)
                {
                    continue;
                }
                match fs::remove_file(&file) {
                    Ok(()) => {
                        log::info!("Deleted orphaned media \"{}\"", file.display());
                        deleted.push(file);
                    }
                    Err(e) => log::warn!("Could not delete \"{}\": {}", file.display(), e),
                }
            }
        }
    }
    deleted
}
