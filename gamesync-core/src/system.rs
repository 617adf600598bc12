//! Systems: one ROM folder, its entity tree and its path index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::paths;
use crate::tree::{EntityFilter, EntityId, EntityKind, EntityTree};

/// Directories that hold media rather than games; never scanned.
pub const MEDIA_DIRS: &[&str] = &[
    "images",
    "videos",
    "manuals",
    "magazines",
    "media",
    "downloaded_images",
    "downloaded_videos",
];

fn yes() -> bool {
    true
}

/// One `[[system]]` table from `systems.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default = "yes")]
    pub game_system: bool,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl SystemConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            full_name: None,
            path: path.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            game_system: true,
            visible: true,
            collection: false,
            platforms: Vec::new(),
        }
    }
}

/// A loaded system: configuration, entity tree and canonical path index.
#[derive(Debug, Clone)]
pub struct SystemData {
    config: SystemConfig,
    start_path: PathBuf,
    extensions: Vec<String>,
    tree: EntityTree,
    index: HashMap<PathBuf, EntityId>,
    gamelist_hash: Option<u64>,
}

impl SystemData {
    pub fn new(config: SystemConfig) -> Self {
        let start_path = paths::normalize(&config.path);
        let extensions = config
            .extensions
            .iter()
            .map(|e| {
                let e = e.trim().to_lowercase();
                if e.starts_with('.') { e } else { format!(".{e}") }
            })
            .collect();
        let tree = EntityTree::new(&start_path);
        let mut index = HashMap::new();
        index.insert(start_path.clone(), tree.root());
        Self {
            config,
            start_path,
            extensions,
            tree,
            index,
            gamelist_hash: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn full_name(&self) -> &str {
        self.config.full_name.as_deref().unwrap_or(&self.config.name)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn start_path(&self) -> &Path {
        &self.start_path
    }

    pub fn gamelist_path(&self) -> PathBuf {
        self.start_path.join("gamelist.xml")
    }

    pub fn is_game_system(&self) -> bool {
        self.config.game_system
    }

    pub fn is_visible(&self) -> bool {
        self.config.visible
    }

    pub fn is_collection(&self) -> bool {
        self.config.collection
    }

    pub fn has_platform(&self, platform: &str) -> bool {
        self.config
            .platforms
            .iter()
            .any(|p| p.eq_ignore_ascii_case(platform))
    }

    /// Whether `ext` (with or without leading dot, any case) is a ROM extension
    /// for this system.
    pub fn is_valid_extension(&self, ext: &str) -> bool {
        let ext = ext.trim().to_lowercase();
        let ext = if ext.starts_with('.') { ext } else { format!(".{ext}") };
        self.extensions.iter().any(|e| *e == ext)
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut EntityTree {
        &mut self.tree
    }

    pub fn root(&self) -> EntityId {
        self.tree.root()
    }

    pub fn index(&self) -> &HashMap<PathBuf, EntityId> {
        &self.index
    }

    /// Find an entity by path; the path is normalized first.
    pub fn lookup(&self, path: &Path) -> Option<EntityId> {
        self.index.get(&paths::normalize(path)).copied()
    }

    pub fn entity_path(&self, id: EntityId) -> Option<&Path> {
        self.tree.get(id).map(|e| e.path())
    }

    pub fn games(&self) -> Vec<EntityId> {
        self.tree.files_recursive(self.root(), EntityFilter::Games)
    }

    pub fn gamelist_hash(&self) -> Option<u64> {
        self.gamelist_hash
    }

    pub fn set_gamelist_hash(&mut self, hash: Option<u64>) {
        self.gamelist_hash = hash;
    }

    /// Create an entity under `parent` and register it in the index.
    ///
    /// Paths that are not strictly inside the start path are rejected with a
    /// warning. An existing entity at the same path is returned unchanged.
    pub fn insert_entity(
        &mut self,
        parent: EntityId,
        kind: EntityKind,
        path: &Path,
    ) -> Option<EntityId> {
        let path = paths::normalize(path);
        match paths::relative_to(&path, &self.start_path) {
            Some(rel) if !rel.as_os_str().is_empty() => {}
            _ => {
                log::warn!(
                    "[{}] '{}' is outside the system folder '{}', skipping",
                    self.name(),
                    path.display(),
                    self.start_path.display()
                );
                return None;
            }
        }
        if let Some(existing) = self.index.get(&path) {
            return Some(*existing);
        }
        let id = self.tree.add_child(parent, kind, &path);
        self.index.insert(path, id);
        Some(id)
    }

    /// Remove an entity (and its descendants) from the tree and the index.
    pub fn remove_entity(&mut self, id: EntityId) {
        for path in self.tree.remove(id) {
            self.index.remove(&path);
        }
    }

    /// Rebuild the path index from the live tree.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .tree
            .iter()
            .map(|(id, e)| (e.path().to_path_buf(), id))
            .collect();
    }

    /// Scan the ROM directory and build the entity tree.
    ///
    /// Returns the number of games found. Folders that end up without any
    /// game are dropped.
    pub fn populate(&mut self) -> Result<usize, CoreError> {
        let start = self.start_path.clone();
        if !start.is_dir() {
            return Err(CoreError::config(format!(
                "system '{}' path '{}' is not a directory",
                self.name(),
                start.display()
            )));
        }
        let root = self.root();
        self.scan_dir(&start, root, true)?;
        let games = self.games().len();
        log::debug!("[{}] scanned {} games", self.name(), games);
        Ok(games)
    }

    fn scan_dir(&mut self, dir: &Path, parent: EntityId, top_level: bool) -> Result<(), CoreError> {
        let mut entries: Vec<std::fs::DirEntry> = std::fs::read_dir(dir)?.flatten().collect();
        entries.sort_by_key(|e| e.path());

        for entry in entries {
            let path = entry.path();
            if paths::is_hidden(&path) {
                continue;
            }
            let is_valid = self.is_valid_extension(&paths::extension(&path));

            if path.is_dir() {
                let name = entry.file_name().to_string_lossy().to_lowercase();
                if top_level && MEDIA_DIRS.contains(&name.as_str()) {
                    continue;
                }
                // A directory carrying a ROM extension (`Game.m3u/`) is a game
                if is_valid {
                    self.insert_entity(parent, EntityKind::Game, &path);
                    continue;
                }
                if let Some(folder) = self.insert_entity(parent, EntityKind::Folder, &path) {
                    self.scan_dir(&path, folder, false)?;
                    if self.tree.files_recursive(folder, EntityFilter::Games).is_empty() {
                        self.remove_entity(folder);
                    }
                }
            } else if is_valid {
                self.insert_entity(parent, EntityKind::Game, &path);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct SystemsFile {
    #[serde(default)]
    system: Vec<SystemConfig>,
}

/// Every configured system.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: Vec<SystemData>,
}

impl SystemRegistry {
    pub fn new(configs: Vec<SystemConfig>) -> Self {
        Self {
            systems: configs.into_iter().map(SystemData::new).collect(),
        }
    }

    /// Load `[[system]]` tables from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, CoreError> {
        let file: SystemsFile = toml::from_str(contents)?;
        let mut seen = std::collections::HashSet::new();
        for sys in &file.system {
            if !seen.insert(sys.name.as_str()) {
                return Err(CoreError::config(format!(
                    "system '{}' is defined more than once",
                    sys.name
                )));
            }
        }
        Ok(Self::new(file.system))
    }

    pub fn push(&mut self, system: SystemData) {
        self.systems.push(system);
    }

    pub fn systems(&self) -> &[SystemData] {
        &self.systems
    }

    pub fn systems_mut(&mut self) -> &mut [SystemData] {
        &mut self.systems
    }

    pub fn find(&self, name: &str) -> Option<&SystemData> {
        self.systems.iter().find(|s| s.name() == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SystemData> {
        self.systems.iter_mut().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/system_tests.rs"]
mod tests;
