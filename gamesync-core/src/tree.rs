//! Arena-owned entity tree for one system's ROM folder.
//!
//! Entities are addressed by [`EntityId`] handles. The path index, in-flight
//! scrape results and the reconciler all hold handles, never references, so
//! the tree can be mutated freely from the owning thread.

use std::path::{Path, PathBuf};

use crate::metadata::{MetadataKind, MetadataRecord};
use crate::paths;

/// Stable handle to an entity inside an [`EntityTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Game,
    Folder,
}

impl EntityKind {
    /// XML element name used in gamelist files.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Folder => "folder",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "game" => Some(Self::Game),
            "folder" => Some(Self::Folder),
            _ => None,
        }
    }

    pub fn metadata_kind(self) -> MetadataKind {
        match self {
            Self::Game => MetadataKind::Game,
            Self::Folder => MetadataKind::Folder,
        }
    }
}

/// Which entities [`EntityTree::files_recursive`] yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFilter {
    Games,
    Folders,
    All,
}

impl EntityFilter {
    fn accepts(self, kind: EntityKind) -> bool {
        match self {
            Self::Games => kind == EntityKind::Game,
            Self::Folders => kind == EntityKind::Folder,
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    kind: EntityKind,
    path: PathBuf,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    pub metadata: MetadataRecord,
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Name shown when the metadata has none: the file stem for games, the
    /// directory name for folders.
    pub fn display_name(&self) -> String {
        match self.kind {
            EntityKind::Game => paths::stem(&self.path),
            EntityKind::Folder => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// Slot arena of entities rooted at a system's start folder.
#[derive(Debug, Clone)]
pub struct EntityTree {
    slots: Vec<Option<Entity>>,
    live: usize,
}

impl EntityTree {
    /// Create a tree whose root folder sits at `root_path`.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        let path = paths::normalize(&root_path.into());
        let mut root = Entity {
            kind: EntityKind::Folder,
            path,
            parent: None,
            children: Vec::new(),
            metadata: MetadataRecord::new(MetadataKind::Folder),
        };
        let name = root.display_name();
        root.metadata.set(crate::metadata::MetaDataId::Name, name);
        root.metadata.reset_dirty();
        Self {
            slots: vec![Some(root)],
            live: 1,
        }
    }

    pub fn root(&self) -> EntityId {
        EntityId(0)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Append a new entity under `parent`. The entity starts with its display
    /// name filled in and a clean dirty flag.
    pub fn add_child(&mut self, parent: EntityId, kind: EntityKind, path: &Path) -> EntityId {
        let id = EntityId(self.slots.len());
        let mut entity = Entity {
            kind,
            path: paths::normalize(path),
            parent: Some(parent),
            children: Vec::new(),
            metadata: MetadataRecord::new(kind.metadata_kind()),
        };
        let name = entity.display_name();
        entity.metadata.set(crate::metadata::MetaDataId::Name, name);
        entity.metadata.reset_dirty();

        self.slots.push(Some(entity));
        self.live += 1;
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Remove an entity and all of its descendants. Returns the paths that were
    /// removed so callers can drop them from any index. The root cannot be
    /// removed.
    pub fn remove(&mut self, id: EntityId) -> Vec<PathBuf> {
        if id == self.root() || self.get(id).is_none() {
            return Vec::new();
        }

        if let Some(parent) = self.get(id).and_then(Entity::parent) {
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(entity) = self.slots.get_mut(current.0).and_then(Option::take) {
                self.live -= 1;
                stack.extend(entity.children.iter().copied());
                removed.push(entity.path);
            }
        }
        removed
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.get(id).map(Entity::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.get(id).and_then(Entity::parent)
    }

    pub fn display_name(&self, id: EntityId) -> String {
        self.get(id).map(Entity::display_name).unwrap_or_default()
    }

    /// Depth-first list of descendants of `from` (not including `from`).
    pub fn files_recursive(&self, from: EntityId, filter: EntityFilter) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack: Vec<EntityId> = self.children(from).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(entity) = self.get(id) else {
                continue;
            };
            if filter.accepts(entity.kind) {
                out.push(id);
            }
            stack.extend(entity.children.iter().rev().copied());
        }
        out
    }

    /// Child of `parent` whose path equals `path`.
    pub fn find_child(&self, parent: EntityId, path: &Path) -> Option<EntityId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.get(*c).is_some_and(|e| e.path == path))
    }

    /// All live entities, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (EntityId(i), e)))
    }

    /// Number of live entities, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
