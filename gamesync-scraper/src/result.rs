//! Search parameters and the results a backend hands back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gamesync_core::lang::LangInfo;
use gamesync_core::paths;
use gamesync_core::{EntityId, MetaDataId, MetadataKind, MetadataRecord, SystemData};

/// Everything a scraper needs to know about the game it searches for. Built
/// on the main thread; workers never see the entity tree.
#[derive(Debug, Clone)]
pub struct ScraperSearchParams {
    pub system: String,
    pub platforms: Vec<String>,
    pub start_path: PathBuf,
    pub entity: EntityId,
    pub path: PathBuf,
    /// Search by this name instead of the file name.
    pub name_override: Option<String>,
    /// Current metadata of the game, used to reuse media already on disk.
    pub current: MetadataRecord,
    pub overwrite_medias: bool,
}

impl ScraperSearchParams {
    pub fn for_entity(system: &SystemData, entity: EntityId, overwrite_medias: bool) -> Option<Self> {
        let e = system.tree().get(entity)?;
        Some(Self {
            system: system.name().to_string(),
            platforms: system.config().platforms.clone(),
            start_path: system.start_path().to_path_buf(),
            entity,
            path: e.path().to_path_buf(),
            name_override: None,
            current: e.metadata.clone(),
            overwrite_medias,
        })
    }

    pub fn has_platform(&self, platform: &str) -> bool {
        self.platforms.iter().any(|p| p.eq_ignore_ascii_case(platform))
    }

    pub fn stem(&self) -> String {
        paths::stem(&self.path)
    }

    /// The name to search for: the override, or the file stem without any
    /// `(...)` or `[...]` tags.
    pub fn search_name(&self) -> String {
        match &self.name_override {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => remove_tags(&self.stem()),
        }
    }

    /// `[system] name` label for progress output.
    pub fn label(&self) -> String {
        let name = self.current.name();
        let name = if name.is_empty() { self.stem() } else { name.to_string() };
        format!("[{}] {}", self.system, name)
    }
}

/// Strip `(...)` and `[...]` groups and collapse the remaining whitespace.
pub fn remove_tags(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A media file not downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperSearchItem {
    pub url: String,
    /// Extension to save as (with the dot), when the URL does not tell.
    pub format: Option<String>,
}

impl ScraperSearchItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: None,
        }
    }

    pub fn with_format(url: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: Some(format.into()),
        }
    }

    /// Extension to save the download under.
    pub fn extension(&self) -> String {
        if let Some(format) = self.format.as_deref().filter(|f| !f.is_empty()) {
            return if format.starts_with('.') {
                format.to_ascii_lowercase()
            } else {
                format!(".{}", format.to_ascii_lowercase())
            };
        }
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        let file = path.rsplit('/').next().unwrap_or_default();
        paths::extension(Path::new(file))
    }
}

/// One scraped candidate: metadata plus media still to download.
#[derive(Debug, Clone)]
pub struct ScraperSearchResult {
    pub scraper: String,
    pub md: MetadataRecord,
    pub urls: BTreeMap<MetaDataId, ScraperSearchItem>,
}

impl ScraperSearchResult {
    pub fn new(scraper: impl Into<String>) -> Self {
        Self {
            scraper: scraper.into(),
            md: MetadataRecord::new(MetadataKind::Game),
            urls: BTreeMap::new(),
        }
    }

    /// Whether any media remains to be downloaded.
    pub fn has_media(&self) -> bool {
        self.urls.values().any(|item| !item.url.is_empty())
    }
}

/// Fill empty `lang` and `region` fields from languages detected in the file
/// name.
pub fn fill_language(record: &mut MetadataRecord, info: &LangInfo) -> bool {
    let mut changed = false;
    if record.get(MetaDataId::Language).is_empty() && !info.languages.is_empty() {
        changed |= record.set(MetaDataId::Language, info.language_string());
    }
    if record.get(MetaDataId::Region).is_empty() && !info.region.is_empty() {
        changed |= record.set(MetaDataId::Region, info.region.as_str());
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_tags() {
        assert_eq!(remove_tags("Metal Slug (World) [!]"), "Metal Slug");
        assert_eq!(remove_tags("Puzzle Bobble (Japan, (rev 1))"), "Puzzle Bobble");
        assert_eq!(remove_tags("mslug"), "mslug");
    }

    #[test]
    fn test_item_extension() {
        assert_eq!(ScraperSearchItem::new("http://a/b/shot.PNG?x=1").extension(), ".png");
        assert_eq!(ScraperSearchItem::with_format("http://a/b?m=1", "jpg").extension(), ".jpg");
        assert_eq!(ScraperSearchItem::new("http://a/video").extension(), "");
    }

    #[test]
    fn test_search_name_prefers_override() {
        let mut system = SystemData::new(gamesync_core::SystemConfig::new("mame", "/roms/mame", &["zip"]));
        let root = system.root();
        let id = system
            .insert_entity(root, gamesync_core::EntityKind::Game, Path::new("/roms/mame/Metal Slug (World).zip"))
            .unwrap();
        let mut params = ScraperSearchParams::for_entity(&system, id, true).unwrap();
        assert_eq!(params.search_name(), "Metal Slug");
        params.name_override = Some("  mslug ".into());
        assert_eq!(params.search_name(), "mslug");
    }
}
