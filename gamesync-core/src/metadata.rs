//! Metadata schema and the per-entity property bag.
//!
//! Every game or folder owns one [`MetadataRecord`]. The set of keys it can
//! hold is fixed by a static schema per [`MetadataKind`]; values are stored as
//! strings exactly as they appear in `gamelist.xml`.

use std::collections::HashMap;

/// How a metadata value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaDataType {
    String,
    Int,
    Float,
    Bool,
    MultilineString,
    Path,
    Rating,
    Date,
    Time,
}

/// Identifier of a metadata property. Each id has a stable XML key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaDataId {
    Name,
    SortName,
    Desc,
    Emulator,
    Core,
    Image,
    Video,
    Marquee,
    Thumbnail,
    FanArt,
    TitleShot,
    BoxArt,
    BoxBack,
    Wheel,
    Cartridge,
    Manual,
    Magazine,
    Map,
    Rating,
    ReleaseDate,
    Developer,
    Publisher,
    Genre,
    GenreIds,
    ArcadeSystemName,
    Players,
    Favorite,
    Hidden,
    KidGame,
    PlayCount,
    LastPlayed,
    GameTime,
    Language,
    Region,
}

impl MetaDataId {
    /// All ids that reference a media file on disk.
    pub const MEDIA: [MetaDataId; 13] = [
        MetaDataId::Image,
        MetaDataId::Thumbnail,
        MetaDataId::Marquee,
        MetaDataId::Video,
        MetaDataId::FanArt,
        MetaDataId::TitleShot,
        MetaDataId::BoxArt,
        MetaDataId::BoxBack,
        MetaDataId::Wheel,
        MetaDataId::Cartridge,
        MetaDataId::Manual,
        MetaDataId::Magazine,
        MetaDataId::Map,
    ];

    /// The XML tag name for this property.
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::SortName => "sortname",
            Self::Desc => "desc",
            Self::Emulator => "emulator",
            Self::Core => "core",
            Self::Image => "image",
            Self::Video => "video",
            Self::Marquee => "marquee",
            Self::Thumbnail => "thumbnail",
            Self::FanArt => "fanart",
            Self::TitleShot => "titleshot",
            Self::BoxArt => "boxart",
            Self::BoxBack => "boxback",
            Self::Wheel => "wheel",
            Self::Cartridge => "cartridge",
            Self::Manual => "manual",
            Self::Magazine => "magazine",
            Self::Map => "map",
            Self::Rating => "rating",
            Self::ReleaseDate => "releasedate",
            Self::Developer => "developer",
            Self::Publisher => "publisher",
            Self::Genre => "genre",
            Self::GenreIds => "genreid",
            Self::ArcadeSystemName => "arcadesystemname",
            Self::Players => "players",
            Self::Favorite => "favorite",
            Self::Hidden => "hidden",
            Self::KidGame => "kidgame",
            Self::PlayCount => "playcount",
            Self::LastPlayed => "lastplayed",
            Self::GameTime => "gametime",
            Self::Language => "lang",
            Self::Region => "region",
        }
    }

    /// Look up an id by its XML tag name.
    pub fn from_key(key: &str) -> Option<Self> {
        GAME_METADATA
            .iter()
            .map(|d| d.id)
            .find(|id| id.key() == key)
    }

    pub fn is_media(self) -> bool {
        Self::MEDIA.contains(&self)
    }
}

/// Schema entry for one property.
#[derive(Debug, Clone, Copy)]
pub struct MetaDataDecl {
    pub id: MetaDataId,
    pub kind: MetaDataType,
    pub default: &'static str,
    /// Statistics are tracked locally and never replaced by scraped values.
    pub is_statistic: bool,
}

impl MetaDataDecl {
    const fn new(id: MetaDataId, kind: MetaDataType, default: &'static str) -> Self {
        Self {
            id,
            kind,
            default,
            is_statistic: false,
        }
    }

    const fn statistic(id: MetaDataId, kind: MetaDataType, default: &'static str) -> Self {
        Self {
            id,
            kind,
            default,
            is_statistic: true,
        }
    }

    pub fn key(&self) -> &'static str {
        self.id.key()
    }
}

use MetaDataId as Id;
use MetaDataType as Ty;

static GAME_METADATA: &[MetaDataDecl] = &[
    MetaDataDecl::new(Id::Name, Ty::String, ""),
    MetaDataDecl::new(Id::SortName, Ty::String, ""),
    MetaDataDecl::new(Id::Desc, Ty::MultilineString, ""),
    MetaDataDecl::new(Id::Emulator, Ty::String, ""),
    MetaDataDecl::new(Id::Core, Ty::String, ""),
    MetaDataDecl::new(Id::Image, Ty::Path, ""),
    MetaDataDecl::new(Id::Video, Ty::Path, ""),
    MetaDataDecl::new(Id::Marquee, Ty::Path, ""),
    MetaDataDecl::new(Id::Thumbnail, Ty::Path, ""),
    MetaDataDecl::new(Id::FanArt, Ty::Path, ""),
    MetaDataDecl::new(Id::TitleShot, Ty::Path, ""),
    MetaDataDecl::new(Id::BoxArt, Ty::Path, ""),
    MetaDataDecl::new(Id::BoxBack, Ty::Path, ""),
    MetaDataDecl::new(Id::Wheel, Ty::Path, ""),
    MetaDataDecl::new(Id::Cartridge, Ty::Path, ""),
    MetaDataDecl::new(Id::Manual, Ty::Path, ""),
    MetaDataDecl::new(Id::Magazine, Ty::Path, ""),
    MetaDataDecl::new(Id::Map, Ty::Path, ""),
    MetaDataDecl::new(Id::Rating, Ty::Rating, "0.000000"),
    MetaDataDecl::new(Id::ReleaseDate, Ty::Date, "not-a-date-time"),
    MetaDataDecl::new(Id::Developer, Ty::String, "unknown"),
    MetaDataDecl::new(Id::Publisher, Ty::String, "unknown"),
    MetaDataDecl::new(Id::Genre, Ty::String, "unknown"),
    MetaDataDecl::new(Id::GenreIds, Ty::String, ""),
    MetaDataDecl::new(Id::ArcadeSystemName, Ty::String, ""),
    MetaDataDecl::new(Id::Players, Ty::Int, "1"),
    MetaDataDecl::new(Id::Favorite, Ty::Bool, "false"),
    MetaDataDecl::new(Id::Hidden, Ty::Bool, "false"),
    MetaDataDecl::new(Id::KidGame, Ty::Bool, "false"),
    MetaDataDecl::statistic(Id::PlayCount, Ty::Int, "0"),
    MetaDataDecl::statistic(Id::LastPlayed, Ty::Time, "0"),
    MetaDataDecl::statistic(Id::GameTime, Ty::Int, "0"),
    MetaDataDecl::new(Id::Language, Ty::String, ""),
    MetaDataDecl::new(Id::Region, Ty::String, ""),
];

static FOLDER_METADATA: &[MetaDataDecl] = &[
    MetaDataDecl::new(Id::Name, Ty::String, ""),
    MetaDataDecl::new(Id::SortName, Ty::String, ""),
    MetaDataDecl::new(Id::Desc, Ty::MultilineString, ""),
    MetaDataDecl::new(Id::Image, Ty::Path, ""),
    MetaDataDecl::new(Id::Thumbnail, Ty::Path, ""),
    MetaDataDecl::new(Id::Video, Ty::Path, ""),
    MetaDataDecl::new(Id::Marquee, Ty::Path, ""),
    MetaDataDecl::new(Id::FanArt, Ty::Path, ""),
    MetaDataDecl::new(Id::Rating, Ty::Rating, "0.000000"),
    MetaDataDecl::new(Id::ReleaseDate, Ty::Date, "not-a-date-time"),
    MetaDataDecl::new(Id::Developer, Ty::String, "unknown"),
    MetaDataDecl::new(Id::Publisher, Ty::String, "unknown"),
    MetaDataDecl::new(Id::Genre, Ty::String, "unknown"),
    MetaDataDecl::new(Id::GenreIds, Ty::String, ""),
    MetaDataDecl::new(Id::Players, Ty::Int, "1"),
    MetaDataDecl::new(Id::Hidden, Ty::Bool, "false"),
    MetaDataDecl::new(Id::Favorite, Ty::Bool, "false"),
];

/// Which schema a record uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    Game,
    Folder,
}

impl MetadataKind {
    pub fn schema(self) -> &'static [MetaDataDecl] {
        match self {
            Self::Game => GAME_METADATA,
            Self::Folder => FOLDER_METADATA,
        }
    }

    pub fn decl(self, id: MetaDataId) -> Option<&'static MetaDataDecl> {
        self.schema().iter().find(|d| d.id == id)
    }
}

/// Key/value metadata for one entity, with change tracking.
#[derive(Debug, Clone)]
pub struct MetadataRecord {
    kind: MetadataKind,
    values: HashMap<MetaDataId, String>,
    dirty: bool,
}

impl MetadataRecord {
    pub fn new(kind: MetadataKind) -> Self {
        Self {
            kind,
            values: HashMap::new(),
            dirty: false,
        }
    }

    pub fn kind(&self) -> MetadataKind {
        self.kind
    }

    pub fn schema(&self) -> &'static [MetaDataDecl] {
        self.kind.schema()
    }

    /// Current value, falling back to the schema default. Ids outside this
    /// record's schema read as empty.
    pub fn get(&self, id: MetaDataId) -> &str {
        if let Some(v) = self.values.get(&id) {
            return v;
        }
        self.kind.decl(id).map(|d| d.default).unwrap_or("")
    }

    /// Set a value. Returns `true` and marks the record dirty only when the
    /// stored value actually changes.
    pub fn set(&mut self, id: MetaDataId, value: impl Into<String>) -> bool {
        if self.kind.decl(id).is_none() {
            log::debug!("Ignoring '{}' on a {:?} record", id.key(), self.kind);
            return false;
        }
        let value = value.into();
        if self.get(id) == value {
            return false;
        }
        self.values.insert(id, value);
        self.dirty = true;
        true
    }

    /// Set a value by its XML key. Unknown keys are ignored.
    pub fn set_by_key(&mut self, key: &str, value: impl Into<String>) -> bool {
        match MetaDataId::from_key(key) {
            Some(id) => self.set(id, value),
            None => false,
        }
    }

    pub fn get_float(&self, id: MetaDataId) -> f32 {
        self.get(id).trim().parse().unwrap_or(0.0)
    }

    pub fn get_int(&self, id: MetaDataId) -> i64 {
        self.get(id).trim().parse().unwrap_or(0)
    }

    pub fn get_bool(&self, id: MetaDataId) -> bool {
        matches!(self.get(id).trim(), "true" | "1")
    }

    pub fn name(&self) -> &str {
        self.get(MetaDataId::Name)
    }

    pub fn is_default(&self, id: MetaDataId) -> bool {
        let default = self.kind.decl(id).map(|d| d.default).unwrap_or("");
        self.get(id) == default
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn reset_dirty(&mut self) {
        self.dirty = false;
    }

    /// Schema-ordered `(decl, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static MetaDataDecl, &str)> + '_ {
        self.schema().iter().map(move |d| (d, self.get(d.id)))
    }

    /// Copy every non-statistic, non-default value from a scraped record.
    /// Returns the number of fields that changed.
    pub fn import_scraped(&mut self, source: &MetadataRecord) -> usize {
        let mut changed = 0;
        for decl in self.schema() {
            if decl.is_statistic {
                continue;
            }
            let value = source.get(decl.id);
            if value.is_empty() || source.is_default(decl.id) {
                continue;
            }
            if self.set(decl.id, value) {
                changed += 1;
            }
        }
        changed
    }
}

/// Convert a scraped release date into the gamelist `YYYYMMDDT000000` form.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYYMMDD` and values that are
/// already in gamelist form.
pub fn normalize_date(value: &str) -> Option<String> {
    use chrono::NaiveDate;

    let value = value.trim();
    if value.len() == 15 && value.as_bytes().get(8) == Some(&b'T') {
        return NaiveDate::parse_from_str(&value[..8], "%Y%m%d")
            .ok()
            .map(|_| value.to_string());
    }

    let date = if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
        value
            .parse()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
    } else if value.len() == 7 {
        NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
            .ok()
    }?;

    Some(date.format("%Y%m%dT000000").to_string())
}

#[cfg(test)]
#[path = "tests/metadata_tests.rs"]
mod tests;
