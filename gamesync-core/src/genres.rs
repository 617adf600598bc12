//! Built-in genre table and free-text genre migration.
//!
//! Scrapers return genres as free text (`"Shooter / Shoot'em Up"`,
//! `"Action, Platform"`). The front-end filters on numeric ids stored in the
//! `genreid` field, so every merged record runs through
//! [`convert_genre_to_ids`].

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::metadata::{MetaDataId, MetadataRecord};

pub struct Genre {
    pub id: u32,
    pub parent: u32,
    pub name: &'static str,
    pub alt_names: &'static [&'static str],
}

const fn genre(id: u32, parent: u32, name: &'static str, alt_names: &'static [&'static str]) -> Genre {
    Genre {
        id,
        parent,
        name,
        alt_names,
    }
}

pub static GENRES: &[Genre] = &[
    genre(100, 0, "Action", &[]),
    genre(101, 100, "Beat'em Up", &["BEAT EM UP", "BRAWLER"]),
    genre(102, 100, "Platform", &["PLATFORMER"]),
    genre(103, 100, "Fighting", &["VERSUS FIGHTING", "VERSUS"]),
    genre(104, 100, "Shoot'em Up", &["SHMUP", "SHOOTER", "SHOOT EM UP"]),
    genre(105, 100, "Run & Gun", &["RUN AND GUN"]),
    genre(106, 100, "Lightgun Shooter", &["LIGHTGUN", "GUN"]),
    genre(200, 0, "Adventure", &[]),
    genre(201, 200, "Graphic Adventure", &["POINT AND CLICK"]),
    genre(202, 200, "Survival Horror", &["HORROR"]),
    genre(300, 0, "Role Playing Game", &["RPG", "ROLE-PLAYING", "ROLE PLAYING"]),
    genre(301, 300, "Action RPG", &["ACTION-RPG"]),
    genre(302, 300, "Dungeon Crawler", &["DUNGEON"]),
    genre(400, 0, "Sports", &["SPORT"]),
    genre(401, 400, "Football", &["SOCCER"]),
    genre(402, 400, "Basketball", &[]),
    genre(403, 400, "Golf", &[]),
    genre(404, 400, "Tennis", &[]),
    genre(500, 0, "Racing", &["DRIVING", "RACE"]),
    genre(600, 0, "Puzzle", &[]),
    genre(700, 0, "Strategy", &["TACTICS"]),
    genre(800, 0, "Simulation", &[]),
    genre(900, 0, "Board Game", &["BOARD", "TABLE"]),
    genre(901, 900, "Casino", &["CARDS"]),
    genre(1000, 0, "Quiz", &["TRIVIA"]),
    genre(1100, 0, "Music", &["RHYTHM"]),
    genre(1200, 0, "Pinball", &[]),
    genre(1300, 0, "Compilation", &[]),
    genre(1400, 0, "Educational", &[]),
    genre(1500, 0, "Maze", &[]),
];

pub fn find_genre(id: u32) -> Option<&'static Genre> {
    GENRES.iter().find(|g| g.id == id)
}

/// Uppercased lookup names: `NAME`, `PARENT / NAME` and every alt name.
fn names() -> &'static HashMap<String, u32> {
    static NAMES: OnceLock<HashMap<String, u32>> = OnceLock::new();
    NAMES.get_or_init(|| {
        let mut map = HashMap::new();
        for g in GENRES {
            map.insert(g.name.to_uppercase(), g.id);
            for alt in g.alt_names {
                map.entry(alt.to_uppercase()).or_insert(g.id);
            }
            if let Some(parent) = find_genre(g.parent) {
                map.insert(
                    format!("{} / {}", parent.name.to_uppercase(), g.name.to_uppercase()),
                    g.id,
                );
            }
        }
        map
    })
}

/// Map a free-text genre to the set of known genre ids.
///
/// The whole string is tried first, then each `,` or `/` separated part.
pub fn genre_ids_for(genre: &str) -> BTreeSet<u32> {
    let genre = genre.trim().to_uppercase();
    let mut ids = BTreeSet::new();
    if genre.is_empty() {
        return ids;
    }
    if let Some(id) = names().get(&genre) {
        ids.insert(*id);
        return ids;
    }
    for part in genre.split([',', '/']) {
        if let Some(id) = names().get(part.trim()) {
            ids.insert(*id);
        }
    }
    ids
}

/// Fill `genreid` from the free-text genre. Unknown genres leave the record
/// untouched. Returns `true` when the record changed.
pub fn convert_genre_to_ids(record: &mut MetadataRecord) -> bool {
    if record.is_default(MetaDataId::Genre) {
        return false;
    }
    let genre = record.get(MetaDataId::Genre).to_string();
    let ids = genre_ids_for(&genre);
    if ids.is_empty() {
        log::debug!("Unknown genre: {genre}");
        return false;
    }
    let list: Vec<String> = ids.iter().map(u32::to_string).collect();
    record.set(MetaDataId::GenreIds, list.join(","))
}
