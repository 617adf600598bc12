use std::fs;
use std::path::{Path, PathBuf};

use gamesync_core::{MetaDataId, Settings, SystemConfig, SystemData};
use gamesync_gamelist::cleanup::probe_media;
use gamesync_gamelist::{
    cleanup_gamelist, has_dirty_file, parse_gamelist, recovery_fragments, save_to_gamelist_recovery,
};

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"data").unwrap();
}

fn load(roms: &Path, settings: &Settings) -> SystemData {
    let mut system = SystemData::new(SystemConfig::new("snes", roms, &["sfc"]));
    system.populate().unwrap();
    parse_gamelist(&mut system, settings);
    system
}

fn setup() -> (tempfile::TempDir, PathBuf, Settings) {
    let tmp = tempfile::tempdir().unwrap();
    let roms = tmp.path().join("snes");
    let settings = Settings {
        config_dir: tmp.path().join("config"),
        ..Settings::default()
    };
    (tmp, roms, settings)
}

#[test]
fn probe_order_prefers_suffixed_names_then_media_folder() {
    let (_tmp, roms, _) = setup();
    touch(&roms.join("images/Alpha.png"));
    touch(&roms.join("media/images/Alpha-image.jpg"));
    // `-image` under media/ wins over the bare name in images/
    assert_eq!(
        probe_media(&roms, "Alpha", MetaDataId::Image),
        Some(roms.join("media/images/Alpha-image.jpg"))
    );

    touch(&roms.join("images/Alpha-image.png"));
    assert_eq!(
        probe_media(&roms, "Alpha", MetaDataId::Image),
        Some(roms.join("images/Alpha-image.png"))
    );

    touch(&roms.join("magazines/Alpha-magazine.cbz"));
    assert_eq!(
        probe_media(&roms, "Alpha", MetaDataId::Magazine),
        Some(roms.join("magazines/Alpha-magazine.cbz"))
    );
    assert_eq!(probe_media(&roms, "Alpha", MetaDataId::Video), None);
}

#[test]
fn cleanup_repairs_gamelist_and_is_idempotent() {
    let (_tmp, roms, settings) = setup();
    touch(&roms.join("Alpha.sfc"));
    touch(&roms.join("Beta.sfc"));
    touch(&roms.join("Gamma.sfc"));
    touch(&roms.join("images/Alpha-thumb.png"));
    touch(&roms.join("images/Gamma-image.jpg"));
    touch(&roms.join("videos/Alpha-video.mp4"));
    touch(&roms.join("images/Orphan-image.png"));
    touch(&roms.join("images/notes.txt"));
    touch(&roms.join("media/images/Old-box.png"));
    fs::write(
        roms.join("gamelist.xml"),
        r#"<?xml version="1.0"?>
<gameList>
	<game><path>./Alpha.sfc</path><name>Alpha</name><video>./videos/Alpha-video.mp4</video><image>./images/gone.png</image></game>
	<game><path>./Beta.sfc</path><name>Beta Deluxe</name></game>
	<game><path>./Deleted.sfc</path><name>Deleted</name></game>
	<game><name>No path</name></game>
</gameList>
"#,
    )
    .unwrap();

    let mut system = load(&roms, &settings);
    let first = cleanup_gamelist(&mut system, &settings).unwrap();
    assert!(first.written);
    assert_eq!(first.removed_nodes, 2);
    // Alpha gains a thumbnail; Gamma gets a node for its probed image
    assert_eq!(first.media_linked, 2);
    // Alpha's broken image reference is stripped
    assert_eq!(first.media_removed, 1);
    assert_eq!(first.added_nodes, 1);
    assert_eq!(
        first.deleted_files,
        vec![
            roms.join("images/Orphan-image.png"),
            roms.join("media/images/Old-box.png"),
        ]
    );

    assert!(roms.join("gamelist.xml.old").exists());
    assert!(roms.join("images/notes.txt").exists());
    assert!(roms.join("images/Alpha-thumb.png").exists());
    assert!(!has_dirty_file(&system));

    let text = fs::read_to_string(roms.join("gamelist.xml")).unwrap();
    assert!(text.contains("<thumbnail>./images/Alpha-thumb.png</thumbnail>"));
    assert!(text.contains("<image>./images/Gamma-image.jpg</image>"));
    assert!(!text.contains("gone.png"));
    assert!(!text.contains("Deleted"));
    assert!(!text.contains("No path"));

    let second = cleanup_gamelist(&mut system, &settings).unwrap();
    assert!(!second.changed());
    assert!(!second.written);
    assert!(second.deleted_files.is_empty());
    assert_eq!(fs::read_to_string(roms.join("gamelist.xml")).unwrap(), text);

    // Same result after a fresh load
    let mut reloaded = load(&roms, &settings);
    assert!(!cleanup_gamelist(&mut reloaded, &settings).unwrap().changed());
}

#[test]
fn cleanup_keeps_media_of_unsaved_changes() {
    let (_tmp, roms, settings) = setup();
    touch(&roms.join("Alpha.sfc"));
    let downloaded = roms.join("images/Alpha-fresh.png");
    touch(&downloaded);

    let mut system = load(&roms, &settings);
    let alpha = system.lookup(&roms.join("Alpha.sfc")).unwrap();
    system
        .tree_mut()
        .get_mut(alpha)
        .unwrap()
        .metadata
        .set(MetaDataId::Image, downloaded.to_string_lossy());

    let outcome = cleanup_gamelist(&mut system, &settings).unwrap();
    assert!(outcome.deleted_files.is_empty());
    assert!(downloaded.exists());
    // The pending change is still waiting for update_gamelist
    assert!(has_dirty_file(&system));
}

#[test]
fn cleanup_skips_collections() {
    let (_tmp, roms, settings) = setup();
    touch(&roms.join("Alpha.sfc"));
    touch(&roms.join("images/Orphan.png"));
    let mut cfg = SystemConfig::new("favorites", &roms, &["sfc"]);
    cfg.collection = true;
    let mut system = SystemData::new(cfg);
    system.populate().unwrap();

    assert!(cleanup_gamelist(&mut system, &settings).unwrap().skipped);
    assert!(roms.join("images/Orphan.png").exists());
}

#[test]
fn cleanup_rejournals_pending_changes_against_the_new_file() {
    let (_tmp, roms, settings) = setup();
    touch(&roms.join("Alpha.sfc"));
    touch(&roms.join("Beta.sfc"));
    fs::write(
        roms.join("gamelist.xml"),
        r#"<?xml version="1.0"?>
<gameList>
	<game><path>./Alpha.sfc</path><name>Alpha</name></game>
	<game><path>./Beta.sfc</path><name>Beta</name></game>
	<game><path>./Gone.sfc</path><name>Gone</name></game>
</gameList>
"#,
    )
    .unwrap();

    let mut system = load(&roms, &settings);
    let beta = system.lookup(&roms.join("Beta.sfc")).unwrap();
    system
        .tree_mut()
        .get_mut(beta)
        .unwrap()
        .metadata
        .set(MetaDataId::Desc, "Scraped text");
    assert!(save_to_gamelist_recovery(&system, &settings, beta).unwrap());

    let outcome = cleanup_gamelist(&mut system, &settings).unwrap();
    assert!(outcome.written);
    assert_eq!(outcome.removed_nodes, 1);
    assert_eq!(recovery_fragments(&settings, &system).len(), 1);

    // Restart before update_gamelist: the fragment still replays
    let reloaded = load(&roms, &settings);
    let beta = reloaded.lookup(&roms.join("Beta.sfc")).unwrap();
    let entity = reloaded.tree().get(beta).unwrap();
    assert_eq!(entity.metadata.get(MetaDataId::Desc), "Scraped text");
    assert!(entity.metadata.is_dirty());
}
