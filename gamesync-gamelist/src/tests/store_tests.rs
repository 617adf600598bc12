use super::*;
use gamesync_core::SystemConfig;
use std::fs;

fn system_at(dir: &Path) -> SystemData {
    SystemData::new(SystemConfig::new("snes", dir, &["sfc", "zip"]))
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_metadata_from_xml_resolves_paths() {
    let node = crate::xml::parse_str(
        "<game><name>Alpha</name><image>./images/a.png</image><rating>0.6</rating></game>",
        Path::new("x"),
    )
    .unwrap();
    let md = metadata_from_xml(EntityKind::Game, &node, Path::new("/roms/snes"));
    assert_eq!(md.name(), "Alpha");
    assert_eq!(md.get(MetaDataId::Image), "/roms/snes/images/a.png");
    assert_eq!(md.get(MetaDataId::Rating), "0.6");
    assert!(!md.is_dirty());
}

#[test]
fn test_append_metadata_skips_defaults_and_relativizes() {
    let mut md = MetadataRecord::new(gamesync_core::MetadataKind::Game);
    md.set(MetaDataId::Name, "Alpha");
    md.set(MetaDataId::Image, "/roms/snes/images/a.png");
    let mut node = XmlElement::new("game");
    append_metadata_to_xml(&md, &mut node, true, Some(Path::new("/roms/snes")));

    let names: Vec<&str> = node.elements().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["name", "image"]);
    assert_eq!(node.child_text("image").as_deref(), Some("./images/a.png"));
}

#[test]
fn test_entity_node_drops_default_name_only() {
    let mut system = system_at(Path::new("/roms/snes"));
    let root = system.root();
    let id = system
        .insert_entity(root, EntityKind::Game, Path::new("/roms/snes/Alpha.sfc"))
        .unwrap();
    assert!(entity_node(&system, id, false).is_none());

    let mut parent = XmlElement::new("gameList");
    assert!(!add_file_data_node(&system, id, &mut parent));
    assert_eq!(parent.elements().count(), 0);

    system
        .tree_mut()
        .get_mut(id)
        .unwrap()
        .metadata
        .set(MetaDataId::Name, "Alpha Deluxe");
    let node = entity_node(&system, id, false).unwrap();
    assert_eq!(node.elements().next().unwrap().name, "path");
    assert_eq!(node.child_text("path").as_deref(), Some("./Alpha.sfc"));

    let full = entity_node(&system, id, true).unwrap();
    assert_eq!(full.child_text("path").as_deref(), Some("/roms/snes/Alpha.sfc"));
}

#[test]
fn test_find_or_create_file_builds_intermediate_folders() {
    let mut system = system_at(Path::new("/roms/snes"));
    let id = find_or_create_file(
        &mut system,
        Path::new("/roms/snes/a/b/Game.sfc"),
        EntityKind::Game,
    )
    .unwrap();
    let b = system.lookup(Path::new("/roms/snes/a/b")).unwrap();
    assert_eq!(system.tree().parent(id), Some(b));
    assert_eq!(system.tree().get(b).unwrap().kind(), EntityKind::Folder);

    // Existing entries are returned, not duplicated
    let again = find_or_create_file(
        &mut system,
        Path::new("/roms/snes/a/./b/Game.sfc"),
        EntityKind::Game,
    );
    assert_eq!(again, Some(id));
}

#[test]
fn test_find_or_create_file_rejections() {
    let mut system = system_at(Path::new("/roms/snes"));
    // Outside the system
    assert!(find_or_create_file(&mut system, Path::new("/roms/nes/x.sfc"), EntityKind::Game).is_none());
    // Unknown extension
    assert!(find_or_create_file(&mut system, Path::new("/roms/snes/x.iso"), EntityKind::Game).is_none());
    // Folders are never created from a gamelist
    assert!(find_or_create_file(&mut system, Path::new("/roms/snes/Hacks"), EntityKind::Folder).is_none());
    assert!(system.lookup(Path::new("/roms/snes/Hacks")).is_none());
    // Nor are folders leading up to a folder node
    assert!(find_or_create_file(&mut system, Path::new("/roms/snes/a/b"), EntityKind::Folder).is_none());
    assert!(system.lookup(Path::new("/roms/snes/a")).is_none());
    assert_eq!(system.tree().len(), 1);
}

#[test]
fn test_load_gamelist_file_merges_and_applies_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let roms = tmp.path().join("snes");
    write(&roms.join("Alpha.sfc"), "x");
    write(&roms.join(".Secret.sfc"), "x");
    write(
        &roms.join("gamelist.xml"),
        r#"<?xml version="1.0"?>
<gameList>
	<game><path>./Alpha.sfc</path><genre>Racing</genre><desc>Fast.</desc></game>
	<game><path>./.Secret.sfc</path><name>Secret</name></game>
	<game><path>./Missing.sfc</path><name>Gone</name></game>
	<game><path>../nes/Other.sfc</path></game>
	<game><name>No path</name></game>
	<folder><path>./Hacks</path><name>Hacks</name></folder>
</gameList>
"#,
    );

    let mut system = system_at(&roms);
    let stats = load_gamelist_file(&mut system, &roms.join("gamelist.xml"), None, false).unwrap();
    assert_eq!(stats.merged, 2);
    assert_eq!(stats.skipped, 4);

    let alpha = system.lookup(&roms.join("Alpha.sfc")).unwrap();
    let md = &system.tree().get(alpha).unwrap().metadata;
    // Name falls back to the file stem, genre ids are migrated
    assert_eq!(md.name(), "Alpha");
    assert_eq!(md.get(MetaDataId::GenreIds), "500");
    assert_eq!(md.get(MetaDataId::Desc), "Fast.");
    assert!(!md.is_dirty());

    let secret = system.lookup(&roms.join(".Secret.sfc")).unwrap();
    assert!(system.tree().get(secret).unwrap().metadata.get_bool(MetaDataId::Hidden));
}

#[test]
fn test_trust_gamelist_skips_existence_check() {
    let tmp = tempfile::tempdir().unwrap();
    let roms = tmp.path().join("snes");
    write(
        &roms.join("gamelist.xml"),
        "<gameList><game><path>./NotHere.sfc</path><name>Trusted</name></game></gameList>",
    );
    let mut system = system_at(&roms);
    let stats = load_gamelist_file(&mut system, &roms.join("gamelist.xml"), None, true).unwrap();
    assert_eq!(stats.merged, 1);
    assert!(system.lookup(&roms.join("NotHere.sfc")).is_some());
}

#[test]
fn test_load_rejects_wrong_root() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("gamelist.xml");
    write(&path, "<games><game/></games>");
    let mut system = system_at(tmp.path());
    assert!(matches!(
        load_gamelist_file(&mut system, &path, None, false),
        Err(GamelistError::MissingRoot(_))
    ));
}

#[test]
fn test_save_to_xml_writes_parent_hash() {
    let tmp = tempfile::tempdir().unwrap();
    let roms = tmp.path().join("snes");
    let mut system = system_at(&roms);
    system.set_gamelist_hash(Some(812));
    let root = system.root();
    let id = system
        .insert_entity(root, EntityKind::Game, &roms.join("Alpha.sfc"))
        .unwrap();

    let out = tmp.path().join("one.xml");
    assert!(matches!(
        save_to_xml(&system, id, &out, false),
        Err(GamelistError::NothingToSave(_))
    ));
    assert!(!out.exists());

    system
        .tree_mut()
        .get_mut(id)
        .unwrap()
        .metadata
        .set(MetaDataId::Players, "2");
    save_to_xml(&system, id, &out, false).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("<gameList parentHash=\"812\">"));
    assert!(text.contains("<players>2</players>"));
}
