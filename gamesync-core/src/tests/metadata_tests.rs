use super::*;

#[test]
fn test_defaults_come_from_schema() {
    let md = MetadataRecord::new(MetadataKind::Game);
    assert_eq!(md.get(MetaDataId::Rating), "0.000000");
    assert_eq!(md.get(MetaDataId::Developer), "unknown");
    assert_eq!(md.get(MetaDataId::Name), "");
    assert!(md.is_default(MetaDataId::Players));
    assert!(!md.is_dirty());
}

#[test]
fn test_set_marks_dirty_only_on_change() {
    let mut md = MetadataRecord::new(MetadataKind::Game);
    assert!(!md.set(MetaDataId::Developer, "unknown"));
    assert!(!md.is_dirty());

    assert!(md.set(MetaDataId::Developer, "Capcom"));
    assert!(md.is_dirty());

    md.reset_dirty();
    assert!(!md.set(MetaDataId::Developer, "Capcom"));
    assert!(!md.is_dirty());
}

#[test]
fn test_folder_schema_rejects_game_only_keys() {
    let mut md = MetadataRecord::new(MetadataKind::Folder);
    assert!(!md.set(MetaDataId::PlayCount, "3"));
    assert_eq!(md.get(MetaDataId::PlayCount), "");
    assert!(!md.is_dirty());
    assert!(md.set(MetaDataId::Image, "./images/folder.png"));
}

#[test]
fn test_keys_round_trip() {
    assert_eq!(MetaDataId::GenreIds.key(), "genreid");
    assert_eq!(MetaDataId::Language.key(), "lang");
    for decl in MetadataKind::Game.schema() {
        assert_eq!(MetaDataId::from_key(decl.key()), Some(decl.id));
    }
    assert_eq!(MetaDataId::from_key("bogus"), None);
}

#[test]
fn test_typed_getters() {
    let mut md = MetadataRecord::new(MetadataKind::Game);
    md.set(MetaDataId::Rating, "0.8");
    md.set(MetaDataId::Players, "4");
    md.set(MetaDataId::Favorite, "true");
    assert!((md.get_float(MetaDataId::Rating) - 0.8).abs() < f32::EPSILON);
    assert_eq!(md.get_int(MetaDataId::Players), 4);
    assert!(md.get_bool(MetaDataId::Favorite));
    assert!(!md.get_bool(MetaDataId::Hidden));
}

#[test]
fn test_import_scraped_skips_statistics_and_defaults() {
    let mut target = MetadataRecord::new(MetadataKind::Game);
    target.set(MetaDataId::PlayCount, "7");
    target.set(MetaDataId::Developer, "Konami");
    target.reset_dirty();

    let mut scraped = MetadataRecord::new(MetadataKind::Game);
    scraped.set(MetaDataId::Name, "Contra");
    scraped.set(MetaDataId::PlayCount, "0");
    scraped.set(MetaDataId::Desc, "Run and gun.");

    let changed = target.import_scraped(&scraped);
    assert_eq!(changed, 2);
    assert_eq!(target.name(), "Contra");
    assert_eq!(target.get(MetaDataId::PlayCount), "7");
    // Default developer in the scraped record does not clobber a real value
    assert_eq!(target.get(MetaDataId::Developer), "Konami");
    assert!(target.is_dirty());
}

#[test]
fn test_normalize_date() {
    assert_eq!(normalize_date("1991").as_deref(), Some("19910101T000000"));
    assert_eq!(normalize_date("1991-08").as_deref(), Some("19910801T000000"));
    assert_eq!(normalize_date("1991-08-23").as_deref(), Some("19910823T000000"));
    assert_eq!(normalize_date("19910823").as_deref(), Some("19910823T000000"));
    assert_eq!(
        normalize_date("19910823T000000").as_deref(),
        Some("19910823T000000")
    );
    assert_eq!(normalize_date("199x"), None);
    assert_eq!(normalize_date(""), None);
}
