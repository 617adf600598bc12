use super::*;
use std::io::Cursor;
use std::sync::Arc;

use gamesync_core::{EntityKind, SystemConfig, SystemData};

use crate::fake_transport::{FakeTransport, http_context, poll_until_done};
use crate::http::{HttpResponse, HttpStatus};
use crate::result::ScraperSearchItem;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn params_for(roms: &Path, file: &str, overwrite: bool) -> ScraperSearchParams {
    let mut system = SystemData::new(SystemConfig::new("mame", roms, &["zip"]));
    let root = system.root();
    let id = system
        .insert_entity(root, EntityKind::Game, &roms.join(file))
        .unwrap();
    ScraperSearchParams::for_entity(&system, id, overwrite).unwrap()
}

fn no_resize() -> ScrapeSettings {
    ScrapeSettings {
        resize_width: 0,
        resize_height: 0,
        retry_delay_ms: 1,
        ..Default::default()
    }
}

fn resolve(
    transport: FakeTransport,
    result: ScraperSearchResult,
    params: &ScraperSearchParams,
    settings: &ScrapeSettings,
) -> (Arc<FakeTransport>, MDResolveHandle, AsyncStatus) {
    let transport = Arc::new(transport);
    let (_runtime, http) = http_context(Arc::clone(&transport));
    let mut handle = MDResolveHandle::new(result, params, settings);
    let status = poll_until_done(AsyncStatus::InProgress, || handle.update(&http));
    (transport, handle, status)
}

#[test]
fn test_save_as_path_layout() {
    let params = params_for(Path::new("/roms/mame"), "mslug.zip", true);
    assert_eq!(
        save_as_path(&params, "image", ".png"),
        Path::new("/roms/mame/images/mslug-image.png")
    );
    assert_eq!(
        save_as_path(&params, "video", ".mp4"),
        Path::new("/roms/mame/videos/mslug-video.mp4")
    );
    assert_eq!(
        save_as_path(&params, "manual", ".pdf"),
        Path::new("/roms/mame/manuals/mslug-manual.pdf")
    );
    assert_eq!(
        save_as_path(&params, "magazine", ".jpg"),
        Path::new("/roms/mame/images/mslug-magazine.jpg")
    );
}

#[test]
fn test_extension_for_content_type() {
    assert_eq!(extension_for_content_type("image/jpeg").as_deref(), Some(".jpg"));
    assert_eq!(extension_for_content_type("IMAGE/PNG").as_deref(), Some(".png"));
    assert_eq!(extension_for_content_type("video/mp4").as_deref(), Some(".mp4"));
    assert_eq!(extension_for_content_type("video/quicktime").as_deref(), Some(".mov"));
    assert_eq!(extension_for_content_type("text/html"), None);
    assert_eq!(extension_for_content_type("image/"), None);
}

#[test]
fn test_downloads_media_to_images_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let params = params_for(tmp.path(), "mslug.zip", true);
    let mut result = ScraperSearchResult::new("test");
    result.md.set(MetaDataId::Name, "Metal Slug");
    result
        .urls
        .insert(MetaDataId::Image, ScraperSearchItem::with_format("http://media.test/ingame/mslug", ".png"));
    let transport = FakeTransport::new().route("ingame", vec![HttpResponse::ok(png(100, 50), Some("image/png"))]);

    let (_, handle, status) = resolve(transport, result, &params, &ScrapeSettings::default());
    assert_eq!(status, AsyncStatus::Done);

    let expected = tmp.path().join("images").join("mslug-image.png");
    assert!(expected.is_file());
    let md = &handle.result().md;
    assert_eq!(md.get(MetaDataId::Image), expected.to_string_lossy());
    assert_eq!(md.name(), "Metal Slug");
    // Within the 640px default, so untouched
    assert_eq!(image::image_dimensions(&expected).unwrap(), (100, 50));
    assert!(handle.result().urls.is_empty());
}

#[test]
fn test_content_type_fixes_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let params = params_for(tmp.path(), "mslug.zip", true);
    let mut result = ScraperSearchResult::new("test");
    result
        .urls
        .insert(MetaDataId::TitleShot, ScraperSearchItem::with_format("http://media.test/title/mslug", ".png"));
    let transport = FakeTransport::new().route("title", vec![HttpResponse::ok(b"jpeg".to_vec(), Some("image/jpeg"))]);

    let (_, handle, status) = resolve(transport, result, &params, &no_resize());
    assert_eq!(status, AsyncStatus::Done);

    let jpg = tmp.path().join("images").join("mslug-titleshot.jpg");
    assert!(jpg.is_file());
    assert!(!tmp.path().join("images").join("mslug-titleshot.png").exists());
    assert_eq!(handle.result().md.get(MetaDataId::TitleShot), jpg.to_string_lossy());
}

#[test]
fn test_resizes_to_configured_width() {
    let tmp = tempfile::tempdir().unwrap();
    let params = params_for(tmp.path(), "mslug.zip", true);
    let mut result = ScraperSearchResult::new("test");
    result
        .urls
        .insert(MetaDataId::Image, ScraperSearchItem::with_format("http://media.test/ingame/mslug", ".png"));
    let transport = FakeTransport::new().route("ingame", vec![HttpResponse::ok(png(100, 50), Some("image/png"))]);
    let settings = ScrapeSettings {
        resize_width: 40,
        resize_height: 0,
        ..Default::default()
    };

    let (_, _, status) = resolve(transport, result, &params, &settings);
    assert_eq!(status, AsyncStatus::Done);
    let saved = tmp.path().join("images").join("mslug-image.png");
    assert_eq!(image::image_dimensions(&saved).unwrap(), (40, 20));
}

#[test]
fn test_resize_image_leaves_small_images_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("small.png");
    std::fs::write(&path, png(30, 30)).unwrap();
    assert!(!resize_image(&path, 40, 0).unwrap());
    assert!(!resize_image(&path, 0, 0).unwrap());
    assert!(resize_image(&path, 0, 15).unwrap());
    assert_eq!(image::image_dimensions(&path).unwrap(), (15, 15));
}

#[test]
fn test_existing_media_is_kept_without_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let params = params_for(tmp.path(), "mslug.zip", false);
    let existing = tmp.path().join("images").join("mslug-image.png");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, png(10, 10)).unwrap();

    let mut result = ScraperSearchResult::new("test");
    result
        .urls
        .insert(MetaDataId::Image, ScraperSearchItem::with_format("http://media.test/ingame/mslug", ".png"));

    let (transport, handle, status) = resolve(FakeTransport::new(), result, &params, &no_resize());
    assert_eq!(status, AsyncStatus::Done);
    assert!(transport.seen().is_empty());
    assert_eq!(handle.result().md.get(MetaDataId::Image), existing.to_string_lossy());
}

#[test]
fn test_missing_remote_media_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let params = params_for(tmp.path(), "mslug.zip", true);
    let mut result = ScraperSearchResult::new("test");
    result
        .urls
        .insert(MetaDataId::Marquee, ScraperSearchItem::with_format("http://media.test/marquee/mslug", ".png"));

    let (_, handle, status) = resolve(FakeTransport::new(), result, &params, &no_resize());
    assert_eq!(status, AsyncStatus::Done);
    assert!(handle.result().md.get(MetaDataId::Marquee).is_empty());
    assert!(!tmp.path().join("images").join("mslug-marquee.png").exists());
}

#[test]
fn test_failed_download_keeps_finished_media() {
    let tmp = tempfile::tempdir().unwrap();
    let params = params_for(tmp.path(), "mslug.zip", true);
    let mut result = ScraperSearchResult::new("test");
    result
        .urls
        .insert(MetaDataId::Image, ScraperSearchItem::with_format("http://media.test/ingame/mslug", ".png"));
    result
        .urls
        .insert(MetaDataId::Video, ScraperSearchItem::new("http://media.test/video/mslug.mp4"));
    let transport = FakeTransport::new()
        .route("ingame", vec![HttpResponse::ok(png(8, 8), Some("image/png"))])
        .status("video", HttpStatus::Blacklisted)
        .slow(std::time::Duration::from_millis(50));

    let (_, handle, status) = resolve(transport, result, &params, &no_resize());
    assert_eq!(status, AsyncStatus::Error);
    let failure = handle.failure().unwrap();
    assert_eq!(failure.status, HttpStatus::Blacklisted);
    assert!(failure.is_fatal());

    let md = handle.into_result().md;
    assert!(md.get(MetaDataId::Video).is_empty());
    assert!(!md.get(MetaDataId::Image).is_empty());
}

#[test]
fn test_result_without_media_is_done_immediately() {
    let params = params_for(Path::new("/roms/mame"), "mslug.zip", true);
    let handle = MDResolveHandle::new(ScraperSearchResult::new("test"), &params, &ScrapeSettings::default());
    assert_eq!(handle.status(), AsyncStatus::Done);
    assert_eq!(handle.percent(), None);
    assert!(handle.current_item().is_empty());
}
