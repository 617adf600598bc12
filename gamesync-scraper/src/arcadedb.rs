//! ArcadeDB (adb.arcadeitalia.net) backend for arcade systems.

use std::collections::VecDeque;

use serde::Deserialize;

use gamesync_core::genres;
use gamesync_core::metadata::normalize_date;
use gamesync_core::{MetaDataId, ScrapeSettings, SystemData};

use crate::error::ScrapeError;
use crate::request::{RequestContext, ResponseParser, RetryPolicy, ScraperHttpRequest, ScraperRequest};
use crate::result::{ScraperSearchItem, ScraperSearchParams, ScraperSearchResult};
use crate::scraper::Scraper;

const BASE_URL: &str = "http://adb.arcadeitalia.net/service_scraper.php";

/// Oldest response format this parser understands.
const MIN_RELEASE: i64 = 4;

const PLATFORMS: &[&str] = &["arcade", "neogeo", "lcdgames"];

const MEDIA: &[MetaDataId] = &[
    MetaDataId::Image,
    MetaDataId::Thumbnail,
    MetaDataId::Marquee,
    MetaDataId::TitleShot,
    MetaDataId::Video,
];

pub struct ArcadeDbScraper {
    threads: usize,
}

impl ArcadeDbScraper {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Query URL for a game name.
    pub fn query_url(name: &str) -> String {
        let params = [
            ("ajax", "query_mame"),
            ("lang", "en"),
            ("use_parent", "1"),
            ("game_name", name),
        ];
        match reqwest::Url::parse_with_params(BASE_URL, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                log::error!("Could not build ArcadeDB query for '{}': {}", name, e);
                BASE_URL.to_string()
            }
        }
    }
}

impl Scraper for ArcadeDbScraper {
    fn name(&self) -> &'static str {
        "ArcadeDB"
    }

    fn thread_count(&self) -> usize {
        self.threads
    }

    fn is_supported_platform(&self, system: &SystemData) -> bool {
        PLATFORMS.iter().any(|p| system.has_platform(p))
    }

    fn supported_media(&self) -> &'static [MetaDataId] {
        MEDIA
    }

    fn generate_requests(
        &self,
        params: &ScraperSearchParams,
        settings: &ScrapeSettings,
        requests: &mut VecDeque<Box<dyn ScraperRequest>>,
    ) {
        let url = Self::query_url(&params.search_name());
        let parser = ArcadeDbParser::new(settings);
        requests.push_back(Box::new(ScraperHttpRequest::new(
            url,
            parser,
            RetryPolicy::from_settings(settings),
        )));
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    release: Option<i64>,
    result: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ArcadeDbGame {
    title: String,
    history: Option<String>,
    year: Option<String>,
    manufacturer: Option<String>,
    genre: Option<String>,
    players: Option<serde_json::Value>,
    url_image_ingame: Option<String>,
    url_image_title: Option<String>,
    url_image_marquee: Option<String>,
    url_image_flyer: Option<String>,
    url_video_shortplay: Option<String>,
    url_video_shortplay_hd: Option<String>,
}

/// Parses an ArcadeDB `query_mame` answer.
pub struct ArcadeDbParser {
    fetch_thumbnail: bool,
    fetch_marquee: bool,
    fetch_video: bool,
}

impl ArcadeDbParser {
    pub fn new(settings: &ScrapeSettings) -> Self {
        Self {
            fetch_thumbnail: settings.fetch_thumbnail,
            fetch_marquee: settings.fetch_marquee,
            fetch_video: settings.fetch_video,
        }
    }

    fn to_result(&self, game: ArcadeDbGame) -> ScraperSearchResult {
        let mut result = ScraperSearchResult::new("ArcadeDB");
        let md = &mut result.md;
        md.set(MetaDataId::Name, game.title.trim());
        if let Some(history) = game.history.filter(|h| !h.trim().is_empty()) {
            md.set(MetaDataId::Desc, history.trim());
        }
        if let Some(date) = game.year.as_deref().and_then(normalize_date) {
            md.set(MetaDataId::ReleaseDate, date);
        }
        if let Some(manufacturer) = game.manufacturer.filter(|m| !m.is_empty()) {
            md.set(MetaDataId::Developer, manufacturer.as_str());
            md.set(MetaDataId::Publisher, manufacturer);
        }
        if let Some(genre) = game.genre.filter(|g| !g.is_empty()) {
            md.set(MetaDataId::Genre, genre);
            genres::convert_genre_to_ids(md);
        }
        if let Some(players) = game.players.as_ref().and_then(serde_json::Value::as_i64) {
            md.set(MetaDataId::Players, players.to_string());
        }

        let mut add = |id: MetaDataId, url: Option<String>, format: Option<&str>| {
            if let Some(url) = url.filter(|u| !u.is_empty()) {
                let item = match format {
                    Some(f) => ScraperSearchItem::with_format(url, f),
                    None => ScraperSearchItem::new(url),
                };
                result.urls.insert(id, item);
            }
        };
        add(MetaDataId::Image, game.url_image_ingame, Some(".png"));
        add(MetaDataId::TitleShot, game.url_image_title, Some(".png"));
        if self.fetch_thumbnail {
            add(MetaDataId::Thumbnail, game.url_image_flyer, Some(".png"));
        }
        if self.fetch_marquee {
            add(MetaDataId::Marquee, game.url_image_marquee, Some(".png"));
        }
        if self.fetch_video {
            add(
                MetaDataId::Video,
                game.url_video_shortplay.or(game.url_video_shortplay_hd),
                None,
            );
        }
        result
    }
}

impl ResponseParser for ArcadeDbParser {
    fn parse(&mut self, body: &[u8], ctx: &mut RequestContext<'_>) -> Result<(), ScrapeError> {
        let response: QueryResponse = serde_json::from_slice(body)?;
        match response.release {
            Some(release) if release >= MIN_RELEASE => {}
            other => {
                log::warn!("ArcadeDB answered with an unsupported format (release {:?})", other);
                return Ok(());
            }
        }
        let Some(games) = response.result else {
            log::warn!("ArcadeDB answer had no game data");
            return Ok(());
        };

        for value in games {
            match serde_json::from_value::<ArcadeDbGame>(value) {
                Ok(game) => ctx.results.push(self.to_result(game)),
                Err(e) => log::error!("Skipping malformed ArcadeDB game: {}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::http::{HttpContext, HttpRequest, HttpResponse, HttpTransport};

    struct Unused;

    impl HttpTransport for Unused {
        fn fetch(
            &self,
            _request: HttpRequest,
            _progress: Arc<std::sync::atomic::AtomicU8>,
        ) -> futures::future::BoxFuture<'static, HttpResponse> {
            unreachable!("parser tests never hit the network")
        }
    }

    fn parse(body: &str, settings: &ScrapeSettings) -> Result<Vec<ScraperSearchResult>, ScrapeError> {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let http = HttpContext::new(runtime.handle().clone(), Arc::new(Unused));
        let mut results = Vec::new();
        let mut follow_ups = VecDeque::new();
        let mut ctx = RequestContext {
            http: &http,
            results: &mut results,
            follow_ups: &mut follow_ups,
        };
        ArcadeDbParser::new(settings).parse(body.as_bytes(), &mut ctx)?;
        assert!(follow_ups.is_empty());
        Ok(results)
    }

    const MSLUG: &str = r#"{
        "release": 4,
        "result": [{
            "game_name": "mslug",
            "title": "Metal Slug - Super Vehicle-001",
            "history": "Run and gun.",
            "year": "1996",
            "manufacturer": "Nazca",
            "genre": "Platform / Shooter Scrolling",
            "players": 2,
            "url_image_ingame": "http://adb.arcadeitalia.net/media/mame.current/ingames/mslug.png",
            "url_image_title": "http://adb.arcadeitalia.net/media/mame.current/titles/mslug.png",
            "url_image_marquee": "http://adb.arcadeitalia.net/media/mame.current/marquees/mslug.png",
            "url_video_shortplay": "http://adb.arcadeitalia.net/download_file.php?tipo=mame_current&codice=mslug&entity=shortplay"
        }, {
            "game_name": "broken"
        }]
    }"#;

    #[test]
    fn test_parse_maps_fields_and_media() {
        let results = parse(MSLUG, &ScrapeSettings::default()).unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.md.name(), "Metal Slug - Super Vehicle-001");
        assert_eq!(r.md.get(MetaDataId::Desc), "Run and gun.");
        assert_eq!(r.md.get(MetaDataId::ReleaseDate), "19960101T000000");
        assert_eq!(r.md.get(MetaDataId::Developer), "Nazca");
        assert_eq!(r.md.get(MetaDataId::Publisher), "Nazca");
        assert_eq!(r.md.get(MetaDataId::Players), "2");
        assert_eq!(r.md.get(MetaDataId::GenreIds), "102");

        let keys: Vec<MetaDataId> = r.urls.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                MetaDataId::Image,
                MetaDataId::Video,
                MetaDataId::Marquee,
                MetaDataId::TitleShot,
            ]
        );
        assert_eq!(r.urls[&MetaDataId::Image].extension(), ".png");
        assert!(r.has_media());
    }

    #[test]
    fn test_parse_honors_media_switches() {
        let settings = ScrapeSettings {
            fetch_video: false,
            fetch_marquee: false,
            ..Default::default()
        };
        let results = parse(MSLUG, &settings).unwrap();
        let keys: Vec<MetaDataId> = results[0].urls.keys().copied().collect();
        assert_eq!(keys, vec![MetaDataId::Image, MetaDataId::TitleShot]);
    }

    #[test]
    fn test_old_release_yields_nothing() {
        let body = r#"{"release": 3, "result": [{"title": "X"}]}"#;
        assert!(parse(body, &ScrapeSettings::default()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            parse("<html>", &ScrapeSettings::default()),
            Err(ScrapeError::Json(_))
        ));
    }

    #[test]
    fn test_query_url_encodes_name() {
        let url = ArcadeDbScraper::query_url("Metal Slug & co");
        assert!(url.starts_with(BASE_URL));
        assert!(url.contains("ajax=query_mame"));
        assert!(url.contains("game_name=Metal+Slug+%26+co"));
    }
}
