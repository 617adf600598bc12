use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use gamesync_core::{MetaDataId, MetadataRecord, ScrapeSettings, SystemData};

use crate::arcadedb::ArcadeDbScraper;
use crate::error::ScrapeError;
use crate::http::HttpContext;
use crate::request::ScraperRequest;
use crate::result::ScraperSearchParams;
use crate::search::ScraperSearchHandle;

/// A scraping backend.
pub trait Scraper: Send + Sync {
    fn name(&self) -> &'static str;

    /// How many games may be searched at once.
    fn thread_count(&self) -> usize {
        1
    }

    fn is_supported_platform(&self, system: &SystemData) -> bool;

    /// Media kinds this backend can provide.
    fn supported_media(&self) -> &'static [MetaDataId];

    /// Whether `record` lacks media this backend could fill in.
    fn has_missing_media(&self, record: &MetadataRecord) -> bool {
        self.supported_media().iter().any(|id| {
            let value = record.get(*id);
            value.is_empty() || !Path::new(value).exists()
        })
    }

    /// Queue the requests of one search.
    fn generate_requests(
        &self,
        params: &ScraperSearchParams,
        settings: &ScrapeSettings,
        requests: &mut VecDeque<Box<dyn ScraperRequest>>,
    );

    fn search(
        &self,
        params: &ScraperSearchParams,
        settings: &ScrapeSettings,
        http: &HttpContext,
    ) -> ScraperSearchHandle {
        let mut requests = VecDeque::new();
        self.generate_requests(params, settings, &mut requests);
        ScraperSearchHandle::new(http.clone(), requests)
    }
}

/// Names accepted by [`scraper_by_name`].
pub const SCRAPER_NAMES: &[&str] = &["ArcadeDB"];

/// Look up a backend by name, case-insensitively.
pub fn scraper_by_name(name: &str, settings: &ScrapeSettings) -> Result<Arc<dyn Scraper>, ScrapeError> {
    if name.eq_ignore_ascii_case("ArcadeDB") {
        return Ok(Arc::new(ArcadeDbScraper::new(settings.threads)));
    }
    Err(ScrapeError::UnknownScraper(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamesync_core::MetadataKind;

    #[test]
    fn test_registry_lookup() {
        let settings = ScrapeSettings {
            threads: 3,
            ..Default::default()
        };
        let scraper = scraper_by_name("arcadedb", &settings).unwrap();
        assert_eq!(scraper.name(), "ArcadeDB");
        assert_eq!(scraper.thread_count(), 3);
        assert!(matches!(
            scraper_by_name("Nope", &settings),
            Err(ScrapeError::UnknownScraper(_))
        ));
    }

    #[test]
    fn test_missing_media_checks_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let scraper = ArcadeDbScraper::new(1);
        let mut record = MetadataRecord::new(MetadataKind::Game);
        assert!(scraper.has_missing_media(&record));

        for id in scraper.supported_media() {
            let file = tmp.path().join(format!("{}.png", id.key()));
            std::fs::write(&file, b"x").unwrap();
            record.set(*id, file.to_string_lossy());
        }
        assert!(!scraper.has_missing_media(&record));

        record.set(MetaDataId::Image, tmp.path().join("gone.png").to_string_lossy());
        assert!(scraper.has_missing_media(&record));
    }
}
