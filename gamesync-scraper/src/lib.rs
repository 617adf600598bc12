//! Concurrent metadata scraping for gamesync.
//!
//! A scrape is a chain of pollable state machines: [`ScraperRequest`]s make
//! up a [`ScraperSearchHandle`], whose first result is handed to an
//! [`MDResolveHandle`] for media downloads. [`ThreadedScraper`] drives many of
//! these chains on a background thread and sends finished results back to
//! the caller, who applies them with [`apply_scrape_result`].

pub mod apply;
pub mod arcadedb;
pub mod error;
pub mod http;
pub mod request;
pub mod resolve;
pub mod result;
pub mod scraper;
pub mod search;
pub mod threaded;

#[cfg(test)]
#[path = "tests/fake_transport.rs"]
pub(crate) mod fake_transport;

pub use apply::apply_scrape_result;
pub use arcadedb::ArcadeDbScraper;
pub use error::ScrapeError;
pub use http::{HttpContext, HttpReq, HttpRequest, HttpResponse, HttpStatus, HttpTransport, ReqwestTransport};
pub use request::{AsyncStatus, RequestContext, RequestFailure, ResponseParser, RetryPolicy, ScraperHttpRequest, ScraperRequest};
pub use resolve::{ImageDownloadHandle, MDResolveHandle};
pub use result::{ScraperSearchItem, ScraperSearchParams, ScraperSearchResult};
pub use scraper::{SCRAPER_NAMES, Scraper, scraper_by_name};
pub use search::ScraperSearchHandle;
pub use threaded::{
    AcceptedResult, NullSink, ProgressSink, RunStatus, RunSummary, ScrapeContext, ScrapeFilter,
    ScrapeMessage, ScrapeProgress, ScrapeRun, ThreadedScraper, build_search_queue,
};
