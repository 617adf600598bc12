use thiserror::Error;

use gamesync_core::CoreError;
use gamesync_gamelist::GamelistError;
use gamesync_scraper::ScrapeError;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Settings or system registry problem
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Gamelist read or write failed
    #[error("Gamelist error: {0}")]
    Gamelist(#[from] GamelistError),

    /// Scraper setup failed
    #[error("Scraper error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Unknown system name
    #[error("Unknown system: {0}")]
    UnknownSystem(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl CliError {
    pub(crate) fn unknown_system(msg: impl Into<String>) -> Self {
        Self::UnknownSystem(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
