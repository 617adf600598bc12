use crate::http::HttpStatus;

/// Errors that can occur while scraping.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed ({status}): {message}")]
    Status { status: HttpStatus, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Gamelist error: {0}")]
    Gamelist(#[from] gamesync_gamelist::GamelistError),

    #[error("Unknown scraper: {0}")]
    UnknownScraper(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    pub fn status(status: HttpStatus, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// The HTTP status carried by this error, if any.
    pub fn http_status(&self) -> Option<HttpStatus> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| HttpStatus::from_code(s.as_u16())),
            _ => None,
        }
    }

    /// Whether this error must end the whole run rather than one item.
    pub fn is_fatal(&self) -> bool {
        self.http_status().is_some_and(HttpStatus::is_fatal)
    }
}
