//! Non-blocking HTTP requests.
//!
//! Every request runs as a task on the scrape run's tokio runtime. The caller
//! keeps an [`HttpReq`] and polls [`HttpReq::status`], which never blocks, so
//! a single loop can drive many requests at once.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::Duration;

use crate::error::ScrapeError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("gamesync/", env!("CARGO_PKG_VERSION"));

/// Outcome of an HTTP request. Besides the usual HTTP codes this carries the
/// local states "in progress", "I/O error" and "file stream error", and the
/// non-standard codes scraping services use for quota and account problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpStatus {
    InProgress,
    IoError,
    FileStreamError,
    Ok,
    BadRequest,
    Unauthorized,
    BadLogin,
    NotFound,
    Maintenance,
    Blacklisted,
    TooManyRequests,
    TooManyScraps,
    TooManyFailures,
    ServerError,
    Other(u16),
}

impl HttpStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::InProgress,
            3 => Self::IoError,
            4 => Self::FileStreamError,
            200 => Self::Ok,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::BadLogin,
            404 => Self::NotFound,
            423 => Self::Maintenance,
            426 => Self::Blacklisted,
            429 => Self::TooManyRequests,
            430 => Self::TooManyScraps,
            431 => Self::TooManyFailures,
            500 => Self::ServerError,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::InProgress => 0,
            Self::IoError => 3,
            Self::FileStreamError => 4,
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::BadLogin => 403,
            Self::NotFound => 404,
            Self::Maintenance => 423,
            Self::Blacklisted => 426,
            Self::TooManyRequests => 429,
            Self::TooManyScraps => 430,
            Self::TooManyFailures => 431,
            Self::ServerError => 500,
            Self::Other(code) => code,
        }
    }

    /// Statuses that stop the whole scrape run: bad login, maintenance,
    /// blacklisting and exhausted quotas.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::BadLogin
                | Self::Maintenance
                | Self::Blacklisted
                | Self::TooManyScraps
                | Self::TooManyFailures
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::InProgress => "in progress",
            Self::IoError => "I/O error",
            Self::FileStreamError => "file stream error",
            Self::Ok => "OK",
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::BadLogin => "bad login",
            Self::NotFound => "not found",
            Self::Maintenance => "server in maintenance",
            Self::Blacklisted => "blacklisted",
            Self::TooManyRequests => "too many requests",
            Self::TooManyScraps => "daily scrape quota reached",
            Self::TooManyFailures => "too many failed requests",
            Self::ServerError => "server error",
            Self::Other(_) => "unexpected status",
        }
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.description())
    }
}

/// A GET request, optionally streamed to a file instead of kept in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub save_path: Option<PathBuf>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            save_path: None,
            headers: Vec::new(),
        }
    }

    pub fn download(url: impl Into<String>, save_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            save_path: Some(save_path.into()),
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: HttpStatus,
    /// Response body; empty when it was streamed to a file.
    pub body: Vec<u8>,
    /// Media type without parameters, lowercased.
    pub content_type: Option<String>,
    pub error: Option<String>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        Self {
            status: HttpStatus::Ok,
            body: body.into(),
            content_type: content_type.map(str::to_string),
            error: None,
        }
    }

    pub fn failed(status: HttpStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Vec::new(),
            content_type: None,
            error: Some(message.into()),
        }
    }
}

/// The seam between request state machines and the network.
pub trait HttpTransport: Send + Sync {
    /// Perform `request`. The future must not fail: transport problems are
    /// reported through the response status. Download progress (0-100) is
    /// published through `progress`.
    fn fetch(&self, request: HttpRequest, progress: Arc<AtomicU8>) -> BoxFuture<'static, HttpResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn fetch(&self, request: HttpRequest, progress: Arc<AtomicU8>) -> BoxFuture<'static, HttpResponse> {
        let client = self.client.clone();
        async move {
            match fetch_with(&client, &request, &progress).await {
                Ok(response) => response,
                Err(e) => {
                    log::debug!("Request to {} failed: {}", request.url, e);
                    let status = match e {
                        ScrapeError::Io(_) => HttpStatus::FileStreamError,
                        _ => HttpStatus::IoError,
                    };
                    HttpResponse::failed(status, e.to_string())
                }
            }
        }
        .boxed()
    }
}

async fn fetch_with(
    client: &reqwest::Client,
    request: &HttpRequest,
    progress: &AtomicU8,
) -> Result<HttpResponse, ScrapeError> {
    let mut builder = client.get(&request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let mut resp = builder.send().await?;

    let status = HttpStatus::from_code(resp.status().as_u16());
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    if status != HttpStatus::Ok {
        let text = resp.text().await.unwrap_or_default();
        return Ok(HttpResponse {
            status,
            body: Vec::new(),
            content_type,
            error: Some(text.chars().take(200).collect()),
        });
    }

    let Some(path) = &request.save_path else {
        let body = resp.bytes().await?.to_vec();
        progress.store(100, Ordering::Relaxed);
        return Ok(HttpResponse {
            status,
            body,
            content_type,
            error: None,
        });
    };

    let total = resp.content_length().filter(|t| *t > 0);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    let mut received = 0u64;
    loop {
        let chunk = match resp.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                remove_partial(path);
                return Err(e.into());
            }
        };
        if let Err(e) = file.write_all(&chunk) {
            remove_partial(path);
            return Err(e.into());
        }
        received += chunk.len() as u64;
        if let Some(total) = total {
            progress.store((received * 100 / total).min(100) as u8, Ordering::Relaxed);
        }
    }
    file.flush()?;
    progress.store(100, Ordering::Relaxed);

    Ok(HttpResponse {
        status,
        body: Vec::new(),
        content_type,
        error: None,
    })
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::debug!("Could not remove partial download \"{}\": {}", path.display(), e);
    }
}

/// The runtime and transport every request of one scrape run shares.
#[derive(Clone)]
pub struct HttpContext {
    runtime: Handle,
    transport: Arc<dyn HttpTransport>,
}

impl HttpContext {
    pub fn new(runtime: Handle, transport: Arc<dyn HttpTransport>) -> Self {
        Self { runtime, transport }
    }

    /// Start `request` in the background.
    pub fn start(&self, request: HttpRequest) -> HttpReq {
        HttpReq::start(&self.runtime, self.transport.as_ref(), request)
    }
}

/// A request running in the background.
///
/// Dropping an `HttpReq` abandons the request: the task runs to completion
/// but its response is discarded.
pub struct HttpReq {
    url: String,
    save_path: Option<PathBuf>,
    percent: Arc<AtomicU8>,
    rx: oneshot::Receiver<HttpResponse>,
    response: Option<HttpResponse>,
}

impl HttpReq {
    pub fn start(runtime: &Handle, transport: &dyn HttpTransport, request: HttpRequest) -> Self {
        let percent = Arc::new(AtomicU8::new(0));
        let (tx, rx) = oneshot::channel();
        let url = request.url.clone();
        let save_path = request.save_path.clone();
        let fut = transport.fetch(request, Arc::clone(&percent));
        runtime.spawn(async move {
            // The receiver is gone when the request was abandoned
            let _ = tx.send(fut.await);
        });
        Self {
            url,
            save_path,
            percent,
            rx,
            response: None,
        }
    }

    /// Current status; never blocks.
    pub fn status(&mut self) -> HttpStatus {
        if self.response.is_none() {
            match self.rx.try_recv() {
                Ok(response) => self.response = Some(response),
                Err(TryRecvError::Empty) => return HttpStatus::InProgress,
                Err(TryRecvError::Closed) => {
                    self.response = Some(HttpResponse::failed(
                        HttpStatus::IoError,
                        "request task ended without a response",
                    ));
                }
            }
        }
        self.response
            .as_ref()
            .map_or(HttpStatus::InProgress, |r| r.status)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// Download progress in percent.
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<HttpResponse> {
        self.response.take()
    }

    pub fn error_message(&self) -> String {
        self.response
            .as_ref()
            .and_then(|r| r.error.clone())
            .unwrap_or_default()
    }
}
