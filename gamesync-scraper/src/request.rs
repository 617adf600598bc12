//! Single outbound scraper calls as pollable state machines.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use gamesync_core::ScrapeSettings;

use crate::error::ScrapeError;
use crate::http::{HttpContext, HttpReq, HttpRequest, HttpStatus};
use crate::result::ScraperSearchResult;

/// State of anything that is polled to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncStatus {
    InProgress,
    Done,
    Error,
}

/// Why a request or handle ended in [`AsyncStatus::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub status: HttpStatus,
    pub message: String,
}

impl RequestFailure {
    pub fn new(status: HttpStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }

    pub fn into_error(self) -> ScrapeError {
        ScrapeError::status(self.status, self.message)
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.status)
        } else {
            write!(f, "{}: {}", self.status, self.message)
        }
    }
}

/// What a request may touch while it is being updated.
pub struct RequestContext<'a> {
    pub http: &'a HttpContext,
    /// Results shared by every request of one search.
    pub results: &'a mut Vec<ScraperSearchResult>,
    /// Requests to run after this one, e.g. a per-game detail query.
    pub follow_ups: &'a mut VecDeque<Box<dyn ScraperRequest>>,
}

/// One step of a search.
pub trait ScraperRequest: Send {
    /// Advance the request. Never blocks.
    fn update(&mut self, ctx: &mut RequestContext<'_>) -> AsyncStatus;

    /// Set once `update` returned [`AsyncStatus::Error`].
    fn failure(&self) -> Option<&RequestFailure>;
}

/// Turns a successful response body into results or follow-up requests.
pub trait ResponseParser: Send {
    fn parse(&mut self, body: &[u8], ctx: &mut RequestContext<'_>) -> Result<(), ScrapeError>;
}

/// Backoff applied to "too many requests" answers. The wait before retry `n`
/// is `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &ScrapeSettings) -> Self {
        Self {
            max_retries: settings.retry_count,
            base_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&ScrapeSettings::default())
    }
}

/// What to do with a finished HTTP call, shared by every request that retries
/// "too many requests".
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    Wait,
    Retry(Instant),
    Completed,
    /// 404 and network errors: finished without results.
    Ignored,
    Failed(RequestFailure),
}

/// Retry bookkeeping for one URL.
#[derive(Debug)]
pub(crate) struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    retry_at: Option<Instant>,
}

impl RetryState {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            retry_at: None,
        }
    }

    /// Whether a backoff is still running.
    pub(crate) fn waiting(&mut self) -> bool {
        match self.retry_at {
            Some(at) if Instant::now() < at => true,
            Some(_) => {
                self.retry_at = None;
                false
            }
            None => false,
        }
    }

    pub(crate) fn decide(&mut self, req: &mut HttpReq) -> RetryDecision {
        let status = req.status();
        match status {
            HttpStatus::InProgress => RetryDecision::Wait,
            HttpStatus::Ok => RetryDecision::Completed,
            HttpStatus::NotFound | HttpStatus::IoError => {
                log::debug!("{} ({}), no result", req.url(), status);
                RetryDecision::Ignored
            }
            HttpStatus::TooManyRequests => {
                self.attempt += 1;
                if self.attempt > self.policy.max_retries {
                    return RetryDecision::Failed(RequestFailure::new(
                        HttpStatus::TooManyRequests,
                        format!("still rate limited after {} retries", self.policy.max_retries),
                    ));
                }
                let delay = self.policy.delay_for(self.attempt);
                log::debug!(
                    "{}: too many requests, retry {} in {:?}",
                    req.url(),
                    self.attempt,
                    delay
                );
                let at = Instant::now() + delay;
                self.retry_at = Some(at);
                RetryDecision::Retry(at)
            }
            status => RetryDecision::Failed(RequestFailure::new(status, req.error_message())),
        }
    }
}

/// A scraper request backed by one HTTP GET, with its body handed to a
/// [`ResponseParser`].
pub struct ScraperHttpRequest<P: ResponseParser> {
    url: String,
    parser: P,
    req: Option<HttpReq>,
    retry: RetryState,
    failure: Option<RequestFailure>,
}

impl<P: ResponseParser> ScraperHttpRequest<P> {
    pub fn new(url: impl Into<String>, parser: P, policy: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            parser,
            req: None,
            retry: RetryState::new(policy),
            failure: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fail(&mut self, failure: RequestFailure) -> AsyncStatus {
        log::debug!("{}: {}", self.url, failure);
        self.failure = Some(failure);
        AsyncStatus::Error
    }
}

impl<P: ResponseParser> ScraperRequest for ScraperHttpRequest<P> {
    fn update(&mut self, ctx: &mut RequestContext<'_>) -> AsyncStatus {
        if self.failure.is_some() {
            return AsyncStatus::Error;
        }
        if self.retry.waiting() {
            return AsyncStatus::InProgress;
        }
        let Some(req) = self.req.as_mut() else {
            self.req = Some(ctx.http.start(HttpRequest::get(self.url.clone())));
            return AsyncStatus::InProgress;
        };

        match self.retry.decide(req) {
            RetryDecision::Wait => AsyncStatus::InProgress,
            RetryDecision::Retry(_) => {
                self.req = None;
                AsyncStatus::InProgress
            }
            RetryDecision::Ignored => AsyncStatus::Done,
            RetryDecision::Failed(failure) => self.fail(failure),
            RetryDecision::Completed => {
                let body = req.take_response().map(|r| r.body).unwrap_or_default();
                match self.parser.parse(&body, ctx) {
                    Ok(()) => AsyncStatus::Done,
                    Err(e) => self.fail(RequestFailure::new(HttpStatus::Ok, e.to_string())),
                }
            }
        }
    }

    fn failure(&self) -> Option<&RequestFailure> {
        self.failure.as_ref()
    }
}
