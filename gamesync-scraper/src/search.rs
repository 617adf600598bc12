//! Search handle: runs one game's request queue until a request yields results.

use std::collections::VecDeque;

use crate::http::{HttpContext, HttpStatus};
use crate::request::{AsyncStatus, RequestContext, RequestFailure, ScraperRequest};
use crate::result::ScraperSearchResult;

/// Drives the request queue of one game's search.
///
/// Requests run one after the other. A request may queue follow-ups, e.g. a
/// detail query per list entry. The search ends at the first request that
/// leaves results behind, when the queue runs dry, or at the first error.
pub struct ScraperSearchHandle {
    http: HttpContext,
    queue: VecDeque<Box<dyn ScraperRequest>>,
    results: Vec<ScraperSearchResult>,
    status: AsyncStatus,
    failure: Option<RequestFailure>,
}

impl ScraperSearchHandle {
    pub fn new(http: HttpContext, queue: VecDeque<Box<dyn ScraperRequest>>) -> Self {
        Self {
            http,
            queue,
            results: Vec::new(),
            status: AsyncStatus::InProgress,
            failure: None,
        }
    }

    pub fn update(&mut self) -> AsyncStatus {
        if self.status != AsyncStatus::InProgress {
            return self.status;
        }

        while let Some(mut request) = self.queue.pop_front() {
            let mut follow_ups = VecDeque::new();
            let status = {
                let mut ctx = RequestContext {
                    http: &self.http,
                    results: &mut self.results,
                    follow_ups: &mut follow_ups,
                };
                request.update(&mut ctx)
            };
            self.queue.extend(follow_ups);

            match status {
                AsyncStatus::InProgress => {
                    self.queue.push_front(request);
                    return AsyncStatus::InProgress;
                }
                AsyncStatus::Error => {
                    self.failure = Some(request.failure().cloned().unwrap_or_else(|| {
                        RequestFailure::new(HttpStatus::Other(0), "request failed")
                    }));
                    self.queue.clear();
                    self.status = AsyncStatus::Error;
                    return self.status;
                }
                AsyncStatus::Done if !self.results.is_empty() => {
                    self.queue.clear();
                }
                AsyncStatus::Done => {}
            }
        }

        self.status = AsyncStatus::Done;
        self.status
    }

    pub fn status(&self) -> AsyncStatus {
        self.status
    }

    pub fn results(&self) -> &[ScraperSearchResult] {
        &self.results
    }

    pub fn take_results(&mut self) -> Vec<ScraperSearchResult> {
        std::mem::take(&mut self.results)
    }

    pub fn failure(&self) -> Option<&RequestFailure> {
        self.failure.as_ref()
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
