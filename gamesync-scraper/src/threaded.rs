//! Background scrape runs.
//!
//! [`ThreadedScraper::start`] moves a queue of games onto a worker thread
//! that drives up to `scraper.thread_count()` slots at once. Each slot runs a
//! search, then a media download, for one game. Workers never touch the
//! entity tree: finished results come back as [`ScrapeMessage`]s which the
//! owner of the [`ScrapeRun`] applies on its own thread with
//! [`ScrapeRun::pump`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;

use gamesync_core::{EntityId, ScrapeSettings, Settings, SystemRegistry};

use crate::apply::apply_scrape_result;
use crate::http::{HttpContext, HttpStatus, HttpTransport};
use crate::request::{AsyncStatus, RequestFailure};
use crate::resolve::MDResolveHandle;
use crate::result::{ScraperSearchParams, ScraperSearchResult};
use crate::scraper::Scraper;
use crate::search::ScraperSearchHandle;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Which games go into a scrape queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeFilter {
    All,
    /// Only games lacking media the scraper could provide.
    MissingMedia,
}

/// Collect the work items for `scraper` across every supported system.
pub fn build_search_queue(
    registry: &SystemRegistry,
    scraper: &dyn Scraper,
    filter: ScrapeFilter,
    settings: &ScrapeSettings,
) -> VecDeque<ScraperSearchParams> {
    let mut queue = VecDeque::new();
    for system in registry.systems() {
        if !system.is_game_system() || system.is_collection() {
            continue;
        }
        if !scraper.is_supported_platform(system) {
            log::debug!("[{}] not supported by {}", system.name(), scraper.name());
            continue;
        }
        for id in system.games() {
            let Some(entity) = system.tree().get(id) else {
                continue;
            };
            if filter == ScrapeFilter::MissingMedia && !scraper.has_missing_media(&entity.metadata) {
                continue;
            }
            if let Some(params) = ScraperSearchParams::for_entity(system, id, settings.overwrite_medias) {
                queue.push_back(params);
            }
        }
    }
    queue
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Done,
    Error,
}

impl RunStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Done,
            _ => Self::Error,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Done => 1,
            Self::Error => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeProgress {
    /// `[system] name` of the most recently dispatched game.
    pub label: String,
    /// What that game's slot is doing, e.g. `Searching...`.
    pub action: String,
    pub done: usize,
    pub total: usize,
    /// Download progress of the current media, if any.
    pub percent: Option<u8>,
}

/// A finished scrape result waiting to be applied.
#[derive(Debug, Clone)]
pub struct AcceptedResult {
    pub system: String,
    pub entity: EntityId,
    pub path: PathBuf,
    pub label: String,
    pub result: ScraperSearchResult,
    /// Some media failed to download; the rest is still usable.
    pub partial: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub accepted: usize,
    pub not_found: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub fatal: Option<String>,
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        if self.fatal.is_some() {
            RunStatus::Error
        } else {
            RunStatus::Done
        }
    }
}

/// Messages from a run's worker thread to its owner.
#[derive(Debug, Clone)]
pub enum ScrapeMessage {
    Progress(ScrapeProgress),
    Accepted(AcceptedResult),
    ItemFailed {
        label: String,
        failure: RequestFailure,
    },
    /// The run stopped because of an error that affects every game.
    Fatal(RequestFailure),
    /// Always the last message of a run.
    Finished(RunSummary),
}

/// Receives progress while a run is pumped. All methods are fire-and-forget.
pub trait ProgressSink {
    fn update_title(&mut self, _title: &str) {}
    fn update_text(&mut self, _game: &str, _action: &str) {}
    fn update_percent(&mut self, _percent: Option<u8>) {}
    /// One-off notification, e.g. when the run completed.
    fn notify(&mut self, _message: &str) {}
    /// An error the user has to see.
    fn show_error(&mut self, _message: &str) {}
}

/// A [`ProgressSink`] that ignores everything.
pub struct NullSink;

impl ProgressSink for NullSink {}

/// Flags shared between a [`ScrapeRun`] and its worker thread.
struct RunControl {
    exit: AtomicU8,
    cancelled: AtomicBool,
    /// Set on a fatal status: nothing new is dispatched, slots already in
    /// flight still finish.
    draining: AtomicBool,
    paused: Mutex<bool>,
    resume: Condvar,
}

impl RunControl {
    fn new() -> Self {
        Self {
            exit: AtomicU8::new(RunStatus::Running.as_u8()),
            cancelled: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            paused: Mutex::new(false),
            resume: Condvar::new(),
        }
    }

    fn status(&self) -> RunStatus {
        RunStatus::from_u8(self.exit.load(Ordering::SeqCst))
    }

    fn is_running(&self) -> bool {
        self.status() == RunStatus::Running
    }

    fn is_dispatching(&self) -> bool {
        self.is_running() && !self.draining.load(Ordering::SeqCst)
    }

    /// Move from running to `status`; a run that already ended keeps its
    /// status.
    fn end(&self, status: RunStatus) {
        let _ = self.exit.compare_exchange(
            RunStatus::Running.as_u8(),
            status.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn set_paused(&self, paused: bool) {
        let mut guard = self.paused.lock().unwrap_or_else(|e| e.into_inner());
        *guard = paused;
        self.resume.notify_all();
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block while paused. Returns early when the run ends.
    fn wait_while_paused(&self) {
        let mut guard = self.paused.lock().unwrap_or_else(|e| e.into_inner());
        while *guard && self.is_running() {
            guard = self.resume.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Everything a run needs besides the queue and the backend.
#[derive(Clone)]
pub struct ScrapeContext {
    pub transport: Arc<dyn HttpTransport>,
    pub settings: ScrapeSettings,
    /// Sleep between two polls of the slots.
    pub poll_interval: Duration,
}

impl ScrapeContext {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: ScrapeSettings) -> Self {
        Self {
            transport,
            settings,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct ThreadedScraper;

impl ThreadedScraper {
    /// Start scraping `queue` in the background. Returns `None` for an empty
    /// queue. Holding the returned [`ScrapeRun`] is what keeps other runs
    /// out; dropping it stops the run.
    pub fn start(
        queue: VecDeque<ScraperSearchParams>,
        scraper: Arc<dyn Scraper>,
        context: ScrapeContext,
    ) -> Option<ScrapeRun> {
        if queue.is_empty() {
            return None;
        }
        let control = Arc::new(RunControl::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let worker_control = Arc::clone(&control);
        let spawned = thread::Builder::new()
            .name("gamesync-scrape".to_string())
            .spawn(move || {
                let worker = Worker {
                    scraper,
                    settings: context.settings,
                    poll_interval: context.poll_interval,
                    control: worker_control,
                    tx,
                };
                worker.run(queue, context.transport);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Could not start the scrape thread: {}", e);
                return None;
            }
        };

        Some(ScrapeRun {
            control,
            rx,
            handle: Some(handle),
            summary: None,
            applied: 0,
            errors: Vec::new(),
        })
    }
}

/// Token for a running scrape.
pub struct ScrapeRun {
    control: Arc<RunControl>,
    rx: mpsc::UnboundedReceiver<ScrapeMessage>,
    handle: Option<JoinHandle<()>>,
    summary: Option<RunSummary>,
    applied: usize,
    errors: Vec<String>,
}

impl ScrapeRun {
    /// Stop dispatching and end the run. Requests in flight are abandoned.
    pub fn stop(&self) {
        self.control.cancelled.store(true, Ordering::SeqCst);
        self.control.end(RunStatus::Done);
        // Wake a paused worker so it can see the stop
        self.control.set_paused(false);
    }

    pub fn pause(&self) {
        self.control.set_paused(true);
    }

    pub fn resume(&self) {
        self.control.set_paused(false);
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn exit_code(&self) -> RunStatus {
        self.control.status()
    }

    /// Next pending message, without applying it.
    pub fn try_recv(&mut self) -> Option<ScrapeMessage> {
        self.rx.try_recv().ok()
    }

    /// Apply every pending message on the calling thread: accepted results
    /// are written into `registry` and journaled, everything else goes to
    /// `sink`. Returns the number of messages handled.
    pub fn pump(
        &mut self,
        registry: &mut SystemRegistry,
        settings: &Settings,
        sink: &mut dyn ProgressSink,
    ) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            handled += 1;
            match message {
                ScrapeMessage::Progress(p) => {
                    sink.update_title(&format!("Scraping... {}/{}", (p.done + 1).min(p.total), p.total));
                    sink.update_text(&p.label, &p.action);
                    sink.update_percent(p.percent);
                }
                ScrapeMessage::Accepted(accepted) => {
                    let Some(system) = registry.find_mut(&accepted.system) else {
                        log::warn!("Dropping result for unknown system '{}'", accepted.system);
                        continue;
                    };
                    match apply_scrape_result(system, settings, &accepted) {
                        Ok(_) => self.applied += 1,
                        Err(e) => {
                            log::error!("{}: could not apply result: {}", accepted.label, e);
                            self.errors.push(format!("{}: {}", accepted.label, e));
                        }
                    }
                }
                ScrapeMessage::ItemFailed { label, failure } => {
                    log::warn!("{}: {}", label, failure);
                    self.errors.push(format!("{label}: {failure}"));
                }
                ScrapeMessage::Fatal(failure) => {
                    log::error!("Scraping stopped: {}", failure);
                    sink.show_error(&format!("Scraping stopped: {failure}"));
                }
                ScrapeMessage::Finished(summary) => {
                    if !summary.cancelled && summary.fatal.is_none() {
                        sink.notify("Scraping finished. Update gamelists to apply changes.");
                    }
                    self.summary = Some(summary);
                }
            }
        }
        handled
    }

    /// Whether the final message has been pumped.
    pub fn is_finished(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Results applied by [`pump`](Self::pump) so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Per-game errors seen by [`pump`](Self::pump) so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Pump until the run finishes, then wait for the worker thread.
    pub fn join(
        mut self,
        registry: &mut SystemRegistry,
        settings: &Settings,
        sink: &mut dyn ProgressSink,
        interval: Duration,
    ) -> RunSummary {
        while !self.is_finished() {
            let handled = self.pump(registry, settings, sink);
            let worker_gone = self.handle.as_ref().is_none_or(JoinHandle::is_finished);
            if handled == 0 && worker_gone && self.rx.is_empty() {
                break;
            }
            if !self.is_finished() {
                thread::sleep(interval);
            }
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("The scrape thread panicked");
            }
        }
        self.summary.take().unwrap_or_else(|| RunSummary {
            fatal: Some("the scrape thread ended without a summary".to_string()),
            ..Default::default()
        })
    }
}

impl Drop for ScrapeRun {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop();
            let _ = handle.join();
        }
    }
}

enum Stage {
    Searching(ScraperSearchHandle),
    Resolving(MDResolveHandle),
}

/// One game in flight.
struct Slot {
    params: ScraperSearchParams,
    stage: Stage,
}

enum SlotOutcome {
    Accepted {
        result: ScraperSearchResult,
        failure: Option<RequestFailure>,
    },
    NotFound,
    Failed(RequestFailure),
}

impl Slot {
    fn start(params: ScraperSearchParams, scraper: &dyn Scraper, settings: &ScrapeSettings, http: &HttpContext) -> Self {
        log::debug!("{}: searching", params.label());
        let handle = scraper.search(&params, settings, http);
        Self {
            params,
            stage: Stage::Searching(handle),
        }
    }

    fn action(&self) -> String {
        match &self.stage {
            Stage::Searching(_) => "Searching...".to_string(),
            Stage::Resolving(h) if h.current_item().is_empty() => "Downloading...".to_string(),
            Stage::Resolving(h) => format!("Downloading {}", h.current_item()),
        }
    }

    fn percent(&self) -> Option<u8> {
        match &self.stage {
            Stage::Searching(_) => None,
            Stage::Resolving(h) => h.percent(),
        }
    }

    /// Advance the slot; `None` while it is still busy.
    fn poll(&mut self, http: &HttpContext, settings: &ScrapeSettings) -> Option<SlotOutcome> {
        match &mut self.stage {
            Stage::Searching(handle) => match handle.update() {
                AsyncStatus::InProgress => None,
                AsyncStatus::Error => Some(SlotOutcome::Failed(handle.failure().cloned().unwrap_or_else(
                    || RequestFailure::new(HttpStatus::Other(0), "search failed"),
                ))),
                AsyncStatus::Done => {
                    // The first candidate is authoritative
                    let Some(first) = handle.take_results().into_iter().next() else {
                        return Some(SlotOutcome::NotFound);
                    };
                    if !first.has_media() {
                        return Some(SlotOutcome::Accepted {
                            result: first,
                            failure: None,
                        });
                    }
                    self.stage = Stage::Resolving(MDResolveHandle::new(first, &self.params, settings));
                    None
                }
            },
            Stage::Resolving(handle) => match handle.update(http) {
                AsyncStatus::InProgress => None,
                AsyncStatus::Done => Some(SlotOutcome::Accepted {
                    result: handle.result().clone(),
                    failure: None,
                }),
                AsyncStatus::Error => Some(SlotOutcome::Accepted {
                    result: handle.result().clone(),
                    failure: Some(handle.failure().cloned().unwrap_or_else(|| {
                        RequestFailure::new(HttpStatus::Other(0), "media download failed")
                    })),
                }),
            },
        }
    }
}

struct Worker {
    scraper: Arc<dyn Scraper>,
    settings: ScrapeSettings,
    poll_interval: Duration,
    control: Arc<RunControl>,
    tx: mpsc::UnboundedSender<ScrapeMessage>,
}

impl Worker {
    fn send(&self, message: ScrapeMessage) {
        // The owner may have stopped listening; the run still winds down
        let _ = self.tx.send(message);
    }

    fn run(self, queue: VecDeque<ScraperSearchParams>, transport: Arc<dyn HttpTransport>) {
        let mut summary = RunSummary {
            total: queue.len(),
            ..Default::default()
        };
        let workers = self.scraper.thread_count().max(1);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers.min(4))
            .thread_name("gamesync-http")
            .enable_all()
            .build();
        match runtime {
            Ok(runtime) => {
                let http = HttpContext::new(runtime.handle().clone(), transport);
                self.drive(queue, workers, &http, &mut summary);
                // Abandon whatever is still in flight
                runtime.shutdown_background();
            }
            Err(e) => {
                let failure = RequestFailure::new(HttpStatus::IoError, format!("could not start runtime: {e}"));
                summary.fatal = Some(failure.to_string());
                self.control.end(RunStatus::Error);
                self.send(ScrapeMessage::Fatal(failure));
            }
        }

        summary.cancelled = self.control.cancelled.load(Ordering::SeqCst);
        log::info!(
            "Scrape run ended: {} accepted, {} not found, {} failed of {}",
            summary.accepted,
            summary.not_found,
            summary.failed,
            summary.total
        );
        self.send(ScrapeMessage::Finished(summary));
    }

    fn drive(
        &self,
        mut queue: VecDeque<ScraperSearchParams>,
        workers: usize,
        http: &HttpContext,
        summary: &mut RunSummary,
    ) {
        let mut slots: Vec<Slot> = Vec::with_capacity(workers);
        while slots.len() < workers {
            let Some(params) = queue.pop_front() else {
                break;
            };
            slots.push(Slot::start(params, self.scraper.as_ref(), &self.settings, http));
        }
        let mut last_progress = None;
        self.report(&slots, queue.len(), summary.total, &mut last_progress);

        while self.control.is_running() {
            self.control.wait_while_paused();
            if !self.control.is_running() {
                break;
            }

            let mut i = 0;
            while i < slots.len() {
                let Some(outcome) = slots[i].poll(http, &self.settings) else {
                    i += 1;
                    continue;
                };
                self.finish_slot(&slots[i].params, outcome, summary);

                let next = if self.control.is_dispatching() {
                    queue.pop_front()
                } else {
                    None
                };
                match next {
                    Some(params) => {
                        slots[i] = Slot::start(params, self.scraper.as_ref(), &self.settings, http);
                        i += 1;
                    }
                    None => {
                        slots.swap_remove(i);
                    }
                }
            }

            self.report(&slots, queue.len(), summary.total, &mut last_progress);
            if slots.is_empty() {
                if self.control.draining.load(Ordering::SeqCst) {
                    self.control.end(RunStatus::Error);
                    break;
                }
                if queue.is_empty() {
                    self.control.end(RunStatus::Done);
                    break;
                }
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn finish_slot(&self, params: &ScraperSearchParams, outcome: SlotOutcome, summary: &mut RunSummary) {
        let label = params.label();
        match outcome {
            SlotOutcome::NotFound => {
                log::debug!("{}: no result", label);
                summary.not_found += 1;
            }
            SlotOutcome::Failed(failure) => self.record_failure(label, failure, summary),
            SlotOutcome::Accepted { result, failure } => {
                let partial = failure.is_some();
                if result.md.name().trim().is_empty() {
                    log::debug!("{}: result without a name, ignored", label);
                    summary.not_found += 1;
                } else {
                    summary.accepted += 1;
                    self.send(ScrapeMessage::Accepted(AcceptedResult {
                        system: params.system.clone(),
                        entity: params.entity,
                        path: params.path.clone(),
                        label: label.clone(),
                        result,
                        partial,
                    }));
                }
                if let Some(failure) = failure {
                    self.record_failure(label, failure, summary);
                }
            }
        }
    }

    fn record_failure(&self, label: String, failure: RequestFailure, summary: &mut RunSummary) {
        summary.errors.push(format!("{label}: {failure}"));
        if failure.is_fatal() {
            if !self.control.draining.swap(true, Ordering::SeqCst) {
                log::warn!("{}: {}; letting requests in flight finish", label, failure);
            }
            if summary.fatal.is_none() {
                summary.fatal = Some(failure.to_string());
                self.send(ScrapeMessage::Fatal(failure));
            }
            return;
        }
        summary.failed += 1;
        self.send(ScrapeMessage::ItemFailed { label, failure });
    }

    fn report(
        &self,
        slots: &[Slot],
        queued: usize,
        total: usize,
        last: &mut Option<ScrapeProgress>,
    ) {
        // Counted this way because slots finish out of order
        let done = total.saturating_sub(queued + slots.len());
        let progress = match slots.last() {
            Some(slot) => ScrapeProgress {
                label: slot.params.label(),
                action: slot.action(),
                done,
                total,
                percent: slot.percent(),
            },
            None => ScrapeProgress {
                label: String::new(),
                action: String::new(),
                done,
                total,
                percent: None,
            },
        };
        if last.as_ref() != Some(&progress) {
            self.send(ScrapeMessage::Progress(progress.clone()));
            *last = Some(progress);
        }
    }
}

#[cfg(test)]
#[path = "tests/threaded_tests.rs"]
mod tests;
