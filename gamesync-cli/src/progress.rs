//! Terminal progress display for scrape runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamesync_scraper::ProgressSink;

/// Spinner line fed by [`ScrapeRun::pump`](gamesync_scraper::ScrapeRun::pump).
pub(crate) struct SpinnerSink {
    pb: ProgressBar,
    game: String,
    action: String,
    percent: Option<u8>,
}

impl SpinnerSink {
    /// When `quiet` is true, the spinner is hidden.
    pub(crate) fn new(quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("  {spinner:.cyan} {prefix:.bold} {msg}")
                    .expect("static pattern")
                    .tick_chars("/-\\|"),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        };
        Self {
            pb,
            game: String::new(),
            action: String::new(),
            percent: None,
        }
    }

    fn refresh(&self) {
        let msg = match self.percent {
            Some(p) => format!("{} {} ({}%)", self.game, self.action, p),
            None => format!("{} {}", self.game, self.action),
        };
        self.pb.set_message(msg);
    }

    pub(crate) fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProgressSink for SpinnerSink {
    fn update_title(&mut self, title: &str) {
        self.pb.set_prefix(title.to_string());
    }

    fn update_text(&mut self, game: &str, action: &str) {
        self.game = game.to_string();
        self.action = action.to_string();
        self.refresh();
    }

    fn update_percent(&mut self, percent: Option<u8>) {
        if self.percent != percent {
            self.percent = percent;
            self.refresh();
        }
    }

    fn notify(&mut self, message: &str) {
        self.pb.suspend(|| {
            log::info!(
                "{} {}",
                "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                message
            );
        });
    }

    fn show_error(&mut self, message: &str) {
        self.pb.suspend(|| {
            log::error!(
                "{} {}",
                "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                message
            );
        });
    }
}
