//! Media download for scrape results.
//!
//! An [`MDResolveHandle`] starts one [`ImageDownloadHandle`] per media kind of
//! a result and rewrites the result's metadata to the saved local files as
//! the downloads finish.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use gamesync_core::{MetaDataId, ScrapeSettings};

use crate::error::ScrapeError;
use crate::http::{HttpContext, HttpReq, HttpRequest};
use crate::request::{AsyncStatus, RequestFailure, RetryDecision, RetryPolicy, RetryState};
use crate::result::{ScraperSearchParams, ScraperSearchResult};

const RESIZABLE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".bmp", ".gif"];

/// File-name suffix a media kind is saved under.
pub fn media_suffix(id: MetaDataId) -> Option<&'static str> {
    let suffix = match id {
        MetaDataId::Image => "image",
        MetaDataId::Thumbnail => "thumb",
        MetaDataId::Marquee => "marquee",
        MetaDataId::Video => "video",
        MetaDataId::FanArt => "fanart",
        MetaDataId::BoxBack => "boxback",
        MetaDataId::BoxArt => "box",
        MetaDataId::Wheel => "wheel",
        MetaDataId::TitleShot => "titleshot",
        MetaDataId::Manual => "manual",
        MetaDataId::Map => "map",
        MetaDataId::Cartridge => "cartridge",
        MetaDataId::Magazine => "magazine",
        _ => return None,
    };
    Some(suffix)
}

/// Media kinds shrunk to the configured maximum size after download.
pub fn is_resized(id: MetaDataId) -> bool {
    matches!(
        id,
        MetaDataId::Image
            | MetaDataId::Thumbnail
            | MetaDataId::Marquee
            | MetaDataId::TitleShot
            | MetaDataId::Cartridge
    )
}

/// `<start>/<images|videos|manuals>/<stem>-<suffix><ext>`
pub fn save_as_path(params: &ScraperSearchParams, suffix: &str, extension: &str) -> PathBuf {
    let folder = match suffix {
        "video" => "videos",
        "manual" => "manuals",
        _ => "images",
    };
    params
        .start_path
        .join(folder)
        .join(format!("{}-{}{}", params.stem(), suffix, extension))
}

/// Extension implied by a response content type, e.g. `.jpg` for
/// `image/jpeg`. Only image and video types are considered.
pub fn extension_for_content_type(content_type: &str) -> Option<String> {
    let content_type = content_type.trim().to_ascii_lowercase();
    let sub = content_type
        .strip_prefix("image/")
        .or_else(|| content_type.strip_prefix("video/"))?;
    let ext = match sub {
        "" => return None,
        "jpeg" => "jpg",
        "svg+xml" => "svg",
        "quicktime" => "mov",
        other => other,
    };
    Some(format!(".{ext}"))
}

/// Shrink the image at `path` in place so it fits `max_width` x `max_height`.
/// A zero bound follows the aspect ratio of the other one; images already
/// within bounds are left alone. Returns whether the file was rewritten.
pub fn resize_image(path: &Path, max_width: u32, max_height: u32) -> Result<bool, ScrapeError> {
    if max_width == 0 && max_height == 0 {
        return Ok(false);
    }
    let img = image::open(path)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Ok(false);
    }

    let (mut target_w, mut target_h) = (max_width, max_height);
    if target_w == 0 {
        target_w = (target_h as f64 / height as f64 * width as f64) as u32;
    } else if target_h == 0 {
        target_h = (target_w as f64 / width as f64 * height as f64) as u32;
    }
    if width <= target_w && height <= target_h {
        return Ok(false);
    }

    let resized = img.resize_exact(target_w.max(1), target_h.max(1), FilterType::Triangle);
    resized.save(path)?;
    Ok(true)
}

/// Downloads one media file, fixes its extension from the response content
/// type and resizes it when asked to.
pub struct ImageDownloadHandle {
    url: String,
    save_path: PathBuf,
    max_width: u32,
    max_height: u32,
    req: Option<HttpReq>,
    retry: RetryState,
    status: AsyncStatus,
    saved: Option<PathBuf>,
    failure: Option<RequestFailure>,
}

impl ImageDownloadHandle {
    pub fn new(
        url: impl Into<String>,
        save_path: impl Into<PathBuf>,
        max_width: u32,
        max_height: u32,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            url: url.into(),
            save_path: save_path.into(),
            max_width,
            max_height,
            req: None,
            retry: RetryState::new(policy),
            status: AsyncStatus::InProgress,
            saved: None,
            failure: None,
        }
    }

    pub fn update(&mut self, http: &HttpContext) -> AsyncStatus {
        if self.status != AsyncStatus::InProgress || self.retry.waiting() {
            return self.status;
        }
        let Some(req) = self.req.as_mut() else {
            log::debug!("Downloading {} -> {}", self.url, self.save_path.display());
            self.req = Some(http.start(HttpRequest::download(self.url.clone(), self.save_path.clone())));
            return self.status;
        };

        match self.retry.decide(req) {
            RetryDecision::Wait => {}
            RetryDecision::Retry(_) => self.req = None,
            RetryDecision::Ignored => self.status = AsyncStatus::Done,
            RetryDecision::Failed(failure) => {
                log::debug!("Download of {} failed: {}", self.url, failure);
                self.failure = Some(failure);
                self.status = AsyncStatus::Error;
            }
            RetryDecision::Completed => {
                let content_type = req.take_response().and_then(|r| r.content_type);
                self.saved = Some(self.finish(content_type.as_deref()));
                self.status = AsyncStatus::Done;
            }
        }
        self.status
    }

    fn finish(&self, content_type: Option<&str>) -> PathBuf {
        let mut path = self.save_path.clone();
        let mut ext = gamesync_core::paths::extension(&path);

        if let Some(true_ext) = content_type.and_then(extension_for_content_type) {
            if true_ext != ext {
                let renamed = path.with_extension(true_ext.trim_start_matches('.'));
                match fs::rename(&path, &renamed) {
                    Ok(()) => {
                        path = renamed;
                        ext = true_ext;
                    }
                    Err(e) => log::warn!("Could not rename \"{}\": {}", path.display(), e),
                }
            }
        }

        if RESIZABLE_EXTENSIONS.contains(&ext.as_str()) {
            if let Err(e) = resize_image(&path, self.max_width, self.max_height) {
                log::warn!("Could not resize \"{}\": {}", path.display(), e);
            }
        }
        path
    }

    pub fn status(&self) -> AsyncStatus {
        self.status
    }

    /// Download progress while the transfer runs.
    pub fn percent(&self) -> Option<u8> {
        match (&self.req, self.status) {
            (Some(req), AsyncStatus::InProgress) => Some(req.percent()),
            _ => None,
        }
    }

    /// The file written, once done. `None` when the server had nothing.
    pub fn saved_path(&self) -> Option<&Path> {
        self.saved.as_deref()
    }

    pub fn failure(&self) -> Option<&RequestFailure> {
        self.failure.as_ref()
    }
}

struct PendingMedia {
    id: MetaDataId,
    suffix: &'static str,
    handle: ImageDownloadHandle,
}

/// Resolves every media URL of one scrape result to a local file.
///
/// A failed download turns the whole handle into [`AsyncStatus::Error`], but
/// media already saved stays applied to [`MDResolveHandle::result`] so the
/// caller can still use the partial result.
pub struct MDResolveHandle {
    result: ScraperSearchResult,
    pending: Vec<PendingMedia>,
    status: AsyncStatus,
    failure: Option<RequestFailure>,
    percent: Option<u8>,
    current_item: String,
}

impl MDResolveHandle {
    pub fn new(result: ScraperSearchResult, params: &ScraperSearchParams, settings: &ScrapeSettings) -> Self {
        let mut result = result;
        let mut pending = Vec::new();
        let policy = RetryPolicy::from_settings(settings);

        let urls = std::mem::take(&mut result.urls);
        for (id, item) in urls {
            if item.url.is_empty() {
                continue;
            }
            if !params.overwrite_medias {
                let existing = params.current.get(id);
                if !existing.is_empty() && Path::new(existing).exists() {
                    result.md.set(id, existing);
                    continue;
                }
            }
            let Some(suffix) = media_suffix(id) else {
                log::debug!("No media folder for '{}', skipping {}", id.key(), item.url);
                continue;
            };
            let path = save_as_path(params, suffix, &item.extension());
            if !params.overwrite_medias && path.exists() {
                result.md.set(id, path.to_string_lossy());
                continue;
            }
            let (w, h) = if is_resized(id) {
                (settings.resize_width, settings.resize_height)
            } else {
                (0, 0)
            };
            pending.push(PendingMedia {
                id,
                suffix,
                handle: ImageDownloadHandle::new(item.url, path, w, h, policy),
            });
        }

        let status = if pending.is_empty() {
            AsyncStatus::Done
        } else {
            AsyncStatus::InProgress
        };
        Self {
            result,
            pending,
            status,
            failure: None,
            percent: None,
            current_item: String::new(),
        }
    }

    pub fn update(&mut self, http: &HttpContext) -> AsyncStatus {
        if self.status != AsyncStatus::InProgress {
            return self.status;
        }

        let mut remaining = Vec::with_capacity(self.pending.len());
        for mut media in std::mem::take(&mut self.pending) {
            match media.handle.update(http) {
                AsyncStatus::InProgress => remaining.push(media),
                AsyncStatus::Done => {
                    if let Some(saved) = media.handle.saved_path() {
                        self.result.md.set(media.id, saved.to_string_lossy());
                    }
                }
                AsyncStatus::Error => {
                    if self.failure.is_none() {
                        self.failure = media.handle.failure().cloned();
                    }
                }
            }
        }

        if self.failure.is_some() {
            // Downloads still running are abandoned
            self.status = AsyncStatus::Error;
            self.percent = None;
            return self.status;
        }

        if remaining.is_empty() {
            self.status = AsyncStatus::Done;
            self.percent = None;
            self.current_item.clear();
        } else {
            let sum: u32 = remaining
                .iter()
                .map(|m| u32::from(m.handle.percent().unwrap_or(0)))
                .sum();
            self.percent = Some((sum / remaining.len() as u32) as u8);
            self.current_item = remaining[0].suffix.to_string();
        }
        self.pending = remaining;
        self.status
    }

    pub fn status(&self) -> AsyncStatus {
        self.status
    }

    /// Average progress of the downloads still running.
    pub fn percent(&self) -> Option<u8> {
        self.percent
    }

    /// Media kind currently downloading, e.g. `thumb`.
    pub fn current_item(&self) -> &str {
        &self.current_item
    }

    pub fn failure(&self) -> Option<&RequestFailure> {
        self.failure.as_ref()
    }

    pub fn result(&self) -> &ScraperSearchResult {
        &self.result
    }

    pub fn into_result(self) -> ScraperSearchResult {
        self.result
    }
}

#[cfg(test)]
#[path = "tests/resolve_tests.rs"]
mod tests;
