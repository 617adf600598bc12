//! Applies accepted results to the in-memory tree on the owning thread.

use gamesync_core::genres;
use gamesync_core::lang::LangInfo;
use gamesync_core::{Settings, SystemData};
use gamesync_gamelist::save_to_gamelist_recovery;

use crate::error::ScrapeError;
use crate::result::fill_language;
use crate::threaded::AcceptedResult;

/// Merge an accepted scrape result into its entity and journal the entity.
///
/// Must run on the thread that owns `system`. Statistics are never
/// overwritten. Returns the number of fields that changed.
pub fn apply_scrape_result(
    system: &mut SystemData,
    settings: &Settings,
    accepted: &AcceptedResult,
) -> Result<usize, ScrapeError> {
    // Look the entity up by path so a rescanned tree cannot misdirect the result
    let Some(id) = system.lookup(&accepted.path) else {
        log::warn!(
            "{}: \"{}\" is no longer part of the system",
            accepted.label,
            accepted.path.display()
        );
        return Ok(0);
    };
    if id != accepted.entity {
        log::debug!("{}: entity moved from {:?} to {:?}", accepted.label, accepted.entity, id);
    }

    let lang = LangInfo::parse(&accepted.path, Some(&*system));
    let Some(entity) = system.tree_mut().get_mut(id) else {
        return Ok(0);
    };
    let md = &mut entity.metadata;
    let mut changed = md.import_scraped(&accepted.result.md);
    if genres::convert_genre_to_ids(md) {
        changed += 1;
    }
    if fill_language(md, &lang) {
        changed += 1;
    }

    if changed > 0 {
        save_to_gamelist_recovery(system, settings, id)?;
    }
    log::info!(
        "{}: {} field(s) updated{}",
        accepted.label,
        changed,
        if accepted.partial { " (some media missing)" } else { "" }
    );
    Ok(changed)
}
