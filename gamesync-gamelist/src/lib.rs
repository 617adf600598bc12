//! Gamelist persistence for gamesync.
//!
//! - [`store`] loads `gamelist.xml` into a system's entity tree
//! - [`recovery`] journals single entities between full write-backs
//! - [`reconcile`] writes dirty entities back
//! - [`cleanup`] repairs a gamelist against the files on disk

pub mod cleanup;
pub mod error;
pub mod reconcile;
pub mod recovery;
pub mod store;
pub mod xml;

pub use cleanup::{CleanupOutcome, cleanup_gamelist};
pub use error::GamelistError;
pub use reconcile::{UpdateOutcome, has_dirty_file, update_gamelist};
pub use recovery::{
    clear_gamelist_recovery, recovery_fragments, recovery_path, remove_from_gamelist_recovery,
    save_to_gamelist_recovery,
};
pub use store::{LoadStats, load_gamelist_file, parse_gamelist, save_to_xml};
