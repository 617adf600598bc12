//! Shared model for gamesync: the metadata schema, arena-owned entity trees,
//! systems, settings and the small helpers every other crate leans on.

pub mod error;
pub mod genres;
pub mod lang;
pub mod metadata;
pub mod paths;
pub mod settings;
pub mod system;
pub mod tree;

pub use error::CoreError;
pub use metadata::{MetaDataDecl, MetaDataId, MetaDataType, MetadataKind, MetadataRecord};
pub use settings::{ScrapeSettings, Settings};
pub use system::{SystemConfig, SystemData, SystemRegistry};
pub use tree::{Entity, EntityFilter, EntityId, EntityKind, EntityTree};
