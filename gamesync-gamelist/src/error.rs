use std::path::PathBuf;

/// Errors from reading or writing gamelist and recovery files.
#[derive(Debug, thiserror::Error)]
pub enum GamelistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Malformed XML in {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Could not find <gameList> root in {0}")]
    MissingRoot(PathBuf),

    #[error("Nothing worth saving for {0}")]
    NothingToSave(PathBuf),

    #[error(transparent)]
    Core(#[from] gamesync_core::CoreError),
}

impl GamelistError {
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing_root(path: impl Into<PathBuf>) -> Self {
        Self::MissingRoot(path.into())
    }
}
