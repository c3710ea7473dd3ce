//! Error type shared by every pipeline stage.

use std::path::PathBuf;

/// Failures surfaced by the segmentation pipeline.
///
/// Quality-score failures and zero divisions resolve to `0.0` where they occur
/// and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A raw input file (month of transactions, lookup table, census) is missing.
    #[error("data not found: {}", path.display())]
    DataNotFound { path: PathBuf },

    /// An unknown selector or malformed parameter was passed by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two tables that must agree row-for-row do not.
    #[error("inconsistent data: {0}")]
    Inconsistent(String),

    /// A row could not be interpreted.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Opens a file, mapping a missing file to [`Error::DataNotFound`].
pub(crate) fn open_input(path: &std::path::Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::DataNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })
}
