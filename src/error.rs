use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Coarse classification of an [`Error`], used by callers to pick an exit
/// code or response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadDataset,
    BadJson,
    BadKeys,
    BadQuery,
    Disk,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("dataset '{0}' invalid")]
    BadDataset(String),
    #[error("json invalid: {reason}")]
    BadJson { reason: String },
    #[error("keys '{0}' invalid")]
    BadKeys(String),
    #[error("query '{dataset} from {min} to {max}' invalid")]
    BadQuery {
        dataset: String,
        min: String,
        max: String,
    },
    #[error("file open or permission error on '{}'", path.display())]
    Disk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt dataset file '{}': {detail}", path.display())]
    Corrupt { path: PathBuf, detail: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadDataset(_) => ErrorKind::BadDataset,
            Error::BadJson { .. } => ErrorKind::BadJson,
            Error::BadKeys(_) => ErrorKind::BadKeys,
            Error::BadQuery { .. } => ErrorKind::BadQuery,
            Error::Disk { .. } | Error::Corrupt { .. } => ErrorKind::Disk,
        }
    }

    pub(crate) fn bad_json(reason: impl fmt::Display) -> Self {
        Error::BadJson {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn bad_keys(keys: &[String]) -> Self {
        Error::BadKeys(format!("{keys:?}"))
    }

    pub(crate) fn bad_query(
        dataset: &str,
        min: impl fmt::Display,
        max: impl fmt::Display,
    ) -> Self {
        Error::BadQuery {
            dataset: dataset.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub(crate) fn corrupt(path: &Path, detail: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }
}

/// Attaches the path an I/O operation was working on.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Disk {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
