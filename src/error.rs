use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported radio technology: {0:?}")]
    UnsupportedTechnology(String),

    #[error("log file {path:?}: {source}")]
    LogIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("first seen store {path:?}: {message}")]
    Store { path: PathBuf, message: String },

    #[error("radio query failed: {0}")]
    Scan(String),

    #[error("radio query timed out after {0}ms")]
    ScanTimeout(u64),
}

impl Error {
    pub(crate) fn log_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LogIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
