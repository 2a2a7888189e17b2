use std::{io, process::ExitStatus};

use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InstallError>;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{what} not found at {path}")]
    NotFound {
        what: &'static str,
        path: Utf8PathBuf,
    },

    #[error("{context}: {program} exited with {status}")]
    ToolFailed {
        context: String,
        program: String,
        status: ExitStatus,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: cancelled")]
    Cancelled { context: String },

    #[error("verifying {path}: {message}")]
    Checksum { path: Utf8PathBuf, message: String },

    #[error("extracting {path}: {message}")]
    Extract { path: Utf8PathBuf, message: String },
}

/// Attaches a context message to io results.
pub trait IoContext<T> {
    fn io_context<F, C>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, C>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|source| InstallError::Io {
            context: context().into(),
            source,
        })
    }
}
