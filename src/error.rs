use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a submission cycle
///
/// `TypeMismatch` and `Filesystem` are raised before or during job creation and are never
/// retried. `RetriesExhausted` is only returned when the caller didn't opt to ignore it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid job arguments: {0}")]
    TypeMismatch(String),

    #[error("Can't access {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Ran out of resubmission tries for {jobname} after {tries} tries")]
    RetriesExhausted { jobname: String, tries: u32 },

    #[error("Can't render template: {0}")]
    Render(#[from] tinytemplate::error::Error),

    #[error(transparent)]
    Program(#[from] anyhow::Error),
}

impl Error {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
