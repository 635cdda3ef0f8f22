use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::runner::RunFailure;

/// Identifies which caller-supplied value failed validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Field {
    /// The repository URL or path handed to `git clone`.
    Location,

    /// The branch or tag handed to `git clone --branch`.
    Reference,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Location => f.write_str("location"),
            Field::Reference => f.write_str("reference"),
        }
    }
}

/// Reasons why a location or reference can not be passed to `git`.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum InvalidReason {
    #[error("must not be empty")]
    Empty,

    /// `git` (and `ssh` beneath it) would read the value as an option.
    #[error("must not start with '-'")]
    LeadingDash,

    #[error("must not contain a NUL byte")]
    ContainsNul,
}

/// Describes the error conditions that might arise from clone and cleanup
/// operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value was rejected before anything was run or created.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidInput {
        field: Field,
        value: String,
        reason: InvalidReason,
    },

    /// `git clone` did not succeed.
    ///
    /// The scratch directory at `path` was created and is left behind. Pass it
    /// to [`cleanup`](crate::cleanup) when it is no longer needed.
    #[error("git clone into {} failed: {failure}", .path.display())]
    CloneFailed { path: PathBuf, failure: RunFailure },

    /// A cleanup target didn't resolve to a path inside the temp root.
    /// Nothing was deleted.
    #[error(
        "refusing to delete {}: not inside temp directory {}",
        .path.display(),
        .root.display()
    )]
    UnsafeDeletion { path: PathBuf, root: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// A specialized `Result` type for tmpclone operations.
pub type Result<T> = std::result::Result<T, Error>;
