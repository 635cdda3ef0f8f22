//! Create throwaway shallow clones of git repositories and remove them again.
//!
//! A clone is made by the host's command-line `git` into a freshly created,
//! uniquely named directory under the temp root. The two things this crate
//! takes care of are the edges around that call:
//!
//! * Caller-supplied locations and references are checked before they reach
//!   `git`, so a value such as `-oProxyCommand=...` or `--upload-pack=...` can
//!   never be read as an option. Arguments are always passed as a discrete
//!   list, never as a shell line.
//!
//! * [`cleanup`] refuses to delete anything that doesn't resolve to a path
//!   inside the temp root.
//!
//! ```no_run
//! # fn main() -> tmpclone::Result<()> {
//! let dir = tmpclone::clone("https://github.com/rust-lang/log", Some("master"))?;
//! // ... inspect the working copy ...
//! tmpclone::cleanup(&dir)?;
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{Error, Field, InvalidReason, Result};

pub mod cleanup;
pub use cleanup::cleanup;

pub mod clone;
pub use clone::{clone, Cloner};

pub mod config;
pub use config::Config;

pub mod runner;
pub use runner::{CancelToken, ProcessRunner, RunFailure, SystemRunner};

pub mod test_support;

pub mod validate;
pub use validate::{validate_location, validate_reference};
