//! Checks applied to caller-supplied values before they are handed to `git`.
//!
//! Command-line tools generally treat any argument that starts with `-` as an
//! option. A location such as `-oProxyCommand=...` or a reference such as
//! `--upload-pack=...` would otherwise be read by `git` as a flag and could be
//! used to run arbitrary commands.

use crate::{Error, Field, InvalidReason, Result};

/// Check that `location` can be passed to `git clone` as a repository URL
/// or path.
///
/// It is an error if `location` is empty, starts with `-`, or contains a
/// NUL byte.
pub fn validate_location(location: &str) -> Result<()> {
    check_value(location).map_err(|reason| invalid(Field::Location, location, reason))
}

/// Check that `reference` can be passed to `git clone --branch`.
///
/// An absent reference (`None` or an empty string) is not an error; `git`
/// will use the remote's default branch. Otherwise the same rules apply as
/// for [`validate_location`].
pub fn validate_reference(reference: Option<&str>) -> Result<()> {
    match reference {
        None | Some("") => Ok(()),
        Some(r) => check_value(r).map_err(|reason| invalid(Field::Reference, r, reason)),
    }
}

fn check_value(value: &str) -> std::result::Result<(), InvalidReason> {
    if value.is_empty() {
        Err(InvalidReason::Empty)
    } else if value.starts_with('-') {
        Err(InvalidReason::LeadingDash)
    } else if value.contains('\0') {
        Err(InvalidReason::ContainsNul)
    } else {
        Ok(())
    }
}

fn invalid(field: Field, value: &str, reason: InvalidReason) -> Error {
    Error::InvalidInput {
        field,
        value: value.to_owned(),
        reason,
    }
}
