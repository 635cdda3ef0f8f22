//! Removal of scratch directories.
//!
//! Nothing is deleted unless the target resolves to a path inside the temp
//! root. Both paths are canonicalized first, so `..` segments and symlinks
//! can't be used to point outside, and containment is decided component by
//! component, so `/tmp-evil` is not inside `/tmp`.

use std::{
    env, fs, io,
    path::{Component, Path, PathBuf},
};

use tracing::debug;

use crate::{Error, Result};

/// Recursively delete `path`, which must lie inside [`std::env::temp_dir`].
///
/// A path that doesn't exist is not an error, so repeated calls succeed.
pub fn cleanup<P: AsRef<Path>>(path: P) -> Result<()> {
    cleanup_in(path, env::temp_dir())
}

/// Recursively delete `path`, which must lie inside `temp_root`.
///
/// Fails with [`Error::UnsafeDeletion`], deleting nothing, if the resolved
/// `path` is neither `temp_root` itself nor a descendant of it. A `path`
/// that doesn't exist is not an error.
///
/// Symlinks found *inside* `path` are removed, not followed.
pub fn cleanup_in<P: AsRef<Path>, R: AsRef<Path>>(path: P, temp_root: R) -> Result<()> {
    let root = fs::canonicalize(temp_root.as_ref())?;

    let resolved = match resolve(path.as_ref())? {
        Resolved::Existing(resolved) | Resolved::DanglingLink(resolved) => resolved,
        Resolved::Missing { path, error } => {
            if !is_within(&path, &root) {
                return Err(Error::UnsafeDeletion { path, root });
            }

            return if error.kind() == io::ErrorKind::NotFound {
                debug!(path = %path.display(), "nothing to remove");
                Ok(())
            } else {
                Err(error.into())
            };
        }
    };

    if !is_within(&resolved, &root) {
        return Err(Error::UnsafeDeletion {
            path: resolved,
            root,
        });
    }

    let removed = match fs::symlink_metadata(&resolved) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&resolved),
        Ok(_) => fs::remove_file(&resolved),
        Err(err) => Err(err),
    };

    match removed {
        Ok(()) => {
            debug!(path = %resolved.display(), "removed");
            Ok(())
        }
        // Someone else got there first.
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Return true if `path` is `root` or lies beneath it.
///
/// The comparison is made on whole path components. Both arguments should
/// already be canonical.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

enum Resolved {
    Existing(PathBuf),

    // A symlink whose target doesn't exist. The path is the link itself,
    // below its canonical parent.
    DanglingLink(PathBuf),

    // Couldn't canonicalize. `path` is the best-effort absolute form used for
    // the containment check; nothing is deleted in this case.
    Missing { path: PathBuf, error: io::Error },
}

fn resolve(path: &Path) -> Result<Resolved> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    match fs::canonicalize(&absolute) {
        Ok(canonical) => Ok(Resolved::Existing(canonical)),
        Err(error) => {
            let path = resolve_missing(&absolute);
            if error.kind() == io::ErrorKind::NotFound && is_symlink(&absolute) && is_symlink(&path)
            {
                Ok(Resolved::DanglingLink(path))
            } else {
                Ok(Resolved::Missing { path, error })
            }
        }
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

// Canonicalize the deepest ancestor that exists and append the rest. Those
// trailing components don't exist, so they can't be symlinks and `..` among
// them is resolved lexically.
fn resolve_missing(absolute: &Path) -> PathBuf {
    let components: Vec<Component> = absolute.components().collect();

    for n in (1..components.len()).rev() {
        let ancestor: PathBuf = components[..n].iter().collect();
        if let Ok(base) = fs::canonicalize(&ancestor) {
            return append_lexically(base, &components[n..]);
        }
    }

    append_lexically(PathBuf::new(), &components)
}

fn append_lexically(mut base: PathBuf, components: &[Component]) -> PathBuf {
    for component in components {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                base.pop();
            }
            other => base.push(other.as_os_str()),
        }
    }
    base
}
