use std::{
    env,
    path::{Path, PathBuf},
};

/// Switches the process working directory for as long as the value lives,
/// then switches back.
///
/// The working directory is process-wide, so any test using this should be
/// marked `#[serial]`.
pub struct TempCwd {
    restore_to: PathBuf,
}

impl TempCwd {
    pub fn new<P: AsRef<Path>>(path: P) -> TempCwd {
        let restore_to = env::current_dir().unwrap();
        env::set_current_dir(path).unwrap();

        TempCwd { restore_to }
    }
}

impl Drop for TempCwd {
    fn drop(&mut self) {
        env::set_current_dir(&self.restore_to).unwrap();
    }
}
