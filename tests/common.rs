use std::{
    fs,
    path::{Path, PathBuf},
};

use assert_cmd::Command;

#[allow(dead_code)]
pub fn tmpclone() -> Command {
    let mut cmd = Command::cargo_bin("tmpclone").unwrap();
    cmd.env_remove("TMPCLONE_GIT")
        .env_remove("TMPCLONE_TIMEOUT_SECS")
        .env_remove("RUST_LOG");
    cmd
}

// The clone command prints the scratch directory followed by a newline.
#[allow(dead_code)]
pub fn path_from_stdout(stdout: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(stdout).trim_end())
}

#[allow(dead_code)]
pub fn entry_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

/// Write an executable shell script that ignores its arguments and sleeps,
/// for standing in as a `git` that never finishes.
#[cfg(unix)]
#[allow(dead_code)]
pub fn sleeping_git(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("slow-git");
    fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}
