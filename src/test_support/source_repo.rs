use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// A small git repository, built with the host's command-line git, to clone
/// from in tests.
///
/// It starts out on branch `main` with one commit containing
/// `content/README.md`. The directory is deleted when the struct is dropped.
pub struct SourceRepo {
    #[allow(dead_code)] // tempdir is only used for RAII
    tempdir: tempfile::TempDir,
    path: PathBuf,
}

impl SourceRepo {
    pub fn new() -> SourceRepo {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("source");
        fs::create_dir_all(&path).unwrap();

        let mut r = SourceRepo { tempdir, path };

        r.git_command(&["init", "--quiet"]);

        // Don't depend on the host's init.defaultBranch.
        r.git_command(&["symbolic-ref", "HEAD", "refs/heads/main"]);

        r.write_file("content/README.md", "# source\n")
            .commit("initial commit");
        r
    }

    /// Return the repo's working directory.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// The working directory as a clone location for `git`.
    ///
    /// Note that `git` ignores `--depth` for plain local paths; use
    /// [`file_url`](SourceRepo::file_url) to get a shallow clone.
    pub fn location(&self) -> String {
        self.path.to_str().unwrap().to_owned()
    }

    /// The repo as a `file://` URL, which `git` clones like a remote.
    pub fn file_url(&self) -> String {
        let path = self.location().replace('\\', "/");
        if path.starts_with('/') {
            format!("file://{}", path)
        } else {
            format!("file:///{}", path)
        }
    }

    /// Write `contents` to `rel_path` in the working directory, creating
    /// parent directories as needed. Does not commit.
    pub fn write_file(&mut self, rel_path: &str, contents: &str) -> &mut SourceRepo {
        let file = self.path.join(rel_path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(file, contents).unwrap();
        self
    }

    /// Stage everything and commit it.
    pub fn commit(&mut self, message: &str) -> &mut SourceRepo {
        self.git_command(&["add", "--all"]);
        self.git_command(&[
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "-m",
            message,
        ])
    }

    /// Create a branch at the current commit and switch to it.
    pub fn create_branch(&mut self, name: &str) -> &mut SourceRepo {
        self.git_command(&["checkout", "--quiet", "-b", name])
    }

    pub fn checkout(&mut self, name: &str) -> &mut SourceRepo {
        self.git_command(&["checkout", "--quiet", name])
    }

    pub fn tag(&mut self, name: &str) -> &mut SourceRepo {
        self.git_command(&["-c", "tag.gpgsign=false", "tag", name])
    }

    // Run git in the repo with a fixed identity so commits work on any host.
    fn command(&self) -> Command {
        let mut c = Command::new("git");
        c.current_dir(&self.path)
            .env("GIT_AUTHOR_NAME", "tmpclone")
            .env("GIT_AUTHOR_EMAIL", "tmpclone@example.com")
            .env("GIT_COMMITTER_NAME", "tmpclone")
            .env("GIT_COMMITTER_EMAIL", "tmpclone@example.com");
        c
    }

    /// Run a git command and return the repo for method chaining.
    /// Panics if the command fails.
    pub fn git_command<I, S>(&mut self, args: I) -> &mut SourceRepo
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        git_output(self.command().args(args));
        self
    }
}

impl Default for SourceRepo {
    fn default() -> SourceRepo {
        SourceRepo::new()
    }
}

/// Run `git` with `args` in `dir` and return its trimmed stdout.
/// Panics if the command fails.
pub fn git_stdout<I, S>(dir: &Path, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    git_output(Command::new("git").current_dir(dir).args(args))
}

fn git_output(command: &mut Command) -> String {
    let output = command.output().unwrap();

    if !output.status.success() {
        panic!(
            "git command failed with status {:?}\n\nstdout:\n\n{}\n\nstderr:\n\n{}\n\n",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}
