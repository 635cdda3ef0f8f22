//! Shallow clones into fresh scratch directories.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    runner::{CancelToken, CommandSpec, ProcessRunner, RunFailure, SystemRunner},
    validate::{validate_location, validate_reference},
    Config, Error, Result,
};

/// Clone `location` (optionally at `reference`) into a new scratch directory
/// using settings from [`Config::from_env`].
///
/// Returns the scratch directory. It belongs to the caller, who should
/// release it with [`cleanup`](crate::cleanup).
pub fn clone(location: &str, reference: Option<&str>) -> Result<PathBuf> {
    validate_location(location)?;
    validate_reference(reference)?;

    Cloner::new(Config::from_env()?).clone_repo(location, reference)
}

/// Build the argument list for a shallow, single-reference `git clone`.
///
/// `location` and `reference` must already have passed validation. Every
/// value is a separate argument and positional arguments follow `--`.
pub fn clone_args(location: &str, reference: Option<&str>, dest: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["clone".into(), "--depth".into(), "1".into()];

    if let Some(reference) = reference {
        args.push("--branch".into());
        args.push(reference.into());
    }

    args.push("--".into());
    args.push(location.into());
    args.push(dest.as_os_str().to_owned());
    args
}

/// Performs clones according to a [`Config`], running `git` through a
/// [`ProcessRunner`].
#[derive(Debug)]
pub struct Cloner<R = SystemRunner> {
    config: Config,
    runner: R,
}

impl Cloner<SystemRunner> {
    pub fn new(config: Config) -> Cloner<SystemRunner> {
        Cloner::with_runner(config, SystemRunner)
    }
}

impl<R: ProcessRunner> Cloner<R> {
    pub fn with_runner(config: Config, runner: R) -> Cloner<R> {
        Cloner { config, runner }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clone `location` into a new scratch directory under the configured
    /// temp root.
    ///
    /// With a `reference`, only that branch or tag is fetched; otherwise the
    /// remote's default branch. History is truncated to the latest commit.
    ///
    /// Inputs are validated before anything touches the file system. If `git`
    /// then fails, the error is [`Error::CloneFailed`] and carries the
    /// scratch directory path, which is left in place.
    pub fn clone_repo(&self, location: &str, reference: Option<&str>) -> Result<PathBuf> {
        self.clone_repo_with_cancel(location, reference, &CancelToken::new())
    }

    /// Like [`clone_repo`](Cloner::clone_repo), but `git` is killed as soon as
    /// `cancel` is set.
    pub fn clone_repo_with_cancel(
        &self,
        location: &str,
        reference: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        validate_location(location)?;
        validate_reference(reference)?;
        let reference = reference.filter(|r| !r.is_empty());

        self.config.check_prefix()?;

        let root = fs::canonicalize(&self.config.temp_root)?;
        let dest = create_scratch_dir(&root, &self.config.prefix)?;
        debug!(path = %dest.display(), "created scratch directory");

        let spec = CommandSpec::new(self.config.git_program.clone())
            .args(clone_args(location, reference, &dest))
            .env("GIT_TERMINAL_PROMPT", "0");

        debug!(
            program = ?spec.program,
            dest = %dest.display(),
            with_reference = reference.is_some(),
            "running git clone"
        );

        let output = match self.runner.run(&spec, self.config.timeout, cancel) {
            Ok(output) => output,
            Err(failure) => return Err(Error::CloneFailed { path: dest, failure }),
        };

        if !output.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CloneFailed {
                path: dest,
                failure: RunFailure::Exited {
                    code: output.code,
                    stderr: stderr.trim_end().to_owned(),
                },
            });
        }

        debug!(path = %dest.display(), "git clone finished");
        Ok(dest)
    }
}

// Creates a uniquely named directory that outlives the `TempDir` handle.
#[allow(deprecated)] // `into_path` is spelled `keep` on newer tempfile.
fn create_scratch_dir(root: &Path, prefix: &str) -> Result<PathBuf> {
    let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?;
    Ok(dir.into_path())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    use crate::{test_support::FakeRunner, Field};

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    fn test_config(root: &Path) -> Config {
        Config::default().with_temp_root(root)
    }

    #[test]
    fn args_without_reference() {
        let args = clone_args("https://example.com/repo", None, Path::new("/tmp/tmpclone-x"));
        assert_eq!(
            args,
            vec![
                "clone",
                "--depth",
                "1",
                "--",
                "https://example.com/repo",
                "/tmp/tmpclone-x"
            ]
        );
    }

    #[test]
    fn args_with_reference() {
        let args = clone_args("https://example.com/repo", Some("v1.0"), Path::new("/tmp/d"));
        assert_eq!(
            args,
            vec![
                "clone",
                "--depth",
                "1",
                "--branch",
                "v1.0",
                "--",
                "https://example.com/repo",
                "/tmp/d"
            ]
        );
    }

    #[test]
    fn dash_location_never_reaches_runner() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let cloner = Cloner::with_runner(test_config(root.path()), &runner);

        let err = cloner.clone_repo("-oProxyCommand=calc.exe", None).unwrap_err();
        if let Error::InvalidInput { field, .. } = err {
            assert_eq!(field, Field::Location);
        } else {
            panic!("wrong error: {:?}", err);
        }

        assert_eq!(runner.call_count(), 0);
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn dash_reference_never_reaches_runner() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let cloner = Cloner::with_runner(test_config(root.path()), &runner);

        let err = cloner
            .clone_repo("https://example.com/repo", Some("--upload-pack=touch /tmp/pwned"))
            .unwrap_err();

        if let Error::InvalidInput { field, value, .. } = err {
            assert_eq!(field, Field::Reference);
            assert_eq!(value, "--upload-pack=touch /tmp/pwned");
        } else {
            panic!("wrong error: {:?}", err);
        }

        assert_eq!(runner.call_count(), 0);
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn creates_scratch_dir_under_root() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let cloner = Cloner::with_runner(test_config(root.path()), &runner);

        let path = cloner.clone_repo("https://example.com/repo", None).unwrap();

        let canonical_root = fs::canonicalize(root.path()).unwrap();
        assert_eq!(path.parent().unwrap(), canonical_root.as_path());
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("tmpclone-"));
        assert!(entries(&path) > 0);
    }

    #[test]
    fn passes_inputs_as_discrete_arguments() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let cloner = Cloner::with_runner(test_config(root.path()), &runner);

        let location = "https://example.com/my repo; rm -rf ~";
        let path = cloner.clone_repo(location, Some("main")).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);

        let spec = &calls[0].spec;
        assert_eq!(spec.program, OsString::from("git"));
        assert_eq!(spec.args, clone_args(location, Some("main"), &path));
        assert!(spec.args.contains(&OsString::from(location)));
        assert!(spec
            .env
            .contains(&("GIT_TERMINAL_PROMPT".into(), "0".into())));
    }

    #[test]
    fn empty_reference_means_default_branch() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let cloner = Cloner::with_runner(test_config(root.path()), &runner);

        let path = cloner.clone_repo("https://example.com/repo", Some("")).unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].spec.args, clone_args("https://example.com/repo", None, &path));
    }

    #[test]
    fn each_clone_gets_its_own_directory() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let cloner = Cloner::with_runner(test_config(root.path()), &runner);

        let a = cloner.clone_repo("https://example.com/a", None).unwrap();
        let b = cloner.clone_repo("https://example.com/a", None).unwrap();

        assert_ne!(a, b);
        assert_eq!(entries(root.path()), 2);
    }

    #[test]
    fn uses_configured_program_prefix_and_timeout() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let config = test_config(root.path())
            .with_git_program("/opt/git/bin/git")
            .with_prefix("scan-")
            .with_timeout(Some(Duration::from_secs(30)));
        let cloner = Cloner::with_runner(config, &runner);

        let path = cloner.clone_repo("https://example.com/repo", None).unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].spec.program, OsString::from("/opt/git/bin/git"));
        assert_eq!(calls[0].timeout, Some(Duration::from_secs(30)));
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("scan-"));
    }

    #[test]
    fn failed_clone_reports_and_keeps_scratch_dir() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::exiting(128, "fatal: repository 'x' not found\n");
        let cloner = Cloner::with_runner(test_config(root.path()), &runner);

        let err = cloner.clone_repo("https://example.com/x", None).unwrap_err();

        if let Error::CloneFailed { path, failure } = err {
            assert!(path.is_dir());
            assert!(path.starts_with(fs::canonicalize(root.path()).unwrap()));

            if let RunFailure::Exited { code, stderr } = failure {
                assert_eq!(code, Some(128));
                assert_eq!(stderr, "fatal: repository 'x' not found");
            } else {
                panic!("wrong failure: {:?}", failure);
            }

            crate::cleanup::cleanup_in(&path, root.path()).unwrap();
            assert!(!path.exists());
        } else {
            panic!("wrong error: {:?}", err);
        }
    }

    #[test]
    fn timeout_is_clone_failure() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::timing_out();
        let config = test_config(root.path()).with_timeout(Some(Duration::from_secs(1)));
        let cloner = Cloner::with_runner(config, &runner);

        let err = cloner.clone_repo("https://example.com/slow", None).unwrap_err();

        if let Error::CloneFailed {
            failure: RunFailure::TimedOut(t),
            ..
        } = err
        {
            assert_eq!(t, Duration::from_secs(1));
        } else {
            panic!("wrong error: {:?}", err);
        }
    }

    #[test]
    fn bad_prefix_is_rejected_before_running() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let config = test_config(root.path()).with_prefix("../escape-");
        let cloner = Cloner::with_runner(config, &runner);

        let err = cloner.clone_repo("https://example.com/repo", None).unwrap_err();
        if let Error::Config(_) = err {
            // expected
        } else {
            panic!("wrong error: {:?}", err);
        }

        assert_eq!(runner.call_count(), 0);
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn missing_temp_root_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let cloner = Cloner::with_runner(test_config(&root.path().join("nope")), &runner);

        let err = cloner.clone_repo("https://example.com/repo", None).unwrap_err();
        if let Error::IoError(_) = err {
            // expected
        } else {
            panic!("wrong error: {:?}", err);
        }

        assert_eq!(runner.call_count(), 0);
    }
}
