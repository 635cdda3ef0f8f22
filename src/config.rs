use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{Error, Result};

/// Name prefix given to every scratch directory.
pub const DEFAULT_PREFIX: &str = "tmpclone-";

/// Environment variable naming the `git` executable to run.
pub const GIT_ENV: &str = "TMPCLONE_GIT";

/// Environment variable holding a clone time limit in whole seconds.
pub const TIMEOUT_ENV: &str = "TMPCLONE_TIMEOUT_SECS";

/// Settings for clone operations.
///
/// The temp root is an ordinary value here rather than something looked up
/// deep inside the clone logic, so tests and callers can point it anywhere.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Directory under which scratch directories are created.
    pub temp_root: PathBuf,

    /// Prefix for scratch directory names. Must be a plain file name.
    pub prefix: String,

    /// Program run to perform the clone.
    pub git_program: OsString,

    /// Upper bound on how long `git clone` may run. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            temp_root: env::temp_dir(),
            prefix: DEFAULT_PREFIX.to_owned(),
            git_program: OsString::from("git"),
            timeout: None,
        }
    }
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// The temp root comes from [`std::env::temp_dir`] (that is, `TMPDIR` on
    /// Unix). `TMPCLONE_GIT` overrides the git executable and
    /// `TMPCLONE_TIMEOUT_SECS` sets a time limit.
    pub fn from_env() -> Result<Config> {
        let mut config = Config::default();

        if let Some(git) = env::var_os(GIT_ENV) {
            if !git.is_empty() {
                config.git_program = git;
            }
        }

        if let Some(secs) = env::var_os(TIMEOUT_ENV) {
            let secs = secs.to_string_lossy();
            config.timeout = Some(parse_timeout_secs(&secs)?);
        }

        Ok(config)
    }

    pub fn with_temp_root<P: Into<PathBuf>>(mut self, temp_root: P) -> Config {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Config {
        self.prefix = prefix.into();
        self
    }

    pub fn with_git_program<S: Into<OsString>>(mut self, git_program: S) -> Config {
        self.git_program = git_program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Config {
        self.timeout = timeout;
        self
    }

    // The prefix is joined onto the temp root, so it has to stay a single
    // path component.
    pub(crate) fn check_prefix(&self) -> Result<()> {
        let prefix = self.prefix.as_str();
        let single_component = {
            let mut components = Path::new(prefix).components();
            matches!(
                (components.next(), components.next()),
                (Some(std::path::Component::Normal(c)), None) if c == prefix
            )
        };

        if single_component {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "scratch directory prefix {:?} must be a plain file name",
                prefix
            )))
        }
    }
}

/// Parse a whole number of seconds, as used by `TMPCLONE_TIMEOUT_SECS` and
/// the command-line `--timeout` option. Zero is rejected.
pub fn parse_timeout_secs(secs: &str) -> Result<Duration> {
    match secs.trim().parse::<u64>() {
        Ok(0) => Err(Error::Config("timeout must be at least one second".to_owned())),
        Ok(n) => Ok(Duration::from_secs(n)),
        Err(_) => Err(Error::Config(format!(
            "timeout {:?} is not a whole number of seconds",
            secs
        ))),
    }
}
