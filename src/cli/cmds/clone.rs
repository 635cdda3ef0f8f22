use std::{
    io::Write,
    path::{Path, PathBuf},
};

use clap::{App, Arg, ArgMatches, SubCommand};
use tracing::warn;

use tmpclone::{
    cleanup::cleanup_in, config::parse_timeout_secs, Cloner, Config, Error, RunFailure,
};

use super::{temp_root, temp_root_arg, utf8_value};
use crate::Result;

pub(crate) fn subcommand<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("clone")
        .about("Shallow-clone a repository into a new scratch directory and print its path")
        .arg(
            Arg::with_name("location")
                .required(true)
                .help("Repository URL or path"),
        )
        .arg(
            Arg::with_name("ref")
                .long("ref")
                .short("r")
                .takes_value(true)
                .allow_hyphen_values(true)
                .value_name("REF")
                .help("Branch or tag to check out [default: the remote's default branch]"),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .takes_value(true)
                .value_name("SECS")
                .help("Kill git and fail if the clone takes longer than this"),
        )
        .arg(temp_root_arg())
}

pub(crate) fn run(app: &mut crate::App, matches: &ArgMatches) -> Result<()> {
    let location = utf8_value(matches, "location")?.unwrap_or_default();
    let reference = utf8_value(matches, "ref")?;

    let mut config = Config::from_env()?;
    if let Some(root) = temp_root(matches) {
        config = config.with_temp_root(root);
    }
    if let Some(secs) = utf8_value(matches, "timeout")? {
        config = config.with_timeout(Some(parse_timeout_secs(secs)?));
    }

    let temp_root = config.temp_root.clone();

    match Cloner::new(config).clone_repo(location, reference) {
        Ok(path) => {
            writeln!(app, "{}", path.display())?;
            Ok(())
        }
        Err(Error::CloneFailed { path, failure }) => {
            Err(discard_failed_clone(path, failure, &temp_root).into())
        }
        Err(err) => Err(err.into()),
    }
}

// Nobody else will ever learn the path of a failed clone, so remove it. The
// clone failure is what gets reported either way.
fn discard_failed_clone(path: PathBuf, failure: RunFailure, temp_root: &Path) -> Error {
    if let Err(err) = cleanup_in(&path, temp_root) {
        warn!(path = %path.display(), error = %err, "could not remove scratch directory");
    }
    Error::CloneFailed { path, failure }
}
