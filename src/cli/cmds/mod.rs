use std::{ffi::OsStr, path::PathBuf};

use clap::{Arg, ArgMatches};

use crate::{App, Result};

mod cleanup;
mod clone;

pub(crate) fn add_subcommands<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
    app.subcommand(cleanup::subcommand())
        .subcommand(clone::subcommand())
}

pub(crate) fn dispatch(app: &mut App) -> Result<()> {
    let matches = app.arg_matches.clone();
    // ^^ Need an independent copy of matches so we can still pass
    // the App struct through to subcommand imps.

    match matches.subcommand() {
        ("cleanup", Some(m)) => cleanup::run(app, &m),
        ("clone", Some(m)) => clone::run(app, &m),
        _ => unreachable!(),
        // unreachable: Should have exited out with appropriate help or
        // error message if no subcommand was given.
    }
}

pub(crate) fn temp_root_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("temp-root")
        .long("temp-root")
        .takes_value(true)
        .value_name("DIR")
        .help("Directory scratch clones live under [default: the system temp directory]")
}

pub(crate) fn temp_root(matches: &ArgMatches) -> Option<PathBuf> {
    matches.value_of_os("temp-root").map(|dir: &OsStr| PathBuf::from(dir))
}

/// The value of argument `name`, which must be valid UTF-8 if present.
pub(crate) fn utf8_value<'a>(matches: &'a ArgMatches, name: &str) -> Result<Option<&'a str>> {
    match matches.value_of_os(name) {
        None => Ok(None),
        Some(value) => match value.to_str() {
            Some(value) => Ok(Some(value)),
            None => Err(format!("{} {:?} is not valid UTF-8", name, value).into()),
        },
    }
}
