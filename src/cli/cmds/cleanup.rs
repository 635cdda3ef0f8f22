use std::env;

use clap::{App, Arg, ArgMatches, SubCommand};

use tmpclone::cleanup::cleanup_in;

use super::{temp_root, temp_root_arg};
use crate::Result;

pub(crate) fn subcommand<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("cleanup")
        .about("Delete a scratch directory created by `clone`")
        .arg(
            Arg::with_name("path")
                .required(true)
                .help("The scratch directory to delete"),
        )
        .arg(temp_root_arg())
}

pub(crate) fn run(_app: &mut crate::App, matches: &ArgMatches) -> Result<()> {
    let path = matches.value_of_os("path").unwrap();
    let root = temp_root(matches).unwrap_or_else(env::temp_dir);

    cleanup_in(path, root)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::App;

    #[test]
    fn removes_scratch_dir() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_str().unwrap();
        let scratch = root.path().join("tmpclone-abc");
        fs::create_dir_all(scratch.join("nested")).unwrap();
        fs::write(scratch.join("nested/file"), b"x").unwrap();
        let scratch_str = scratch.to_str().unwrap();

        let stdout =
            App::run_with_args(vec!["cleanup", "--temp-root", root_str, scratch_str]).unwrap();

        assert!(stdout.is_empty());
        assert!(!scratch.exists());

        // Running it again is fine.
        App::run_with_args(vec!["cleanup", "--temp-root", root_str, scratch_str]).unwrap();
    }

    #[test]
    fn refuses_path_outside_temp_root() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_str().unwrap();
        let other = tempfile::tempdir().unwrap();
        let sentinel = other.path().join("sentinel");
        fs::write(&sentinel, b"keep me").unwrap();

        let err = App::run_with_args(vec![
            "cleanup",
            "--temp-root",
            root_str,
            other.path().to_str().unwrap(),
        ])
        .unwrap_err();

        let errmsg = err.to_string();
        assert!(
            errmsg.starts_with("refusing to delete"),
            "\nincorrect error message:\n\n{}",
            errmsg
        );
        assert!(sentinel.exists());
    }

    #[test]
    fn error_no_path() {
        let err = App::run_with_args(vec!["cleanup"]).unwrap_err();

        let errmsg = err.to_string();
        assert!(
            errmsg.contains("required arguments were not provided"),
            "\nincorrect error message:\n\n{}",
            errmsg
        );
    }

    #[test]
    fn error_too_many_args() {
        let err = App::run_with_args(vec!["cleanup", "here", "and there"]).unwrap_err();

        let errmsg = err.to_string();
        assert!(
            errmsg.contains("wasn't expected"),
            "\nincorrect error message:\n\n{}",
            errmsg
        );
    }
}
