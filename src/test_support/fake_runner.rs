use std::{fs, path::Path, sync::Mutex, time::Duration};

use crate::runner::{CancelToken, CommandSpec, ProcessOutput, ProcessRunner, RunFailure};

/// One recorded invocation of a [`FakeRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Call {
    pub spec: CommandSpec,
    pub timeout: Option<Duration>,
}

#[derive(Debug)]
enum Behavior {
    Succeed,
    Exit { code: i32, stderr: String },
    TimeOut,
}

/// A [`ProcessRunner`] that records what it was asked to run instead of
/// running it.
///
/// A succeeding fake imitates `git clone` just enough to be useful: it
/// writes a `README.md` into the directory named by the last argument.
#[derive(Debug)]
pub struct FakeRunner {
    behavior: Behavior,
    calls: Mutex<Vec<Call>>,
}

impl FakeRunner {
    pub fn succeeding() -> FakeRunner {
        FakeRunner::with_behavior(Behavior::Succeed)
    }

    /// Every run exits with `code` after writing `stderr`.
    pub fn exiting(code: i32, stderr: &str) -> FakeRunner {
        FakeRunner::with_behavior(Behavior::Exit {
            code,
            stderr: stderr.to_owned(),
        })
    }

    /// Every run reports that the configured timeout elapsed.
    pub fn timing_out() -> FakeRunner {
        FakeRunner::with_behavior(Behavior::TimeOut)
    }

    fn with_behavior(behavior: Behavior) -> FakeRunner {
        FakeRunner {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunFailure> {
        self.calls.lock().unwrap().push(Call {
            spec: spec.clone(),
            timeout,
        });

        if cancel.is_cancelled() {
            return Err(RunFailure::Cancelled);
        }

        match &self.behavior {
            Behavior::Succeed => {
                if let Some(dest) = spec.args.last() {
                    fs::write(Path::new(dest).join("README.md"), "cloned\n").unwrap();
                }
                Ok(ProcessOutput {
                    code: Some(0),
                    ..ProcessOutput::default()
                })
            }
            Behavior::Exit { code, stderr } => Ok(ProcessOutput {
                code: Some(*code),
                stdout: Vec::new(),
                stderr: stderr.clone().into_bytes(),
            }),
            Behavior::TimeOut => Err(RunFailure::TimedOut(timeout.unwrap_or_default())),
        }
    }
}
