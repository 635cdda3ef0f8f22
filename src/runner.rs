//! Running external programs.
//!
//! Clone logic talks to `git` only through the [`ProcessRunner`] trait so it
//! can be exercised with a fake runner in tests. [`SystemRunner`] is the real
//! implementation, built on `std::process::Command`.

use std::{
    ffi::OsString,
    io::{self, Read},
    path::PathBuf,
    process::{Child, Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::debug;

/// A program invocation: the program, its arguments as discrete tokens, and
/// where and with which extra environment to run it.
///
/// There is intentionally no way to express a shell command line here.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    pub fn new<S: Into<OsString>>(program: S) -> CommandSpec {
        CommandSpec {
            program: program.into(),
            ..CommandSpec::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> CommandSpec {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env<K: Into<OsString>, V: Into<OsString>>(mut self, key: K, value: V) -> CommandSpec {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// What a finished process left behind.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Reasons why an external program did not complete successfully.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error("{} with output:\n{stderr}", describe_exit(.code))]
    Exited { code: Option<i32>, stderr: String },

    #[error("timed out after {0:?}; process was killed")]
    TimedOut(Duration),

    #[error("cancelled; process was killed")]
    Cancelled,

    #[error("could not start process: {0}")]
    Spawn(#[source] io::Error),

    #[error("lost track of process: {0}")]
    Wait(#[source] io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_owned(),
    }
}

/// Shared flag used to ask a running process to stop.
///
/// Clones of a token observe the same flag, so one thread may cancel work
/// running on another.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Capability to run an external program to completion.
///
/// Implementations must stop the process and return
/// [`RunFailure::TimedOut`] once `timeout` has elapsed, or
/// [`RunFailure::Cancelled`] once `cancel` is set. A non-zero exit is *not*
/// a failure at this level; it is reported through [`ProcessOutput::code`].
pub trait ProcessRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunFailure>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunFailure> {
        (**self).run(spec, timeout, cancel)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs programs on the host with `std::process::Command`.
///
/// stdin is closed, stdout and stderr are captured. The calling thread blocks
/// until the process exits, polling so that timeouts and cancellation are
/// noticed promptly.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, RunFailure> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        for (key, value) in &spec.env {
            command.env(key, value);
        }

        // The child leads a new process group so a kill also reaches
        // anything it started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(RunFailure::Spawn)?;
        debug!(pid = child.id(), program = ?spec.program, "spawned");

        // Drain both pipes while waiting; a full pipe would stall the child.
        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        pending += drain(child.stdout.take(), Stream::Stdout, &tx);
        pending += drain(child.stderr.take(), Stream::Stderr, &tx);
        drop(tx);

        let watch = Watch {
            // A timeout too large to represent as an `Instant` never expires.
            deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
            timeout,
            cancel,
        };

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => {
                    terminate(&mut child);
                    return Err(RunFailure::Wait(err));
                }
            }

            if let Some(failure) = watch.expired() {
                terminate(&mut child);
                return Err(failure);
            }

            thread::sleep(POLL_INTERVAL);
        };

        let mut output = ProcessOutput {
            code: status.code(),
            ..ProcessOutput::default()
        };

        // A descendant may still hold the pipes open after the child exits.
        // Readers are never joined, and on expiry are left behind.
        while pending > 0 {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok((Stream::Stdout, buf)) => {
                    output.stdout = buf;
                    pending -= 1;
                }
                Ok((Stream::Stderr, buf)) => {
                    output.stderr = buf;
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(failure) = watch.expired() {
                        kill_group(child.id());
                        return Err(failure);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok(output)
    }
}

struct Watch<'a> {
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    cancel: &'a CancelToken,
}

impl Watch<'_> {
    fn expired(&self) -> Option<RunFailure> {
        if self.cancel.is_cancelled() {
            return Some(RunFailure::Cancelled);
        }

        match (self.deadline, self.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Some(RunFailure::TimedOut(timeout))
            }
            _ => None,
        }
    }
}

enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    stream: Stream,
    tx: &Sender<(Stream, Vec<u8>)>,
) -> usize {
    match pipe {
        Some(mut pipe) => {
            let tx = tx.clone();
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send((stream, buf));
            });
            1
        }
        None => 0,
    }
}

fn terminate(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    // Errors mean the group is already gone.
    unsafe {
        libc::kill(-(pgid as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
