//! Subprocess execution for SCM client binaries.
//!
//! Every backend shells out through a [`CommandRunner`], which reports each
//! invocation to an [`InvocationObserver`] before running it. The default
//! observer only logs; tests install a [`RecordingObserver`] to assert on the
//! exact command lines a backend issued.
//!
//! A runner built [`with_cancellation`](CommandRunner::with_cancellation)
//! kills the running client as soon as the flag is set, so an interrupted
//! run does not wait for a long clone to finish.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;
use thiserror::Error;

/// A single SCM client invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Receives a callback for every subprocess the backends start.
pub trait InvocationObserver: Send + Sync {
    fn observe(&self, invocation: &Invocation);
}

/// Logs invocations at debug level.
#[derive(Debug, Default)]
pub struct LogObserver;

impl InvocationObserver for LogObserver {
    fn observe(&self, invocation: &Invocation) {
        match &invocation.cwd {
            Some(cwd) => debug!("running `{}` in {}", invocation, cwd.display()),
            None => debug!("running `{}`", invocation),
        }
    }
}

/// Keeps every invocation in memory, in the order they happened.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the invocations recorded so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }
}

impl InvocationObserver for RecordingObserver {
    fn observe(&self, invocation: &Invocation) {
        if let Ok(mut list) = self.invocations.lock() {
            list.push(invocation.clone());
        }
    }
}

/// A command that could not be started or exited unsuccessfully.
#[derive(Error, Debug)]
#[error("`{command}` failed: {message}")]
pub struct CommandError {
    pub command: String,
    pub message: String,
}

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs SCM client binaries and captures their standard output.
#[derive(Clone)]
pub struct CommandRunner {
    observer: Arc<dyn InvocationObserver>,
    cancel: Option<Arc<AtomicBool>>,
}

impl CommandRunner {
    pub fn new(observer: Arc<dyn InvocationObserver>) -> Self {
        Self {
            observer,
            cancel: None,
        }
    }

    /// Stops running clients once `cancel` is set.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|cancel| cancel.load(Ordering::SeqCst))
    }

    /// Runs `program` with `args`, optionally inside `cwd`, and returns its
    /// trimmed standard output.
    pub fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<String, CommandError> {
        let invocation = Invocation {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: cwd.map(Path::to_path_buf),
        };
        self.observer.observe(&invocation);

        let fail = |message: String| CommandError {
            command: invocation.to_string(),
            message,
        };

        if self.cancelled() {
            return Err(fail("interrupted".to_string()));
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| fail(e.to_string()))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match &self.cancel {
            None => child.wait().map_err(|e| fail(e.to_string()))?,
            Some(cancel) => match wait_unless_cancelled(&mut child, cancel) {
                Ok(Some(status)) => status,
                // The reader threads are left behind: a grandchild may
                // still hold the pipes open.
                Ok(None) => return Err(fail("interrupted".to_string())),
                Err(e) => return Err(fail(e.to_string())),
            },
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            return Err(fail(stderr.trim().to_string()));
        }

        Ok(stdout.trim().to_string())
    }
}

/// Reads a child pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Waits for `child` to exit. Returns `None` after killing it because
/// `cancel` was set.
fn wait_unless_cancelled(
    child: &mut Child,
    cancel: &AtomicBool,
) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.load(Ordering::SeqCst) {
            // Fails only when the child already exited
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(CANCEL_POLL_INTERVAL);
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Arc::new(LogObserver))
    }
}

impl fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner")
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}
