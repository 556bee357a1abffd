use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{DiffProvider, ProviderError};

/// How often a running git child is polled for exit while a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Answers diff queries from a local clone using the `git` binary.
///
/// The clone must already contain both revisions; nothing is fetched.
/// The repository name passed by the engine is ignored since the clone
/// is already bound to one repository.
#[derive(Debug, Clone)]
pub struct GitDiffProvider {
    git_dir: PathBuf,
    timeout: Option<Duration>,
}

impl GitDiffProvider {
    /// Provider reading from the clone at `git_dir`, with no time limit.
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
            timeout: None,
        }
    }

    /// Kill any git invocation still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clone the provider reads from.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Run `git <options> --end-of-options <revisions> --`.
    ///
    /// Revisions always follow `--end-of-options` so a value starting with
    /// `-` can never be read as a flag.
    fn run(&self, options: &[&str], revisions: &[&str]) -> Result<String, ProviderError> {
        let child = Command::new("git")
            .arg("-C")
            .arg(&self.git_dir)
            .args(options)
            .arg("--end-of-options")
            .args(revisions)
            .arg("--")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProviderError::Unavailable(format!("failed to run git: {e}")))?;

        let output = wait_bounded(child, self.timeout)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(stderr.trim()))
    }
}

/// Wait for `child`, killing it once `timeout` has passed.
///
/// Both pipes are drained on their own threads so a large diff cannot
/// stall the child on a full pipe while it is being polled.
fn wait_bounded(mut child: Child, timeout: Option<Duration>) -> Result<Output, ProviderError> {
    let waiting =
        |e: std::io::Error| ProviderError::Unavailable(format!("failed to wait for git: {e}"));

    let Some(timeout) = timeout else {
        return child.wait_with_output().map_err(waiting);
    };

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let started = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait().map_err(waiting)? {
            break status;
        }
        if started.elapsed() >= timeout {
            // kill only fails if the child has already exited.
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("git killed after exceeding {timeout:?}");
            return Err(ProviderError::TimedOut(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Map git's stderr to a provider error.
fn classify_failure(stderr: &str) -> ProviderError {
    const MISSING: &[&str] = &[
        "unknown revision",
        "bad revision",
        "bad object",
        "invalid object name",
        "not a valid object name",
    ];
    if MISSING.iter().any(|m| stderr.contains(m)) {
        ProviderError::NotFound(stderr.to_string())
    } else {
        ProviderError::Unavailable(stderr.to_string())
    }
}

impl DiffProvider for GitDiffProvider {
    fn compare(&self, _repo: &str, base: &str, head: &str) -> Result<Vec<String>, ProviderError> {
        // Three-dot range: changes on head since the merge base, as a hosted compare reports them.
        let range = format!("{base}...{head}");
        let out = self.run(&["diff", "--name-only"], &[&range])?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn commit_message(&self, _repo: &str, sha: &str) -> Result<String, ProviderError> {
        let out = self.run(&["log", "-1", "--format=%B"], &[sha])?;
        Ok(out.trim_end().to_string())
    }
}
