use crate::models::{
    args::{Args, Invocation},
    status::Status,
};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::OnceLock,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    time,
};
use tracing::{debug, error, info, warn};

/// Upper bound of stderr kept for diagnostics. Older output is dropped first.
pub const STDERR_CAPTURE_LIMIT: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum BlenderError {
    #[error("Unable to start blender {executable:?}: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to write control script {path:?}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Blender exited with code {exit_code:?}: {stderr}")]
    Failure {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("Blender did not finish within {0:?} and was terminated")]
    Timeout(Duration),
    #[error("Unable to find blender version in output: {0:?}")]
    Version(String),
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

/// What a finished (successful) blender run left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub exit_code: Option<i32>,
    /// Files blender announced with `Saved:` lines, in order.
    pub saved: Vec<PathBuf>,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Blender structure to hold path to executable and version of blender installed.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Blender {
    /// Path to blender executable on the system.
    executable: PathBuf,
    /// Version reported by the executable, if it was probed.
    version: Option<Version>,
}

impl Blender {
    /// Create a new blender struct with provided path. Note this is not checked and enforced!
    pub fn new(executable: impl AsRef<Path>) -> Self {
        Blender {
            executable: executable.as_ref().to_path_buf(),
            version: None,
        }
    }

    /// Create a new blender struct from executable path. This function will fetch the version of blender by invoking --version.
    /// Otherwise, if Blender is not installed, or a version is not found, an error is returned.
    pub async fn from_executable(executable: impl AsRef<Path>) -> Result<Self, BlenderError> {
        let executable = executable.as_ref().to_path_buf();
        let output = Command::new(&executable)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BlenderError::Spawn {
                executable: executable.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = Self::parse_version(&stdout)
            .ok_or_else(|| BlenderError::Version(stdout.lines().next().unwrap_or("").to_owned()))?;

        Ok(Blender {
            executable,
            version: Some(version),
        })
    }

    /// Read the version from the first line of `blender --version`, e.g. "Blender 4.1.0".
    pub fn parse_version(stdout: &str) -> Option<Version> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let regex = PATTERN
            .get_or_init(|| Regex::new(r"Blender (\d+)\.(\d+)(?:\.(\d+))?").ok())
            .as_ref()?;

        let first = stdout.lines().next()?;
        let captures = regex.captures(first)?;
        let major = captures.get(1)?.as_str().parse().ok()?;
        let minor = captures.get(2)?.as_str().parse().ok()?;
        let patch = match captures.get(3) {
            Some(patch) => patch.as_str().parse().ok()?,
            None => 0,
        };
        Some(Version::new(major, minor, patch))
    }

    pub fn get_executable(&self) -> &Path {
        &self.executable
    }

    pub fn get_version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Run one job. The control script is written before the process starts and removed after it ends.
    pub async fn render(&self, args: &Args, timeout: Duration) -> Result<RenderReport, BlenderError> {
        let invocation = args.invocation(&self.executable);
        execute(&invocation, timeout).await
    }
}

impl PartialEq for Blender {
    fn eq(&self, other: &Self) -> bool {
        self.executable.eq(&other.executable) && self.version.eq(&other.version)
    }
}

/// Spawn `invocation` and wait for it, at most `limit`.
///
/// The limit covers both the process and the draining of its output pipes, so a descendant that
/// keeps the pipes open cannot hold the job past `limit`. On timeout the child is killed and
/// reaped before `Timeout` is returned. Dropping the returned future also kills the child, and
/// the control script is removed on every path.
pub async fn execute(invocation: &Invocation, limit: Duration) -> Result<RenderReport, BlenderError> {
    prepare(invocation).await?;
    let _script = ScriptGuard(&invocation.script_path);
    run(invocation, limit).await
}

/// Removes the control script when dropped, including when the render future is cancelled.
struct ScriptGuard<'a>(&'a Path);

impl Drop for ScriptGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(self.0) {
            debug!(path = %self.0.display(), error = %e, "Unable to remove control script");
        }
    }
}

async fn prepare(invocation: &Invocation) -> Result<(), BlenderError> {
    let path = &invocation.script_path;
    let to_error = |source| BlenderError::Script {
        path: path.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(to_error)?;
    }
    fs::create_dir_all(&invocation.working_dir)
        .await
        .map_err(to_error)?;
    fs::write(path, invocation.script_body.as_bytes())
        .await
        .map_err(to_error)
}

async fn run(invocation: &Invocation, limit: Duration) -> Result<RenderReport, BlenderError> {
    let started = Instant::now();
    let deadline = time::Instant::now() + limit;
    info!(
        program = %invocation.program.display(),
        args = ?invocation.args,
        working_dir = %invocation.working_dir.display(),
        "Executing blender command"
    );

    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| {
            error!(program = %invocation.program.display(), error = %source, "Failed to spawn blender");
            BlenderError::Spawn {
                executable: invocation.program.clone(),
                source,
            }
        })?;

    let mut stdout = tokio::spawn(read_stdout(child.stdout.take()));
    let mut stderr = tokio::spawn(read_stderr(child.stderr.take()));

    let status = match time::timeout_at(deadline, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            warn!(
                pid = child.id(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Blender exceeded its time limit, terminating"
            );
            // kill() also waits for the process, so nothing is left running
            if let Err(e) = child.kill().await {
                error!(error = %e, "Unable to terminate blender");
            }
            stdout.abort();
            stderr.abort();
            return Err(BlenderError::Timeout(limit));
        }
    };

    // the pipes stay open as long as any descendant of blender holds them
    let drained = time::timeout_at(deadline, async {
        ((&mut stdout).await, (&mut stderr).await)
    })
    .await;
    let (saved, stderr) = match drained {
        Ok((saved, stderr)) => (saved.unwrap_or_default(), stderr.unwrap_or_default()),
        Err(_) => {
            warn!(
                exit_code = status.code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Blender output still open at its time limit, giving up"
            );
            stdout.abort();
            stderr.abort();
            return Err(BlenderError::Timeout(limit));
        }
    };
    let elapsed = started.elapsed();

    if !status.success() {
        warn!(
            exit_code = status.code(),
            elapsed_ms = elapsed.as_millis() as u64,
            stderr = %stderr,
            "Blender render failed"
        );
        return Err(BlenderError::Failure {
            exit_code: status.code(),
            stderr,
        });
    }

    info!(
        exit_code = status.code(),
        elapsed_ms = elapsed.as_millis() as u64,
        saved = saved.len(),
        "Blender finished"
    );
    Ok(RenderReport {
        exit_code: status.code(),
        saved,
        stderr,
        elapsed,
    })
}

// Lines are read as bytes so invalid UTF-8 never stops draining the pipe.
async fn read_stdout(stdout: Option<impl AsyncRead + Unpin>) -> Vec<PathBuf> {
    let mut saved = Vec::new();
    let Some(stdout) = stdout else {
        return saved;
    };
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&buf);
        match Status::parse(&line) {
            Some(Status::Running { frame, status }) => debug!(?frame, "{status}"),
            Some(Status::Warning { message }) => warn!("{message}"),
            Some(Status::Error { message }) => error!("{message}"),
            Some(Status::Saved { result }) => {
                info!(path = %result.display(), "Blender saved output");
                saved.push(result);
            }
            Some(Status::Log { status }) => debug!("{status}"),
            None => {}
        }
    }
    saved
}

async fn read_stderr(stderr: Option<impl AsyncRead + Unpin>) -> String {
    let mut capture = String::new();
    let Some(stderr) = stderr else {
        return capture;
    };
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => push_bounded(&mut capture, &String::from_utf8_lossy(&buf), STDERR_CAPTURE_LIMIT),
        }
    }
    capture
}

/// Append `text`, then drop the oldest bytes so that at most `limit` bytes remain.
fn push_bounded(capture: &mut String, text: &str, limit: usize) {
    capture.push_str(text);
    if capture.len() <= limit {
        return;
    }
    let mut cut = capture.len() - limit;
    while !capture.is_char_boundary(cut) {
        cut += 1;
    }
    capture.drain(..cut);
}
