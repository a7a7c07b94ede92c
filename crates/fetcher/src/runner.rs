use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;
use crate::error::RunnerError;
use crate::job::CancelToken;

/// One external command invocation: program, ordered arguments, and the
/// wall-clock bound enforced while waiting on its output. Immutable,
/// constructed per stage.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        CommandSpec {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Loggable rendering of the full command line
    pub fn display_line(&self) -> String {
        format!("{} {}", self.program.display(), self.args.join(" "))
    }
}

/// Captured result of a non-streaming invocation
#[derive(Debug)]
pub struct CaptureOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CaptureOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Backstop so no child outlives its job even on abnormal exits
        .kill_on_drop(true);
    cmd
}

async fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill child process: {}", e);
    }
}

/// Run an external command, streaming its combined stdout/stderr to
/// `on_line` one line at a time as it arrives.
///
/// Fails with `Timeout` when neither an output line nor process exit
/// happens within `spec.timeout`, with `Failed` on a nonzero exit code,
/// and with `Cancelled` when the token fires mid-run. In every failure
/// path the child is killed before returning. The callback is invoked
/// synchronously and must not block for long or it stalls the stream.
pub async fn run_streaming<F>(spec: &CommandSpec, cancel: &CancelToken, mut on_line: F) -> Result<(), RunnerError>
where
    F: FnMut(&str),
{
    debug!("Executing: {}", spec.display_line());

    let mut child = build_command(spec).spawn().map_err(|e| RunnerError::Spawn {
        program: spec.program.display().to_string(),
        source: e,
    })?;

    // Merge both streams into one ordered line channel. Each reader task
    // owns one pipe; the channel closes when both hit EOF at process exit.
    let (tx, mut rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                kill_child(&mut child).await;
                return Err(RunnerError::Cancelled);
            }
            next = timeout(spec.timeout, rx.recv()) => match next {
                Err(_) => {
                    kill_child(&mut child).await;
                    return Err(RunnerError::Timeout { secs: spec.timeout.as_secs() });
                }
                Ok(Some(line)) => on_line(&line),
                // Both pipes closed: the process has exited (or closed its
                // output); collect the exit status below
                Ok(None) => break,
            }
        }
    }

    let status = match timeout(spec.timeout, child.wait()).await {
        Ok(res) => res?,
        Err(_) => {
            kill_child(&mut child).await;
            return Err(RunnerError::Timeout { secs: spec.timeout.as_secs() });
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::Failed {
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Run an external command to completion, capturing stdout and stderr.
/// Used for short interrogations like the metadata lookup; exit status
/// interpretation is left to the caller.
pub async fn run_capture(spec: &CommandSpec, cancel: &CancelToken) -> Result<CaptureOutput, RunnerError> {
    debug!("Executing (capture): {}", spec.display_line());

    let mut child = build_command(spec).spawn().map_err(|e| RunnerError::Spawn {
        program: spec.program.display().to_string(),
        source: e,
    })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    // Both pipes are drained concurrently; reading them one after the
    // other deadlocks once the unread pipe's buffer fills up
    let collect = async {
        let read_stdout = async {
            let mut buf = String::new();
            if let Some(ref mut pipe) = stdout_pipe {
                pipe.read_to_string(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let read_stderr = async {
            let mut buf = String::new();
            if let Some(ref mut pipe) = stderr_pipe {
                pipe.read_to_string(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let (stdout, stderr) = tokio::try_join!(read_stdout, read_stderr)?;
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, stdout, stderr))
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(RunnerError::Cancelled),
        collected = timeout(spec.timeout, collect) => match collected {
            Err(_) => Err(RunnerError::Timeout { secs: spec.timeout.as_secs() }),
            Ok(Err(e)) => Err(RunnerError::Io(e)),
            Ok(Ok((status, stdout, stderr))) => Ok(CaptureOutput {
                code: status.code().unwrap_or(-1),
                stdout,
                stderr,
            }),
        }
    }
}
