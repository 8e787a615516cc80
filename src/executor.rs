//! Shell command execution.
//!
//! The runner only needs one capability from the outside world: run a command
//! to completion, stream what it prints, and say how it ended. That capability
//! is the [`Executor`] trait. [`ShellExecutor`] implements it with real child
//! processes; tests substitute scripted executors.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ExecError;
use crate::events::{Event, Slot};
use crate::output::{OutputHistory, StreamKind};
use crate::process::ProcessExit;

/// How long output readers may keep running once the process has exited.
/// A background child that inherited stdout can hold the pipe open forever.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Runs a single command to completion.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `command` with no timeout.
    ///
    /// Implementations report the pid and every chunk of output through
    /// `sink` before returning. Nothing may be sent through `sink` after
    /// the call returns.
    async fn execute(
        &self,
        command: &str,
        cwd: Option<&Path>,
        sink: OutputSink,
    ) -> Result<ProcessExit, ExecError>;
}

/// Where an executor reports progress for one handle.
#[derive(Debug, Clone)]
pub struct OutputSink {
    slot: Slot,
    tx: mpsc::Sender<Event>,
}

impl OutputSink {
    pub fn new(slot: Slot, tx: mpsc::Sender<Event>) -> Self {
        Self { slot, tx }
    }

    /// Reports the OS pid of the spawned process.
    pub async fn started(&self, pid: u32) {
        let _ = self
            .tx
            .send(Event::ProcessStarted {
                slot: self.slot,
                pid,
            })
            .await;
    }

    /// Reports one chunk of output.
    pub async fn output(&self, text: impl Into<String>, stream: StreamKind) {
        let _ = self
            .tx
            .send(Event::ProcessOutput {
                slot: self.slot,
                text: text.into(),
                stream,
            })
            .await;
    }
}

/// Platform shell used to interpret command strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// The shell executable (e.g., "sh" or "cmd.exe").
    pub program: String,
    /// Arguments placed before the command string (e.g., ["-c"] or ["/C"]).
    pub args: Vec<String>,
}

#[cfg(unix)]
impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }
}

#[cfg(windows)]
impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "cmd.exe".to_string(),
            args: vec!["/C".to_string()],
        }
    }
}

impl ShellConfig {
    /// Parses a shell override such as `"bash -lc"`.
    pub fn parse(raw: &str) -> Result<Self, ExecError> {
        let mut parts = shell_words::split(raw).map_err(|err| ExecError::InvalidShell {
            shell: raw.to_string(),
            reason: err.to_string(),
        })?;
        if parts.is_empty() {
            return Err(ExecError::InvalidShell {
                shell: raw.to_string(),
                reason: "no program given".to_string(),
            });
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }

    fn command(&self, script: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(script);
        command
    }
}

/// Executes commands through the host shell.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    shell: ShellConfig,
    env: HashMap<String, String>,
}

impl ShellExecutor {
    pub fn new(shell: ShellConfig) -> Self {
        Self {
            shell,
            env: HashMap::new(),
        }
    }

    /// Adds environment variables passed to every command.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(
        &self,
        command: &str,
        cwd: Option<&Path>,
        sink: OutputSink,
    ) -> Result<ProcessExit, ExecError> {
        let mut process = self.shell.command(command);
        if let Some(cwd) = cwd {
            process.current_dir(cwd);
        }
        if !self.env.is_empty() {
            process.envs(&self.env);
        }
        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = process.spawn().map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;
        if let Some(pid) = child.id() {
            debug!(pid, command, "spawned");
            sink.started(pid).await;
        }

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(read_stream(
                StreamKind::Stdout,
                stdout,
                sink.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(read_stream(
                StreamKind::Stderr,
                stderr,
                sink.clone(),
            )));
        }

        let status = child.wait().await.map_err(|source| ExecError::Io {
            command: command.to_string(),
            source,
        })?;
        // Output must be fully delivered before the caller reports the exit.
        for mut reader in readers {
            if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
                warn!(command, "output still open after exit, detaching");
                reader.abort();
                let _ = reader.await;
            }
        }
        Ok(ProcessExit::from(status))
    }
}

// Lines are split on raw bytes so invalid UTF-8 never stops the reader.
// The pipe is drained to EOF either way: a closed pipe would kill the child
// with SIGPIPE.
async fn read_stream<R>(stream: StreamKind, reader: R, sink: OutputSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => sink.output(decode_line(&buf), stream).await,
            Err(err) => {
                debug!(error = %err, "output stream failed, draining");
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                return;
            }
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Result of running one command outside a parallel run.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit: ProcessExit,
    /// Captured output, closed by the exit marker.
    pub output: OutputHistory,
}

impl CommandOutcome {
    pub fn exit_code(&self) -> i32 {
        self.exit.exit_code()
    }

    pub fn success(&self) -> bool {
        self.exit.success()
    }
}

/// Runs one command to completion and collects its output.
pub async fn run_command(
    executor: &dyn Executor,
    command: &str,
    cwd: Option<&Path>,
) -> Result<CommandOutcome, ExecError> {
    let (tx, mut rx) = mpsc::channel(64);
    let sink = OutputSink::new(Slot::new(0, 0), tx);
    let collect = async {
        let mut output = OutputHistory::new();
        while let Some(event) = rx.recv().await {
            if let Event::ProcessOutput { text, stream, .. } = event {
                output.push_text(text, stream);
            }
        }
        output
    };
    let (exit, mut output) = tokio::join!(executor.execute(command, cwd, sink), collect);
    let exit = exit?;
    output.push_exit(exit.exit_code());
    Ok(CommandOutcome {
        exit,
        output,
    })
}

/// Like [`run_command`], but hands a failed outcome to `on_error`.
///
/// `on_error` decides whether the failure is fatal by returning an error.
pub async fn run_checked<F, E>(
    executor: &dyn Executor,
    command: &str,
    cwd: Option<&Path>,
    on_error: F,
) -> Result<CommandOutcome, E>
where
    F: FnOnce(&CommandOutcome) -> Result<(), E>,
    E: From<ExecError>,
{
    let outcome = run_command(executor, command, cwd).await?;
    if !outcome.success() {
        on_error(&outcome)?;
    }
    Ok(outcome)
}
