//! External command execution.
//!
//! Everything the workflow runs outside the process (package manager,
//! toolchain installer, `make`, `git clone`) goes through [`CommandExecutor`].
//! [`SystemExecutor`] runs real programs with `tokio::process`.

use crate::error::{ExecError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

/// What happens to a child's stdout and stderr
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect both streams into the [`CommandOutput`]
    Capture,
    /// Let the child write straight to the terminal
    Inherit,
    /// Print both streams live and append them to a log file
    Tee(PathBuf),
}

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory, inherited when `None`
    pub cwd: Option<PathBuf>,
    /// Variables set on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Output handling
    pub output: OutputMode,
}

impl CommandSpec {
    /// Start describing a command
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            output: OutputMode::Inherit,
        }
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run inside `dir`
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set environment variables for the child
    pub fn envs(mut self, vars: &[(String, String)]) -> Self {
        self.env.extend(vars.iter().cloned());
        self
    }

    /// Choose the output mode
    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }

    /// Whether any argument equals `arg`
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured stdout (empty unless [`OutputMode::Capture`])
    pub stdout: String,
    /// Captured stderr (empty unless [`OutputMode::Capture`])
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code
    pub fn failed(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    /// Exit code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable exit status
    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => code.to_string(),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs on behalf of the workflow
#[allow(async_fn_in_trait)]
pub trait CommandExecutor {
    /// Resolve a program on `search_path`, or the inherited `PATH` when `None`
    fn locate(&self, program: &str, search_path: Option<&str>) -> Option<PathBuf>;

    /// Run a command to completion. A non-zero exit is not an error here.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Executor backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn locate(&self, program: &str, search_path: Option<&str>) -> Option<PathBuf> {
        match search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(program, Some(paths), cwd).ok()
            }
            None => which::which(program).ok(),
        }
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        log::debug!("Running: {spec}");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        match &spec.output {
            OutputMode::Capture => {
                let output = cmd.output().await.map_err(|source| ExecError::Spawn {
                    command: spec.to_string(),
                    source,
                })?;
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            OutputMode::Inherit => {
                let status = cmd.status().await.map_err(|source| ExecError::Spawn {
                    command: spec.to_string(),
                    source,
                })?;
                Ok(CommandOutput {
                    code: status.code(),
                    ..CommandOutput::default()
                })
            }
            OutputMode::Tee(log_path) => run_tee(spec, cmd, log_path).await,
        }
    }
}

/// Stream stdout and stderr line by line to the terminal and the log file.
///
/// Lines are handled as raw bytes: the log gets them unchanged, the terminal
/// gets a lossy UTF-8 rendering.
async fn run_tee(spec: &CommandSpec, mut cmd: Command, log_path: &Path) -> Result<CommandOutput> {
    let wait_err = |source: std::io::Error| ExecError::Wait {
        command: spec.to_string(),
        source,
    };

    let mut log = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await?;

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            command: spec.to_string(),
            source,
        })?;

    // Both streams feed one channel so the log keeps the interleaving make produced.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump_lines(stderr, tx.clone(), Stream::Stderr));
    }
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump_lines(stdout, tx.clone(), Stream::Stdout));
    }
    drop(tx);

    // A failing log write must not stop the drain, or the child dies on SIGPIPE.
    let mut log_error = None;
    while let Some(line) = rx.recv().await {
        if log_error.is_none()
            && let Err(e) = log.write_all(&line).await
        {
            log::warn!("Writing {} failed: {}", log_path.display(), e);
            log_error = Some(e);
        }
    }
    if log_error.is_none()
        && let Err(e) = log.flush().await
    {
        log_error = Some(e);
    }

    let status = child.wait().await.map_err(wait_err)?;
    if let Some(e) = log_error {
        return Err(wait_err(e).into());
    }
    Ok(CommandOutput {
        code: status.code(),
        ..CommandOutput::default()
    })
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Echo every line of `reader` and forward it, newline-terminated, to `tx`.
///
/// Reads until EOF even after the receiver is gone.
async fn pump_lines<R>(reader: R, tx: UnboundedSender<Vec<u8>>, stream: Stream)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let text = text.trim_end_matches(['\r', '\n']);
                match stream {
                    Stream::Stdout => println!("{text}"),
                    Stream::Stderr => eprintln!("{text}"),
                }
                if !buf.ends_with(b"\n") {
                    buf.push(b'\n');
                }
                let _ = tx.send(buf.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Reading child {stream:?} failed: {e}");
                break;
            }
        }
    }
}

/// Last `count` lines of a log file; empty when the file is missing.
pub async fn read_log_tail(path: &Path, count: usize) -> Vec<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let lines: Vec<&str> = content.lines().collect();
            let start = lines.len().saturating_sub(count);
            lines[start..].iter().map(|l| l.to_string()).collect()
        }
        Err(_) => Vec::new(),
    }
}
