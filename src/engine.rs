//! Thin driver around the `sqlite3` command-line shell.
//!
//! Nothing here understands the database file. Scripts are written to the
//! shell's stdin, batches are streamed into `.import`, and the exit status
//! decides success.

use core::fmt;
use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tokio::{io::AsyncWriteExt, process::Command};

// Batches are written in slices of this size so a failed copy can report how
// far it got.
const COPY_CHUNK: usize = 1 << 20;

#[derive(Debug)]
pub enum EngineError {
    Spawn(PathBuf, std::io::Error),
    StdinUnavailable,
    Output(std::io::Error),
    Exit {
        status: ExitStatus,
        output: String,
        written: u64,
    },
    Copy {
        written: u64,
        source: std::io::Error,
    },
}

impl EngineError {
    /// Bytes handed to the shell before the failure.
    pub fn written(&self) -> u64 {
        match self {
            Self::Exit { written, .. } | Self::Copy { written, .. } => *written,
            _ => 0,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(binary, e) => write!(f, "cannot start {}: {}", binary.display(), e),
            Self::StdinUnavailable => write!(f, "stdin pipe of sqlite3 unavailable"),
            Self::Output(e) => write!(f, "collecting sqlite3 output failed: {}", e),
            Self::Exit { status, output, .. } => {
                write!(f, "exec failed: {}", status)?;
                let output = output.trim();
                if !output.is_empty() {
                    write!(f, ": {}", output)?;
                }
                Ok(())
            }
            Self::Copy { written, source } => {
                write!(f, "copy failed after {} bytes: {}", written, source)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(_, e) | Self::Output(e) | Self::Copy { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// The import control script, living in a temporary file for as long as
/// this value does.
pub struct ControlScript {
    file: NamedTempFile,
}

impl ControlScript {
    pub fn new(contents: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("sqlikv-")
            .suffix(".sql")
            .tempfile()
            .context("creating control script")?;
        file.write_all(contents.as_bytes())
            .context("writing control script")?;
        file.flush().context("writing control script")?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

pub struct Sqlite3 {
    binary: PathBuf,
    database: PathBuf,
}

impl Sqlite3 {
    pub fn new(binary: impl Into<PathBuf>, database: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            database: database.into(),
        }
    }

    /// Run `script` against the database and log `message` once it succeeded.
    pub async fn run_script(&self, script: &str, message: &str) -> Result<(), EngineError> {
        let command = self.command(None);
        self.feed(command, script.as_bytes()).await?;
        tracing::info!("[ok] {} -- {}", message, self.database.display());
        Ok(())
    }

    /// Stream `batch` into the `map` table through `.import`, configured by
    /// the control script. Returns the number of bytes handed to the shell.
    pub async fn import(&self, batch: &[u8], control: &ControlScript) -> Result<u64, EngineError> {
        let command = self.command(Some(control.path()));
        self.feed(command, batch).await
    }

    // `-bail` makes the shell exit non-zero on the first failed statement,
    // including ones in the `--init` file, which would otherwise exit 0.
    fn command(&self, init: Option<&Path>) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("-bail");
        if let Some(init) = init {
            command.arg("--init").arg(init);
        }
        command.arg(&self.database);
        command
    }

    // Copy `input` into the child's stdin while waiting for it to exit. The
    // exit status takes precedence over copy errors: a shell that died early
    // also breaks the pipe.
    async fn feed(&self, mut command: Command, input: &[u8]) -> Result<u64, EngineError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(self.binary.clone(), e))?;
        let mut stdin = child.stdin.take().ok_or(EngineError::StdinUnavailable)?;

        let copy = async move {
            let mut written = 0u64;
            for chunk in input.chunks(COPY_CHUNK) {
                if let Err(e) = stdin.write_all(chunk).await {
                    return (written, Err(e));
                }
                written += chunk.len() as u64;
            }
            // closing the pipe is the shell's end of input
            let closed = stdin.shutdown().await;
            drop(stdin);
            (written, closed)
        };
        let ((written, copied), output) = tokio::join!(copy, child.wait_with_output());

        let output = output.map_err(EngineError::Output)?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(EngineError::Exit {
                status: output.status,
                output: combined,
                written,
            });
        }
        copied.map_err(|source| EngineError::Copy { written, source })?;
        tracing::debug!(
            "{} accepted {} bytes ({})",
            self.binary.display(),
            written,
            humansize::format_size(written, humansize::BINARY)
        );
        Ok(written)
    }
}
