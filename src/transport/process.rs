use super::{Interpreter, OutputBuffer, Transport};
use crate::{
    Result,
    bridge::{FailureKind, InferenceRequest, InferenceResult},
    config::ProcessConfig,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

const READ_CHUNK_SIZE: usize = 4096;

/// Runs the retrieval script once per question: `<interpreter> <script> <prompt>`.
pub struct ProcessTransport {
    interpreter: Interpreter,
    script: PathBuf,
    working_dir: PathBuf,
    env: HashMap<String, String>,
}

impl ProcessTransport {
    pub fn new(config: &ProcessConfig) -> Result<Self> {
        let script = if config.script_path.is_absolute() {
            config.script_path.clone()
        } else {
            std::env::current_dir()?.join(&config.script_path)
        };
        let script = script.canonicalize().unwrap_or(script);
        let working_dir = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let interpreter = Interpreter::resolve(&working_dir, config.interpreter.as_deref());

        info!(
            "Interpreter in use: {} ({:?})",
            interpreter.program().display(),
            interpreter.source()
        );
        info!("Script: {}", script.display());
        if !script.is_file() {
            warn!("Script not found at {}", script.display());
        }

        Ok(Self {
            interpreter,
            script,
            working_dir,
            env: config.env.clone(),
        })
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(self.interpreter.program());
        cmd.arg(&self.script);
        cmd.arg(prompt);
        cmd.current_dir(&self.working_dir);
        cmd.env("PYTHONIOENCODING", "utf-8");
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn infer(&self, request: &InferenceRequest) -> InferenceResult {
        if !self.script.is_file() {
            error!("Script not found at {}", self.script.display());
            return InferenceResult::failure(
                FailureKind::Spawn,
                format!("script not found: {}", self.script.display()),
            );
        }

        let child = match self.command(&request.prompt()).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(
                    "Failed to spawn {}: {}",
                    self.interpreter.program().display(),
                    e
                );
                return InferenceResult::failure(
                    FailureKind::Spawn,
                    format!("failed to start interpreter: {}", e),
                );
            }
        };

        let mut child = ChildGuard::new(child);
        debug!("Spawned interpreter process {:?}", child.pid);

        match child.run_to_exit().await {
            Ok(output) => output.into_result(),
            Err(e) => InferenceResult::failure(
                FailureKind::Process,
                format!("failed to read interpreter output: {}", e),
            ),
        }
    }
}

/// Owns the child for the duration of one call. Dropping the guard before
/// the child has been reaped sends it a kill signal.
struct ChildGuard {
    child: Child,
    pid: Option<u32>,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            reaped: false,
        }
    }

    async fn run_to_exit(&mut self) -> io::Result<ProcessOutput> {
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not captured"))?;
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not captured"))?;

        let (stdout, stderr) = tokio::try_join!(read_stdout(stdout), read_stderr(stderr))?;
        let status = self.child.wait().await?;
        self.reaped = true;

        debug!("Interpreter process {:?} exited with {}", self.pid, status);

        Ok(ProcessOutput {
            status,
            stdout,
            stderr,
        })
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!("Terminating interpreter process {:?}", self.pid);
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to kill interpreter process {:?}: {}", self.pid, e);
        }
    }
}

async fn read_stdout(mut stdout: impl AsyncRead + Unpin) -> io::Result<OutputBuffer> {
    let mut buffer = OutputBuffer::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = stdout.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        debug!(
            "stdout: {}",
            String::from_utf8_lossy(&chunk[..n]).trim_end()
        );
        buffer.append(&chunk[..n]);
    }
    Ok(buffer)
}

// Lossy per line: undecodable diagnostics must not fail the call.
async fn read_stderr(stderr: impl AsyncRead + Unpin) -> io::Result<String> {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    let mut collected = String::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        debug!("stderr: {}", text.trim_end());
        collected.push_str(&text);
    }
    Ok(collected)
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: OutputBuffer,
    stderr: String,
}

impl ProcessOutput {
    fn into_result(self) -> InferenceResult {
        let status = self.status;
        let stderr = self.stderr;
        let answer = self.stdout.finish();

        if status.success() && !answer.is_empty() {
            return InferenceResult::success(answer);
        }

        error!("Interpreter failed or produced no output ({})", status);
        if !stderr.is_empty() {
            error!("stderr: {}", stderr.trim_end());
        }

        let detail = if status.success() {
            "interpreter produced no output".to_string()
        } else {
            format!("interpreter exited with {}", status)
        };
        InferenceResult::failure(FailureKind::Process, detail)
    }
}
