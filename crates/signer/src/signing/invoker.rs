use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

use super::command::SmimeCommand;
use super::content::Content;
use super::request::SignRequest;
use crate::error::{InputField, SignError};

const DEFAULT_PROGRAM: &str = "openssl";
const PIPE_CHUNK_SIZE: usize = 64 * 1024;

/// What is known about the signing tool once it has exited.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: Option<u32>,
    pub status: ExitStatus,
    /// Whatever the tool printed on stderr, lossily decoded.
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct SignResult {
    /// Complete stdout of the tool, in arrival order.
    pub output: Bytes,
    pub process: ProcessInfo,
}

/// Runs `openssl smime -sign` once per request.
///
/// Holds configuration only, so one invoker can serve any number of
/// concurrent calls; each call owns its own child process and buffers.
#[derive(Debug, Clone)]
pub struct SigningInvoker {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for SigningInvoker {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            timeout: None,
        }
    }
}

impl SigningInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executable to run instead of `openssl` from `PATH`.
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Kill the tool and fail with [`SignError::Timeout`] if it has not
    /// exited within `limit`.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn program_path(&self) -> &Path {
        &self.program
    }

    /// Sign `request.content`, resolving once the tool has exited.
    pub async fn sign(&self, request: SignRequest) -> Result<SignResult, SignError> {
        let (command, content) = prepare(request)?;

        debug!(program = %self.program.display(), ?command, "spawning signing tool");
        let mut child = Command::new(&self.program)
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SignError::Spawn)?;
        let pid = child.id();

        let completed = match self.timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, drive(&mut child, content)).await;
                match outcome {
                    Ok(completed) => completed?,
                    Err(_) => {
                        warn!(?pid, ?limit, "signing tool timed out, killing it");
                        terminate(&mut child).await;
                        return Err(SignError::Timeout(limit));
                    }
                }
            }
            None => drive(&mut child, content).await?,
        };

        let Completed { status, output, stderr } = completed;
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            warn!(?pid, %status, stderr = stderr.trim(), "signing tool failed");
            return Err(SignError::ProcessFailed {
                code: status.code(),
                stderr,
            });
        }

        debug!(?pid, output_len = output.len(), "signing tool finished");
        Ok(SignResult {
            output: Bytes::from(output),
            process: ProcessInfo { pid, status, stderr },
        })
    }
}

/// Sign with the default invoker: `openssl` from `PATH`, no timeout.
pub async fn sign(request: SignRequest) -> Result<SignResult, SignError> {
    SigningInvoker::default().sign(request).await
}

/// Checks required fields in order and builds the argument vector.
fn prepare(request: SignRequest) -> Result<(SmimeCommand, Content), SignError> {
    let SignRequest {
        content,
        key,
        cert,
        password,
        output_format,
        opaque,
    } = request;

    let content = content
        .filter(|c| !c.is_empty())
        .ok_or(SignError::InvalidInput(InputField::Content))?;
    let key = key
        .filter(|k| !k.as_os_str().is_empty())
        .ok_or(SignError::InvalidInput(InputField::Key))?;
    let cert = cert
        .filter(|c| !c.as_os_str().is_empty())
        .ok_or(SignError::InvalidInput(InputField::Certificate))?;

    let command = SmimeCommand::new(cert, key)
        .output_format(output_format)
        .password(password)
        .opaque(opaque);

    Ok((command, content))
}

struct Completed {
    status: ExitStatus,
    output: Vec<u8>,
    stderr: Vec<u8>,
}

/// Pumps stdin, stdout and stderr concurrently and reaps the child.
///
/// The process side decides when the call ends: once the child has exited
/// and both output pipes are at EOF, any content not yet written is
/// abandoned, even if its source is still open.
async fn drive(child: &mut Child, content: Content) -> Result<Completed, SignError> {
    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let outcome = {
        let process = async {
            let (output, stderr) = tokio::try_join!(collect(stdout), collect(stderr))?;
            let status = child.wait().await.map_err(SignError::Io)?;
            Ok::<_, SignError>(Completed { status, output, stderr })
        };
        let mut process = pin!(process);
        let mut feeding = pin!(feed(content, stdin));
        let mut fed = false;

        loop {
            tokio::select! {
                completed = &mut process => break completed,
                result = &mut feeding, if !fed => match result {
                    Ok(()) => fed = true,
                    Err(err) => break Err(err),
                },
            }
        }
    };

    match outcome {
        Ok(completed) => Ok(completed),
        Err(err) => {
            warn!(pid = ?child.id(), error = %err, "aborting signing tool");
            terminate(child).await;
            Err(err)
        }
    }
}

/// Copies all of `content` into the child's stdin and closes it.
///
/// A broken pipe means the child stopped reading; its exit status decides
/// the outcome, so the rest of the content is dropped silently.
async fn feed(content: Content, mut stdin: ChildStdin) -> Result<(), SignError> {
    let mut reader = content.into_reader();
    let mut buf = vec![0u8; PIPE_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await.map_err(SignError::Stream)?;
        if n == 0 {
            break;
        }
        if let Err(err) = stdin.write_all(&buf[..n]).await {
            return closed_early(err);
        }
    }

    if let Err(err) = stdin.shutdown().await {
        return closed_early(err);
    }
    Ok(())
}

fn closed_early(err: io::Error) -> Result<(), SignError> {
    if err.kind() == io::ErrorKind::BrokenPipe {
        debug!("signing tool closed stdin before all content was written");
        Ok(())
    } else {
        Err(SignError::Io(err))
    }
}

async fn collect<R>(mut pipe: R) -> Result<Vec<u8>, SignError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).await.map_err(SignError::Io)?;
    Ok(buf)
}

async fn terminate(child: &mut Child) {
    if let Err(err) = child.kill().await {
        warn!(pid = ?child.id(), error = %err, "failed to kill signing tool");
    }
}

fn missing_pipe(name: &str) -> SignError {
    SignError::Io(io::Error::other(format!("{name} of signing tool was not captured")))
}
