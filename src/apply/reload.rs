//! Reload mechanisms for the external HAProxy process.
//!
//! # Responsibilities
//! - Ask HAProxy to adopt the freshly written configuration
//! - Bound every attempt with a timeout
//! - Turn failures into `LbaasError::Apply` with captured output
//!
//! # Design Decisions
//! - One attempt per call, no retries here
//! - Command output is drained on its own tasks, so a timed-out command is
//!   killed and still reports what it printed before the deadline
//! - The master CLI socket gives a structured `Success=1|0` answer and is
//!   preferred over shelling out when HAProxy runs in master-worker mode

use serde::{Deserialize, Serialize};
use std::future::Future;
#[cfg(unix)]
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
#[cfg(unix)]
use tokio::io::AsyncWriteExt;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::schema::{ReloadConfig, ReloadMechanism};
use crate::error::{LbaasError, LbaasResult};

/// What the reload mechanism reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Something that can make HAProxy reread its configuration file.
pub trait ReloadInvoker: Send + Sync + 'static {
    /// Perform one reload attempt.
    fn reload(&self) -> impl Future<Output = LbaasResult<ReloadOutput>> + Send;

    /// Human readable description used in logs.
    fn describe(&self) -> String;
}

/// Runs a service-manager command such as `service haproxy restart`.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandInvoker {
    /// Build from an argv vector. The first element is the program.
    pub fn new(argv: Vec<String>, timeout: Duration) -> LbaasResult<Self> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LbaasError::Validation("reload command is empty".to_string()))?;
        Ok(Self {
            program,
            args: argv.collect(),
            timeout,
        })
    }
}

/// How long a killed command gets to exit and flush its pipes.
const KILL_GRACE: Duration = Duration::from_millis(100);

/// A child pipe drained into a buffer by a background task.
struct PipeCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeCapture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buffer, task }
    }

    /// Whatever was read by `until`. A pipe still held open by a
    /// grandchild is abandoned at that point.
    async fn collect(mut self, until: Instant) -> String {
        if timeout_at(until, &mut self.task).await.is_err() {
            self.task.abort();
        }
        let bytes = self.buffer.lock().await;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text
    }
}

impl ReloadInvoker for CommandInvoker {
    async fn reload(&self) -> LbaasResult<ReloadOutput> {
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LbaasError::apply(format!("failed to spawn {}: {}", self.program, e)))?;

        let stdout = PipeCapture::spawn(child.stdout.take());
        let stderr = PipeCapture::spawn(child.stderr.take());

        let waited = timeout_at(deadline, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(LbaasError::apply(format!(
                    "failed to wait for {}: {}",
                    self.program, e
                )))
            }
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(command = %self.describe(), error = %e, "Failed to kill reload command");
                }
                let _ = timeout(KILL_GRACE, child.wait()).await;
                let grace = Instant::now() + KILL_GRACE;
                return Err(LbaasError::Apply {
                    reason: format!("{} timed out after {:?}", self.describe(), self.timeout),
                    exit_code: None,
                    stdout: stdout.collect(grace).await,
                    stderr: stderr.collect(grace).await,
                });
            }
        };

        let drain = deadline.max(Instant::now() + KILL_GRACE);
        let exit_code = status.code();
        let stdout = stdout.collect(drain).await;
        let stderr = stderr.collect(drain).await;

        if status.success() {
            Ok(ReloadOutput {
                exit_code,
                stdout,
                stderr,
            })
        } else {
            Err(LbaasError::Apply {
                reason: format!("{} exited with {}", self.describe(), status),
                exit_code,
                stdout,
                stderr,
            })
        }
    }

    fn describe(&self) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.args.iter().map(String::as_str));
        format!("`{}`", parts.join(" "))
    }
}

/// Talks to the HAProxy master CLI (`-S` socket) and issues `reload`.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct MasterSocketInvoker {
    socket_path: PathBuf,
    timeout: Duration,
}

#[cfg(unix)]
impl MasterSocketInvoker {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    async fn exchange(&self) -> std::io::Result<String> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        stream.write_all(b"reload\n").await?;
        stream.shutdown().await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        Ok(response)
    }
}

#[cfg(unix)]
impl ReloadInvoker for MasterSocketInvoker {
    async fn reload(&self) -> LbaasResult<ReloadOutput> {
        match timeout(self.timeout, self.exchange()).await {
            Ok(Ok(response)) => parse_master_response(&response),
            Ok(Err(e)) => Err(LbaasError::apply(format!(
                "master socket {}: {}",
                self.socket_path.display(),
                e
            ))),
            Err(_) => Err(LbaasError::apply(format!(
                "master socket {} timed out after {:?}",
                self.socket_path.display(),
                self.timeout
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("master socket {}", self.socket_path.display())
    }
}

/// Parse the answer to `reload`:
///
/// ```text
/// Success=1
/// --
/// <startup logs>
/// ```
#[cfg(unix)]
fn parse_master_response(response: &str) -> LbaasResult<ReloadOutput> {
    let mut lines = response.lines();
    let status = lines.next().map(str::trim).unwrap_or_default();
    let logs: String = lines
        .skip_while(|l| l.trim() == "--")
        .map(|l| format!("{}\n", l))
        .collect();

    match status {
        "Success=1" => Ok(ReloadOutput {
            exit_code: Some(0),
            stdout: logs,
            stderr: String::new(),
        }),
        "Success=0" => Err(LbaasError::Apply {
            reason: "haproxy rejected the reload".to_string(),
            exit_code: Some(1),
            stdout: logs,
            stderr: String::new(),
        }),
        other => Err(LbaasError::Apply {
            reason: format!("unexpected master CLI response: {:?}", other),
            exit_code: None,
            stdout: response.to_string(),
            stderr: String::new(),
        }),
    }
}

/// Invoker selected from configuration.
#[derive(Debug, Clone)]
pub enum Invoker {
    Command(CommandInvoker),
    #[cfg(unix)]
    MasterSocket(MasterSocketInvoker),
    /// Write the artifact but never touch the process.
    Disabled,
}

impl Invoker {
    pub fn from_config(config: &ReloadConfig) -> LbaasResult<Self> {
        let limit = Duration::from_secs(config.timeout_secs);
        Ok(match config.mechanism {
            ReloadMechanism::Command => {
                Invoker::Command(CommandInvoker::new(config.command.clone(), limit)?)
            }
            #[cfg(unix)]
            ReloadMechanism::MasterSocket => {
                Invoker::MasterSocket(MasterSocketInvoker::new(config.master_socket.clone(), limit))
            }
            #[cfg(not(unix))]
            ReloadMechanism::MasterSocket => {
                return Err(LbaasError::Validation(
                    "the master socket reload needs a unix platform".to_string(),
                ))
            }
            ReloadMechanism::Disabled => Invoker::Disabled,
        })
    }
}

impl ReloadInvoker for Invoker {
    async fn reload(&self) -> LbaasResult<ReloadOutput> {
        match self {
            Invoker::Command(invoker) => invoker.reload().await,
            #[cfg(unix)]
            Invoker::MasterSocket(invoker) => invoker.reload().await,
            Invoker::Disabled => Ok(ReloadOutput::default()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Invoker::Command(invoker) => invoker.describe(),
            #[cfg(unix)]
            Invoker::MasterSocket(invoker) => invoker.describe(),
            Invoker::Disabled => "disabled".to_string(),
        }
    }
}
