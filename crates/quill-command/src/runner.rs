//! Running command lines.
//!
//! [`CommandRunner`] is the seam between the plugin and the operating system;
//! tests substitute their own implementation. [`ShellRunner`] hands each line
//! to a shell, so pipes and redirections work as written. On unix the shell
//! leads its own process group, and a timeout kills the whole group.

use std::io::{self, PipeReader, Read};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::CommandConfig;
use crate::error::CommandError;

/// Executes one command line and returns its combined output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `line`, returning its interleaved stdout and stderr on success.
    async fn run(&self, line: &str) -> Result<String, CommandError>;
}

/// Runs lines as `<shell> -c <line>`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    timeout: Option<Duration>,
}

impl ShellRunner {
    /// Creates a runner using `shell` with no time limit.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout: None,
        }
    }

    /// Sets the per-command time limit.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(config.shell.clone()).with_timeout(config.timeout())
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::from_config(&CommandConfig::default())
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, line: &str) -> Result<String, CommandError> {
        let spawn_err = |e: io::Error| CommandError::Spawn {
            command: line.to_string(),
            reason: e.to_string(),
        };

        // One pipe for both streams keeps stdout and stderr in write order.
        let (reader, writer) = io::pipe().map_err(spawn_err)?;
        let mut child = {
            let mut command = Command::new(&self.shell);
            command
                .arg("-c")
                .arg(line)
                .stdin(Stdio::null())
                .stdout(writer.try_clone().map_err(spawn_err)?)
                .stderr(writer)
                .kill_on_drop(true);
            #[cfg(unix)]
            command.process_group(0);
            command.spawn().map_err(spawn_err)?
        };
        let pid = child.id();

        let collected = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, collect_output(&mut child, reader)).await {
                    Ok(collected) => collected,
                    Err(_) => {
                        kill_process_group(pid);
                        return Err(CommandError::Timeout {
                            command: line.to_string(),
                            timeout: limit,
                        });
                    }
                }
            }
            None => collect_output(&mut child, reader).await,
        };
        let (status, output) = collected.map_err(spawn_err)?;
        let combined = String::from_utf8_lossy(&output).into_owned();

        debug!(command = %line, status = %status, bytes = combined.len(), "Command finished");

        if status.success() {
            Ok(combined)
        } else {
            Err(CommandError::Failed {
                command: line.to_string(),
                status: describe_status(status),
                output: combined,
            })
        }
    }
}

/// Waits for the shell and drains the shared pipe until every writer closes.
async fn collect_output(
    child: &mut Child,
    mut reader: PipeReader,
) -> io::Result<(ExitStatus, Vec<u8>)> {
    let drain = tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map(|_| buf)
    });
    let status = child.wait().await?;
    let output = drain.await.map_err(io::Error::other)??;
    Ok((status, output))
}

/// Kills the process group led by the shell, taking its descendants with it.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "Failed to kill command process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {signal}");
        }
    }
    status.to_string()
}
