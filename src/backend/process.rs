use crate::config::Tools;
use crate::util::expand_tilde;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("failed to spawn {exe}: {message}")]
    Spawn { exe: String, message: String },

    #[error("{exe} exceeded timeout ({timeout:?}); stderr: {stderr}")]
    TimedOut {
        exe: String,
        timeout: Duration,
        stderr: String,
    },

    #[error("{exe} exited with {code:?}: {stderr}")]
    Exit {
        exe: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{exe}: {message}")]
    Io { exe: String, message: String },
}

impl CommandError {
    /// Text the classifier matches against.
    pub fn diagnostic(&self) -> &str {
        match self {
            CommandError::Spawn { message, .. } | CommandError::Io { message, .. } => message,
            CommandError::TimedOut { stderr, .. } | CommandError::Exit { stderr, .. } => stderr,
        }
    }
}

/// Runs external CLIs with the configured environment and a hard timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
    keep_stderr: bool,
}

impl CommandRunner {
    pub fn new(tools: &Tools, keep_stderr: bool) -> Self {
        let mut env: Vec<(String, String)> = tools
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !tools.kubeconfig.trim().is_empty() {
            let path = expand_tilde(tools.kubeconfig.trim());
            env.push(("KUBECONFIG".into(), path.display().to_string()));
        }
        let timeout = (tools.command_timeout_seconds > 0)
            .then(|| Duration::from_secs(tools.command_timeout_seconds));
        Self {
            env,
            timeout,
            keep_stderr,
        }
    }

    pub fn run(&self, exe: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        self.run_with_timeout(exe, args, self.timeout)
    }

    pub fn run_with_timeout(
        &self,
        exe: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        debug!("exec {} {} timeout={:?}", exe, args.join(" "), timeout);
        let mut cmd = Command::new(resolve_exe(exe));
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|e| CommandError::Spawn {
            exe: exe.to_string(),
            message: e.to_string(),
        })?;

        let (status, stdout, stderr) = wait_with_timeout(&mut child, exe, timeout)?;
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            return Err(CommandError::Exit {
                exe: exe.to_string(),
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        if self.keep_stderr && !stderr.trim().is_empty() {
            debug!("{} stderr: {}", exe, stderr.trim());
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

fn resolve_exe(raw: &str) -> PathBuf {
    expand_tilde(raw.trim())
}

type Collected = (ExitStatus, Vec<u8>, Vec<u8>);
type Reader = JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Reader {
    std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn io_error(exe: &str, message: String) -> CommandError {
    CommandError::Io {
        exe: exe.to_string(),
        message,
    }
}

fn join_reader(h: Reader, exe: &str, which: &str) -> Result<Vec<u8>, CommandError> {
    h.join()
        .map_err(|_| io_error(exe, format!("{which} reader thread panicked")))?
        .map_err(|e| io_error(exe, format!("read {which}: {e}")))
}

/// Kills and reaps the child, then drains both readers. Returns captured stderr.
fn kill_and_reap(child: &mut Child, exe: &str, stdout: Reader, stderr: Reader) -> String {
    if let Err(e) = child.kill() {
        debug!("kill {exe}: {e}");
    }
    if let Err(e) = child.wait() {
        warn!("reaping {exe}: {e}");
    }
    let _ = join_reader(stdout, exe, "stdout");
    let stderr = join_reader(stderr, exe, "stderr").unwrap_or_default();
    String::from_utf8_lossy(&stderr).trim().to_string()
}

fn wait_with_timeout(
    child: &mut Child,
    exe: &str,
    timeout: Option<Duration>,
) -> Result<Collected, CommandError> {
    // Drain pipes while waiting so chatty CLIs can't deadlock on a full buffer.
    let stdout_thread = spawn_reader(child.stdout.take());
    let stderr_thread = spawn_reader(child.stderr.take());

    let start = Instant::now();
    loop {
        let exited = match child.try_wait() {
            Ok(exited) => exited,
            Err(e) => {
                kill_and_reap(child, exe, stdout_thread, stderr_thread);
                return Err(io_error(exe, format!("try_wait: {e}")));
            }
        };
        if let Some(status) = exited {
            let stdout = join_reader(stdout_thread, exe, "stdout")?;
            let stderr = join_reader(stderr_thread, exe, "stderr")?;
            return Ok((status, stdout, stderr));
        }

        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                warn!("{} timed out after {:?}", exe, limit);
                let stderr = kill_and_reap(child, exe, stdout_thread, stderr_thread);
                return Err(CommandError::TimedOut {
                    exe: exe.to_string(),
                    timeout: limit,
                    stderr,
                });
            }
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
