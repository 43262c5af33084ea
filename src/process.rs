//! External process invocation
//!
//! Every external job is described by an [`Invocation`] and executed by a
//! [`ProcessRunner`]. Execution is synchronous: one child at a time, blocking
//! until it exits. Exit status is the only failure signal; nothing is
//! retried.
//!
//! Without a timeout the child stays in specbench's process group, so a
//! terminal Ctrl-C reaches it directly. With a timeout it gets its own group
//! and the whole group is killed when the deadline passes. Signals sent to
//! specbench alone are forwarded to the child (or its group).

use crate::error::{BenchError, Result};
use crate::signal;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting on a child
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time between the first signal and SIGKILL
const KILL_GRACE: Duration = Duration::from_secs(5);

/// A fully built external command
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Method or tool name, used in errors and logs
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    /// Variables added to the inherited environment
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn flag(self, flag: &str, value: impl ToString) -> Self {
        self.arg(flag).arg(value.to_string())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-quoted command line, prefixed with environment assignments
    pub fn command_line(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,:=+@%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Whether the child's stdout is passed through or captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Inherit,
    Capture,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    pub code: i32,
    /// Captured stdout, empty in inherit mode
    pub stdout: String,
    pub elapsed: Duration,
}

/// Runs invocations. The only implementation that spawns is
/// [`SystemRunner`]; tests substitute recorders.
pub trait ProcessRunner {
    /// Run to completion. A non-zero exit is an `ExternalProcess` error.
    fn run(&self, invocation: &Invocation, output: OutputMode) -> Result<ProcessOutput>;
}

/// Spawns real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// The child leads its own process group only when a deadline applies
    fn own_group(&self) -> bool {
        self.timeout.is_some()
    }

    fn wait(&self, child: &mut Child, label: &str) -> Result<ExitStatus> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(raw) = signal::take_pending() {
                tracing::warn!(tool = label, signal = raw, "interrupted, forwarding signal");
                let sig = Signal::try_from(raw).unwrap_or(Signal::SIGTERM);
                self.terminate(child, sig);
                return Err(BenchError::Interrupted {
                    tool: label.to_string(),
                    signal: raw,
                });
            }

            // try_wait returns Ok(Some(_)) if exited, Ok(None) if still running
            if let Some(status) = child.try_wait().map_err(|e| spawn_error(label, e))? {
                // A terminal Ctrl-C hits both processes; report it as ours
                if let Some(raw) = signal::take_pending() {
                    return Err(BenchError::Interrupted {
                        tool: label.to_string(),
                        signal: raw,
                    });
                }
                return Ok(status);
            }

            if let (Some(deadline), Some(timeout)) = (deadline, self.timeout) {
                if Instant::now() >= deadline {
                    tracing::warn!(
                        tool = label,
                        timeout_secs = timeout.as_secs(),
                        "deadline passed, terminating process group"
                    );
                    self.terminate(child, Signal::SIGTERM);
                    return Err(BenchError::Timeout {
                        tool: label.to_string(),
                        after: timeout,
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Send `sig` to the child (its group when it leads one), then SIGKILL
    /// after a grace period
    fn terminate(&self, child: &mut Child, sig: Signal) {
        let pid = Pid::from_raw(child.id() as i32);
        let own_group = self.own_group();
        let send = |sig: Signal| {
            let _ = if own_group {
                killpg(pid, sig)
            } else {
                kill(pid, sig)
            };
        };
        send(sig);

        let start = Instant::now();
        while start.elapsed() < KILL_GRACE {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }

        send(Signal::SIGKILL);
        let _ = child.wait();
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, output: OutputMode) -> Result<ProcessOutput> {
        let mut cmd = invocation.to_command();
        if self.own_group() {
            cmd.process_group(0);
        }
        cmd.stdin(Stdio::null());
        if output == OutputMode::Capture {
            cmd.stdout(Stdio::piped());
        }

        signal::install();
        tracing::info!(
            tool = %invocation.label,
            command = %invocation.command_line(),
            "spawning"
        );
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| BenchError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        // Drain stdout on a thread so a chatty child never blocks on a full pipe
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stdout.read_to_string(&mut buf);
                buf
            })
        });

        let status = self.wait(&mut child, &invocation.label)?;
        let elapsed = start.elapsed();
        let stdout = reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        tracing::info!(
            tool = %invocation.label,
            code = ?status.code(),
            elapsed_secs = elapsed.as_secs_f64(),
            "process exited"
        );

        if !status.success() {
            if let Some(sig) = status.signal() {
                tracing::warn!(tool = %invocation.label, signal = sig, "terminated by signal");
            }
            return Err(BenchError::ExternalProcess {
                tool: invocation.label.clone(),
                code: status.code(),
            });
        }

        Ok(ProcessOutput {
            code: status.code().unwrap_or(0),
            stdout,
            elapsed,
        })
    }
}

fn spawn_error(label: &str, source: std::io::Error) -> BenchError {
    BenchError::Spawn {
        program: label.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quoting() {
        let inv = Invocation::new("vanilla", "python")
            .arg("-m")
            .arg("evaluation.inference_baseline")
            .flag("--model-path", "/models/my model")
            .env("CUDA_VISIBLE_DEVICES", "0,1");
        assert_eq!(
            inv.command_line(),
            "CUDA_VISIBLE_DEVICES=0,1 python -m evaluation.inference_baseline --model-path '/models/my model'"
        );
    }

    #[test]
    fn test_shell_quote_single_quote() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_capture_stdout() {
        let runner = SystemRunner::default();
        let inv = Invocation::new("echo", "sh").arg("-c").arg("echo 1.5");
        let out = runner.run(&inv, OutputMode::Capture).unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout.trim(), "1.5");
    }

    #[test]
    fn test_env_is_passed() {
        let runner = SystemRunner::default();
        let inv = Invocation::new("env", "sh")
            .arg("-c")
            .arg("printf %s \"$USE_LADE\"")
            .env("USE_LADE", "1");
        let out = runner.run(&inv, OutputMode::Capture).unwrap();
        assert_eq!(out.stdout, "1");
    }

    #[test]
    fn test_nonzero_exit_is_error() {
        let runner = SystemRunner::default();
        let inv = Invocation::new("clasp", "sh").arg("-c").arg("exit 3");
        match runner.run(&inv, OutputMode::Inherit) {
            Err(BenchError::ExternalProcess { tool, code }) => {
                assert_eq!(tool, "clasp");
                assert_eq!(code, Some(3));
            }
            other => panic!("expected ExternalProcess, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = SystemRunner::default();
        let inv = Invocation::new("ghost", "/nonexistent/specbench-python");
        let err = runner.run(&inv, OutputMode::Inherit).unwrap_err();
        assert_eq!(err.error_code(), "SPAWN_FAILED");
    }

    #[test]
    fn test_timeout_kills_child() {
        let runner = SystemRunner::new(Some(Duration::from_secs(1)));
        let inv = Invocation::new("sleepy", "sh").arg("-c").arg("sleep 30");
        let start = Instant::now();
        let err = runner.run(&inv, OutputMode::Inherit).unwrap_err();
        assert_eq!(err.error_code(), "PROCESS_TIMEOUT");
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    /// Own pid and process group of a `sh` child, from /proc
    #[cfg(target_os = "linux")]
    fn child_pid_and_group(runner: &SystemRunner) -> (String, String) {
        let inv = Invocation::new("pgrp", "sh")
            .arg("-c")
            .arg("echo $$; cut -d' ' -f5 /proc/$$/stat");
        let out = runner.run(&inv, OutputMode::Capture).unwrap();
        let mut lines = out.stdout.lines().map(str::to_string);
        (lines.next().unwrap(), lines.next().unwrap())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_child_shares_group_without_timeout() {
        let (_, pgrp) = child_pid_and_group(&SystemRunner::default());
        assert_eq!(pgrp, nix::unistd::getpgrp().to_string());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_child_leads_group_with_timeout() {
        let runner = SystemRunner::new(Some(Duration::from_secs(30)));
        let (pid, pgrp) = child_pid_and_group(&runner);
        assert_eq!(pid, pgrp);
        assert_ne!(pgrp, nix::unistd::getpgrp().to_string());
    }

    #[test]
    fn test_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner::default();
        let inv = Invocation::new("pwd", "sh")
            .arg("-c")
            .arg("pwd -P")
            .current_dir(dir.path());
        let out = runner.run(&inv, OutputMode::Capture).unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(out.stdout.trim(), expected.to_string_lossy());
    }
}
