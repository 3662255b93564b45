//! Lean 4 REPL subprocess management.
//!
//! Spawns leanprover-community/repl and exchanges JSON objects with it over
//! stdin/stdout, one request or reply per blank-line separated chunk.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::types::{LeanCommand, LeanResponse};

/// Configuration for the Lean REPL subprocess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeanReplConfig {
    /// Path to the REPL executable. `~` is expanded.
    pub repl_path: Option<PathBuf>,

    /// Lean project root (containing the lakefile). When set and no explicit
    /// path is given, the REPL runs through `lake env repl`.
    pub project_root: Option<PathBuf>,

    /// Timeout for a single request in milliseconds.
    pub timeout_ms: u64,

    /// Log every request and reply at debug level.
    pub verbose: bool,
}

impl Default for LeanReplConfig {
    fn default() -> Self {
        Self {
            repl_path: None,
            project_root: None,
            timeout_ms: 60_000, // elaborating Mathlib imports is slow
            verbose: false,
        }
    }
}

impl LeanReplConfig {
    /// Create a new config with a project root.
    pub fn with_project(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: Some(project_root.into()),
            ..Default::default()
        }
    }

    pub fn with_repl_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repl_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Project root with `~` expanded.
    pub fn resolved_project_root(&self) -> Option<PathBuf> {
        self.project_root.as_deref().map(expand_path)
    }

    /// Build the command that starts the REPL.
    pub fn build_command(&self) -> Result<Command> {
        if let Some(ref repl_path) = self.repl_path {
            let mut cmd = Command::new(expand_path(repl_path));
            if let Some(root) = self.resolved_project_root() {
                cmd.current_dir(root);
            }
            Ok(cmd)
        } else if let Some(root) = self.resolved_project_root() {
            let lake = which::which("lake")
                .map_err(|e| Error::config(format!("`lake` not found in PATH: {}", e)))?;
            let mut cmd = Command::new(lake);
            cmd.arg("env").arg("repl").current_dir(root);
            Ok(cmd)
        } else {
            let repl = which::which("repl").map_err(|e| {
                Error::config(format!(
                    "no repl_path or project_root configured and `repl` not found in PATH: {}",
                    e
                ))
            })?;
            Ok(Command::new(repl))
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
}

/// Handle to a running Lean REPL subprocess.
pub struct LeanRepl {
    child: Child,
    /// `None` once shut down.
    stdin: Option<ChildStdin>,
    /// Lines of stdout, read on a helper thread. An empty line means EOF.
    lines: Receiver<std::io::Result<String>>,
    config: LeanReplConfig,
}

/// Forward every line of `reader` to the returned channel.
///
/// The thread ends at EOF, after sending an empty string, or when the
/// receiver is dropped.
fn spawn_line_reader<R: BufRead + Send + 'static>(
    mut reader: R,
) -> Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line);
        let done = !matches!(read, Ok(n) if n > 0);
        if tx.send(read.map(|_| line)).is_err() || done {
            break;
        }
    });
    rx
}

/// Collect one blank-line terminated reply, giving up after `timeout_ms`.
///
/// The deadline covers the whole reply, including a REPL that never writes.
fn read_reply(lines: &Receiver<std::io::Result<String>>, timeout_ms: u64) -> Result<String> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut reply = String::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let line = match lines.recv_timeout(remaining) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                return Err(Error::SubprocessComm(format!(
                    "Failed to read from Lean REPL: {}",
                    e
                )));
            }
            Err(RecvTimeoutError::Timeout) => return Err(Error::timeout(timeout_ms)),
            Err(RecvTimeoutError::Disconnected) => String::new(),
        };

        if line.is_empty() {
            return Err(Error::SubprocessComm(
                "Lean REPL subprocess closed unexpectedly".to_string(),
            ));
        }
        if line.trim().is_empty() {
            if reply.trim().is_empty() {
                continue;
            }
            return Ok(reply);
        }
        reply.push_str(&line);
    }
}

impl LeanRepl {
    /// Spawn a new Lean REPL subprocess.
    pub fn spawn(config: LeanReplConfig) -> Result<Self> {
        let mut cmd = config.build_command()?;
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            Error::SubprocessComm(format!("Failed to spawn Lean REPL subprocess: {}", e))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdin handle for Lean REPL".to_string())
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdout handle for Lean REPL".to_string())
        })?;

        tracing::debug!(pid = child.id(), "Spawned Lean REPL");

        Ok(Self {
            child,
            stdin: Some(stdin),
            lines: spawn_line_reader(BufReader::new(stdout)),
            config,
        })
    }

    /// Send a JSON command and read the reply.
    ///
    /// Replies are separated by a blank line; a reply may span several lines.
    fn send_command(&mut self, command: &LeanCommand) -> Result<LeanResponse> {
        let request_json = serde_json::to_string(command)?;

        if self.config.verbose {
            tracing::debug!("Lean REPL request: {}", request_json);
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::SubprocessComm("Lean REPL already shut down".to_string()))?;

        // The REPL reads a command until a blank line.
        write!(stdin, "{}\n\n", request_json).map_err(|e| {
            Error::SubprocessComm(format!("Failed to send command to Lean REPL: {}", e))
        })?;
        stdin.flush().map_err(|e| {
            Error::SubprocessComm(format!("Failed to flush Lean REPL stdin: {}", e))
        })?;

        let reply = read_reply(&self.lines, self.config.timeout_ms)?;

        if self.config.verbose {
            tracing::debug!("Lean REPL response: {}", reply.trim());
        }

        serde_json::from_str(&reply).map_err(|e| {
            Error::SubprocessComm(format!(
                "Failed to parse Lean REPL response: {} (reply: {})",
                e,
                reply.trim()
            ))
        })
    }

    /// Elaborate `code`, on top of `env` when given.
    pub fn execute_command(&mut self, code: &str, env: Option<u64>) -> Result<LeanResponse> {
        let command = match env {
            Some(env) => LeanCommand::command_with_env(code, env),
            None => LeanCommand::command(code),
        };
        self.send_command(&command)
    }

    /// Elaborate a whole file, collecting every tactic with its goals.
    pub fn collect_tactics(&mut self, code: &str) -> Result<LeanResponse> {
        self.send_command(&LeanCommand::with_all_tactics(code))
    }

    /// Check if the subprocess is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Close stdin and wait for the process. Safe to call twice.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.stdin.take().is_none() {
            return Ok(());
        }
        if self.is_alive() {
            if let Err(e) = self.child.kill() {
                tracing::debug!(error = %e, "Lean REPL already exited");
            }
        }
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for LeanRepl {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lean_repl_config_default() {
        let config = LeanReplConfig::default();
        assert!(config.repl_path.is_none());
        assert!(config.project_root.is_none());
        assert_eq!(config.timeout_ms, 60_000);
    }

    #[test]
    fn test_lean_repl_config_with_project() {
        let config = LeanReplConfig::with_project("/path/to/project").with_timeout(5_000);
        assert_eq!(config.project_root, Some(PathBuf::from("/path/to/project")));
        assert_eq!(config.timeout_ms, 5_000);
    }

    #[test]
    fn test_lean_repl_config_serde_defaults() {
        let config: LeanReplConfig = serde_json::from_str(r#"{"verbose": true}"#).unwrap();
        assert!(config.verbose);
        assert_eq!(config.timeout_ms, 60_000);
    }

    #[test]
    fn test_explicit_path_is_used_verbatim() {
        let config = LeanReplConfig::default().with_repl_path("/opt/lean/repl");
        let cmd = config.build_command().unwrap();
        assert_eq!(cmd.get_program(), "/opt/lean/repl");
    }

    #[test]
    fn test_tilde_expansion() {
        let expanded = expand_path(Path::new("~/repl"));
        assert!(expanded.ends_with("repl"));
        assert_eq!(expand_path(Path::new("/abs/repl")), PathBuf::from("/abs/repl"));
    }

    #[test]
    fn test_read_reply_joins_lines_until_blank() {
        let lines = spawn_line_reader(std::io::Cursor::new(
            "\n{\"env\": 0,\n \"messages\": []}\n\n{\"env\": 1}\n\n",
        ));
        assert_eq!(read_reply(&lines, 1_000).unwrap(), "{\"env\": 0,\n \"messages\": []}\n");
        assert_eq!(read_reply(&lines, 1_000).unwrap(), "{\"env\": 1}\n");
    }

    #[test]
    fn test_read_reply_times_out_on_silent_repl() {
        let (_tx, lines) = mpsc::channel::<std::io::Result<String>>();
        let start = Instant::now();
        let err = read_reply(&lines, 50).unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }), "{:?}", err);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_read_reply_reports_closed_stream() {
        let lines = spawn_line_reader(std::io::Cursor::new("{\"env\": 0}\n"));
        let err = read_reply(&lines, 1_000).unwrap_err();
        assert!(matches!(err, Error::SubprocessComm(_)));
    }

    #[test]
    #[ignore = "requires Lean REPL installed"]
    fn test_lean_repl_execute() {
        let mut repl = LeanRepl::spawn(LeanReplConfig::default()).unwrap();
        let response = repl.execute_command("def foo := 42", None).unwrap();
        assert!(response.is_success());
        assert!(response.env.is_some());
    }
}
