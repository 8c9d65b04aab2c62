//! Command execution with consistent error handling.
//!
//! All provisioning work ultimately shells out to the host's tools (apt-get,
//! fc-cache, install-tl, tlmgr, pip, adduser). This module wraps
//! `std::process::Command` so every call site gets the same two behaviors:
//! a missing program surfaces as `StageError::ToolchainMissing`, and a
//! non-zero exit never panics or bails on its own. Stages inspect the result
//! and classify the failure into their own error kind.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::StageError;

/// Captured result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Get stdout, trimmed of whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }

    /// Stdout and stderr concatenated, for classifiers that scan both.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Set an environment variable for the child process.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.envs
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_error(&self, err: io::Error) -> StageError {
        if err.kind() == io::ErrorKind::NotFound {
            StageError::ToolchainMissing(self.program.clone())
        } else {
            StageError::Io(err)
        }
    }

    /// Run the command and capture output.
    ///
    /// A non-zero exit is not an error here; callers classify the captured
    /// output into their stage's failure kind.
    pub fn run(self) -> Result<CommandResult, StageError> {
        let output = self.build().output().map_err(|e| self.spawn_error(e))?;

        Ok(CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the command with inherited stdio (streaming).
    ///
    /// Output goes directly to the build log. Use for long-running commands
    /// where only the exit status matters for classification (install-tl,
    /// pip, fc-cache).
    pub fn run_interactive(self) -> Result<ExitStatus, StageError> {
        let mut cmd = self.build();
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        cmd.status().map_err(|e| self.spawn_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout() {
        let result = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello");
    }

    #[test]
    fn run_does_not_fail_on_nonzero_exit() {
        let result = Cmd::new("false").run().unwrap();
        assert!(!result.success());
        assert_eq!(result.code(), 1);
    }

    #[test]
    fn missing_program_is_toolchain_missing() {
        let err = Cmd::new("nonexistent_program_12345").run().unwrap_err();
        assert!(matches!(err, StageError::ToolchainMissing(p) if p == "nonexistent_program_12345"));
    }

    #[test]
    fn env_is_passed_to_child() {
        let result = Cmd::new("sh")
            .args(["-c", "echo $PROVISION_TEST_VAR"])
            .env("PROVISION_TEST_VAR", "42")
            .run()
            .unwrap();
        assert_eq!(result.stdout_trimmed(), "42");
    }

    #[test]
    fn dir_sets_working_directory() {
        let result = Cmd::new("pwd").dir(Path::new("/tmp")).run().unwrap();
        assert!(result.stdout_trimmed().contains("tmp"));
    }
}
