//! Subprocess execution seam
//!
//! Every external tool call (restore, compile, test, docker, helm) goes
//! through [`ToolRunner`], so the error-tolerance policy is uniform across
//! the whole pipeline.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, warn};

use crate::error::ToolError;

/// One external tool call, described as a value so it can be composed,
/// inspected and logged before anything is spawned.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl ToolInvocation {
    /// Create a new invocation for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set several environment variables for the child process
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The program being invoked
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments in order
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Environment variables set on the child
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// Working directory, if any
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Render the invocation for logs and error messages
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Captured output of a completed tool call
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// Runs external tools with captured output and a process-wide
/// error-tolerance policy.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    tolerate_errors: bool,
}

impl ToolRunner {
    /// Create a runner with the default hard-stop policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether tool failures are logged and swallowed instead of
    /// propagated
    pub fn with_tolerate_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_errors = tolerate;
        self
    }

    /// Whether this runner swallows tool failures
    pub fn tolerates_errors(&self) -> bool {
        self.tolerate_errors
    }

    /// Run a tool and fail on any non-zero exit, regardless of the
    /// tolerance policy. Used where a failure has its own handling
    /// (e.g. idempotent cleanup).
    pub fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let command_line = invocation.command_line();
        debug!(command = %command_line, "running tool");

        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.arguments());
        for (key, value) in invocation.environment() {
            cmd.env(key, value);
        }
        if let Some(dir) = invocation.working_dir() {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| ToolError::SpawnFailed {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(ToolError::CommandFailed {
                command: command_line,
                code,
                stderr,
            });
        }

        debug!(command = %command_line, "tool completed");
        Ok(ToolOutput { stdout, stderr })
    }

    /// Run a tool under the tolerance policy: a failure is logged, then
    /// either propagated (default) or swallowed to `Ok(None)` when the
    /// runner tolerates errors.
    pub fn exec(&self, invocation: &ToolInvocation) -> Result<Option<ToolOutput>, ToolError> {
        match self.run(invocation) {
            Ok(output) => Ok(Some(output)),
            Err(e) => {
                error!(command = %invocation.command_line(), "{e}");
                if self.tolerate_errors {
                    warn!("continuing despite tool failure (tolerate-errors is set)");
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = ToolInvocation::new("docker")
            .arg("build")
            .args(["-t", "myimage:local"])
            .env("DOCKER_BUILDKIT", "1")
            .current_dir("/tmp");

        assert_eq!(inv.program(), "docker");
        assert_eq!(inv.arguments(), &["build", "-t", "myimage:local"]);
        assert_eq!(inv.environment().len(), 1);
        assert_eq!(inv.working_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_command_line_quotes_spaces() {
        let inv = ToolInvocation::new("helm").arg("upgrade").arg("my release");
        assert_eq!(inv.command_line(), "helm upgrade \"my release\"");
    }

    #[test]
    fn test_run_captures_stdout() {
        let runner = ToolRunner::new();
        let inv = ToolInvocation::new("sh").args(["-c", "echo hello"]);
        let output = runner.run(&inv).unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_nonzero_exit_is_error() {
        let runner = ToolRunner::new();
        let inv = ToolInvocation::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let err = runner.run(&inv).unwrap_err();
        match err {
            ToolError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exec_propagates_by_default() {
        let runner = ToolRunner::new();
        let inv = ToolInvocation::new("sh").args(["-c", "exit 1"]);
        assert!(runner.exec(&inv).is_err());
    }

    #[test]
    fn test_exec_swallows_when_tolerant() {
        let runner = ToolRunner::new().with_tolerate_errors(true);
        let inv = ToolInvocation::new("sh").args(["-c", "exit 1"]);
        let result = runner.exec(&inv).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_exec_returns_output_on_success() {
        let runner = ToolRunner::new().with_tolerate_errors(true);
        let inv = ToolInvocation::new("sh").args(["-c", "echo ok"]);
        let result = runner.exec(&inv).unwrap();
        assert_eq!(result.unwrap().stdout.trim(), "ok");
    }

    #[test]
    fn test_run_missing_program_is_spawn_error() {
        let runner = ToolRunner::new();
        let inv = ToolInvocation::new("definitely-not-a-real-tool-4471");
        assert!(matches!(
            runner.run(&inv),
            Err(ToolError::SpawnFailed { .. })
        ));
    }

    #[test]
    fn test_env_passed_to_child() {
        let runner = ToolRunner::new();
        let inv = ToolInvocation::new("sh")
            .args(["-c", "printf %s \"$KUBECONFIG\""])
            .env("KUBECONFIG", "/tmp/kubeconfig");
        let output = runner.run(&inv).unwrap();
        assert_eq!(output.stdout, "/tmp/kubeconfig");
    }
}
