//! External process execution.
//!
//! Every tool invocation goes through a [`Runner`], so tests can replace
//! the real processes with a scripted [`MockRunner`].

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

/// Placeholder error text when a failed tool printed nothing.
const NO_OUTPUT: &str = "See stdout for more information.";

/// Result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Captured standard output (empty when not captured).
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl Output {
    /// A successful result.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Error text: standard error, else standard output, else a placeholder.
    pub fn error_text(&self) -> String {
        let text = if !self.stderr.trim().is_empty() {
            &self.stderr
        } else if !self.stdout.trim().is_empty() {
            &self.stdout
        } else {
            NO_OUTPUT
        };
        text.trim().to_string()
    }

    /// Turn a failed result into `Error::CommandFailed`.
    pub fn check(self, tool: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                tool: tool.to_string(),
                message: self.error_text(),
            })
        }
    }
}

/// Runs external programs.
pub trait Runner {
    /// Run `program` with `args` in `cwd`.
    ///
    /// Standard error is always captured. Standard output is captured when
    /// `capture` is set, else it goes to the terminal.
    fn run(&self, program: &Path, args: &[&str], cwd: &Path, capture: bool) -> Result<Output>;
}

/// Runs real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, program: &Path, args: &[&str], cwd: &Path, capture: bool) -> Result<Output> {
        log::debug!("Running {} {} in {}", program.display(), args.join(" "), cwd.display());

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(if capture { Stdio::piped() } else { Stdio::inherit() })
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::io(program, e))?;

        Ok(Output {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Program path.
    pub program: PathBuf,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Call {
    /// Arguments joined with spaces.
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

#[derive(Debug, Default)]
struct Script {
    /// One-shot responses, consumed in order.
    queued: VecDeque<(String, Output)>,
    /// Standing responses, the most recent match wins.
    rules: Vec<(String, Output)>,
    calls: Vec<Call>,
}

/// Scripted runner for tests.
///
/// Responses are selected by a substring of the space-joined arguments.
/// Unmatched calls succeed with empty output. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    script: Arc<Mutex<Script>>,
}

impl MockRunner {
    /// Create a runner where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `output` to every call matching `pattern`.
    pub fn on(&self, pattern: impl Into<String>, output: Output) -> &Self {
        self.script.lock().unwrap().rules.push((pattern.into(), output));
        self
    }

    /// Respond with `output` to the next call matching `pattern` only.
    pub fn once(&self, pattern: impl Into<String>, output: Output) -> &Self {
        self.script.lock().unwrap().queued.push_back((pattern.into(), output));
        self
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Number of calls whose command line contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.command_line().contains(pattern))
            .count()
    }
}

impl Runner for MockRunner {
    fn run(&self, program: &Path, args: &[&str], cwd: &Path, _capture: bool) -> Result<Output> {
        let mut script = self.script.lock().unwrap();
        let call = Call {
            program: program.to_path_buf(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            cwd: cwd.to_path_buf(),
        };
        let line = call.command_line();
        script.calls.push(call);

        if let Some(index) = script.queued.iter().position(|(p, _)| line.contains(p.as_str()))
            && let Some((_, output)) = script.queued.remove(index)
        {
            return Ok(output);
        }

        Ok(script
            .rules
            .iter()
            .rev()
            .find(|(p, _)| line.contains(p.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| Output::success("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_priority() {
        let both = Output {
            success: false,
            stdout: "out".to_string(),
            stderr: " err \n".to_string(),
        };
        assert_eq!(both.error_text(), "err");

        let stdout_only = Output {
            success: false,
            stdout: "out\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(stdout_only.error_text(), "out");

        assert_eq!(Output::failure("").error_text(), NO_OUTPUT);
    }

    #[test]
    fn test_check() {
        assert!(Output::success("ok").check("terraform").is_ok());
        let err = Output::failure("bad plan").check("terraform").unwrap_err();
        match err {
            Error::CommandFailed { tool, message } => {
                assert_eq!(tool, "terraform");
                assert_eq!(message, "bad plan");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mock_runner_rules() {
        let runner = MockRunner::new();
        runner.on("state list", Output::success("aws_instance.host\n"));
        runner.once("apply", Output::failure("first"));

        let cwd = Path::new("/tmp");
        let program = Path::new("terraform");
        assert!(!runner.run(program, &["apply"], cwd, true).unwrap().success);
        assert!(runner.run(program, &["apply"], cwd, true).unwrap().success);
        assert_eq!(
            runner.run(program, &["state", "list"], cwd, true).unwrap().stdout,
            "aws_instance.host\n"
        );
        assert_eq!(runner.count("apply"), 2);
        assert_eq!(runner.calls().len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures() {
        let output = SystemRunner
            .run(Path::new("sh"), &["-c", "echo out; echo err >&2; exit 3"], Path::new("."), true)
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.error_text(), "err");
    }
}
