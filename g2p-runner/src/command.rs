//! External command execution
//!
//! Thin wrapper around `tokio::process::Command` used by the compose and
//! container services. Children are killed when their future is dropped, so
//! a timed-out or cancelled call never leaves a stray CLI process behind.

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short diagnostic used in error messages
    pub fn describe(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit_code={}", self.exit_code)
        } else {
            format!("exit_code={}, stderr='{}'", self.exit_code, stderr)
        }
    }
}

/// A program plus leading arguments, e.g. `docker compose`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    prefix: Vec<String>,
}

impl CommandLine {
    /// Builds a command line from its words; `None` when empty
    pub fn from_words(words: &[String]) -> Option<Self> {
        let (program, prefix) = words.split_first()?;
        Some(Self {
            program: program.clone(),
            prefix: prefix.to_vec(),
        })
    }

    /// Splits a command line such as `"podman --remote"` on whitespace
    pub fn parse(command_line: &str) -> Option<Self> {
        let words: Vec<String> = command_line.split_whitespace().map(str::to_string).collect();
        Self::from_words(&words)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Renders the full invocation for logs and errors
    pub fn display_with(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.prefix.iter().map(String::as_str))
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command to completion and captures its output
    pub async fn run(&self, args: &[String]) -> std::io::Result<CommandOutput> {
        debug!("Running: {}", self.display_with(args));

        let output = Command::new(&self.program)
            .args(&self.prefix)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if !result.stdout.trim().is_empty() {
            debug!("{} stdout: {}", self.program, result.stdout.trim());
        }
        if !result.stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, result.stderr.trim());
        }

        Ok(result)
    }
}

/// Converts string slices into owned arguments
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_from_words() {
        let line = CommandLine::from_words(&args(["docker", "compose"])).unwrap();
        assert_eq!(line.program(), "docker");
        assert_eq!(
            line.display_with(&args(["-p", "g2p_x", "up", "-d"])),
            "docker compose -p g2p_x up -d"
        );

        assert!(CommandLine::from_words(&[]).is_none());
        assert_eq!(
            CommandLine::parse(" podman  --remote "),
            CommandLine::from_words(&args(["podman", "--remote"]))
        );
        assert!(CommandLine::parse("  ").is_none());
    }

    #[test]
    fn test_describe_output() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "  no such image \n".to_string(),
            exit_code: 125,
        };
        assert!(!output.success());
        assert_eq!(output.describe(), "exit_code=125, stderr='no such image'");

        let output = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 1,
        };
        assert_eq!(output.describe(), "exit_code=1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output() {
        let line = CommandLine::from_words(&args(["sh", "-c"])).unwrap();
        let output = line.run(&args(["echo out; echo err >&2; exit 3"])).await.unwrap();

        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let line = CommandLine::from_words(&args(["g2p-definitely-not-installed"])).unwrap();
        assert!(line.run(&[]).await.is_err());
    }
}
