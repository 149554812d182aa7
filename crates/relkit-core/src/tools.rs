//! External programs: the repository indexer and command-line signers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// An external program could not be run or did not succeed.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{program} not found in PATH")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}:\n{output}")]
    Failed {
        command: String,
        status: ExitStatus,
        output: String,
    },
}

/// Runs external programs to completion.
#[async_trait]
pub trait ToolRunner: Send + Sync + fmt::Debug {
    /// Run `command`, returning its combined stdout and stderr on success.
    async fn run(&self, command: &ToolCommand) -> Result<String, ToolError>;
}

/// Runs programs as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<String, ToolError> {
        let program = which::which(&command.program).map_err(|source| ToolError::NotFound {
            program: command.program.clone(),
            source,
        })?;

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&command.args);
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        debug!("running {command}");
        let output = cmd.output().await.map_err(|source| ToolError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(ToolError::Failed {
                command: command.to_string(),
                status: output.status,
                output: combined,
            })
        }
    }
}

/// The `createrepo` style indexer invocation for `dir`.
pub fn indexer_command(program: &str, args: &[String], dir: &Path) -> ToolCommand {
    ToolCommand::new(program)
        .args(args.iter().cloned())
        .arg(dir.to_string_lossy())
}
