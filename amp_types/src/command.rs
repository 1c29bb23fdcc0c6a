//! Command lines for the external collaborators (worker, plotting, report).
//!
//! Assembling a command is pure data; running it is left to the caller.

use anyhow::{Context, Result};
use itertools::Itertools;
use shell_escape::escape;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::process::{Command, ExitStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ExternalCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Append `--flag=value`.
    pub fn flag(self, flag: &str, value: impl Display) -> Self {
        self.arg(format!("--{flag}={value}"))
    }

    /// Append `--flag=value` if `value` is present.
    pub fn optional_flag<T: Display>(self, flag: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.flag(flag, value),
            None => self,
        }
    }

    /// The command as a single line that can be handed to `sh -c`.
    pub fn to_shell_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| escape(s.into()))
            .join(" ")
    }

    /// Run the command to completion, inheriting stdio.
    pub fn status(&self) -> Result<ExitStatus> {
        Command::new(&self.program)
            .args(&self.args)
            .status()
            .with_context(|| format!("running {self}"))
    }
}

impl Display for ExternalCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}
