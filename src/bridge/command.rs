//! Command lines handed to the bridge.

use std::fmt;

use portable_pty::CommandBuilder;

/// What to run on the pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Program followed by its arguments, no shell involved.
    Argv(Vec<String>),
    /// A command string run through the platform shell.
    Shell(String),
}

impl CommandLine {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Argv(args.into_iter().map(Into::into).collect())
    }

    pub fn shell(command: impl Into<String>) -> Self {
        CommandLine::Shell(command.into())
    }

    /// Program name used in logs and spawn errors.
    pub fn program(&self) -> &str {
        match self {
            CommandLine::Argv(args) => args.first().map(String::as_str).unwrap_or(""),
            CommandLine::Shell(_) => shell_program(),
        }
    }

    /// Full argument vector, including the shell wrapper for `Shell`.
    pub fn to_argv(&self) -> Vec<String> {
        match self {
            CommandLine::Argv(args) => args.clone(),
            CommandLine::Shell(command) => vec![
                shell_program().to_string(),
                shell_flag().to_string(),
                command.clone(),
            ],
        }
    }

    pub(crate) fn to_builder(&self) -> Option<CommandBuilder> {
        let argv = self.to_argv();
        let (program, args) = argv.split_first()?;
        if program.is_empty() {
            return None;
        }
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        Some(cmd)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Argv(args) => write!(f, "{}", args.join(" ")),
            CommandLine::Shell(command) => write!(f, "{}", command),
        }
    }
}

#[cfg(unix)]
fn shell_program() -> &'static str {
    "/bin/sh"
}

#[cfg(windows)]
fn shell_program() -> &'static str {
    "cmd.exe"
}

#[cfg(unix)]
fn shell_flag() -> &'static str {
    "-c"
}

#[cfg(windows)]
fn shell_flag() -> &'static str {
    "/C"
}
