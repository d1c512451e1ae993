//! Build the installer command line for one catalog server.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bridge::CommandLine;
use crate::models::INSTALLER_PACKAGE;
use crate::paths::Paths;

/// MCP client the installer registers the server with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Client {
    #[default]
    Claude,
    Cline,
    RooCline,
}

impl Client {
    pub fn as_str(&self) -> &'static str {
        match self {
            Client::Claude => "claude",
            Client::Cline => "cline",
            Client::RooCline => "roo-cline",
        }
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the `npx` launcher: explicit override, then the usual Windows
/// install locations, then `PATH`, then the bare name.
pub fn locate_npx(paths: &Paths) -> PathBuf {
    if let Some(npx) = &paths.npx_override {
        return npx.clone();
    }
    if cfg!(windows) {
        if let Some(found) = windows_npx_candidates().into_iter().find(|p| p.is_file()) {
            return found;
        }
    }
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    match find_in_path(npx_file_name(), &path_var) {
        Some(found) => found,
        None => {
            debug!("npx not found on PATH, relying on the shell");
            PathBuf::from("npx")
        }
    }
}

fn npx_file_name() -> &'static str {
    if cfg!(windows) {
        "npx.cmd"
    } else {
        "npx"
    }
}

fn windows_npx_candidates() -> Vec<PathBuf> {
    let env_or = |key: &str, fallback: &str| {
        std::env::var_os(key)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(fallback))
    };
    vec![
        env_or("APPDATA", "").join("npm").join("npx.cmd"),
        env_or("ProgramFiles", "C:\\Program Files")
            .join("nodejs")
            .join("npx.cmd"),
        env_or("ProgramFiles(x86)", "C:\\Program Files (x86)")
            .join("nodejs")
            .join("npx.cmd"),
    ]
}

/// First `dir/name` in a `PATH`-style list that is an existing file.
pub fn find_in_path(name: &str, path_var: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// The installer invocation for one server.
#[derive(Debug, Clone)]
pub struct InstallerCommand {
    qualified_name: String,
    client: Client,
    npx: PathBuf,
}

impl InstallerCommand {
    pub fn new(qualified_name: impl Into<String>, client: Client) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            client,
            npx: PathBuf::from("npx"),
        }
    }

    pub fn with_npx(mut self, npx: impl AsRef<Path>) -> Self {
        self.npx = npx.as_ref().to_path_buf();
        self
    }

    fn installer_args(&self) -> Vec<String> {
        vec![
            self.npx.to_string_lossy().into_owned(),
            "-y".to_string(),
            INSTALLER_PACKAGE.to_string(),
            "install".to_string(),
            self.qualified_name.clone(),
            "--client".to_string(),
            self.client.as_str().to_string(),
        ]
    }

    /// `.cmd` launchers on Windows only run through `cmd /C`.
    pub fn command_line(&self) -> CommandLine {
        let args = self.installer_args();
        if cfg!(windows) {
            let mut wrapped = vec!["cmd".to_string(), "/C".to_string()];
            wrapped.extend(args);
            CommandLine::Argv(wrapped)
        } else {
            CommandLine::Argv(args)
        }
    }
}
