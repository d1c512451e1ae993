//! Runner directory bootstrap.
//!
//! The installer CLI writes client config under a fixed runner home, which
//! usually has to be created by root once and handed to the current user.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::paths::Paths;

/// Returns true if the current process is running as root.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}

/// True once the runner home exists; nothing needs elevation then.
pub fn runner_ready(paths: &Paths) -> bool {
    paths.runner_home().exists()
}

/// Create `<runner>/.config/Claude` and give the runner home to the current
/// user. Runs through `sudo -S` with `password` on stdin unless already root.
pub fn ensure_runner_dir(paths: &Paths, password: Option<&str>) -> Result<(), ElevationError> {
    let config_dir = paths.runner_config_dir();
    if is_elevated() {
        info!(dir = %config_dir.display(), "creating runner directory");
        return std::fs::create_dir_all(&config_dir).map_err(ElevationError::CreateDir);
    }

    let password = password.ok_or(ElevationError::PasswordRequired)?;
    let owner = format!("{}:{}", current_user()?, current_group()?);

    run_sudo(password, &["mkdir", "-p"], &config_dir)?;
    run_sudo(password, &["chown", "-R", &owner], paths.runner_home())?;
    info!(dir = %paths.runner_home().display(), %owner, "runner directory ready");
    Ok(())
}

fn run_sudo(password: &str, args: &[&str], target: &Path) -> Result<(), ElevationError> {
    let command = format!("sudo {} {}", args.join(" "), target.display());
    debug!(%command, "running");

    let mut child = Command::new("sudo")
        .args(["-S", "-p", ""])
        .args(args)
        .arg(target)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ElevationError::Spawn)?;

    if let Some(mut stdin) = child.stdin.take() {
        // sudo may exit before reading (cached credentials); a broken pipe is fine.
        let _ = writeln!(stdin, "{password}");
    }

    let output = child.wait_with_output().map_err(ElevationError::Spawn)?;
    if output.status.success() {
        return Ok(());
    }
    Err(ElevationError::Command {
        command,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[cfg(unix)]
fn current_user() -> Result<String, ElevationError> {
    let uid = nix::unistd::Uid::current();
    match nix::unistd::User::from_uid(uid) {
        Ok(Some(user)) => Ok(user.name),
        _ => std::env::var("USER").map_err(|_| ElevationError::UnknownUser),
    }
}

#[cfg(unix)]
fn current_group() -> Result<String, ElevationError> {
    let gid = nix::unistd::Gid::current();
    match nix::unistd::Group::from_gid(gid) {
        Ok(Some(group)) => Ok(group.name),
        _ => current_user(),
    }
}

#[cfg(not(unix))]
fn current_user() -> Result<String, ElevationError> {
    Err(ElevationError::UnknownUser)
}

#[cfg(not(unix))]
fn current_group() -> Result<String, ElevationError> {
    Err(ElevationError::UnknownUser)
}

#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    #[error("A sudo password is required to create the runner directory")]
    PasswordRequired,

    #[error("Cannot determine the current user")]
    UnknownUser,

    #[error("Failed to create directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("Failed to run sudo: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn paths_with_runner(runner: PathBuf) -> Paths {
        Paths {
            catalog_url: String::new(),
            runner_home: runner,
            client_config: PathBuf::from("/tmp/unused.json"),
            npx_override: None,
        }
    }

    #[test]
    fn runner_ready_follows_directory_existence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(runner_ready(&paths_with_runner(dir.path().to_path_buf())));
        assert!(!runner_ready(&paths_with_runner(dir.path().join("missing"))));
    }

    #[cfg(unix)]
    #[test]
    fn password_is_required_when_not_root() {
        if is_elevated() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_runner_dir(&paths_with_runner(dir.path().join("r")), None).unwrap_err();
        assert!(matches!(err, ElevationError::PasswordRequired));
    }

    #[cfg(unix)]
    #[test]
    fn root_creates_config_dir_directly() {
        if !is_elevated() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_with_runner(dir.path().join("runner"));
        ensure_runner_dir(&paths, None).unwrap();
        assert!(paths.runner_config_dir().is_dir());
    }
}
