//! Path and endpoint resolution.
//!
//! Uses env vars when set, otherwise platform defaults.

use std::path::{Path, PathBuf};

/// Default catalog endpoint (returns `{"servers": [...]}`).
pub const DEFAULT_CATALOG_URL: &str = "https://sparkphial.com/proxgui.php";

/// Resolved locations used by the installer.
#[derive(Debug, Clone)]
pub struct Paths {
    pub catalog_url: String,
    pub runner_home: PathBuf,
    pub client_config: PathBuf,
    pub npx_override: Option<PathBuf>,
}

impl Paths {
    /// Resolve paths from environment, falling back to defaults.
    pub fn resolve() -> Self {
        let catalog_url = env_value("MCPI_CATALOG_URL")
            .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());
        let runner_home = resolve_path(
            "MCPI_RUNNER_HOME",
            Some(PathBuf::from("/home/runner")),
            "/home/runner",
        );
        let client_config = resolve_path(
            "MCPI_CLIENT_CONFIG",
            dirs::config_dir().map(|p| p.join("Claude/claude_desktop_config.json")),
            "~/.config/Claude/claude_desktop_config.json",
        );
        let npx_override = env_value("MCPI_NPX").map(|v| expand_tilde(&v));

        Self {
            catalog_url,
            runner_home,
            client_config,
            npx_override,
        }
    }

    /// Home directory the installer CLI writes its config under.
    pub fn runner_home(&self) -> &Path {
        &self.runner_home
    }

    /// Claude config directory inside the runner home.
    pub fn runner_config_dir(&self) -> PathBuf {
        self.runner_home.join(".config/Claude")
    }

    /// Config file the installer CLI writes.
    pub fn runner_config(&self) -> PathBuf {
        self.runner_config_dir().join("claude_desktop_config.json")
    }

    /// The user's own client config the new server is merged into.
    pub fn client_config(&self) -> &Path {
        &self.client_config
    }
}

fn env_value(env_var: &str) -> Option<String> {
    let val = std::env::var(env_var).ok()?;
    let trimmed = val.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn resolve_path(env_var: &str, platform_default: Option<PathBuf>, fallback: &str) -> PathBuf {
    if let Some(val) = env_value(env_var) {
        return expand_tilde(&val);
    }
    platform_default.unwrap_or_else(|| expand_tilde(fallback))
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_config_lives_under_runner_home() {
        let paths = Paths {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            runner_home: PathBuf::from("/srv/runner"),
            client_config: PathBuf::from("/tmp/client.json"),
            npx_override: None,
        };
        assert_eq!(
            paths.runner_config(),
            PathBuf::from("/srv/runner/.config/Claude/claude_desktop_config.json")
        );
    }

    #[test]
    fn env_override_wins_and_is_trimmed() {
        std::env::set_var("MCPI_TEST_RESOLVE_OVERRIDE", "  /opt/x  ");
        let p = resolve_path("MCPI_TEST_RESOLVE_OVERRIDE", Some(PathBuf::from("/d")), "/f");
        assert_eq!(p, PathBuf::from("/opt/x"));
        std::env::remove_var("MCPI_TEST_RESOLVE_OVERRIDE");
    }

    #[test]
    fn blank_env_falls_back_to_default() {
        std::env::set_var("MCPI_TEST_RESOLVE_BLANK", "   ");
        let p = resolve_path("MCPI_TEST_RESOLVE_BLANK", None, "/fallback/path");
        assert_eq!(p, PathBuf::from("/fallback/path"));
        std::env::remove_var("MCPI_TEST_RESOLVE_BLANK");
    }

    #[test]
    fn tilde_is_expanded() {
        let p = expand_tilde("~/x");
        assert!(!p.to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
    }
}
