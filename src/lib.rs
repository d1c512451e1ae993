//! mcp-installer - MCP Installer
//!
//! Browses the Smithery catalog and installs MCP servers by driving the
//! installer CLI on a pseudo-terminal, surfacing its questions as prompts.

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod elevation;
pub mod install;
pub mod logging;
pub mod models;
pub mod paths;
pub mod session;

pub use bridge::{
    BridgeConfig, BridgeError, BridgeEvent, BridgeHandle, CommandLine, ExitResult, ProcessBridge,
};
pub use catalog::{fetch_servers, CatalogError, DEFAULT_PAGE_SIZE};
pub use config::{merge_client_config, ConfigError};
pub use elevation::{ensure_runner_dir, runner_ready, ElevationError};
pub use install::{locate_npx, Client, InstallerCommand};
pub use models::CatalogServer;
pub use paths::Paths;
pub use session::{
    run_install, InstallMonitor, InstallNotice, InstallOutcome, InstallUi, PromptReply,
};
