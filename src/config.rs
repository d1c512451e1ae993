//! Merge the installer-written client config into the user's own.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

const SERVERS_KEY: &str = "mcpServers";

/// Copy every `mcpServers` entry of `source` into `dest`, overwriting entries
/// with the same name and keeping everything else. Returns the merged names.
pub fn merge_client_config(source: &Path, dest: &Path) -> Result<Vec<String>, ConfigError> {
    if !source.exists() {
        return Err(ConfigError::SourceMissing(source.to_path_buf()));
    }
    let content = std::fs::read_to_string(source)
        .map_err(|e| ConfigError::ReadFailed {
            path: source.to_path_buf(),
            source: e,
        })?;
    let mut incoming: Value = serde_json::from_str(&content)
        .map_err(|e| ConfigError::ParseFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

    let mut existing = read_existing(dest);

    let new_servers = servers_mut(&mut incoming).ok_or(ConfigError::InvalidConfig)?.clone();
    let servers = servers_mut(&mut existing).ok_or(ConfigError::InvalidConfig)?;

    let mut merged = Vec::with_capacity(new_servers.len());
    for (name, server) in new_servers {
        servers.insert(name.clone(), server);
        merged.push(name);
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_failed(e, dest))?;
    }
    let output = serde_json::to_string_pretty(&existing).map_err(ConfigError::SerializeFailed)?;
    std::fs::write(dest, output).map_err(|e| write_failed(e, dest))?;

    debug!(dest = %dest.display(), servers = ?merged, "merged client config");
    Ok(merged)
}

fn write_failed(source: std::io::Error, path: &Path) -> ConfigError {
    ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn empty_config() -> Value {
    serde_json::json!({ "mcpServers": {} })
}

fn read_existing(dest: &Path) -> Value {
    let Ok(content) = std::fs::read_to_string(dest) else {
        return empty_config();
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(value) if value.is_object() => value,
        Ok(_) | Err(_) => {
            warn!(path = %dest.display(), "invalid JSON in existing config, will overwrite");
            empty_config()
        }
    }
}

/// The `mcpServers` object, created if absent. `None` when the document or
/// the entry is not a JSON object.
fn servers_mut(config: &mut Value) -> Option<&mut Map<String, Value>> {
    let root = config.as_object_mut()?;
    root.entry(SERVERS_KEY)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config not found at {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Config has no usable mcpServers object")]
    InvalidConfig,

    #[error("Failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
