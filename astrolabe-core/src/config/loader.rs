use super::error::ConfigError;
use super::server::{RawServer, ServerConfig};
use super::settings::{RawSettings, Settings};
use crate::constants::{CONFIG_PATH, ENV_PATH};
use serde_json::Value;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing::{debug, info, warn};

static ENV_LOADER: Once = Once::new();

/// Loads variables from the env file once per process. A missing file is
/// not an error.
pub fn ensure_env_loaded(path: Option<&Path>) {
    ENV_LOADER.call_once(|| {
        let path = path.unwrap_or_else(|| Path::new(ENV_PATH));
        match dotenvy::from_path(path) {
            Ok(()) => debug!(path = %path.display(), "Loaded environment file"),
            Err(err) if err.not_found() => {
                debug!(path = %path.display(), "No environment file found")
            }
            Err(err) => warn!(path = %path.display(), %err, "Failed to load environment file"),
        }
    });
}

/// Read the `mcpServers` document. Entry order is preserved and becomes the
/// startup order of the connections.
pub fn load_servers(path: &Path) -> Result<Vec<ServerConfig>, ConfigError> {
    debug!(path = %path.display(), "Reading server configuration file");
    let content = read(path)?;
    let document: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    parse_servers(document)
}

pub fn parse_servers(document: Value) -> Result<Vec<ServerConfig>, ConfigError> {
    let Some(Value::Object(entries)) = document.get("mcpServers").cloned() else {
        return Err(ConfigError::MissingServers);
    };

    let mut servers = Vec::with_capacity(entries.len());
    for (name, value) in entries {
        let raw: RawServer =
            serde_json::from_value(value).map_err(|source| ConfigError::InvalidServer {
                server: name.clone(),
                source,
            })?;
        servers.push(ServerConfig::from_raw(name, raw));
    }
    info!(count = servers.len(), "Loaded MCP server definitions");
    Ok(servers)
}

/// Load client settings. An explicit path must exist; the default path is
/// optional and falls back to environment-only settings.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    load_settings_with(path, |key| env::var(key).ok())
}

/// Like [`load_settings`], reading variables through `lookup` instead of the
/// process environment.
pub fn load_settings_with<F>(path: Option<&Path>, lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = match path {
        Some(path) => read_settings(path)?,
        None => match read_settings(Path::new(CONFIG_PATH)) {
            Ok(raw) => raw,
            Err(ConfigError::NotFound { .. }) => {
                debug!(path = CONFIG_PATH, "No settings file, using environment only");
                RawSettings::default()
            }
            Err(err) => return Err(err),
        },
    };
    Settings::resolve(raw, lookup)
}

fn read_settings(path: &Path) -> Result<RawSettings, ConfigError> {
    let content = read(path)?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
