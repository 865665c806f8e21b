use super::error::ConfigError;
use crate::constants::DEFAULT_READ_TIMEOUT_SECS;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One entry of the `mcpServers` object.
///
/// Fields are kept as written; [`ServerConfig::transport`] validates them
/// when a connection is initialized, so a bad entry fails only its own
/// connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub name: String,
    pub kind: Option<String>,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub url: Option<String>,
    pub headers: HashMap<String, String>,
    /// Seconds
    pub read_timeout: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    #[serde(rename = "type", alias = "transport", default)]
    kind: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: Option<HashMap<String, String>>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    /// Seconds
    #[serde(default)]
    read_timeout: Option<f64>,
}

/// Validated transport selection for one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfig {
    Stdio(StdioConfig),
    Http(HttpConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StdioConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
    /// Overrides applied on top of the inherited process environment
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub url: String,
    pub headers: HeaderMap,
    pub read_timeout: Duration,
}

impl ServerConfig {
    pub(crate) fn from_raw(name: String, raw: RawServer) -> Self {
        let expand = |s: &str| -> String {
            shellexpand::full(s)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| s.to_string())
        };

        Self {
            name,
            kind: raw.kind.map(|kind| kind.trim().to_ascii_lowercase()),
            command: raw.command.map(|command| expand(command.trim())),
            args: raw.args.iter().map(|arg| expand(arg)).collect(),
            env: raw.env.unwrap_or_default(),
            cwd: raw.cwd.map(|dir| PathBuf::from(expand(&dir))),
            url: raw.url.map(|url| expand(url.trim())),
            headers: raw.headers.unwrap_or_default(),
            read_timeout: raw.read_timeout,
        }
    }

    /// Subprocess entry with no optional fields set
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            command: Some(command.into()),
            args,
            env: HashMap::new(),
            cwd: None,
            url: None,
            headers: HashMap::new(),
            read_timeout: None,
        }
    }

    /// Network-stream entry with no optional fields set
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            url: Some(url.into()),
            headers: HashMap::new(),
            read_timeout: None,
        }
    }

    /// Select and validate the transport. Acquires nothing.
    pub fn transport(&self) -> Result<TransportConfig, ConfigError> {
        let kind = match self.kind.as_deref() {
            Some(kind) => kind,
            None if self.url.is_some() => "http",
            None => "stdio",
        };

        match kind {
            "stdio" => {
                let command = self
                    .command
                    .as_deref()
                    .filter(|command| !command.is_empty())
                    .ok_or_else(|| self.missing("command"))?;
                Ok(TransportConfig::Stdio(StdioConfig {
                    command: resolve_executable(command, self.env.get("PATH").map(String::as_str)),
                    args: self.args.clone(),
                    env: self.env.clone(),
                    cwd: self.cwd.clone(),
                }))
            }
            "http" | "streamable_http" | "streamable-http" => {
                let url = self
                    .url
                    .as_deref()
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| self.missing("url"))?;
                Ok(TransportConfig::Http(HttpConfig {
                    url: url.to_string(),
                    headers: self.header_map()?,
                    read_timeout: self.read_timeout()?,
                }))
            }
            other => Err(ConfigError::UnsupportedTransport {
                server: self.name.clone(),
                kind: other.to_string(),
            }),
        }
    }

    fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            let invalid = || ConfigError::InvalidHeader {
                server: self.name.clone(),
                header: key.clone(),
            };
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn read_timeout(&self) -> Result<Duration, ConfigError> {
        let Some(secs) = self.read_timeout else {
            return Ok(Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS));
        };
        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(ConfigError::InvalidValue {
                key: "read_timeout",
                value: secs.to_string(),
                reason: format!("server '{}' needs a positive number of seconds", self.name),
            }),
        }
    }

    fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::MissingField {
            server: self.name.clone(),
            field,
        }
    }
}

/// Look a bare command name up on `PATH`. Commands containing a path
/// separator, or not found anywhere, are returned unchanged and left for
/// the spawn to report.
pub fn resolve_executable(command: &str, path_override: Option<&str>) -> PathBuf {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.to_path_buf();
    }

    let search = match path_override {
        Some(path) => Some(path.into()),
        None => env::var_os("PATH"),
    };
    if let Some(search) = search {
        for dir in env::split_paths(&search) {
            let full = dir.join(command);
            if full.is_file() {
                return full;
            }
            if cfg!(windows) {
                let exe = full.with_extension("exe");
                if exe.is_file() {
                    return exe;
                }
            }
        }
    }
    candidate.to_path_buf()
}
