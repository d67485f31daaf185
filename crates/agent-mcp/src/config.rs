use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{McpError, Result};

/// Root MCP configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

/// One external tool provider. Exactly one of `command` (stdio) or `url`
/// (SSE endpoint) must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique name, also used as the tool namespace
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Bound on connect + handshake + discovery
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Empty means every tool is allowed
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub denied_tools: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfig {
    Stdio(StdioConfig),
    Sse(SseConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StdioConfig {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SseConfig {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub connect_timeout_ms: u64,
}

impl McpConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| McpError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    /// Load the file, falling back to an empty configuration (built-in tools
    /// only) when it is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No MCP config at {}, using built-in tools only", path.display());
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Ignoring invalid MCP config {}: {}; using built-in tools only",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Enabled servers that pass validation. Rejected entries are returned
    /// separately with the reason.
    pub fn partition_valid(&self) -> (Vec<McpServerConfig>, Vec<(String, McpError)>) {
        let mut seen = HashSet::new();
        let mut valid = Vec::new();
        let mut rejected = Vec::new();

        for server in self.servers.iter().filter(|server| server.enabled) {
            if !seen.insert(server.name.clone()) {
                rejected.push((
                    server.name.clone(),
                    McpError::InvalidConfig(format!("duplicate server name '{}'", server.name)),
                ));
                continue;
            }

            match server.transport() {
                Ok(_) => valid.push(server.clone()),
                Err(e) => rejected.push((server.name.clone(), e)),
            }
        }

        (valid, rejected)
    }
}

impl McpServerConfig {
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            enabled: true,
            command: Some(command.into()),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            url: None,
            headers: HashMap::new(),
            connect_timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_timeout_ms(),
            allowed_tools: Vec::new(),
            denied_tools: Vec::new(),
        }
    }

    /// Validate and resolve `${VAR}` references into a transport description.
    pub fn transport(&self) -> Result<TransportConfig> {
        if self.name.trim().is_empty() {
            return Err(McpError::InvalidConfig("server name cannot be empty".to_string()));
        }

        let command = self.command.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty());

        match (command, url) {
            (Some(command), None) => Ok(TransportConfig::Stdio(StdioConfig {
                command: substitute_env(command),
                args: self.args.iter().map(|arg| substitute_env(arg)).collect(),
                cwd: self.cwd.as_deref().map(substitute_env),
                env: self
                    .env
                    .iter()
                    .map(|(key, value)| (key.clone(), substitute_env(value)))
                    .collect(),
            })),
            (None, Some(url)) => Ok(TransportConfig::Sse(SseConfig {
                url: substitute_env(url),
                headers: self
                    .headers
                    .iter()
                    .map(|(key, value)| (key.clone(), substitute_env(value)))
                    .collect(),
                connect_timeout_ms: self.connect_timeout_ms,
            })),
            (Some(_), Some(_)) => Err(McpError::InvalidConfig(format!(
                "server '{}' sets both command and url",
                self.name
            ))),
            (None, None) => Err(McpError::InvalidConfig(format!(
                "server '{}' needs a command or a url",
                self.name
            ))),
        }
    }
}

/// Replace `${VAR}` with the value of the environment variable. Unset
/// variables become empty strings.
pub fn substitute_env(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(resolved) => output.push_str(&resolved),
                    Err(_) => warn!("Environment variable '{}' is not set", name),
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}
