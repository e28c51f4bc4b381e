use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::proxy_rules::{ProxyRule, ProxyRules};

pub const DEFAULT_CONFIG_FILE: &str = "devgate.yaml";
pub const DEFAULT_UPSTREAM: &str = "http://127.0.0.1:8000";

pub const ENV_HOST: &str = "DEVGATE_HOST";
pub const ENV_PORT: &str = "DEVGATE_PORT";
pub const ENV_STRICT_PORT: &str = "DEVGATE_STRICT_PORT";
pub const ENV_PROXY_TARGET: &str = "DEVGATE_PROXY_TARGET";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
}

/// Complete configuration structure for devgate.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevConfig {
    /// Project root, relative paths below resolve against it
    pub root: PathBuf,

    /// Static directory served by the dev server
    pub public_dir: String,

    pub server: ServerOptions,

    pub preview: PreviewOptions,

    pub build: BuildOptions,

    pub optimize_deps: OptimizeDepsOptions,
}

/// Dev server binding and proxy rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    /// Fail instead of moving to the next free port
    pub strict_port: bool,
    pub proxy: ProxyRules,
}

/// Static-preview server binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewOptions {
    pub host: String,
    pub port: u16,
    pub strict_port: bool,
    /// Falls back to `server.proxy` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyRules>,
}

/// Production build output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    pub out_dir: String,
    pub target: String,
    /// Chunk name to module list; unset means no manual code-splitting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_chunks: Option<BTreeMap<String, Vec<String>>>,
}

/// Dependency pre-bundling hints, carried as data for the bundler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeDepsOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            public_dir: "public".to_string(),
            server: ServerOptions::default(),
            preview: PreviewOptions::default(),
            build: BuildOptions::default(),
            optimize_deps: OptimizeDepsOptions::default(),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        let mut proxy = ProxyRules::new();
        proxy.insert(
            "/api",
            ProxyRule {
                target: DEFAULT_UPSTREAM.to_string(),
                change_origin: true,
                secure: false,
                ws: false,
            },
        );
        proxy.insert(
            "/ws",
            ProxyRule {
                target: DEFAULT_UPSTREAM.to_string(),
                change_origin: false,
                secure: true,
                ws: true,
            },
        );

        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            strict_port: true,
            proxy,
        }
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            strict_port: true,
            proxy: None,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            out_dir: "dist".to_string(),
            target: "esnext".to_string(),
            manual_chunks: None,
        }
    }
}

impl DevConfig {
    /// Parse configuration from YAML string. An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize configuration to YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load and validate a configuration file; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::from_yaml(&fs::read_to_string(path)?)?
        } else {
            debug!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply `DEVGATE_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Host, port and strict-port apply to both the dev and the preview
    /// server; the proxy target replaces the target of every rule.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            debug!("Overriding host from {}: {}", ENV_HOST, host);
            self.server.host = host.clone();
            self.preview.host = host;
        }

        if let Some(value) = lookup(ENV_PORT) {
            let port = value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidOverride {
                    key: ENV_PORT.to_string(),
                    value: value.clone(),
                })?;
            debug!("Overriding port from {}: {}", ENV_PORT, port);
            self.server.port = port;
            self.preview.port = port;
        }

        if let Some(value) = lookup(ENV_STRICT_PORT) {
            let strict = parse_bool(&value).ok_or_else(|| ConfigError::InvalidOverride {
                key: ENV_STRICT_PORT.to_string(),
                value: value.clone(),
            })?;
            self.server.strict_port = strict;
            self.preview.strict_port = strict;
        }

        if let Some(target) = lookup(ENV_PROXY_TARGET) {
            debug!("Overriding proxy targets from {}: {}", ENV_PROXY_TARGET, target);
            for (_, rule) in self.server.proxy.iter_mut() {
                rule.target = target.clone();
            }
            if let Some(preview_proxy) = self.preview.proxy.as_mut() {
                for (_, rule) in preview_proxy.iter_mut() {
                    rule.target = target.clone();
                }
            }
        }

        Ok(())
    }

    /// Check bind ports, proxy prefixes and proxy targets
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfiguration {
                details: "server.port must be between 1 and 65535".to_string(),
            });
        }
        if self.preview.port == 0 {
            return Err(ConfigError::InvalidConfiguration {
                details: "preview.port must be between 1 and 65535".to_string(),
            });
        }
        if self.build.out_dir.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                details: "build.outDir must not be empty".to_string(),
            });
        }

        validate_rules("server.proxy", &self.server.proxy)?;
        if let Some(preview_proxy) = &self.preview.proxy {
            validate_rules("preview.proxy", preview_proxy)?;
        }

        Ok(())
    }

    /// Proxy rules the preview server uses
    pub fn preview_proxy(&self) -> &ProxyRules {
        self.preview.proxy.as_ref().unwrap_or(&self.server.proxy)
    }

    /// Directory served by the dev server
    pub fn public_dir_path(&self) -> PathBuf {
        self.root.join(&self.public_dir)
    }

    /// Directory served by the preview server
    pub fn out_dir_path(&self) -> PathBuf {
        self.root.join(&self.build.out_dir)
    }
}

fn validate_rules(section: &str, rules: &ProxyRules) -> Result<(), ConfigError> {
    for (prefix, rule) in rules.iter() {
        if !prefix.starts_with('/') {
            return Err(ConfigError::InvalidConfiguration {
                details: format!("{} key `{}` must start with '/'", section, prefix),
            });
        }
        rule.target_url()?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
