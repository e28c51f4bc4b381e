use devgate_config::{DevConfig, ProxyRules};
use std::fmt;
use std::path::PathBuf;

/// Which server is being run from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Serves `publicDir` and proxies `server.proxy`
    Dev,
    /// Serves `build.outDir` and proxies `preview.proxy` (or `server.proxy`)
    Preview,
}

impl fmt::Display for ServeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeMode::Dev => f.write_str("dev"),
            ServeMode::Preview => f.write_str("preview"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub mode: ServeMode,
    pub host: String,
    pub port: u16,
    pub strict_port: bool,
    pub rules: ProxyRules,
    pub static_root: PathBuf,
}

impl ProxyConfig {
    pub fn from_dev_config(config: &DevConfig, mode: ServeMode) -> Self {
        match mode {
            ServeMode::Dev => Self {
                mode,
                host: config.server.host.clone(),
                port: config.server.port,
                strict_port: config.server.strict_port,
                rules: config.server.proxy.clone(),
                static_root: config.public_dir_path(),
            },
            ServeMode::Preview => Self {
                mode,
                host: config.preview.host.clone(),
                port: config.preview.port,
                strict_port: config.preview.strict_port,
                rules: config.preview_proxy().clone(),
                static_root: config.out_dir_path(),
            },
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from_dev_config(&DevConfig::default(), ServeMode::Dev)
    }
}
