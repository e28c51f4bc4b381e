//! Devgate Config - dev-server configuration model
//!
//! Central definition of the `devgate.yaml` file consumed by the dev and
//! preview servers: bind addresses, reverse-proxy rules, build output and
//! dependency-optimization settings.

mod config;
mod proxy_rules;

pub use config::{
    BuildOptions, ConfigError, DevConfig, OptimizeDepsOptions, PreviewOptions, ServerOptions,
    DEFAULT_CONFIG_FILE, DEFAULT_UPSTREAM, ENV_HOST, ENV_PORT, ENV_PROXY_TARGET, ENV_STRICT_PORT,
};
pub use proxy_rules::{ProxyRule, ProxyRules};
