use devgate_config::ConfigError;

/// Error types for the proxy server
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid proxy rule for {prefix}: {source}")]
    InvalidRule {
        prefix: String,
        #[source]
        source: ConfigError,
    },

    #[error("Port {port} is already in use on {host}")]
    PortInUse { host: String, port: u16 },

    #[error("No free port on {host} in {first}..={last}")]
    NoFreePort { host: String, first: u16, last: u16 },

    #[error("Failed to resolve listen address {host}:{port}")]
    UnresolvableHost { host: String, port: u16 },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
