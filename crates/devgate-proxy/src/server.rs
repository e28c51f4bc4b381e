use anyhow::Result;
use async_trait::async_trait;
use pingora::server::RunArgs;
use pingora_core::server::configuration::Opt;
use pingora_proxy::http_proxy_service;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ProxyConfig, ServeMode};
use crate::error::ProxyError;
use crate::listener::bind_listener;
use crate::proxy::DevProxy;
use crate::routes::RouteTable;
use crate::static_files::StaticFiles;
use crate::traits::UpstreamResolver;

/// Custom shutdown signal trait that callers can implement
pub trait ProxyShutdownSignal: Send + Sync {
    /// Wait for the shutdown signal to be triggered
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Bridge between our custom trait and Pingora's ShutdownSignalWatch
struct ShutdownSignalBridge {
    signal: Box<dyn ProxyShutdownSignal>,
}

impl ShutdownSignalBridge {
    fn new(signal: Box<dyn ProxyShutdownSignal>) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl pingora::server::ShutdownSignalWatch for ShutdownSignalBridge {
    async fn recv(&self) -> pingora::server::ShutdownSignal {
        self.signal.wait_for_signal().await;
        pingora::server::ShutdownSignal::FastShutdown
    }
}

/// Build the proxy from its configuration without starting a server
pub fn create_proxy_service(config: &ProxyConfig) -> Result<DevProxy, ProxyError> {
    let route_table = RouteTable::from_rules(&config.rules)?;
    if route_table.is_empty() {
        debug!("No proxy rules configured, serving static files only");
    }

    let resolver = Arc::new(route_table) as Arc<dyn UpstreamResolver>;
    let static_files = StaticFiles::new(config.static_root.clone());

    Ok(DevProxy::new(config.mode, resolver, static_files))
}

/// Setup and run the server until the shutdown signal fires
pub fn setup_proxy_server(
    config: ProxyConfig,
    shutdown_signal: Box<dyn ProxyShutdownSignal>,
) -> Result<()> {
    let proxy = create_proxy_service(&config)?;

    if !config.static_root.is_dir() {
        match config.mode {
            ServeMode::Preview => warn!(
                "Build output {} does not exist, run the build first",
                config.static_root.display()
            ),
            ServeMode::Dev => debug!(
                "Static directory {} does not exist",
                config.static_root.display()
            ),
        }
    }

    let address = bind_listener(&config.host, config.port, config.strict_port)?;

    // Setup Pingora server
    let opt = Opt {
        daemon: false,
        ..Default::default()
    };

    let mut server = pingora_core::server::Server::new(opt)?;
    server.bootstrap();

    let mut proxy_service = http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&address.to_string());
    server.add_service(proxy_service);

    info!(
        "Starting {} server on http://{}:{}",
        config.mode,
        config.host,
        address.port()
    );
    for (prefix, rule) in config.rules.iter() {
        info!("  {} -> {}", prefix, rule.target);
    }
    info!("  static files from {}", config.static_root.display());

    let run_args = RunArgs {
        shutdown_signal: Box::new(ShutdownSignalBridge::new(shutdown_signal)),
    };
    server.run(run_args);

    Ok(())
}
