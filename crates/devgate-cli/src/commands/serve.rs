use clap::Args;
use devgate_config::DevConfig;
use devgate_proxy::{ProxyConfig, ProxyShutdownSignal, ServeMode};
use tracing::{error, info};

use super::config::ConfigArgs;
use super::shutdown::CtrlCShutdownSignal;

#[derive(Args)]
pub struct ServeCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Host to bind (overrides the configuration file)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides the configuration file)
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeCommand {
    pub fn execute(self, mode: ServeMode) -> anyhow::Result<()> {
        let config = self.config.load()?;
        let proxy_config = self.proxy_config(&config, mode);

        info!(
            "Starting devgate {} server (strictPort={})",
            mode, proxy_config.strict_port
        );

        let shutdown_signal = Box::new(CtrlCShutdownSignal) as Box<dyn ProxyShutdownSignal>;

        match devgate_proxy::setup_proxy_server(proxy_config, shutdown_signal) {
            Ok(_) => {
                info!("{} server exited", mode);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start {} server: {}", mode, e);
                Err(anyhow::anyhow!("Failed to start {} server: {}", mode, e))
            }
        }
    }

    fn proxy_config(&self, config: &DevConfig, mode: ServeMode) -> ProxyConfig {
        let mut proxy_config = ProxyConfig::from_dev_config(config, mode);
        if let Some(host) = &self.host {
            proxy_config.host = host.clone();
        }
        if let Some(port) = self.port {
            proxy_config.port = port;
        }
        proxy_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn command(host: Option<&str>, port: Option<u16>) -> ServeCommand {
        ServeCommand {
            config: ConfigArgs {
                path: PathBuf::from("devgate.yaml"),
            },
            host: host.map(str::to_string),
            port,
        }
    }

    #[test]
    fn test_flags_override_configuration() {
        let config = DevConfig::default();
        let proxy_config = command(Some("0.0.0.0"), Some(5173)).proxy_config(&config, ServeMode::Dev);

        assert_eq!(proxy_config.host, "0.0.0.0");
        assert_eq!(proxy_config.port, 5173);
        assert!(proxy_config.strict_port);
    }

    #[test]
    fn test_preview_without_flags_uses_preview_section() {
        let mut config = DevConfig::default();
        config.preview.port = 4173;

        let proxy_config = command(None, None).proxy_config(&config, ServeMode::Preview);
        assert_eq!(proxy_config.mode, ServeMode::Preview);
        assert_eq!(proxy_config.host, "localhost");
        assert_eq!(proxy_config.port, 4173);
    }
}
