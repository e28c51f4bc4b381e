use devgate_proxy::ProxyShutdownSignal;
use std::future::Future;
use std::pin::Pin;
use tracing::{error, info};

/// Shutdown signal for Ctrl+C
pub struct CtrlCShutdownSignal;

impl ProxyShutdownSignal for CtrlCShutdownSignal {
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                // Without a signal handler the server runs until killed
                error!("Failed to listen for ctrl-c signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down...");
        })
    }
}
