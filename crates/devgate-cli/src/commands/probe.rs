use clap::Args;
use devgate_probe::{run_probe, ConsoleHandler, ProbeTarget, TokenSource, DEFAULT_TOKEN_ENV};
use tracing::debug;

#[derive(Args)]
pub struct ProbeCommand {
    /// WebSocket host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// WebSocket port
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Endpoint path
    #[arg(long, default_value = "/ws/")]
    pub path: String,

    /// HTTP(S) base URL to derive the ws(s) origin from, instead of host/port
    #[arg(long)]
    pub base_url: Option<String>,

    /// Token to send; takes precedence over --token-env
    #[arg(long)]
    pub token: Option<String>,

    /// Environment variable holding the token
    #[arg(long, default_value = DEFAULT_TOKEN_ENV)]
    pub token_env: String,
}

impl ProbeCommand {
    pub fn token_source(&self) -> TokenSource {
        match &self.token {
            Some(token) => TokenSource::Literal(token.clone()),
            None => TokenSource::Env(self.token_env.clone()),
        }
    }

    pub fn target(&self) -> anyhow::Result<ProbeTarget> {
        match &self.base_url {
            Some(base_url) => Ok(ProbeTarget::from_base_url(base_url, &self.path)?),
            None => Ok(ProbeTarget::new(self.host.clone(), self.port).with_path(self.path.clone())),
        }
    }

    /// Connection failures are printed, not returned
    pub fn execute(self) -> anyhow::Result<()> {
        let target = self.target()?;
        let token = self.token_source().resolve();
        let url = target.url(&token);
        debug!("Probing {}", target.endpoint());

        let rt = tokio::runtime::Runtime::new()?;
        let mut handler = ConsoleHandler;
        let outcome = rt.block_on(run_probe(&url, &mut handler));
        debug!("Probe outcome: {:?}", outcome);

        Ok(())
    }
}
