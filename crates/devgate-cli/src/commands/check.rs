use clap::Args;
use devgate_probe::{login, run_check, Channel, CheckOptions, ThreatFilters};
use tracing::{error, info};

#[derive(Args)]
pub struct CheckCommand {
    /// Base HTTP URL of the backend
    #[arg(long, default_value = "http://127.0.0.1:8000", env = "BASE_URL")]
    pub base_url: String,

    /// Login email
    #[arg(long, default_value = "admin@trojandefender.com", env = "TD_ADMIN_EMAIL")]
    pub email: String,

    /// Login password
    #[arg(long, env = "TD_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Access token to use instead of logging in
    #[arg(long)]
    pub token: Option<String>,

    /// Run the general channel check
    #[arg(long)]
    pub run_general: bool,

    /// Run the threat-intelligence channel check
    #[arg(long)]
    pub run_ti: bool,

    /// Run the threat-map channel check
    #[arg(long)]
    pub run_map: bool,

    /// Threat-map severity filter (e.g. high, medium)
    #[arg(long, default_value = "high")]
    pub filters_severity: String,

    /// Threat-map window in days
    #[arg(long, default_value_t = 30)]
    pub filters_days: u32,

    /// Skip posting a threat event during the threat-map check
    #[arg(long)]
    pub no_create_event: bool,
}

impl CheckCommand {
    /// Selected channels; none selected means all of them
    pub fn channels(&self) -> Vec<Channel> {
        let selected: Vec<Channel> = [
            (self.run_general, Channel::General),
            (self.run_ti, Channel::ThreatIntelligence),
            (self.run_map, Channel::ThreatMap),
        ]
        .into_iter()
        .filter_map(|(enabled, channel)| enabled.then_some(channel))
        .collect();

        if selected.is_empty() {
            Channel::ALL.to_vec()
        } else {
            selected
        }
    }

    pub fn filters(&self) -> ThreatFilters {
        ThreatFilters {
            days: self.filters_days,
            severity: self.filters_severity.clone(),
        }
    }

    pub fn options(&self) -> CheckOptions {
        CheckOptions {
            filters: self.filters(),
            create_event: !self.no_create_event,
        }
    }

    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(&self) -> anyhow::Result<()> {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => {
                let password = self.password.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("--password (or TD_ADMIN_PASSWORD) is required without --token")
                })?;
                let token = login(&self.base_url, &self.email, password).await?;
                println!("Obtained access token.");
                token
            }
        };

        let options = self.options();
        let mut failed = Vec::new();
        for channel in self.channels() {
            match run_check(&self.base_url, &token, channel, &options).await {
                Ok(report) => info!(
                    "{} channel: {} message(s) received",
                    channel,
                    report.received.len()
                ),
                Err(e) => {
                    error!("{} channel check failed: {}", channel, e);
                    failed.push(channel.to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Could not connect to channel(s): {}",
                failed.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        check: CheckCommand,
    }

    fn parse(args: &[&str]) -> CheckCommand {
        let mut argv = vec!["check"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().check
    }

    #[test]
    fn test_no_selection_runs_all_channels() {
        assert_eq!(parse(&[]).channels(), Channel::ALL.to_vec());
    }

    #[test]
    fn test_selected_channels_keep_order() {
        let cmd = parse(&["--run-map", "--run-general"]);
        assert_eq!(cmd.channels(), vec![Channel::General, Channel::ThreatMap]);
    }

    #[test]
    fn test_filters() {
        let cmd = parse(&["--filters-severity", "medium", "--filters-days", "7"]);
        assert_eq!(
            cmd.filters(),
            ThreatFilters {
                days: 7,
                severity: "medium".to_string()
            }
        );
        assert_eq!(parse(&[]).filters(), ThreatFilters::default());
    }

    #[test]
    fn test_event_creation_toggle() {
        assert!(parse(&[]).options().create_event);

        let options = parse(&["--run-map", "--no-create-event"]).options();
        assert!(!options.create_event);
        assert_eq!(options.filters, ThreatFilters::default());
    }
}
