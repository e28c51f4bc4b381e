use clap::Args;
use devgate_config::{DevConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

/// Configuration file selection shared by the commands that need it
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the configuration file (defaults apply when it is missing)
    #[arg(long = "config", default_value = DEFAULT_CONFIG_FILE, env = "DEVGATE_CONFIG")]
    pub path: PathBuf,
}

impl ConfigArgs {
    /// Load the file, apply `DEVGATE_*` overrides and validate the result
    pub fn load(&self) -> anyhow::Result<DevConfig> {
        let mut config = DevConfig::load(&self.path).map_err(|e| {
            anyhow::anyhow!("Failed to load {}: {}", self.path.display(), e)
        })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ConfigCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.config.load()?;
        print!("{}", config.to_yaml()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let args = ConfigArgs {
            path: dir.path().join("devgate.yaml"),
        };

        let config = args.load().unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.build.out_dir, "dist");
    }

    #[test]
    #[serial]
    fn test_env_overrides_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devgate.yaml");
        std::fs::write(&path, "server:\n  port: 5173\n").unwrap();

        std::env::set_var(devgate_config::ENV_PORT, "4000");
        let result = ConfigArgs { path }.load();
        std::env::remove_var(devgate_config::ENV_PORT);

        assert_eq!(result.unwrap().server.port, 4000);
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devgate.yaml");
        std::fs::write(&path, "server:\n  port: [1, 2]\n").unwrap();

        let err = ConfigArgs { path }.load().unwrap_err();
        assert!(err.to_string().contains("devgate.yaml"));
    }
}
