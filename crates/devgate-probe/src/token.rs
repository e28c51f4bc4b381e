use std::env::VarError;
use tracing::{debug, warn};

/// Environment variable the probe reads its token from by default
pub const DEFAULT_TOKEN_ENV: &str = "JWT_TOKEN";

/// Where the probe's token comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Read from an environment variable; empty string when unset
    Env(String),
    /// Given explicitly
    Literal(String),
}

impl Default for TokenSource {
    fn default() -> Self {
        TokenSource::Env(DEFAULT_TOKEN_ENV.to_string())
    }
}

impl TokenSource {
    pub fn resolve(&self) -> String {
        self.resolve_with(env_token)
    }

    /// Resolve with a custom variable lookup
    pub fn resolve_with<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            TokenSource::Literal(token) => token.clone(),
            TokenSource::Env(name) => match lookup(name) {
                Some(token) => token,
                None => {
                    debug!("{} is not set, using an empty token", name);
                    String::new()
                }
            },
        }
    }
}

fn env_token(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(token) => Some(token),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            warn!("{} is not valid UTF-8, ignoring it", name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ProbeTarget;
    use serial_test::serial;

    #[test]
    fn test_literal_token() {
        let source = TokenSource::Literal("abc".to_string());
        assert_eq!(source.resolve_with(|_| Some("ignored".to_string())), "abc");
    }

    #[test]
    fn test_env_lookup_uses_variable_name() {
        let source = TokenSource::Env("PROBE_TOKEN".to_string());
        let token = source.resolve_with(|name| (name == "PROBE_TOKEN").then(|| "xyz".to_string()));
        assert_eq!(token, "xyz");
    }

    #[test]
    #[serial]
    fn test_unset_env_gives_empty_token_in_url() {
        std::env::remove_var(DEFAULT_TOKEN_ENV);

        let token = TokenSource::default().resolve();
        assert_eq!(token, "");
        assert_eq!(
            ProbeTarget::default().url(&token),
            "ws://localhost:8000/ws/?token="
        );
    }

    #[test]
    #[serial]
    fn test_env_token_is_read() {
        std::env::set_var(DEFAULT_TOKEN_ENV, "from-env");
        let token = TokenSource::default().resolve();
        std::env::remove_var(DEFAULT_TOKEN_ENV);

        assert_eq!(token, "from-env");
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_non_utf8_env_token_is_ignored() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var(DEFAULT_TOKEN_ENV, OsStr::from_bytes(&[0x66, 0xff, 0xfe]));
        let lookup = env_token(DEFAULT_TOKEN_ENV);
        let token = TokenSource::default().resolve();
        std::env::remove_var(DEFAULT_TOKEN_ENV);

        assert_eq!(lookup, None);
        assert_eq!(token, "");
    }
}
