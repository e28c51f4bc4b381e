use url::Url;

use crate::error::ProbeError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PATH: &str = "/ws/";

/// Where the probe connects; the token is supplied when the URL is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// `ws` or `wss`
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for ProbeTarget {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl ProbeTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_path(&path.into());
        self
    }

    /// Target on the same origin as an HTTP(S) base URL.
    ///
    /// `http` maps to `ws` and `https` to `wss`. A path on the base URL is
    /// kept as a prefix of `path`.
    pub fn from_base_url(base_url: &str, path: &str) -> Result<Self, ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(&http_to_ws(base_url)).map_err(|e| invalid(&e.to_string()))?;
        // Url lowercases the scheme, so `HTTP://` reaches here unconverted
        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host"))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let prefix = url.path().trim_end_matches('/');
        let path = normalize_path(path);

        Ok(Self {
            scheme: scheme.to_string(),
            host,
            port,
            path: format!("{}{}", prefix, path),
        })
    }

    /// Probe URL with the token as the `token` query parameter
    pub fn url(&self, token: &str) -> String {
        format!(
            "{}?token={}",
            self.endpoint(),
            urlencoding::encode(token)
        )
    }

    /// URL without the query string, safe to log
    pub fn endpoint(&self) -> String {
        let default_port = match self.scheme.as_str() {
            "wss" => 443,
            _ => 80,
        };
        if self.port == default_port {
            format!("{}://{}{}", self.scheme, self.host, self.path)
        } else {
            format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
        }
    }
}

/// Swap an `http(s)://` prefix for `ws(s)://`, leaving anything else as-is
pub fn http_to_ws(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
