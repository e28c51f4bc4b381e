use devgate_config::{ProxyRule, ProxyRules};
use pingora::{Error, ErrorType};
use pingora_core::{upstreams::peer::HttpPeer, Result as PingoraResult};
use std::sync::Arc;
use tracing::debug;

use crate::error::ProxyError;
use crate::traits::UpstreamResolver;

/// Connection details derived from a rule's target origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// `host:port` used to open the TCP connection
    pub authority: String,
    /// HTTP origin requests are forwarded to (ws/wss map to http/https)
    pub origin: String,
    pub tls: bool,
    pub sni: String,
    /// Value for the Host header when the rule rewrites the origin
    pub host_header: String,
    pub verify_cert: bool,
}

impl Upstream {
    pub fn from_rule(prefix: &str, rule: &ProxyRule) -> Result<Self, ProxyError> {
        let url = rule.target_url().map_err(|source| ProxyError::InvalidRule {
            prefix: prefix.to_string(),
            source,
        })?;

        let tls = matches!(url.scheme(), "https" | "wss");
        let scheme = if tls { "https" } else { "http" };
        // target_url() guarantees a host
        let host = url.host_str().unwrap_or_default().to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if tls { 443 } else { 80 });

        let host_header = match url.port() {
            Some(explicit) => format!("{}:{}", host, explicit),
            None => host.clone(),
        };

        Ok(Self {
            authority: format!("{}:{}", host, port),
            origin: format!("{}://{}", scheme, host_header),
            tls,
            sni: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            host_header,
            verify_cert: rule.secure,
        })
    }

    /// Full upstream URL for a request path (path and query are kept as-is)
    pub fn forward_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.origin, path_and_query)
    }

    /// Resolve the authority and build the Pingora peer
    pub async fn peer(&self) -> PingoraResult<Box<HttpPeer>> {
        let addr = tokio::net::lookup_host(self.authority.as_str())
            .await
            .map_err(|e| {
                Error::because(
                    ErrorType::ConnectNoRoute,
                    format!("Failed to resolve upstream {}", self.authority),
                    e,
                )
            })?
            .next()
            .ok_or_else(|| {
                Error::explain(
                    ErrorType::ConnectNoRoute,
                    format!("No address for upstream {}", self.authority),
                )
            })?;

        let mut peer = HttpPeer::new(addr, self.tls, self.sni.clone());
        if self.tls {
            peer.options.verify_cert = self.verify_cert;
            peer.options.verify_hostname = self.verify_cert;
        }
        Ok(Box::new(peer))
    }
}

/// A proxy rule with its prefix and resolved upstream
#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: String,
    pub rule: ProxyRule,
    pub upstream: Upstream,
}

impl Route {
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Prefix routes in declaration order; first match wins
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn from_rules(rules: &ProxyRules) -> Result<Self, ProxyError> {
        let routes = rules
            .iter()
            .map(|(prefix, rule)| {
                let upstream = Upstream::from_rule(prefix, rule)?;
                debug!(
                    "Proxy route {} -> {} (changeOrigin={}, ws={})",
                    prefix, upstream.origin, rule.change_origin, rule.ws
                );
                Ok(Arc::new(Route {
                    prefix: prefix.to_string(),
                    rule: rule.clone(),
                    upstream,
                }))
            })
            .collect::<Result<Vec<_>, ProxyError>>()?;

        Ok(Self { routes })
    }

    pub fn resolve(&self, path: &str) -> Option<Arc<Route>> {
        self.routes.iter().find(|route| route.matches(path)).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl UpstreamResolver for RouteTable {
    fn resolve_route(&self, path: &str) -> Option<Arc<Route>> {
        self.resolve(path)
    }
}
