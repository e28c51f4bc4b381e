use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use url::Url;

use crate::config::ConfigError;

const SUPPORTED_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

/// A single reverse-proxy rule, keyed by path prefix in [`ProxyRules`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRule {
    /// Upstream origin, e.g. `http://127.0.0.1:8000`
    pub target: String,

    /// Rewrite the outbound Host header to the target's host
    #[serde(default)]
    pub change_origin: bool,

    /// Verify upstream TLS certificates (only meaningful for https/wss targets)
    #[serde(default = "default_secure")]
    pub secure: bool,

    /// Tunnel WebSocket upgrade requests for this prefix
    #[serde(default)]
    pub ws: bool,
}

fn default_secure() -> bool {
    true
}

impl ProxyRule {
    /// Rule with only a target, every flag at its default
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            change_origin: false,
            secure: default_secure(),
            ws: false,
        }
    }

    /// Parse and check the target origin
    pub fn target_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.target).map_err(|e| ConfigError::InvalidConfiguration {
            details: format!("proxy target `{}` is not a valid URL: {}", self.target, e),
        })?;

        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(ConfigError::InvalidConfiguration {
                details: format!(
                    "proxy target `{}` must use one of {:?}",
                    self.target, SUPPORTED_SCHEMES
                ),
            });
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidConfiguration {
                details: format!("proxy target `{}` has no host", self.target),
            });
        }

        Ok(url)
    }
}

/// Either the `'/foo': 'http://host'` shorthand or the full rule object
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleEntry {
    Target(String),
    Rule(ProxyRule),
}

impl From<RuleEntry> for ProxyRule {
    fn from(entry: RuleEntry) -> Self {
        match entry {
            RuleEntry::Target(target) => ProxyRule::new(target),
            RuleEntry::Rule(rule) => rule,
        }
    }
}

/// Proxy rules in declaration order (the YAML mapping order).
///
/// The first prefix that matches a request path wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRules(Vec<(String, ProxyRule)>);

impl ProxyRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule, replacing an existing rule with the same prefix in place
    pub fn insert(&mut self, prefix: impl Into<String>, rule: ProxyRule) {
        let prefix = prefix.into();
        match self.0.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, existing)) => *existing = rule,
            None => self.0.push((prefix, rule)),
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&ProxyRule> {
        self.0.iter().find(|(p, _)| p == prefix).map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProxyRule)> {
        self.0.iter().map(|(prefix, rule)| (prefix.as_str(), rule))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ProxyRule)> {
        self.0.iter_mut().map(|(prefix, rule)| (prefix.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ProxyRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (prefix, rule) in &self.0 {
            map.serialize_entry(prefix, rule)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProxyRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = ProxyRules;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of path prefixes to proxy rules")
            }

            fn visit_unit<E: DeError>(self) -> Result<ProxyRules, E> {
                Ok(ProxyRules::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ProxyRules, A::Error> {
                let mut rules: Vec<(String, ProxyRule)> = Vec::new();
                while let Some((prefix, entry)) = map.next_entry::<String, RuleEntry>()? {
                    if rules.iter().any(|(p, _)| *p == prefix) {
                        return Err(A::Error::custom(format!(
                            "duplicate proxy prefix `{}`",
                            prefix
                        )));
                    }
                    rules.push((prefix, entry.into()));
                }
                Ok(ProxyRules(rules))
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}
