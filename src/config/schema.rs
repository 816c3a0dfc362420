//! Configuration schema definitions.
//!
//! Two sources feed the proxy: runtime parameters (flags or environment
//! variables, see [`ProxyConfig`]) and the policy document (YAML or TOML,
//! see [`PolicyDocument`]).

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

/// Runtime parameters for the proxy.
#[derive(Debug, Clone, Args)]
pub struct ProxyConfig {
    /// Upstream server that allowed requests are forwarded to (`http://` only).
    #[arg(long, env = "UPSTREAM_ENDPOINT")]
    pub upstream_endpoint: String,

    /// Status code returned to denied requests.
    #[arg(long, env = "DENY_RESPONSE_CODE", default_value_t = 404)]
    pub deny_response_code: u16,

    /// Port to listen on (all interfaces).
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds to wait for in-flight requests on shutdown.
    #[arg(long = "exit-timeout", env = "EXIT_TIMEOUT", default_value_t = 10)]
    pub exit_timeout_secs: u64,

    /// Whole-request deadline in seconds.
    #[arg(long = "request-timeout", env = "REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,
}

impl ProxyConfig {
    /// Configuration with every optional parameter at its default.
    pub fn new(upstream_endpoint: impl Into<String>) -> Self {
        Self {
            upstream_endpoint: upstream_endpoint.into(),
            deny_response_code: 404,
            port: 3000,
            exit_timeout_secs: 10,
            request_timeout_secs: 30,
            metrics_address: None,
        }
    }

    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_secs(self.exit_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Root of the policy document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyDocument {
    /// Rule sets in evaluation order.
    pub rulesets: Vec<RuleSetConfig>,
}

/// One rule set: an action and the rules that must all match.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetConfig {
    /// `allow` or `deny`, case-insensitive.
    pub action: String,

    /// Rules combined with AND semantics; must not be empty.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single rule descriptor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Matcher kind: `note_body`, `mention_count`, `actor`,
    /// `user_agent` (or `useragent`), `remote_ip`.
    pub source: String,

    /// Substring for `note_body` and `user_agent`; address block for
    /// `remote_ip` when `cidr` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,

    /// Prefix for `actor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,

    /// Mention threshold for `mention_count` (missing means 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_than: Option<i64>,

    /// Address block for `remote_ip`. Takes precedence over `contains`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
}
