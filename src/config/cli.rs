//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::ProxyConfig;
use crate::observability::logging::LogFormat;

#[derive(Debug, Clone, Parser)]
#[command(name = "inbox-shield")]
#[command(about = "Filtering proxy for federated inbox traffic", long_about = None)]
pub struct Cli {
    /// Policy file with the access-control rule sets (YAML or TOML).
    #[arg(long, env = "RULE_FILE")]
    pub rule_file: PathBuf,

    #[command(flatten)]
    pub proxy: ProxyConfig,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Validate configuration and policy, then exit.
    #[arg(long)]
    pub check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: [&str; 8] = [
        "RULE_FILE",
        "UPSTREAM_ENDPOINT",
        "DENY_RESPONSE_CODE",
        "PORT",
        "EXIT_TIMEOUT",
        "REQUEST_TIMEOUT",
        "LOG_FORMAT",
        "METRICS_ADDRESS",
    ];

    fn env_is_clean() -> bool {
        ENV_VARS.iter().all(|v| std::env::var_os(v).is_none())
    }

    #[test]
    fn test_defaults() {
        if !env_is_clean() {
            return;
        }
        let cli = Cli::try_parse_from([
            "inbox-shield",
            "--rule-file",
            "rules.yaml",
            "--upstream-endpoint",
            "http://127.0.0.1:8080",
        ])
        .unwrap();

        assert_eq!(cli.rule_file, PathBuf::from("rules.yaml"));
        assert_eq!(cli.proxy.upstream_endpoint, "http://127.0.0.1:8080");
        assert_eq!(cli.proxy.deny_response_code, 404);
        assert_eq!(cli.proxy.port, 3000);
        assert_eq!(cli.proxy.exit_timeout_secs, 10);
        assert_eq!(cli.proxy.request_timeout_secs, 30);
        assert_eq!(cli.proxy.metrics_address, None);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert!(!cli.check);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "inbox-shield",
            "--rule-file",
            "rules.toml",
            "--upstream-endpoint",
            "http://mastodon:3000",
            "--deny-response-code",
            "403",
            "--port",
            "8080",
            "--exit-timeout",
            "5",
            "--metrics-address",
            "127.0.0.1:9100",
            "--log-format",
            "json",
            "--check",
        ])
        .unwrap();

        assert_eq!(cli.proxy.deny_response_code, 403);
        assert_eq!(cli.proxy.port, 8080);
        assert_eq!(cli.proxy.exit_timeout_secs, 5);
        assert_eq!(cli.proxy.metrics_address, Some("127.0.0.1:9100".parse().unwrap()));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.check);
    }

    #[test]
    fn test_upstream_is_required() {
        if !env_is_clean() {
            return;
        }
        assert!(Cli::try_parse_from(["inbox-shield", "--rule-file", "rules.yaml"]).is_err());
    }

    #[test]
    fn test_help_states_upstream_scheme() {
        use clap::CommandFactory;

        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("--upstream-endpoint"));
        assert!(help.contains("`http://` only"));
    }
}
