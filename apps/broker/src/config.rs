//! Broker configuration
//!
//! Command-line flags with environment fallbacks (`PORT`, `SCHEME`, `DOMAIN`).

use clap::Parser;
use std::time::Duration;
use tunl_common::constants::{DEFAULT_BROKER_PORT, REQUEST_TIMEOUT_SECS};

/// CLI arguments for the broker
#[derive(Parser, Debug)]
#[command(name = "tunl-broker")]
#[command(about = "Public HTTP listener and subdomain registry for tunl agents", long_about = None)]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_BROKER_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Scheme used in public URLs handed to agents
    #[arg(long, env = "SCHEME", default_value = "http", value_parser = ["http", "https"])]
    pub scheme: String,

    /// Public base domain; tunnels live at <subdomain>.<domain>
    /// Defaults to localhost:<port>
    #[arg(short, long, env = "DOMAIN")]
    pub domain: Option<String>,

    /// Seconds to wait for an agent to answer a forwarded request
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub request_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Configuration for the broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Socket address to listen on (e.g., "0.0.0.0:1234")
    pub listen_addr: String,

    /// Public scheme, "http" or "https"
    pub scheme: String,

    /// Public base domain, possibly with a port (e.g., "example.com", "localhost:1234")
    pub domain: String,

    /// How long a public request waits for its agent
    pub request_timeout: Duration,
}

impl BrokerConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            listen_addr: format!("{}:{}", args.bind, args.port),
            scheme: args.scheme.clone(),
            domain: args
                .domain
                .clone()
                .unwrap_or_else(|| format!("localhost:{}", args.port)),
            request_timeout: Duration::from_secs(args.request_timeout),
        }
    }

    /// Public URL for a tunnel
    pub fn public_url(&self, subdomain: &str) -> String {
        format!("{}://{}.{}", self.scheme, subdomain, self.domain)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_BROKER_PORT),
            scheme: "http".to_string(),
            domain: format!("localhost:{}", DEFAULT_BROKER_PORT),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_domain_to_localhost_port() {
        let args = Args::parse_from(["tunl-broker", "--port", "9100"]);
        let config = BrokerConfig::from_args(&args);

        assert_eq!(config.listen_addr, "0.0.0.0:9100");
        assert_eq!(config.scheme, "http");
        assert_eq!(config.domain, "localhost:9100");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from([
            "tunl-broker",
            "--port",
            "8080",
            "--bind",
            "127.0.0.1",
            "--scheme",
            "https",
            "--domain",
            "tunnel.example.com",
            "--request-timeout",
            "5",
        ]);
        let config = BrokerConfig::from_args(&args);

        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.scheme, "https");
        assert_eq!(config.domain, "tunnel.example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        assert!(Args::try_parse_from(["tunl-broker", "--scheme", "ftp"]).is_err());
    }

    #[test]
    fn test_public_url() {
        let config = BrokerConfig {
            domain: "example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.public_url("bold-calm-fox"), "http://bold-calm-fox.example.com");
    }
}
