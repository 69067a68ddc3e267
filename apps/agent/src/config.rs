//! Agent configuration

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::time::Duration;
use tunl_common::constants::{
    CONNECT_TIMEOUT_SECS, HEARTBEAT_INTERVAL_SECS, REGISTRATION_PARAM, REQUEST_TIMEOUT_SECS,
    SUBDOMAIN_PARAM,
};
use url::{Host, Url};

/// CLI arguments for the agent
#[derive(Parser, Debug, Clone)]
#[command(name = "tunl")]
#[command(about = "Expose a local HTTP server through a tunl broker", long_about = None)]
#[command(version)]
pub struct Args {
    /// Local port to forward requests to
    #[arg(short, long, env = "TUNL_PORT")]
    pub port: u16,

    /// Local host address
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Broker domain, optionally with a port
    #[arg(short, long, env = "TUNL_DOMAIN", default_value = "localhost:1234")]
    pub domain: String,

    /// Subdomain to request; a random one is assigned when taken or absent
    #[arg(short, long)]
    pub subdomain: Option<String>,

    /// WebSocket scheme; inferred from the domain when omitted
    #[arg(long, value_parser = ["ws", "wss"])]
    pub scheme: Option<String>,

    /// Open the public URL in a browser once connected
    #[arg(short, long)]
    pub open: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// Request timeout in seconds when calling the local server
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub request_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct Config {
    /// Local server address (e.g., "http://localhost:3000")
    pub local_address: String,

    /// Registration URL on the broker (e.g., "ws://localhost:1234/?new")
    pub websocket_url: String,

    /// Open the public URL in a browser after `init`
    pub open_browser: bool,

    /// Time allowed for connecting and receiving `init`
    pub connect_timeout: Duration,

    /// Request timeout when calling the local server
    pub request_timeout: Duration,

    /// Interval between WebSocket ping frames
    pub heartbeat_interval: Duration,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let websocket_url =
            registration_url(&args.domain, args.subdomain.as_deref(), args.scheme.as_deref())?;

        Ok(Self {
            local_address: format!("http://{}:{}", args.host, args.port),
            websocket_url,
            open_browser: args.open,
            connect_timeout: Duration::from_secs(args.connect_timeout),
            request_timeout: Duration::from_secs(args.request_timeout),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
        })
    }
}

/// Build the broker URL an agent registers at: `{ws|wss}://{domain}/?new[&subdomain=..]`
pub fn registration_url(
    domain: &str,
    subdomain: Option<&str>,
    scheme: Option<&str>,
) -> Result<String> {
    let domain = domain.trim().trim_end_matches('/');
    let mut url = Url::parse(&format!("ws://{}/", domain))
        .with_context(|| format!("Invalid broker domain: {}", domain))?;

    let scheme = match scheme {
        Some(scheme) => scheme,
        None if is_local_host(&url) => "ws",
        None => "wss",
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("Invalid WebSocket scheme: {}", scheme))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_key_only(REGISTRATION_PARAM);
        if let Some(subdomain) = subdomain.filter(|s| !s.is_empty()) {
            query.append_pair(SUBDOMAIN_PARAM, subdomain);
        }
    }

    Ok(url.to_string())
}

/// Loopback and unspecified hosts are served without TLS
fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Some(Host::Ipv6(ip)) => ip.is_loopback() || ip.is_unspecified(),
        None => false,
    }
}
