//! Command-line configuration for the marquee binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use marquee_limiter::LimiterConfig;

/// Runtime settings, parsed from process flags.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "JSON API for the marquee movie catalog")]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, default_value = "127.0.0.1:4000")]
    pub addr: SocketAddr,

    /// Environment name reported by the healthcheck
    #[arg(long, default_value = "development")]
    pub env: String,

    /// Path to the SQLite database file
    #[arg(long, default_value = "marquee.db")]
    pub db: PathBuf,

    /// Sustained request rate allowed per client IP, in requests per second
    #[arg(long, default_value_t = 2.0)]
    pub limiter_rps: f64,

    /// Maximum burst of requests allowed per client IP
    #[arg(long, default_value_t = 4)]
    pub limiter_burst: u32,

    /// Whether per-client rate limiting is enforced
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub limiter_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

impl Config {
    /// The limiter settings carried by these flags.
    #[must_use]
    pub fn limiter(&self) -> LimiterConfig {
        LimiterConfig {
            rps: self.limiter_rps,
            burst: self.limiter_burst,
            enabled: self.limiter_enabled,
        }
    }
}
