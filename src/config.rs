use std::env;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite:englishauction.db?mode=rwc";
const DEFAULT_HTTP_PORT: u16 = 9470;
const DEFAULT_WS_PORT: u16 = 9471;
const DEFAULT_WORKER_TICK_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Service configuration, read from `AUCTION_*` environment variables with
/// sensible defaults for local runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub cors_origins: Option<String>,
    pub worker_tick: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            http_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_HTTP_PORT)),
            ws_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_WS_PORT)),
            cors_origins: None,
            worker_tick: Duration::from_millis(DEFAULT_WORKER_TICK_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let database_url =
            env::var("AUCTION_DATABASE_URL").unwrap_or(defaults.database_url);
        let http_addr = parse_addr("AUCTION_HTTP_ADDR", defaults.http_addr)?;
        let ws_addr = parse_addr("AUCTION_WS_ADDR", defaults.ws_addr)?;
        let cors_origins = env::var("AUCTION_CORS_ORIGINS").ok();
        let worker_tick = match env::var("AUCTION_WORKER_TICK_MS") {
            Ok(value) => Duration::from_millis(value.parse().map_err(|_| {
                ConfigError::Invalid {
                    var: "AUCTION_WORKER_TICK_MS",
                    value,
                }
            })?),
            Err(_) => defaults.worker_tick,
        };

        Ok(Config {
            database_url,
            http_addr,
            ws_addr,
            cors_origins,
            worker_tick,
        })
    }
}

fn parse_addr(var: &'static str, default: SocketAddr) -> Result<SocketAddr, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_well_formed() {
        let config = Config::default();
        assert_eq!(config.http_addr.port(), 9470);
        assert_eq!(config.ws_addr.port(), 9471);
        assert!(config.cors_origins.is_none());
        assert_eq!(config.worker_tick, Duration::from_millis(500));
    }
}
