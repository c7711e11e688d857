//! Application settings gathered from the environment

use bincoms_client::ConnectionBuilder;
use bincoms_core::{BincomsError, BincomsResult};
use bincoms_server::ServerConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

pub const TTY_VAR: &str = "BINCOMS_TTY";
pub const BAUD_VAR: &str = "BINCOMS_BAUD";
pub const HOST_VAR: &str = "BINCOMS_HOST";
pub const PORT_VAR: &str = "BINCOMS_PORT";

pub const DEFAULT_TTY: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD: u32 = 1_000_000;
pub const DEFAULT_PORT: u16 = 7912;

/// Settings for the logic timer server binary
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub tty: String,
    pub baud_rate: u32,
    pub host: IpAddr,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tty: DEFAULT_TTY.to_string(),
            baud_rate: DEFAULT_BAUD,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Read settings from the process environment
    pub fn from_env() -> BincomsResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; unset variables keep their default
    ///
    /// # Errors
    /// Returns `InvalidData` if a variable is set but cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> BincomsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            tty: lookup(TTY_VAR).unwrap_or(defaults.tty),
            baud_rate: parse_var(&lookup, BAUD_VAR, defaults.baud_rate)?,
            host: parse_var(&lookup, HOST_VAR, defaults.host)?,
            port: parse_var(&lookup, PORT_VAR, defaults.port)?,
        })
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn connection(&self) -> ConnectionBuilder {
        ConnectionBuilder::new().serial(&self.tty, self.baud_rate)
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig::default().with_address(self.address())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> BincomsResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            BincomsError::InvalidData(format!("Invalid {} value '{}': {}", name, raw, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.tty, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 1_000_000);
        assert_eq!(config.address().to_string(), "0.0.0.0:7912");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (TTY_VAR, "/dev/ttyUSB1"),
            (BAUD_VAR, "115200"),
            (HOST_VAR, "127.0.0.1"),
            (PORT_VAR, "8000"),
        ]))
        .unwrap();
        assert_eq!(config.tty, "/dev/ttyUSB1");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.server().address.to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [(BAUD_VAR, "fast"), (HOST_VAR, "nowhere"), (PORT_VAR, "70000")] {
            match AppConfig::from_lookup(lookup(&[(name, value)])) {
                Err(BincomsError::InvalidData(message)) => assert!(message.contains(name)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
