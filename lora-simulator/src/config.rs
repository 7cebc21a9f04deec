//! Simulator configuration.
//!
//! Defaults first, then an optional YAML file (`$SIMULATOR_CONFIG`, else
//! `simulator.yaml`), then environment overrides. Durations are written the
//! humantime way: `30s`, `250ms`, `1m 30s`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

pub const DEFAULT_BROKER: &str = "tcp://localhost:1883";
pub const DEFAULT_CLIENT_ID: &str = "lora-p2p-multi-simulator";
pub const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub broker: String,
    pub client_id: String,
    #[serde(with = "humantime_duration")]
    pub publish_interval: Duration,
    #[serde(with = "humantime_duration")]
    pub disconnect_grace: Duration,
    #[serde(with = "humantime_duration")]
    pub keep_alive: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            broker: DEFAULT_BROKER.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            publish_interval: Duration::from_secs(30),
            disconnect_grace: Duration::from_millis(250),
            keep_alive: Duration::from_secs(30),
        }
    }
}

impl SimulatorConfig {
    /// Loads file + process environment and validates the result.
    pub async fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SIMULATOR_CONFIG").unwrap_or_else(|_| "simulator.yaml".into());
        let mut config = Self::from_file(&path).await?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML file. A missing or empty file yields the defaults.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no {} found, using default configuration", path.display());
            return Ok(Self::default());
        }

        let txt = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&txt).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies `MQTT_BROKER`, `MQTT_CLIENT_ID`, `PUBLISH_INTERVAL`,
    /// `DISCONNECT_GRACE` and `MQTT_KEEP_ALIVE` as returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(broker) = lookup("MQTT_BROKER") {
            debug!(%broker, "broker overridden from environment");
            self.broker = broker;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Some(raw) = lookup("PUBLISH_INTERVAL") {
            self.publish_interval = parse_duration("PUBLISH_INTERVAL", &raw)?;
        }
        if let Some(raw) = lookup("DISCONNECT_GRACE") {
            self.disconnect_grace = parse_duration("DISCONNECT_GRACE", &raw)?;
        }
        if let Some(raw) = lookup("MQTT_KEEP_ALIVE") {
            self.keep_alive = parse_duration("MQTT_KEEP_ALIVE", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker_address()?;
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "client_id",
                reason: "must not be empty".into(),
            });
        }
        if self.publish_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "publish_interval",
                reason: "must be greater than zero".into(),
            });
        }
        // rumqttc rejects keep-alives below one second
        if self.keep_alive < Duration::from_secs(1) {
            return Err(ConfigError::InvalidValue {
                key: "keep_alive",
                reason: "must be at least 1s".into(),
            });
        }
        Ok(())
    }

    pub fn broker_address(&self) -> Result<BrokerAddress, ConfigError> {
        self.broker.parse()
    }
}

fn parse_duration(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key,
        reason: format!("'{}': {}", raw, e),
    })
}

/// Broker endpoint: `tcp://host:port`, `mqtt://host:port` or bare `host[:port]`.
/// IPv6 hosts go in brackets (`tcp://[::1]:1883`); `host` holds them without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for BrokerAddress {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::BrokerAddress {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix("tcp://")
            .or_else(|| raw.strip_prefix("mqtt://"))
            .unwrap_or(raw);
        if rest.contains("://") {
            return Err(invalid("unsupported scheme, expected tcp:// or mqtt://"));
        }

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unclosed '[' around IPv6 host"))?;
            let port = match tail {
                "" => DEFAULT_MQTT_PORT,
                _ => tail
                    .strip_prefix(':')
                    .ok_or_else(|| invalid("unexpected text after IPv6 host"))?
                    .parse::<u16>()
                    .map_err(|_| invalid("port is not a number"))?,
            };
            (host, port)
        } else {
            match rest.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => {
                    return Err(invalid("IPv6 hosts must be written in brackets, e.g. [::1]:1883"))
                }
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;
                    (host, port)
                }
                None => (rest, DEFAULT_MQTT_PORT),
            }
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self { host: host.to_string(), port })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "tcp://[{}]:{}", self.host, self.port)
        } else {
            write!(f, "tcp://{}:{}", self.host, self.port)
        }
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
