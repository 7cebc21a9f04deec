//! Error types of the simulator.
//!
//! Configuration and connection errors stop the process at startup. Publish and
//! serialization errors only concern one tick: they are logged and the loop goes on.

use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid broker address '{address}': {reason}")]
    BrokerAddress { address: String, reason: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// The initial broker connection could not be established.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection to {address} failed: {source}")]
    Connection {
        address: String,
        #[source]
        source: rumqttc::ConnectionError,
    },

    #[error("broker {address} refused the connection ({code:?})")]
    Refused {
        address: String,
        code: rumqttc::ConnectReturnCode,
    },
}

/// A single publish was not accepted. The message is dropped, the loop goes on.
#[derive(Debug, Clone, Error)]
#[error("publish to {topic} failed: {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

#[derive(Debug, Error)]
#[error("cannot serialize message #{sequence} from {node}: {source}")]
pub struct SerializationError {
    pub node: String,
    pub sequence: u32,
    #[source]
    pub source: serde_json::Error,
}
